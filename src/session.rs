// ===============================
// src/session.rs
// ===============================
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::api::{ApiError, TradeApi};
use crate::domain::User;

/// Signed-in user as seen by the controllers. Cloning shares the same slot.
#[derive(Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Option<Arc<User>>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    pub fn anonymous() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn with_user(user: User) -> Self {
        let s = Self::anonymous();
        s.set(user);
        s
    }

    pub fn current(&self) -> Option<Arc<User>> {
        self.tx.borrow().clone()
    }

    /// Numeric id, needed for the trader blotter.
    pub fn user_id(&self) -> Option<i64> {
        self.current().and_then(|u| u.id)
    }

    /// Login id, needed for validation. Blank counts as missing.
    pub fn login_id(&self) -> Option<String> {
        self.current()
            .and_then(|u| u.login_id.clone())
            .filter(|l| !l.trim().is_empty())
    }

    pub fn set(&self, user: User) -> Arc<User> {
        let user = Arc::new(user);
        self.tx.send_replace(Some(user.clone()));
        user
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

/// Authenticates, then loads the user record into the session.
pub async fn sign_in<A: TradeApi + ?Sized>(
    api: &A,
    session: &Session,
    login: &str,
    password: &str,
) -> Result<Arc<User>, ApiError> {
    api.authenticate(login, password).await?;
    let mut user = api.user_by_login(login).await?;
    if user.login_id.as_deref().map_or(true, |l| l.trim().is_empty()) {
        user.login_id = Some(login.to_string());
    }
    info!(login, user_id = ?user.id, "signed in");
    Ok(session.set(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Call, FakeApi};

    #[test]
    fn blank_login_counts_as_missing() {
        let s = Session::with_user(User {
            id: Some(7),
            login_id: Some("  ".into()),
            ..User::default()
        });
        assert_eq!(s.user_id(), Some(7));
        assert_eq!(s.login_id(), None);
        s.clear();
        assert!(s.current().is_none());
    }

    #[tokio::test]
    async fn sign_in_loads_the_user_record() {
        let api = FakeApi::default();
        *api.user.lock().unwrap() = Ok(User {
            id: Some(11),
            login_id: None,
            ..User::default()
        });
        let session = Session::anonymous();

        let user = sign_in(&api, &session, "jsmith", "pw").await.unwrap();
        assert_eq!(user.id, Some(11));
        assert_eq!(session.login_id().as_deref(), Some("jsmith"));
        assert_eq!(
            api.calls(),
            vec![Call::Login("jsmith".into()), Call::UserByLogin("jsmith".into())]
        );
    }

    #[tokio::test]
    async fn failed_authentication_leaves_session_empty() {
        let api = FakeApi::default();
        *api.login.lock().unwrap() = Err(ApiError::Backend {
            status: 401,
            message: "Bad credentials".into(),
        });
        let session = Session::anonymous();

        let err = sign_in(&api, &session, "jsmith", "nope").await.unwrap_err();
        assert_eq!(err.user_message(), "Bad credentials");
        assert!(session.current().is_none());
        assert_eq!(api.calls(), vec![Call::Login("jsmith".into())]);
    }
}
