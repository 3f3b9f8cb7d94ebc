// ===============================
// src/validation.rs
// ===============================
//
// Trade validation modal: create / amend / read checks for the held trade
// on behalf of the signed-in login id. Same supersession rule as search:
// only the pending request may land, a mode switch or clear abandons it.
//
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::TradeApi;
use crate::domain::{Trade, ValidationResult};
use crate::notify::Snackbar;
use crate::session::Session;
use crate::store::{Reducer, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    Create,
    Amend,
    Read,
}

impl ValidationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "new" => Some(ValidationMode::Create),
            "amend" | "amendment" => Some(ValidationMode::Amend),
            "read" => Some(ValidationMode::Read),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ValidationMode::Create => "Create",
            ValidationMode::Amend => "Amend",
            ValidationMode::Read => "Read",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationState {
    pub mode: ValidationMode,
    pub trade: Trade,
    pub result: Option<ValidationResult>,
    pub loading: bool,
    pub pending: Option<u64>,
    pub requests: u64,
    pub snackbar: Snackbar,
}

impl Default for ValidationState {
    fn default() -> Self {
        Self {
            mode: ValidationMode::default(),
            trade: Trade::draft(),
            result: None,
            loading: false,
            pending: None,
            requests: 0,
            snackbar: Snackbar::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ValidationAction {
    SetMode(ValidationMode),
    SetTrade(Trade),
    Clear,
    MissingIdentity,
    Start,
    Succeeded { request: u64, result: ValidationResult },
    Failed { request: u64, message: String },
    DismissNotice,
}

impl ValidationState {
    fn abandon(&mut self) {
        self.result = None;
        self.loading = false;
        self.pending = None;
    }
}

impl Reducer for ValidationState {
    type Action = ValidationAction;

    fn reduce(&self, action: ValidationAction) -> Self {
        let mut next = self.clone();
        match action {
            ValidationAction::SetMode(mode) => {
                next.mode = mode;
                next.abandon();
            }
            ValidationAction::SetTrade(trade) => {
                next.trade = trade;
                next.result = None;
            }
            ValidationAction::Clear => next.abandon(),
            ValidationAction::MissingIdentity => {
                next.snackbar = self.snackbar.error("User login ID not available");
            }
            ValidationAction::Start => {
                next.requests += 1;
                next.pending = Some(next.requests);
                next.loading = true;
            }
            ValidationAction::Succeeded { request, result } => {
                if self.pending != Some(request) {
                    return next;
                }
                next.snackbar = self.snackbar.success("Validation completed");
                next.result = Some(result);
                next.loading = false;
                next.pending = None;
            }
            ValidationAction::Failed { request, message } => {
                if self.pending != Some(request) {
                    return next;
                }
                next.snackbar = self.snackbar.error(format!("Validation failed: {message}"));
                next.loading = false;
                next.pending = None;
            }
            ValidationAction::DismissNotice => next.snackbar = self.snackbar.dismiss(),
        }
        next
    }
}

pub struct ValidationController<A: TradeApi + ?Sized> {
    api: Arc<A>,
    session: Session,
    store: Store<ValidationState>,
}

impl<A: TradeApi + ?Sized> ValidationController<A> {
    pub fn new(api: Arc<A>, session: Session) -> Self {
        Self::with_trade(api, session, Trade::draft())
    }

    pub fn with_trade(api: Arc<A>, session: Session, trade: Trade) -> Self {
        let state = ValidationState {
            trade,
            ..ValidationState::default()
        };
        Self {
            api,
            session,
            store: Store::new(state),
        }
    }

    pub fn state(&self) -> Arc<ValidationState> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ValidationState>> {
        self.store.subscribe()
    }

    pub fn dispatch(&self, action: ValidationAction) -> Arc<ValidationState> {
        self.store.dispatch(action)
    }

    pub fn clear(&self) -> Arc<ValidationState> {
        self.store.dispatch(ValidationAction::Clear)
    }

    pub async fn validate(&self) -> Arc<ValidationState> {
        let Some(user_id) = self.session.login_id() else {
            warn!("validation requested without a signed-in login id");
            return self.store.dispatch(ValidationAction::MissingIdentity);
        };

        let started = self.store.dispatch(ValidationAction::Start);
        let request = started.requests;
        info!(mode = ?started.mode, request, user_id = %user_id, "trade validation");

        let outcome = match started.mode {
            ValidationMode::Create => self.api.validate_creation(&started.trade, &user_id).await,
            ValidationMode::Amend => self.api.validate_amendment(&started.trade, &user_id).await,
            ValidationMode::Read => self.api.validate_read(&user_id).await,
        };

        match outcome {
            Ok(result) => {
                info!(
                    request,
                    valid = result.is_valid,
                    errors = result.errors.len(),
                    warnings = result.warnings.len(),
                    "trade validation done"
                );
                self.store
                    .dispatch(ValidationAction::Succeeded { request, result })
            }
            Err(e) => {
                warn!(request, error = %e, "trade validation failed");
                self.store.dispatch(ValidationAction::Failed {
                    request,
                    message: e.user_message(),
                })
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum TradeFileError {
    #[error("cannot read trade file: {0}")]
    Io(#[from] std::io::Error),
    #[error("trade file is not a valid trade: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads a trade document (the same JSON the backend accepts).
pub fn load_trade(path: impl AsRef<Path>) -> Result<Trade, TradeFileError> {
    let raw = std::fs::read(path.as_ref())?;
    Ok(serde_json::from_slice(&raw)?)
}
