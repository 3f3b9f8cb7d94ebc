// ===============================
// src/notify.rs
// ===============================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

impl NoticeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
        }
    }
}

/// Transient outcome message (the snackbar). `id` grows per raised notice,
/// so a viewer can tell a new notice from one it already showed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

/// Notice slot carried by every controller state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snackbar {
    pub current: Option<Notice>,
    raised: u64,
}

impl Snackbar {
    pub fn raise(&self, kind: NoticeKind, message: impl Into<String>) -> Self {
        let id = self.raised + 1;
        Snackbar {
            current: Some(Notice {
                id,
                kind,
                message: message.into(),
            }),
            raised: id,
        }
    }

    pub fn success(&self, message: impl Into<String>) -> Self {
        self.raise(NoticeKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Self {
        self.raise(NoticeKind::Error, message)
    }

    pub fn dismiss(&self) -> Self {
        Snackbar {
            current: None,
            raised: self.raised,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.current.as_ref().map(|n| n.message.as_str())
    }

    pub fn kind(&self) -> Option<NoticeKind> {
        self.current.as_ref().map(|n| n.kind)
    }
}
