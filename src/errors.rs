use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no active session")]
    NoSession,

    #[error("session changed while the request was in flight")]
    SessionChanged,

    #[error("backend returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl SyncError {
    /// Short machine-readable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NoSession => "no_session",
            SyncError::SessionChanged => "session_changed",
            SyncError::Server { .. } => "server",
            SyncError::Transport(_) => "transport",
            SyncError::Decode(_) => "decode",
            SyncError::InvalidUrl(_) => "invalid_url",
        }
    }

    /// True for failures caused by the session ending rather than the backend.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, SyncError::NoSession | SyncError::SessionChanged)
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display_includes_status_and_message() {
        let err = SyncError::Server {
            status: 404,
            message: "Notification not found".into(),
        };
        assert_eq!(err.to_string(), "backend returned 404: Notification not found");
        assert_eq!(err.kind(), "server");
    }

    #[test]
    fn test_session_loss_classification() {
        assert!(SyncError::NoSession.is_session_loss());
        assert!(SyncError::SessionChanged.is_session_loss());
        assert!(!SyncError::Server {
            status: 500,
            message: "boom".into()
        }
        .is_session_loss());
    }
}
