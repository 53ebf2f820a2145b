use thiserror::Error;

/// Failures surfaced by chat operations. Store failures collapse into
/// `Internal`; everything else names what the caller got wrong.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// Stable name for the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Unauthenticated => "Unauthenticated",
            ChatError::Forbidden(_) => "Forbidden",
            ChatError::NotFound(_) => "NotFound",
            ChatError::Conflict(_) => "Conflict",
            ChatError::InvalidArgument(_) => "InvalidArgument",
            ChatError::Internal(_) => "Internal",
        }
    }

    pub fn room_not_found(id: i64) -> Self {
        ChatError::NotFound(format!("room {}", id))
    }

    pub fn message_not_found(id: i64) -> Self {
        ChatError::NotFound(format!("message {}", id))
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_become_internal() {
        fn failing() -> ChatResult<()> {
            Err(anyhow::anyhow!("disk full"))?;
            Ok(())
        }
        let err = failing().unwrap_err();
        assert_eq!(err.kind(), "Internal");
        assert_eq!(ChatError::room_not_found(4).to_string(), "Not found: room 4");
    }
}
