use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Connection-level failure before an HTTP status was received.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for failures where no response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Transport(_) | BridgeError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
