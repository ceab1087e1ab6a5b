use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("API error: {0}")]
    Api(#[from] core_auth::ApiError),

    #[error("Nothing could be loaded: {0}")]
    Aggregate(#[from] core_auth::AggregateError),
}

impl CoreError {
    /// True when the host should show the login screen.
    pub fn requires_login(&self) -> bool {
        match self {
            CoreError::Api(e) => e.requires_login(),
            CoreError::Aggregate(e) => e.requires_login(),
            CoreError::Auth(core_auth::AuthError::NoSession) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
