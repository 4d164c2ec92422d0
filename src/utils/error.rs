use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential load, signing, or token exchange failed. Fatal.
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Read error: {0}")]
    Read(String),

    #[error("Write error: {0}")]
    Write(String),
}

impl AppError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Authentication(_) => 1,
            AppError::Read(_) | AppError::Write(_) => 2,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
