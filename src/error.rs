use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Connectivity error: {0}")]
    ConnectivityError(String),
    #[error("Server error: {status} - {body}")]
    ServiceError { status: u16, body: String },
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    #[error("A payment is already being created")]
    SubmissionInProgress,
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, PaymentError>;

impl PaymentError {
    /// Text shown to the person at the terminal when an operation fails.
    pub fn user_message(&self) -> String {
        match self {
            Self::ValidationError(reason) => reason.clone(),
            Self::ConnectivityError(_) => "Connection failed - check server status".to_string(),
            Self::SubmissionInProgress => "A payment is already being created".to_string(),
            other => format!("Failed to create payment: {other}"),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::ProtocolError(err.to_string())
        } else {
            Self::ConnectivityError(err.to_string())
        }
    }
}
