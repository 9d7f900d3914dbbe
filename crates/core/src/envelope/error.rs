use thiserror::Error;

/// Domain-level failures carried by a response envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Captcha required")]
    CaptchaRequired,
    #[error("{0}")]
    Rejected(String),
    #[error("Response is missing data")]
    MissingData,
}

impl EnvelopeError {
    /// Returns the message to show the user.
    pub fn user_message(&self) -> String {
        match self {
            EnvelopeError::CaptchaRequired => super::CAPTCHA_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
