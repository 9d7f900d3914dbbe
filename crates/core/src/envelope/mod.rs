//! Domain-level response envelope shared by every backend endpoint.
//!
//! A transport-level success can still be a domain failure: the backend
//! reports the outcome in `resultCode`, with human-readable `messages`.

mod error;
mod types;

pub use error::EnvelopeError;
pub use types::{EnvelopeOutcome, FieldError, ResponseEnvelope, ResultCode};

/// Message surfaced when a domain error carries no message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Some error occurred";

/// Message surfaced when a login attempt needs a captcha.
pub const CAPTCHA_MESSAGE: &str = "Please enter the captcha";

/// Message surfaced for transport failures.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error occurred";
