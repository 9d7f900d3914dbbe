use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::EnvelopeError;
use super::{CAPTCHA_MESSAGE, DEFAULT_ERROR_MESSAGE};

/// Domain result code of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ResultCode {
    Success,
    Error,
    CaptchaError,
    Other(i32),
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Error,
            10 => Self::CaptchaError,
            other => Self::Other(other),
        }
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::Success => 0,
            ResultCode::Error => 1,
            ResultCode::CaptchaError => 10,
            ResultCode::Other(code) => code,
        }
    }
}

/// A per-field validation error reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

/// `{resultCode, messages, data}` wrapper returned by every domain endpoint.
///
/// `data` is decoded leniently: error responses usually carry `{}`, which
/// does not fit the success payload type, so a payload that fails to decode
/// is kept as `None` instead of failing the whole response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: DeserializeOwned", serialize = "T: Serialize"))]
pub struct ResponseEnvelope<T> {
    pub result_code: ResultCode,
    #[serde(default, deserialize_with = "crate::serde::deserialize_null_vec")]
    pub messages: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub data: Option<T>,
    #[serde(default, deserialize_with = "crate::serde::deserialize_null_vec")]
    pub fields_errors: Vec<FieldError>,
}

fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// Classification of an envelope, as the UI acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeOutcome<T> {
    /// `resultCode == 0`: the payload is authoritative.
    Success(T),
    /// `resultCode == 10`: the user must solve a captcha before retrying.
    CaptchaRequired { message: String },
    /// Any other code: a form-level message, no state change.
    Rejected { message: String },
}

impl<T> ResponseEnvelope<T> {
    /// Creates a successful envelope around `data`.
    pub fn success(data: T) -> Self {
        Self {
            result_code: ResultCode::Success,
            messages: Vec::new(),
            data: Some(data),
            fields_errors: Vec::new(),
        }
    }

    /// Creates a failed envelope with the given code and messages.
    pub fn failure(result_code: ResultCode, messages: Vec<String>) -> Self {
        Self {
            result_code,
            messages,
            data: None,
            fields_errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == ResultCode::Success
    }

    /// First backend message, or `default` when there is none.
    pub fn first_message_or(&self, default: &str) -> String {
        self.messages
            .first()
            .filter(|m| !m.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Classifies the envelope, using `default_message` for rejections
    /// that carry no message.
    pub fn outcome(self, default_message: &str) -> EnvelopeOutcome<T> {
        match self.result_code {
            ResultCode::Success => match self.data {
                Some(data) => EnvelopeOutcome::Success(data),
                None => EnvelopeOutcome::Rejected {
                    message: EnvelopeError::MissingData.to_string(),
                },
            },
            ResultCode::CaptchaError => EnvelopeOutcome::CaptchaRequired {
                message: CAPTCHA_MESSAGE.to_string(),
            },
            _ => EnvelopeOutcome::Rejected {
                message: self.first_message_or(default_message),
            },
        }
    }

    /// Converts the envelope into its payload or a domain error.
    pub fn into_result(self) -> Result<T, EnvelopeError> {
        match self.result_code {
            ResultCode::Success => self.data.ok_or(EnvelopeError::MissingData),
            ResultCode::CaptchaError => Err(EnvelopeError::CaptchaRequired),
            _ => Err(EnvelopeError::Rejected(
                self.first_message_or(DEFAULT_ERROR_MESSAGE),
            )),
        }
    }

    /// Checks the result code only, discarding the payload.
    pub fn check(self) -> Result<(), EnvelopeError> {
        match self.result_code {
            ResultCode::Success => Ok(()),
            ResultCode::CaptchaError => Err(EnvelopeError::CaptchaRequired),
            _ => Err(EnvelopeError::Rejected(
                self.first_message_or(DEFAULT_ERROR_MESSAGE),
            )),
        }
    }
}
