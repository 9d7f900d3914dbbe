use serde::{Deserialize, Serialize};

use crate::cache::EndpointConfig;

/// Global request status shown by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Single-instance application/session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_logged_in: bool,
    pub status: RequestStatus,
    pub error: Option<String>,
    pub captcha_url: Option<String>,
}

/// Everything that can change the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    RequestStarted(EndpointConfig),
    RequestFulfilled(EndpointConfig),
    RequestRejected(EndpointConfig),
    SetStatus(RequestStatus),
    SetError(Option<String>),
    SetLoggedIn(bool),
    SetCaptchaUrl(Option<String>),
    /// Back to the logged-out initial state.
    Reset,
}

impl SessionState {
    /// Applies `action` in place.
    ///
    /// Request lifecycle events are last-writer-wins across every in-flight
    /// request. A start only flips the status to `loading` when the endpoint
    /// opts in via `affects_global_status`; settlement always applies.
    pub fn apply(&mut self, action: SessionAction) {
        match action {
            SessionAction::RequestStarted(config) => {
                if config.affects_global_status {
                    self.status = RequestStatus::Loading;
                }
            }
            SessionAction::RequestFulfilled(_) => self.status = RequestStatus::Succeeded,
            SessionAction::RequestRejected(_) => self.status = RequestStatus::Failed,
            SessionAction::SetStatus(status) => self.status = status,
            SessionAction::SetError(error) => self.error = error,
            SessionAction::SetLoggedIn(is_logged_in) => self.is_logged_in = is_logged_in,
            SessionAction::SetCaptchaUrl(captcha_url) => self.captcha_url = captcha_url,
            SessionAction::Reset => *self = SessionState::default(),
        }
    }
}
