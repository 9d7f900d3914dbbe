//! Auth API operations.

use reqwest::Method;
use todosync_core::envelope::ResponseEnvelope;
use todosync_core::todolist::{CaptchaResponse, EmptyData, LoginArgs, LoginData, MeData};
use tracing::debug;

use super::TodoClient;
use crate::error::Result;

impl TodoClient {
    /// Get the current user (`GET auth/me`).
    pub async fn me(&self) -> Result<ResponseEnvelope<MeData>> {
        let response = self.request(Method::GET, "auth/me").await.send().await?;
        self.handle_response(response).await
    }

    /// Get a fresh captcha image URL.
    pub async fn captcha_url(&self) -> Result<CaptchaResponse> {
        let response = self
            .request(Method::GET, "security/get-captcha-url")
            .await
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Log in with credentials (`POST auth/login`).
    pub async fn login(&self, args: &LoginArgs) -> Result<ResponseEnvelope<LoginData>> {
        debug!(email = %args.email, with_captcha = args.captcha.is_some(), "login request");
        let response = self
            .request(Method::POST, "auth/login")
            .await
            .json(args)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Log out (`DELETE auth/login`).
    pub async fn logout(&self) -> Result<ResponseEnvelope<EmptyData>> {
        let response = self
            .request(Method::DELETE, "auth/login")
            .await
            .send()
            .await?;
        self.handle_response(response).await
    }
}
