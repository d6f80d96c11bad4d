//! Firebase Identity Toolkit phone-auth client.
//!
//! Two REST calls back the flow: `accounts:sendVerificationCode` issues the
//! challenge and returns a `sessionInfo` handle, and
//! `accounts:signInWithPhoneNumber` confirms the code against that handle.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use diya_core::{PhoneNumber, Uid};

use crate::config::FirebaseConfig;

use super::{ChallengeHandle, Identity, IdentityError, IdentityProvider};

/// Client for the Firebase Identity Toolkit REST API.
pub struct FirebaseIdentityClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeResponse {
    session_info: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    phone_number: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl FirebaseIdentityClient {
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{method}?key={}",
            self.base_url,
            self.api_key.expose_secret()
        )
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, IdentityError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map_or_else(|_| text.chars().take(200).collect(), |e| e.error.message);
            // Bad or expired codes come back as API errors, not transport ones.
            if message.starts_with("INVALID_CODE") || message.starts_with("SESSION_EXPIRED") {
                return Err(IdentityError::InvalidCode);
            }
            return Err(IdentityError::Rejected { message });
        }

        serde_json::from_str(&text).map_err(|e| IdentityError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityClient {
    #[instrument(skip(self, bot_token))]
    async fn issue_challenge(
        &self,
        phone: &PhoneNumber,
        bot_token: &str,
    ) -> Result<ChallengeHandle, IdentityError> {
        let response: SendCodeResponse = self
            .call(
                "sendVerificationCode",
                json!({
                    "phoneNumber": phone.as_str(),
                    "recaptchaToken": bot_token,
                }),
            )
            .await?;

        Ok(ChallengeHandle::new(response.session_info))
    }

    #[instrument(skip(self, handle, code))]
    async fn confirm_challenge(
        &self,
        handle: &ChallengeHandle,
        code: &str,
    ) -> Result<Identity, IdentityError> {
        let response: SignInResponse = self
            .call(
                "signInWithPhoneNumber",
                json!({
                    "sessionInfo": handle.as_str(),
                    "code": code,
                }),
            )
            .await?;

        let phone = PhoneNumber::parse(&response.phone_number)
            .map_err(|e| IdentityError::MalformedResponse(e.to_string()))?;

        Ok(Identity {
            uid: Uid::new(response.local_id),
            phone,
            email: response.email.filter(|e| !e.is_empty()),
        })
    }
}
