//! Sign-in route handlers.
//!
//! The OTP flow lives server-side; every response reports the current stage
//! plus whatever the matching screen needs (masked phone, resend timer,
//! profile).

use std::time::Instant;

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use diya_core::UserProfile;

use crate::error::Result;
use crate::services::auth::{AuthStage, OtpFlow};
use crate::state::AppState;

/// The sign-in flow as rendered to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum AuthView {
    PhoneEntry,
    #[serde(rename_all = "camelCase")]
    CodeEntry {
        phone: String,
        can_resend: bool,
        resend_in_secs: u64,
    },
    #[serde(rename_all = "camelCase")]
    ProfileIncomplete { profile: UserProfile },
    #[serde(rename_all = "camelCase")]
    Authenticated { profile: UserProfile },
}

impl AuthView {
    fn render(flow: &OtpFlow, now: Instant) -> Self {
        match flow.stage() {
            AuthStage::PhoneEntry => Self::PhoneEntry,
            AuthStage::ChallengeIssued { phone, .. } => Self::CodeEntry {
                phone: phone.as_str().to_owned(),
                can_resend: flow.can_resend(now),
                resend_in_secs: flow
                    .resend_available_in(now)
                    .map_or(0, |d| d.as_secs()),
            },
            // A pending profile lookup never normally renders: verify and
            // /auth/session both resolve it before answering.
            AuthStage::Verified { .. } => Self::PhoneEntry,
            AuthStage::ProfileIncomplete { profile, .. } => Self::ProfileIncomplete {
                profile: profile.clone(),
            },
            AuthStage::Authenticated { profile } => Self::Authenticated {
                profile: profile.clone(),
            },
        }
    }
}

/// Phone submission body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneBody {
    pub phone: String,
    pub bot_token: String,
}

/// Code submission body.
#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub code: String,
}

/// Resend body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendBody {
    pub bot_token: String,
}

/// Profile completion body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
    pub full_name: String,
    pub email: String,
}

/// POST /auth/phone - Submit the phone number and send the first code.
#[instrument(skip_all)]
pub async fn submit_phone(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<PhoneBody>,
) -> Result<Json<AuthView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;

    let now = Instant::now();
    guard
        .auth
        .submit_phone(&body.phone, &body.bot_token, state.identity(), now)
        .await?;

    Ok(Json(AuthView::render(&guard.auth, now)))
}

/// POST /auth/verify - Submit the OTP code.
///
/// On a correct code the profile is resolved in the same request: returning
/// users come back authenticated, first-timers land at profile completion.
/// If an earlier verify confirmed the code but the profile lookup failed,
/// this retries the lookup without burning another code.
#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<VerifyBody>,
) -> Result<Json<AuthView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;

    if !matches!(guard.auth.stage(), AuthStage::Verified { .. }) {
        guard.auth.submit_code(&body.code, state.identity()).await?;
    }
    guard
        .auth
        .resolve_profile(state.profiles(), Utc::now())
        .await?;

    Ok(Json(AuthView::render(&guard.auth, Instant::now())))
}

/// POST /auth/resend - Re-send the code after the cooldown.
#[instrument(skip_all)]
pub async fn resend(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ResendBody>,
) -> Result<Json<AuthView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;

    let now = Instant::now();
    guard
        .auth
        .resend(&body.bot_token, state.identity(), now)
        .await?;

    Ok(Json(AuthView::render(&guard.auth, now)))
}

/// POST /auth/change-number - Abandon the challenge and re-enter the phone.
#[instrument(skip_all)]
pub async fn change_number(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<AuthView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;

    guard.auth.change_number()?;
    Ok(Json(AuthView::render(&guard.auth, Instant::now())))
}

/// POST /auth/profile - Complete a first-time profile.
#[instrument(skip_all)]
pub async fn complete_profile(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ProfileBody>,
) -> Result<Json<AuthView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;

    guard
        .auth
        .complete_profile(&body.full_name, &body.email, state.profiles(), Utc::now())
        .await?;

    Ok(Json(AuthView::render(&guard.auth, Instant::now())))
}

/// GET /auth/session - Current sign-in stage.
#[instrument(skip_all)]
pub async fn session(State(state): State<AppState>, session: Session) -> Result<Json<AuthView>> {
    let entry = state
        .sessions()
        .resolve(&session, state.config().otp_resend_cooldown)
        .await?;
    let mut guard = entry.lock().await;

    // Finish a half-done verify if a profile lookup failed earlier.
    if matches!(guard.auth.stage(), AuthStage::Verified { .. }) {
        guard
            .auth
            .resolve_profile(state.profiles(), Utc::now())
            .await?;
    }

    Ok(Json(AuthView::render(&guard.auth, Instant::now())))
}
