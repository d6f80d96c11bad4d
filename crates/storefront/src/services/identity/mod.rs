//! Identity provider collaborator and profile storage.
//!
//! The identity provider owns phone verification: it sends the one-time code
//! out of band and checks the code the user types back. The storefront never
//! sees the code itself, only an opaque challenge handle.

mod firebase;

pub use firebase::FirebaseIdentityClient;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use diya_core::{Email, PhoneNumber, Uid, UserProfile};

/// Opaque handle for an outstanding verification challenge.
///
/// Returned when a code is sent and consumed when the code is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeHandle(String);

impl ChallengeHandle {
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A verified identity returned by the provider on successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: Uid,
    pub phone: PhoneNumber,
    /// Email the provider already holds for this account, if any.
    pub email: Option<String>,
}

/// Errors from the identity provider collaborator.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Transport-level failure reaching the provider.
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request for a reason other than a bad code.
    #[error("identity provider rejected the request: {message}")]
    Rejected { message: String },

    /// The submitted code did not match, or the challenge has expired.
    #[error("verification code rejected")]
    InvalidCode,

    /// The provider answered with a body we could not interpret.
    #[error("malformed identity provider response: {0}")]
    MalformedResponse(String),
}

/// Phone verification operations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Send a one-time code to `phone` and return the challenge handle.
    ///
    /// `bot_token` is the anti-abuse token collected client-side before the
    /// code is sent.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] when the provider is unreachable or
    /// rejects the request.
    async fn issue_challenge(
        &self,
        phone: &PhoneNumber,
        bot_token: &str,
    ) -> Result<ChallengeHandle, IdentityError>;

    /// Confirm the code the user typed against an outstanding challenge.
    ///
    /// A successful confirmation consumes the handle.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCode`] when the code does not match or
    /// the challenge has expired, and other variants for transport failures.
    async fn confirm_challenge(
        &self,
        handle: &ChallengeHandle,
        code: &str,
    ) -> Result<Identity, IdentityError>;
}

/// Errors from the profile store.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No profile exists for the given uid.
    #[error("no profile for uid {0}")]
    NotFound(Uid),

    /// The backing store failed.
    #[error("profile store failure: {0}")]
    Store(String),
}

/// Profile document storage keyed by provider uid.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch the profile for `uid`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Store`] when the backing store fails.
    async fn profile(&self, uid: &Uid) -> Result<Option<UserProfile>, ProfileError>;

    /// Record a successful verification: create an incomplete profile for a
    /// first-time user, or refresh `last_login_at` for a returning one.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Store`] when the backing store fails.
    async fn record_verification(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, ProfileError>;

    /// Complete a profile with the supplied name and email.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] when no profile exists for `uid`.
    async fn complete(
        &self,
        uid: &Uid,
        full_name: &str,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, ProfileError>;
}

// ============================================================================
// In-memory repository
// ============================================================================

/// In-process profile store.
///
/// Profiles live for the lifetime of the server; durable storage sits behind
/// the same trait when it arrives.
#[derive(Debug, Default)]
pub struct MemoryProfileRepository {
    profiles: RwLock<HashMap<Uid, UserProfile>>,
}

impl MemoryProfileRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfileRepository {
    async fn profile(&self, uid: &Uid) -> Result<Option<UserProfile>, ProfileError> {
        Ok(self.profiles.read().await.get(uid).cloned())
    }

    async fn record_verification(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, ProfileError> {
        let mut profiles = self.profiles.write().await;

        let profile = match profiles.get_mut(&identity.uid) {
            Some(existing) => {
                existing.touch_last_login(now);
                existing.clone()
            }
            None => {
                let email = identity
                    .email
                    .as_deref()
                    .and_then(|e| Email::parse(e).ok());
                let profile = UserProfile::incomplete(
                    identity.uid.clone(),
                    identity.phone.clone(),
                    email.as_ref(),
                    now,
                );
                profiles.insert(identity.uid.clone(), profile.clone());
                profile
            }
        };

        Ok(profile)
    }

    async fn complete(
        &self,
        uid: &Uid,
        full_name: &str,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, ProfileError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(uid)
            .ok_or_else(|| ProfileError::NotFound(uid.clone()))?;
        profile.complete(full_name, email, now);
        Ok(profile.clone())
    }
}
