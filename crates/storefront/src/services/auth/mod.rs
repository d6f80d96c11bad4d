//! OTP sign-in flow state machine.
//!
//! Phone number in, verified profile out: the flow walks from phone entry
//! through code verification to an authenticated session, creating or
//! completing the user's profile along the way. The one-time code itself
//! never passes through here; the identity provider holds it and we hold an
//! opaque challenge handle.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use diya_core::{Email, EmailError, PhoneError, PhoneNumber, UserProfile};

use crate::services::identity::{
    ChallengeHandle, Identity, IdentityError, IdentityProvider, ProfileError, ProfileRepository,
};

/// Expected one-time code length.
const CODE_LENGTH: usize = 6;

/// Default wait before a code may be re-sent.
pub const DEFAULT_RESEND_COOLDOWN: Duration = Duration::from_secs(60);

/// Errors from OTP flow operations.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// The phone input is not a valid 10-digit national number.
    #[error(transparent)]
    InvalidPhone(#[from] PhoneError),

    /// The code input is not six digits; never sent to the provider.
    #[error("verification code must be {CODE_LENGTH} digits")]
    MalformedCode,

    /// The provider rejected the code; the challenge stays open.
    #[error("verification code rejected")]
    WrongCode,

    /// A resend was requested before the cooldown elapsed.
    #[error("please wait before requesting another code")]
    CooldownActive { retry_in: Duration },

    /// The operation does not apply to the current stage.
    #[error("cannot {action} at this sign-in stage")]
    InvalidState { action: &'static str },

    /// The email input failed validation; never persisted.
    #[error(transparent)]
    InvalidEmail(#[from] EmailError),

    /// The full name input is blank.
    #[error("full name cannot be empty")]
    EmptyName,

    /// The identity provider failed.
    #[error(transparent)]
    Provider(IdentityError),

    /// The profile store failed.
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

impl From<IdentityError> for AuthFlowError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCode => Self::WrongCode,
            other => Self::Provider(other),
        }
    }
}

/// Where the user is in the sign-in flow.
#[derive(Debug, Clone)]
pub enum AuthStage {
    /// Waiting for a phone number.
    PhoneEntry,
    /// A code has been sent; waiting for the user to type it back.
    ChallengeIssued {
        phone: PhoneNumber,
        handle: ChallengeHandle,
        resend_available_at: Instant,
    },
    /// The code checked out but the profile has not been resolved yet.
    ///
    /// A distinct stage so a profile-store failure can be retried without
    /// re-confirming a code the provider has already consumed.
    Verified { identity: Identity },
    /// Signed in, but the profile still needs a name and email.
    ProfileIncomplete {
        identity: Identity,
        profile: UserProfile,
    },
    /// Signed in with a complete profile. Terminal.
    Authenticated { profile: UserProfile },
}

/// One session's OTP sign-in flow.
///
/// Time is passed in explicitly ([`Instant`] for the resend cooldown,
/// [`DateTime<Utc>`] for profile timestamps) so transitions stay
/// deterministic under test.
#[derive(Debug, Clone)]
pub struct OtpFlow {
    stage: AuthStage,
    resend_cooldown: Duration,
}

impl Default for OtpFlow {
    fn default() -> Self {
        Self::new(DEFAULT_RESEND_COOLDOWN)
    }
}

impl OtpFlow {
    /// Start a flow at phone entry with the given resend cooldown.
    #[must_use]
    pub const fn new(resend_cooldown: Duration) -> Self {
        Self {
            stage: AuthStage::PhoneEntry,
            resend_cooldown,
        }
    }

    /// The current stage.
    #[must_use]
    pub const fn stage(&self) -> &AuthStage {
        &self.stage
    }

    /// Whether a resend would be accepted at `now`.
    #[must_use]
    pub fn can_resend(&self, now: Instant) -> bool {
        match &self.stage {
            AuthStage::ChallengeIssued {
                resend_available_at,
                ..
            } => now >= *resend_available_at,
            _ => false,
        }
    }

    /// Time left on the resend cooldown, if a challenge is outstanding.
    #[must_use]
    pub fn resend_available_in(&self, now: Instant) -> Option<Duration> {
        match &self.stage {
            AuthStage::ChallengeIssued {
                resend_available_at,
                ..
            } => Some(resend_available_at.saturating_duration_since(now)),
            _ => None,
        }
    }

    /// Submit a phone number and send the first code.
    ///
    /// The input must be exactly ten digits; it is rejected locally before
    /// the provider is contacted. On success a challenge is outstanding and
    /// the resend cooldown starts.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::InvalidPhone`] for malformed input,
    /// [`AuthFlowError::InvalidState`] when a challenge is already
    /// outstanding, and [`AuthFlowError::Provider`] when sending fails (the
    /// flow stays at phone entry).
    #[instrument(skip_all)]
    pub async fn submit_phone(
        &mut self,
        input: &str,
        bot_token: &str,
        provider: &dyn IdentityProvider,
        now: Instant,
    ) -> Result<(), AuthFlowError> {
        let AuthStage::PhoneEntry = &self.stage else {
            return Err(AuthFlowError::InvalidState {
                action: "submit a phone number",
            });
        };

        let phone = PhoneNumber::parse_national(input.trim())?;
        let handle = provider.issue_challenge(&phone, bot_token).await?;

        self.stage = AuthStage::ChallengeIssued {
            phone,
            handle,
            resend_available_at: now + self.resend_cooldown,
        };
        Ok(())
    }

    /// Re-send the code to the same phone number.
    ///
    /// Issues a fresh challenge; the old handle is superseded, so only the
    /// newest code verifies. If the provider fails, the previous challenge
    /// stays live.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::CooldownActive`] until the cooldown elapses
    /// and [`AuthFlowError::InvalidState`] when no challenge is outstanding.
    #[instrument(skip_all)]
    pub async fn resend(
        &mut self,
        bot_token: &str,
        provider: &dyn IdentityProvider,
        now: Instant,
    ) -> Result<(), AuthFlowError> {
        let AuthStage::ChallengeIssued {
            phone,
            resend_available_at,
            ..
        } = &self.stage
        else {
            return Err(AuthFlowError::InvalidState {
                action: "resend a code",
            });
        };

        if now < *resend_available_at {
            return Err(AuthFlowError::CooldownActive {
                retry_in: resend_available_at.saturating_duration_since(now),
            });
        }

        let phone = phone.clone();
        let handle = provider.issue_challenge(&phone, bot_token).await?;

        self.stage = AuthStage::ChallengeIssued {
            phone,
            handle,
            resend_available_at: now + self.resend_cooldown,
        };
        Ok(())
    }

    /// Abandon the outstanding challenge and return to phone entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::InvalidState`] when no challenge is
    /// outstanding.
    pub fn change_number(&mut self) -> Result<(), AuthFlowError> {
        let AuthStage::ChallengeIssued { .. } = &self.stage else {
            return Err(AuthFlowError::InvalidState {
                action: "change the phone number",
            });
        };
        self.stage = AuthStage::PhoneEntry;
        Ok(())
    }

    /// Submit the code the user typed.
    ///
    /// Anything that is not six digits is rejected locally without spending
    /// a provider round trip. A wrong code leaves the challenge open for
    /// another try.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::MalformedCode`] for non-six-digit input,
    /// [`AuthFlowError::WrongCode`] when the provider rejects the code, and
    /// [`AuthFlowError::InvalidState`] when no challenge is outstanding.
    #[instrument(skip_all)]
    pub async fn submit_code(
        &mut self,
        code: &str,
        provider: &dyn IdentityProvider,
    ) -> Result<(), AuthFlowError> {
        let AuthStage::ChallengeIssued { handle, .. } = &self.stage else {
            return Err(AuthFlowError::InvalidState {
                action: "submit a code",
            });
        };

        let code = code.trim();
        if code.len() != CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthFlowError::MalformedCode);
        }

        let identity = provider.confirm_challenge(handle, code).await?;
        self.stage = AuthStage::Verified { identity };
        Ok(())
    }

    /// Resolve the verified identity against the profile store.
    ///
    /// First-time users get an incomplete profile and land at
    /// [`AuthStage::ProfileIncomplete`]; returning users with a complete
    /// profile land at [`AuthStage::Authenticated`] with their last-login
    /// timestamp refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::Profile`] when the store fails; the flow
    /// stays at [`AuthStage::Verified`] so the lookup can be retried.
    #[instrument(skip_all)]
    pub async fn resolve_profile(
        &mut self,
        profiles: &dyn ProfileRepository,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AuthFlowError> {
        let AuthStage::Verified { identity } = &self.stage else {
            return Err(AuthFlowError::InvalidState {
                action: "resolve the profile",
            });
        };

        let identity = identity.clone();
        let profile = profiles.record_verification(&identity, now).await?;

        self.stage = if profile.profile_completed {
            AuthStage::Authenticated {
                profile: profile.clone(),
            }
        } else {
            AuthStage::ProfileIncomplete {
                identity,
                profile: profile.clone(),
            }
        };
        Ok(profile)
    }

    /// Supply the name and email that complete a first-time profile.
    ///
    /// Both inputs are validated locally before the store is touched; a
    /// rejected email leaves the stage unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::EmptyName`] or [`AuthFlowError::InvalidEmail`]
    /// for bad input, and [`AuthFlowError::InvalidState`] when the profile is
    /// not awaiting completion.
    #[instrument(skip_all)]
    pub async fn complete_profile(
        &mut self,
        full_name: &str,
        email: &str,
        profiles: &dyn ProfileRepository,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, AuthFlowError> {
        let AuthStage::ProfileIncomplete { identity, .. } = &self.stage else {
            return Err(AuthFlowError::InvalidState {
                action: "complete the profile",
            });
        };

        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(AuthFlowError::EmptyName);
        }
        let email = Email::parse(email.trim())?;

        let profile = profiles
            .complete(&identity.uid, full_name, &email, now)
            .await?;

        self.stage = AuthStage::Authenticated {
            profile: profile.clone(),
        };
        Ok(profile)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use diya_core::Uid;

    use crate::services::identity::MemoryProfileRepository;

    use super::*;

    /// Provider double: hands out numbered handles, accepts code "123456".
    #[derive(Default)]
    struct FakeProvider {
        challenges_issued: AtomicUsize,
        fail_issue: bool,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn issue_challenge(
            &self,
            _phone: &PhoneNumber,
            _bot_token: &str,
        ) -> Result<ChallengeHandle, IdentityError> {
            if self.fail_issue {
                return Err(IdentityError::Rejected {
                    message: "quota exceeded".to_owned(),
                });
            }
            let n = self.challenges_issued.fetch_add(1, Ordering::SeqCst);
            Ok(ChallengeHandle::new(format!("challenge_{n}")))
        }

        async fn confirm_challenge(
            &self,
            _handle: &ChallengeHandle,
            code: &str,
        ) -> Result<Identity, IdentityError> {
            if code != "123456" {
                return Err(IdentityError::InvalidCode);
            }
            Ok(Identity {
                uid: Uid::new("uid-1"),
                phone: PhoneNumber::parse("9876543210").unwrap(),
                email: None,
            })
        }
    }

    async fn flow_with_challenge(provider: &FakeProvider, now: Instant) -> OtpFlow {
        let mut flow = OtpFlow::default();
        flow.submit_phone("9876543210", "token", provider, now)
            .await
            .unwrap();
        flow
    }

    #[tokio::test]
    async fn test_short_phone_rejected_without_provider_call() {
        let provider = FakeProvider::default();
        let mut flow = OtpFlow::default();

        let err = flow
            .submit_phone("987654321", "token", &provider, Instant::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFlowError::InvalidPhone(_)));
        assert_eq!(provider.challenges_issued.load(Ordering::SeqCst), 0);
        assert!(matches!(flow.stage(), AuthStage::PhoneEntry));
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_phone_entry() {
        let provider = FakeProvider {
            fail_issue: true,
            ..FakeProvider::default()
        };
        let mut flow = OtpFlow::default();

        let err = flow
            .submit_phone("9876543210", "token", &provider, Instant::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFlowError::Provider(_)));
        assert!(matches!(flow.stage(), AuthStage::PhoneEntry));
    }

    #[tokio::test]
    async fn test_malformed_code_rejected_locally() {
        let provider = FakeProvider::default();
        let now = Instant::now();
        let mut flow = flow_with_challenge(&provider, now).await;

        for bad in ["12345", "1234567", "12a456", ""] {
            let err = flow.submit_code(bad, &provider).await.unwrap_err();
            assert!(matches!(err, AuthFlowError::MalformedCode), "input {bad:?}");
        }
        assert!(matches!(flow.stage(), AuthStage::ChallengeIssued { .. }));
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_challenge_open() {
        let provider = FakeProvider::default();
        let now = Instant::now();
        let mut flow = flow_with_challenge(&provider, now).await;

        let err = flow.submit_code("654321", &provider).await.unwrap_err();
        assert!(matches!(err, AuthFlowError::WrongCode));

        // Same challenge, correct code still works.
        flow.submit_code("123456", &provider).await.unwrap();
        assert!(matches!(flow.stage(), AuthStage::Verified { .. }));
    }

    #[tokio::test]
    async fn test_resend_respects_cooldown() {
        let provider = FakeProvider::default();
        let now = Instant::now();
        let mut flow = flow_with_challenge(&provider, now).await;

        let early = now + Duration::from_secs(59);
        assert!(!flow.can_resend(early));
        let err = flow.resend("token", &provider, early).await.unwrap_err();
        assert!(matches!(err, AuthFlowError::CooldownActive { .. }));
        assert_eq!(provider.challenges_issued.load(Ordering::SeqCst), 1);

        // Exactly at expiry the resend goes through.
        let at_expiry = now + DEFAULT_RESEND_COOLDOWN;
        assert!(flow.can_resend(at_expiry));
        flow.resend("token", &provider, at_expiry).await.unwrap();
        assert_eq!(provider.challenges_issued.load(Ordering::SeqCst), 2);

        // And the cooldown restarts.
        assert!(!flow.can_resend(at_expiry + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_resend_failure_keeps_old_challenge() {
        let provider = FakeProvider::default();
        let now = Instant::now();
        let mut flow = flow_with_challenge(&provider, now).await;

        let failing = FakeProvider {
            fail_issue: true,
            ..FakeProvider::default()
        };
        let at_expiry = now + DEFAULT_RESEND_COOLDOWN;
        let err = flow.resend("token", &failing, at_expiry).await.unwrap_err();
        assert!(matches!(err, AuthFlowError::Provider(_)));

        // The original challenge still verifies.
        flow.submit_code("123456", &provider).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_number_returns_to_phone_entry() {
        let provider = FakeProvider::default();
        let mut flow = flow_with_challenge(&provider, Instant::now()).await;

        flow.change_number().unwrap();
        assert!(matches!(flow.stage(), AuthStage::PhoneEntry));
        assert!(flow.resend_available_in(Instant::now()).is_none());
    }

    #[tokio::test]
    async fn test_first_time_user_lands_at_profile_incomplete() {
        let provider = FakeProvider::default();
        let profiles = MemoryProfileRepository::new();
        let mut flow = flow_with_challenge(&provider, Instant::now()).await;

        flow.submit_code("123456", &provider).await.unwrap();
        let profile = flow.resolve_profile(&profiles, Utc::now()).await.unwrap();

        assert!(!profile.profile_completed);
        assert!(matches!(flow.stage(), AuthStage::ProfileIncomplete { .. }));
    }

    #[tokio::test]
    async fn test_complete_profile_authenticates() {
        let provider = FakeProvider::default();
        let profiles = MemoryProfileRepository::new();
        let mut flow = flow_with_challenge(&provider, Instant::now()).await;
        flow.submit_code("123456", &provider).await.unwrap();
        flow.resolve_profile(&profiles, Utc::now()).await.unwrap();

        // Bad email keeps the stage; never persisted.
        let err = flow
            .complete_profile("Asha Rao", "asha@nodot", &profiles, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFlowError::InvalidEmail(_)));

        let err = flow
            .complete_profile("   ", "asha@example.com", &profiles, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthFlowError::EmptyName));

        let profile = flow
            .complete_profile("Asha Rao", "asha@example.com", &profiles, Utc::now())
            .await
            .unwrap();
        assert!(profile.profile_completed);
        assert!(matches!(flow.stage(), AuthStage::Authenticated { .. }));
    }

    #[tokio::test]
    async fn test_returning_user_skips_profile_completion() {
        let provider = FakeProvider::default();
        let profiles = MemoryProfileRepository::new();

        // First sign-in completes the profile.
        let mut first = flow_with_challenge(&provider, Instant::now()).await;
        first.submit_code("123456", &provider).await.unwrap();
        first.resolve_profile(&profiles, Utc::now()).await.unwrap();
        first
            .complete_profile("Asha Rao", "asha@example.com", &profiles, Utc::now())
            .await
            .unwrap();

        // Second sign-in goes straight to authenticated.
        let mut second = flow_with_challenge(&provider, Instant::now()).await;
        second.submit_code("123456", &provider).await.unwrap();
        let profile = second.resolve_profile(&profiles, Utc::now()).await.unwrap();

        assert!(profile.profile_completed);
        assert!(matches!(second.stage(), AuthStage::Authenticated { .. }));
    }

    #[tokio::test]
    async fn test_wrong_stage_operations_rejected() {
        let provider = FakeProvider::default();
        let profiles = MemoryProfileRepository::new();
        let mut flow = OtpFlow::default();

        assert!(matches!(
            flow.submit_code("123456", &provider).await,
            Err(AuthFlowError::InvalidState { .. })
        ));
        assert!(matches!(
            flow.resend("token", &provider, Instant::now()).await,
            Err(AuthFlowError::InvalidState { .. })
        ));
        assert!(matches!(
            flow.resolve_profile(&profiles, Utc::now()).await,
            Err(AuthFlowError::InvalidState { .. })
        ));
        assert!(matches!(
            flow.change_number(),
            Err(AuthFlowError::InvalidState { .. })
        ));
    }
}
