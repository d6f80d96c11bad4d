//! Per-session storefront state.
//!
//! The browser cookie (managed by tower-sessions) carries only an opaque id;
//! the cart ledger, checkout session, and sign-in flow live server-side in
//! the [`SessionRegistry`]. Each entry sits behind its own async mutex, so
//! operations on one session are serialized while different sessions proceed
//! independently. Entries idle past the cookie's inactivity expiry are
//! evicted, so abandoned sessions do not accumulate.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tower_sessions::Session;
use uuid::Uuid;

use diya_core::CartLedger;

use crate::error::AppError;
use crate::services::auth::OtpFlow;
use crate::services::checkout::CheckoutSession;

/// Session key under which the registry id is stored.
const REGISTRY_ID_KEY: &str = "diya.sid";

/// How long an untouched entry survives (7 days, matching the session
/// cookie's inactivity expiry).
pub const SESSION_IDLE_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Everything the storefront remembers about one browser session.
#[derive(Debug)]
pub struct SessionState {
    pub cart: CartLedger,
    /// Present once the buyer has entered checkout.
    pub checkout: Option<CheckoutSession>,
    pub auth: OtpFlow,
}

impl SessionState {
    fn new(otp_resend_cooldown: Duration) -> Self {
        Self {
            cart: CartLedger::new(),
            checkout: None,
            auth: OtpFlow::new(otp_resend_cooldown),
        }
    }
}

/// Server-side store of session state, keyed by the id in the cookie.
pub struct SessionRegistry {
    entries: Cache<Uuid, Arc<tokio::sync::Mutex<SessionState>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_idle_expiry(SESSION_IDLE_EXPIRY)
    }

    /// Build a registry whose entries expire after `idle` without access.
    #[must_use]
    pub fn with_idle_expiry(idle: Duration) -> Self {
        Self {
            entries: Cache::builder().time_to_idle(idle).build(),
        }
    }

    async fn entry(
        &self,
        id: Uuid,
        otp_resend_cooldown: Duration,
    ) -> Arc<tokio::sync::Mutex<SessionState>> {
        self.entries
            .get_with(id, async {
                Arc::new(tokio::sync::Mutex::new(SessionState::new(
                    otp_resend_cooldown,
                )))
            })
            .await
    }

    /// Resolve the state for the request's session, creating both the
    /// registry entry and the cookie-side id on first contact.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] when the session store fails.
    pub async fn resolve(
        &self,
        session: &Session,
        otp_resend_cooldown: Duration,
    ) -> Result<Arc<tokio::sync::Mutex<SessionState>>, AppError> {
        let id = match session
            .get::<Uuid>(REGISTRY_ID_KEY)
            .await
            .map_err(|e| AppError::Internal(format!("session load failed: {e}")))?
        {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                session
                    .insert(REGISTRY_ID_KEY, id)
                    .await
                    .map_err(|e| AppError::Internal(format!("session save failed: {e}")))?;
                id
            }
        };

        Ok(self.entry(id, otp_resend_cooldown).await)
    }
}
