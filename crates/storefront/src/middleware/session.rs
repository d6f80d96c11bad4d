//! Session middleware configuration.
//!
//! Sets up in-memory cookie sessions using tower-sessions. The cookie holds
//! only the opaque registry id; the actual cart and flow state lives in
//! [`crate::session::SessionRegistry`].

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::StorefrontConfig;
use crate::session::SESSION_IDLE_EXPIRY;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "diya_session";

/// Create the session layer with an in-memory store.
///
/// The cookie's inactivity expiry mirrors the registry's idle eviction, so
/// the cookie and the server-side state age out together.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore> {
    let store = MemoryStore::default();

    // Determine if we're in production (HTTPS)
    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(
                i64::try_from(SESSION_IDLE_EXPIRY.as_secs()).unwrap_or(i64::MAX),
            ),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
