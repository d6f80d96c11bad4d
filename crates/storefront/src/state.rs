//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::services::catalog::{HttpCatalog, ProductCatalog};
use crate::services::identity::{
    FirebaseIdentityClient, IdentityProvider, MemoryProfileRepository, ProfileRepository,
};
use crate::services::payment::{PaymentGateway, RazorpayClient};
use crate::session::SessionRegistry;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration, external collaborators, and the session registry.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Arc<dyn ProductCatalog>,
    gateway: Arc<dyn PaymentGateway>,
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    sessions: SessionRegistry,
}

impl AppState {
    /// Create application state with the real external collaborators.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let catalog = Arc::new(HttpCatalog::new(config.catalog_base_url.clone()));
        let gateway = Arc::new(RazorpayClient::new(&config.razorpay));
        let identity = Arc::new(FirebaseIdentityClient::new(&config.firebase));
        let profiles = Arc::new(MemoryProfileRepository::new());
        Self::with_collaborators(config, catalog, gateway, identity, profiles)
    }

    /// Create application state with explicit collaborators.
    ///
    /// Handlers only see the trait objects, so tests swap in doubles here.
    #[must_use]
    pub fn with_collaborators(
        config: StorefrontConfig,
        catalog: Arc<dyn ProductCatalog>,
        gateway: Arc<dyn PaymentGateway>,
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                gateway,
                identity,
                profiles,
                sessions: SessionRegistry::new(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn ProductCatalog {
        self.inner.catalog.as_ref()
    }

    /// Get a reference to the payment gateway.
    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    /// Get a reference to the identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// Get a reference to the profile store.
    #[must_use]
    pub fn profiles(&self) -> &dyn ProfileRepository {
        self.inner.profiles.as_ref()
    }

    /// Get a reference to the session registry.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }
}
