//! Product catalog collaborator.
//!
//! The catalog is read-only from the storefront's point of view. Product
//! lookups fetch a snapshot of the current listing (price, tax rate, stock);
//! the cart keeps its own copy afterwards, so cart totals stay stable even
//! if the catalog changes mid-session.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use diya_core::ProductId;

const CACHE_CAPACITY: u64 = 1_000;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// A product listing as served by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    /// Unit price in rupees.
    pub price: Decimal,
    /// Pre-discount price, when the listing is on sale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    /// GST rate as a percentage, e.g. `12` for 12%.
    #[serde(rename = "gstRate")]
    pub tax_rate_percent: Decimal,
    /// Units in stock; `None` when the catalog does not track stock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Errors from the catalog collaborator.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Transport-level failure reaching the catalog.
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog answered with a body we could not interpret.
    #[error("malformed catalog response: {0}")]
    MalformedResponse(String),
}

/// Product lookup operations.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch the current listing for `id`, or `None` when no such product
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] when the catalog is unreachable or answers
    /// with an uninterpretable body.
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError>;
}

/// HTTP catalog client with an in-process cache in front.
///
/// Listings change rarely relative to cart traffic, so a short TTL keeps
/// repeat adds of the same product off the wire.
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<ProductId, Option<Product>>,
}

impl HttpCatalog {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    async fn fetch(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        let response = self
            .client
            .get(format!("{}/products/{}", self.base_url, id.as_str()))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status()?;
        let product: Product = response
            .json()
            .await
            .map_err(|e| CatalogError::MalformedResponse(e.to_string()))?;

        Ok(Some(product))
    }
}

#[async_trait]
impl ProductCatalog for HttpCatalog {
    #[instrument(skip(self), fields(product = %id))]
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        if let Some(cached) = self.cache.get(id).await {
            return Ok(cached);
        }

        let fetched = self.fetch(id).await?;
        self.cache.insert(id.clone(), fetched.clone()).await;
        Ok(fetched)
    }
}
