//! Newtype IDs for type-safe entity references.
//!
//! Identifiers in this system come from external collaborators (the product
//! catalog, the identity provider, the payment gateway) or are minted locally
//! (cart line ids, receipt references). Use the `define_string_id!` macro for
//! opaque string-backed ids to prevent accidentally mixing ids from different
//! entity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe string-backed ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>` and `From<&str>` implementations
///
/// # Example
///
/// ```rust
/// # use diya_core::define_string_id;
/// define_string_id!(ProductId);
/// define_string_id!(Uid);
///
/// let product_id = ProductId::new("rudraksha-mala-108");
/// let uid = Uid::new("x9f2kQ");
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = uid;
/// ```
#[macro_export]
macro_rules! define_string_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a string value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

// Catalog entity reference (owned by the product catalog collaborator).
define_string_id!(ProductId);

// Identity provider user reference.
define_string_id!(Uid);

// Payment gateway order and payment references.
define_string_id!(GatewayOrderId);
define_string_id!(GatewayPaymentId);

/// Cart line identifier, assigned at insertion time.
///
/// Opaque and distinct from the product id: the same product re-added to a
/// cart merges into its existing line, so the line id outlives quantity
/// changes but not removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(Uuid);

impl LineId {
    /// Generate a fresh line id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for LineId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Client-generated idempotency token passed to the payment gateway.
///
/// A fresh reference must be generated for every payment attempt so a retry
/// is never mistaken for a duplicate of an earlier attempt on the gateway
/// side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptRef(String);

impl ReceiptRef {
    /// Generate a fresh receipt reference for a payment attempt.
    ///
    /// The format is `order_<millis>_<suffix>`: a timestamp for operator
    /// legibility plus a random suffix so two attempts within the same
    /// millisecond stay distinct.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(9)
            .collect();
        Self(format!("order_{}_{suffix}", now.timestamp_millis()))
    }

    /// Get the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
