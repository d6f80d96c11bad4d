//! Diya Core - Shared types and cart ledger.
//!
//! This crate provides the common types used across all Diya components:
//! - `storefront` - Public-facing e-commerce site for spiritual goods
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no ambient clocks (operations that need a timestamp take it as
//! an argument). This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, phone
//!   numbers, and user profiles
//! - [`cart`] - The cart ledger: line items and deterministic price totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::*;
pub use types::*;
