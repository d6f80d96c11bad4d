//! Domain services: external collaborators and per-session state machines.

pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod identity;
pub mod payment;
