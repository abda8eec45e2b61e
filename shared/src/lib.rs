//! Shared types and models for the Stock Ledger point-of-sale platform
//!
//! This crate contains types shared between the backend, the browser till
//! (via WASM), and other components of the system. Nothing in here performs
//! I/O; the backend enables the `sqlx` feature to map these types to rows.

pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use ledger::*;
pub use models::*;
pub use types::*;
pub use validation::*;
