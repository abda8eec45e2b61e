//! Domain models used by the backend
//!
//! Re-exports the shared crate's models, request types and validators

pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;
