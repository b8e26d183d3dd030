//! api-rest - authenticated REST helper
//!
//! Sends requests against a configured base endpoint with the current token
//! attached, and renews the session once when a request is rejected with 401.
//! The session lives only in memory.

pub mod cli;
pub mod core;
pub mod error;
pub mod http;

pub use error::{ApiRestError, Result};
