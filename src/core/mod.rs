//! Core state for api-rest
//!
//! This module contains:
//! - Runtime configuration
//! - The in-memory session (token and refresh code)

pub mod config;
pub mod session;

pub use config::{RetryPolicy, RuntimeConfig};
pub use session::{AuthStore, Credentials};
