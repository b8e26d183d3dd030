//! HTTP layer for api-rest
//!
//! - `client` - the authenticated request function and session refresh
//! - `options` - per-request options
//! - `notify` - the "clear displayed error" hook

pub mod client;
pub mod notify;
pub mod options;

pub use client::ApiClient;
pub use notify::{ErrorDisplay, NoopErrorDisplay, TracingErrorDisplay};
pub use options::{Method, RequestOptions};
