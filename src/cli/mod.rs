//! CLI module for api-rest
//!
//! This module contains all CLI command definitions and handlers using clap.

pub mod commands;
pub mod config;
pub mod request;

pub use commands::{Cli, Commands};
