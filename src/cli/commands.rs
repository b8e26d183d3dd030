//! CLI command definitions using clap
//!
//! Defines the command structure for the `api-rest` CLI tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// api-rest - authenticated REST helper
///
/// Sends requests with the given session attached and renews the session
/// once when the API answers 401.
#[derive(Parser, Debug)]
#[command(name = "api-rest", version, about, long_about = None)]
pub struct Cli {
    /// Access token to start the session with
    #[arg(long, global = true, env = "API_REST_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Refresh code to start the session with
    #[arg(long, global = true, env = "API_REST_REFRESH_CODE", hide_env_values = true)]
    pub refresh_code: Option<String>,

    /// Use this configuration file instead of the default one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send GET requests (several targets are fetched concurrently)
    Get(GetArgs),

    /// Send a POST request with a JSON body
    Post(PostArgs),

    /// Exchange the refresh code for a new session and print it
    Refresh,

    /// Manage configuration
    Config(ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Options shared by request commands
#[derive(Args, Debug, Default)]
pub struct RequestFlags {
    /// Extra header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Send without retry, so a 401 ends the session instead of refreshing it
    #[arg(long)]
    pub no_retry: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Target paths, relative to the base endpoint
    #[arg(required = true)]
    pub paths: Vec<String>,

    #[command(flatten)]
    pub flags: RequestFlags,
}

#[derive(Args, Debug)]
pub struct PostArgs {
    /// Target path, relative to the base endpoint
    pub path: String,

    /// JSON body
    #[arg(short, long)]
    pub data: Option<String>,

    #[command(flatten)]
    pub flags: RequestFlags,
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration commands
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: ConfigKey,

        /// Configuration value
        value: String,
    },

    /// Reset a configuration value to its default
    Reset {
        /// Configuration key
        key: ConfigKey,
    },
}

/// Available configuration keys
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Base endpoint
    #[value(name = "rest-api-url")]
    RestApiUrl,

    /// Alternate endpoint for mobile
    #[value(name = "rest-api-url-mobile")]
    RestApiUrlMobile,

    /// Route through the mobile endpoint
    #[value(name = "is-mobile")]
    IsMobile,

    /// Origin for a relative base endpoint
    #[value(name = "origin")]
    Origin,

    /// Header carrying the token
    #[value(name = "auth-header")]
    AuthHeader,

    /// Path of the refresh endpoint
    #[value(name = "refresh-path")]
    RefreshPath,

    /// Request timeout in seconds
    #[value(name = "timeout")]
    Timeout,

    /// Replay a request after its 401 led to a refresh
    #[value(name = "replay-after-refresh")]
    ReplayAfterRefresh,
}
