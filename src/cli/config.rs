//! Configuration CLI command handlers

use std::path::Path;

use crate::cli::commands::{ConfigCommand, ConfigKey};
use crate::core::config::RuntimeConfig;
use crate::error::{ApiRestError, Result};

/// Handle configuration commands against the file at `path`
pub fn handle_config(command: ConfigCommand, path: &Path) -> Result<()> {
    match command {
        ConfigCommand::Show => handle_show(path),
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            let mut config = RuntimeConfig::load_from(path)?;
            set_value(&mut config, key, &value)?;
            config.save_to(path)?;
            println!("{} set to: {}", key_name(key), value);
            Ok(())
        }
        ConfigCommand::Reset { key } => {
            let mut config = RuntimeConfig::load_from(path)?;
            reset_value(&mut config, key);
            config.save_to(path)?;
            println!("{} reset to default", key_name(key));
            Ok(())
        }
    }
}

/// Print the effective configuration (file plus environment overrides)
fn handle_show(path: &Path) -> Result<()> {
    let mut config = RuntimeConfig::load_from(path)?;
    config.apply_env_overrides();

    print!("{}", toml::to_string_pretty(&config)?);
    println!();
    println!("# base url: {}", config.base_url()?);
    Ok(())
}

fn set_value(config: &mut RuntimeConfig, key: ConfigKey, value: &str) -> Result<()> {
    match key {
        ConfigKey::RestApiUrl => config.rest_api_url = value.to_string(),
        ConfigKey::RestApiUrlMobile => config.rest_api_url_mobile = value.to_string(),
        ConfigKey::IsMobile => config.is_mobile = parse_bool(value)?,
        ConfigKey::Origin => config.origin = value.to_string(),
        ConfigKey::AuthHeader => config.auth_header = value.to_string(),
        ConfigKey::RefreshPath => config.refresh_path = value.to_string(),
        ConfigKey::Timeout => {
            let secs = value.parse::<u64>().map_err(|_| {
                ApiRestError::InvalidInput(format!(
                    "Invalid timeout '{}'. Expected a number of seconds",
                    value
                ))
            })?;
            config.timeout_secs = Some(secs);
        }
        ConfigKey::ReplayAfterRefresh => config.retry.replay_after_refresh = parse_bool(value)?,
    }

    // Catch an unusable endpoint now rather than on the next request
    config.base_url()?;
    Ok(())
}

fn reset_value(config: &mut RuntimeConfig, key: ConfigKey) {
    let defaults = RuntimeConfig::default();
    match key {
        ConfigKey::RestApiUrl => config.rest_api_url = defaults.rest_api_url,
        ConfigKey::RestApiUrlMobile => config.rest_api_url_mobile = defaults.rest_api_url_mobile,
        ConfigKey::IsMobile => config.is_mobile = defaults.is_mobile,
        ConfigKey::Origin => config.origin = defaults.origin,
        ConfigKey::AuthHeader => config.auth_header = defaults.auth_header,
        ConfigKey::RefreshPath => config.refresh_path = defaults.refresh_path,
        ConfigKey::Timeout => config.timeout_secs = defaults.timeout_secs,
        ConfigKey::ReplayAfterRefresh => {
            config.retry.replay_after_refresh = defaults.retry.replay_after_refresh
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ApiRestError::InvalidInput(format!(
            "Invalid value '{}'. Expected true or false",
            value
        ))),
    }
}

fn key_name(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::RestApiUrl => "rest-api-url",
        ConfigKey::RestApiUrlMobile => "rest-api-url-mobile",
        ConfigKey::IsMobile => "is-mobile",
        ConfigKey::Origin => "origin",
        ConfigKey::AuthHeader => "auth-header",
        ConfigKey::RefreshPath => "refresh-path",
        ConfigKey::Timeout => "timeout",
        ConfigKey::ReplayAfterRefresh => "replay-after-refresh",
    }
}
