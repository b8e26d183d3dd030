//! Request CLI command handlers

use std::sync::Arc;

use futures::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::cli::commands::{GetArgs, PostArgs, RequestFlags};
use crate::core::config::RuntimeConfig;
use crate::core::session::{mask_secret, AuthStore, Credentials};
use crate::error::{ApiRestError, Result};
use crate::http::{ApiClient, RequestOptions, TracingErrorDisplay};

/// Build the in-memory session from the command line
///
/// A token without a refresh code (or the reverse) is kept as given; the
/// missing half just reads as absent.
pub fn build_store(token: Option<String>, refresh_code: Option<String>) -> Arc<AuthStore> {
    let store = match (token, refresh_code) {
        (None, None) => AuthStore::new(),
        (token, refresh_code) => AuthStore::with_credentials(Credentials::new(
            token.unwrap_or_default(),
            refresh_code.unwrap_or_default(),
        )),
    };
    Arc::new(store)
}

/// Create a client for CLI use
pub fn build_client(config: &RuntimeConfig, store: Arc<AuthStore>) -> Result<ApiClient> {
    Ok(ApiClient::new(config, store)?.with_error_display(Arc::new(TracingErrorDisplay)))
}

/// Handle `get`
pub async fn handle_get(client: &ApiClient, args: GetArgs) -> Result<()> {
    let options = request_options(RequestOptions::get(), &args.flags)?;
    let before = client.store().token();

    let results = join_all(
        args.paths
            .iter()
            .map(|path| client.request::<Value>(path, options.clone())),
    )
    .await;

    let mut first_error = None;
    for (path, result) in args.paths.iter().zip(results) {
        match result {
            Ok(body) => print_body(&body)?,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                first_error.get_or_insert(e);
            }
        }
    }

    report_session(client.store(), before);
    first_error.map_or(Ok(()), Err)
}

/// Handle `post`
pub async fn handle_post(client: &ApiClient, args: PostArgs) -> Result<()> {
    let mut options = request_options(RequestOptions::post(), &args.flags)?;
    if let Some(data) = &args.data {
        let body: Value = serde_json::from_str(data)
            .map_err(|e| ApiRestError::InvalidInput(format!("Body is not valid JSON: {}", e)))?;
        options.body = Some(body);
    }

    let before = client.store().token();
    let result = client.request::<Value>(&args.path, options).await;
    report_session(client.store(), before);

    print_body(&result?)
}

/// Handle `refresh`
pub async fn handle_refresh(client: &ApiClient) -> Result<()> {
    let credentials = client.refresh_credentials().await?;

    println!("token={}", credentials.token.expose_secret());
    println!("refresh_code={}", credentials.refresh_code.expose_secret());
    Ok(())
}

fn request_options(mut options: RequestOptions, flags: &RequestFlags) -> Result<RequestOptions> {
    for raw in &flags.headers {
        let (name, value) = parse_header(raw)?;
        options = options.header(name, value);
    }
    if flags.no_retry {
        options = options.retry(0);
    }
    Ok(options)
}

/// Parse `NAME:VALUE`
fn parse_header(raw: &str) -> Result<(&str, &str)> {
    raw.split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| {
            ApiRestError::InvalidInput(format!(
                "Invalid header '{}'. Expected NAME:VALUE",
                raw
            ))
        })
}

fn print_body(body: &Value) -> Result<()> {
    if !body.is_null() {
        println!("{}", serde_json::to_string_pretty(body)?);
    }
    Ok(())
}

/// Tell the user when the session changed during the run
///
/// Nothing is persisted, so a refreshed pair is printed in full; the old
/// refresh code no longer works.
fn report_session(store: &AuthStore, before: Option<SecretString>) {
    match (before, store.snapshot()) {
        (Some(_), None) => eprintln!("Session ended. Log in again."),
        (Some(old), Some(new)) if old.expose_secret() != new.token.expose_secret() => {
            eprintln!("Session refreshed ({}).", mask_secret(&new.token));
            eprintln!("  token={}", new.token.expose_secret());
            eprintln!("  refresh_code={}", new.refresh_code.expose_secret());
        }
        _ => {}
    }
}
