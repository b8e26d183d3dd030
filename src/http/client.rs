//! Authenticated REST client with one-shot session refresh
//!
//! Every request carries the current token in the configured auth header.
//! When a request comes back 401 while a token and refresh code are held, the
//! client exchanges the refresh code for a new pair, at most once per call:
//!
//! - refresh succeeds: the new pair is stored and the caller gets
//!   [`ApiRestError::Refreshed`] (or the request is replayed, if
//!   [`RetryPolicy::replay_after_refresh`] is on)
//! - refresh is rejected with 400/401: the session is cleared
//! - refresh fails any other way: the session is left untouched
//!
//! A 401 on a call that has no retry left clears the session without trying
//! to refresh. The refresh call itself is sent with no retry, so it can never
//! start another refresh.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::config::{RetryPolicy, RuntimeConfig};
use crate::core::session::{AuthStore, Credentials};
use crate::error::{ApiRestError, HttpFailure, Result};
use crate::http::notify::{ErrorDisplay, NoopErrorDisplay};
use crate::http::options::RequestOptions;

/// Refresh request body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    token_refresh_code: &'a str,
}

/// Refresh response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    token: String,
    token_refresh_code: String,
}

/// REST client bound to one base endpoint and one shared session
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    auth_header: HeaderName,
    refresh_path: String,
    policy: RetryPolicy,
    store: Arc<AuthStore>,
    errors: Arc<dyn ErrorDisplay + Send + Sync>,
}

impl ApiClient {
    /// Create a client from runtime configuration and a shared session
    pub fn new(config: &RuntimeConfig, store: Arc<AuthStore>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        let auth_header = HeaderName::from_bytes(config.auth_header.as_bytes()).map_err(|e| {
            ApiRestError::Config(format!("Invalid auth header '{}': {}", config.auth_header, e))
        })?;

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url()?,
            auth_header,
            refresh_path: config.refresh_path.clone(),
            policy: config.retry.clone(),
            store,
            errors: Arc::new(NoopErrorDisplay),
        })
    }

    /// Use a custom error display hook
    pub fn with_error_display(mut self, errors: Arc<dyn ErrorDisplay + Send + Sync>) -> Self {
        self.errors = errors;
        self
    }

    /// The session this client reads and updates
    pub fn store(&self) -> &Arc<AuthStore> {
        &self.store
    }

    /// Base URL targets are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET a target and decode the JSON response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(path, RequestOptions::get()).await
    }

    /// POST a JSON body to a target and decode the JSON response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(path, RequestOptions::post().json(body)?).await
    }

    /// Send a request and decode the JSON response
    ///
    /// An empty response body decodes as JSON `null`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let text = self.send(path, options).await?;
        decode(&text)
    }

    /// Exchange the held refresh code for a new token and refresh code
    ///
    /// The new pair is stored before it is returned.
    pub async fn refresh_credentials(&self) -> Result<Credentials> {
        let refresh_code = self
            .store
            .refresh_code()
            .ok_or(ApiRestError::NotAuthenticated)?;

        let options = RequestOptions::post()
            .json(&RefreshRequest {
                token_refresh_code: refresh_code.expose_secret(),
            })?
            .retry(0);

        let text = self.send(&self.refresh_path, options).await?;
        let response: RefreshResponse = decode(&text)?;

        let credentials = Credentials::new(response.token, response.token_refresh_code);
        self.store.set_credentials(credentials.clone());
        tracing::info!("session refreshed");

        Ok(credentials)
    }

    /// Send with the retry/refresh handling, returning the raw body
    ///
    /// Boxed because a refresh sends through here again.
    fn send<'a>(&'a self, path: &'a str, options: RequestOptions) -> BoxFuture<'a, Result<String>> {
        async move {
            let url = self.url_for(path)?;
            let mut retries_left = options.retry.unwrap_or(self.policy.retries);
            // Cleared once this call has started a refresh; replays can't start another.
            let mut refresh_eligible = retries_left > 0;

            loop {
                let response = self.dispatch(&url, &options).await?;
                let status = response.status();

                if status.is_success() {
                    return Ok(response.text().await?);
                }

                let body = response.text().await.unwrap_or_else(|e| {
                    tracing::debug!(%url, %status, error = %e, "failed to read error response body");
                    String::new()
                });
                let failure = HttpFailure::new(status, body);
                tracing::debug!(%url, %status, retries_left, "request failed");
                self.errors.clear();

                if status == StatusCode::UNAUTHORIZED && self.store.refreshable().is_some() {
                    if !refresh_eligible || retries_left == 0 {
                        self.logout();
                        return Err(ApiRestError::SessionExpired(failure));
                    }

                    // Consumed before the refresh goes out.
                    refresh_eligible = false;
                    retries_left -= 1;

                    match self.refresh_credentials().await {
                        Ok(_) if self.policy.replay_after_refresh && self.policy.retries_on(status) => {
                            tracing::debug!(%url, "replaying request with refreshed session");
                            continue;
                        }
                        Ok(_) => return Err(ApiRestError::Refreshed(failure)),
                        Err(err) => return Err(self.refresh_failed(failure, err)),
                    }
                }

                if retries_left > 0 && self.policy.retries_on(status) {
                    retries_left -= 1;
                    tracing::debug!(%url, %status, "retrying request");
                    continue;
                }

                return Err(if status == StatusCode::UNAUTHORIZED {
                    ApiRestError::Unauthenticated(failure)
                } else {
                    ApiRestError::Http(failure)
                });
            }
        }
        .boxed()
    }

    /// Classify a failed refresh; 400 and 401 end the session
    fn refresh_failed(&self, original: HttpFailure, err: ApiRestError) -> ApiRestError {
        match err.status() {
            Some(status) if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED => {
                self.logout();
                ApiRestError::RefreshFatal {
                    original,
                    refresh_status: status,
                }
            }
            _ => {
                tracing::warn!(error = %err, "session refresh failed, keeping current session");
                ApiRestError::RefreshTransient {
                    original,
                    reason: err.to_string(),
                }
            }
        }
    }

    fn logout(&self) {
        self.store.reset();
        tracing::warn!("session cleared, log in again");
    }

    async fn dispatch(&self, url: &Url, options: &RequestOptions) -> Result<reqwest::Response> {
        let mut builder = self
            .http
            .request(options.method.as_reqwest(), url.clone())
            .headers(self.headers_for(options)?);

        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %options.method, %url, "sending request");
        Ok(builder.send().await?)
    }

    /// Caller headers plus the auth header when a token is held
    fn headers_for(&self, options: &RequestOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiRestError::InvalidInput(format!("Invalid header '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiRestError::InvalidInput(format!("Invalid value for '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        if let Some(token) = self.store.token() {
            let mut value = HeaderValue::from_str(token.expose_secret())
                .map_err(|_| ApiRestError::InvalidInput("Token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(self.auth_header.clone(), value);
        }

        Ok(headers)
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::notify::MockErrorDisplay;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    const ITEMS: &str = "/api/items";
    const REFRESH: &str = "/api/auth/refresh";

    struct NoAuthHeader;

    impl Match for NoAuthHeader {
        fn matches(&self, request: &Request) -> bool {
            !request.headers.contains_key("x-authorization")
        }
    }

    fn client_for(server: &MockServer, store: Arc<AuthStore>) -> ApiClient {
        client_with(server, store, RetryPolicy::default())
    }

    fn client_with(server: &MockServer, store: Arc<AuthStore>, retry: RetryPolicy) -> ApiClient {
        let config = RuntimeConfig {
            rest_api_url: server.uri(),
            retry,
            ..RuntimeConfig::default()
        };
        ApiClient::new(&config, store).unwrap()
    }

    fn logged_in() -> Arc<AuthStore> {
        Arc::new(AuthStore::with_credentials(Credentials::new("T1", "R1")))
    }

    fn session(store: &AuthStore) -> Option<(String, String)> {
        store.snapshot().map(|c| {
            (
                c.token.expose_secret().to_string(),
                c.refresh_code.expose_secret().to_string(),
            )
        })
    }

    async fn mount_items_unauthorized(server: &MockServer, expected: u64) {
        Mock::given(method("GET"))
            .and(path(ITEMS))
            .respond_with(ResponseTemplate::new(401))
            .expect(expected)
            .mount(server)
            .await;
    }

    async fn mount_refresh(server: &MockServer, response: ResponseTemplate, expected: u64) {
        Mock::given(method("POST"))
            .and(path(REFRESH))
            .and(body_json(json!({"tokenRefreshCode": "R1"})))
            .respond_with(response)
            .expect(expected)
            .mount(server)
            .await;
    }

    fn refreshed_pair() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"token": "T2", "tokenRefreshCode": "R2"}))
    }

    #[tokio::test]
    async fn test_no_token_sends_no_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ITEMS))
            .and(NoAuthHeader)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(AuthStore::new()));
        let items: Vec<u32> = client.get(ITEMS).await.unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_token_is_sent_in_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ITEMS))
            .and(header("x-authorization", "T1"))
            .and(header("x-trace", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, logged_in());
        let body: Value = client
            .request(ITEMS, RequestOptions::get().header("x-trace", "abc"))
            .await
            .unwrap();
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notes"))
            .and(body_json(json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, logged_in());
        let _: () = client
            .post("api/notes", &json!({"text": "hello"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_success_stores_new_pair() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 1).await;
        mount_refresh(&server, refreshed_pair(), 1).await;

        let store = logged_in();
        let client = client_for(&server, store.clone());
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        assert!(matches!(err, ApiRestError::Refreshed(_)));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(session(&store), Some(("T2".into(), "R2".into())));
    }

    #[tokio::test]
    async fn test_refresh_rejected_with_401_logs_out() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 1).await;
        mount_refresh(&server, ResponseTemplate::new(401), 1).await;

        let store = logged_in();
        let client = client_for(&server, store.clone());
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        assert!(matches!(
            err,
            ApiRestError::RefreshFatal { refresh_status, .. } if refresh_status == StatusCode::UNAUTHORIZED
        ));
        assert!(session(&store).is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejected_with_400_logs_out() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 1).await;
        mount_refresh(&server, ResponseTemplate::new(400), 1).await;

        let store = logged_in();
        let client = client_for(&server, store.clone());
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        assert!(err.is_logout());
        assert!(session(&store).is_none());
    }

    #[tokio::test]
    async fn test_refresh_server_error_keeps_session() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 1).await;
        mount_refresh(&server, ResponseTemplate::new(500), 1).await;

        let store = logged_in();
        let client = client_for(&server, store.clone());
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        assert!(matches!(err, ApiRestError::RefreshTransient { .. }));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(session(&store), Some(("T1".into(), "R1".into())));
    }

    #[tokio::test]
    async fn test_no_retry_left_logs_out_without_refresh() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 1).await;
        mount_refresh(&server, refreshed_pair(), 0).await;

        let store = logged_in();
        let client = client_for(&server, store.clone());
        let err = client
            .request::<Value>(ITEMS, RequestOptions::get().retry(0))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiRestError::SessionExpired(_)));
        assert!(session(&store).is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_skips_refresh() {
        let server = MockServer::start().await;
        // The transport re-sends once on 401
        mount_items_unauthorized(&server, 2).await;
        mount_refresh(&server, refreshed_pair(), 0).await;

        let store = Arc::new(AuthStore::new());
        let client = client_for(&server, store.clone());
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        assert!(matches!(err, ApiRestError::Unauthenticated(_)));
        assert!(session(&store).is_none());
    }

    #[tokio::test]
    async fn test_replay_after_refresh_uses_new_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ITEMS))
            .and(header("x-authorization", "T1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ITEMS))
            .and(header("x-authorization", "T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, refreshed_pair(), 1).await;

        let retry = RetryPolicy {
            replay_after_refresh: true,
            ..RetryPolicy::default()
        };
        let store = logged_in();
        let client = client_with(&server, store.clone(), retry);
        let body: Value = client.get(ITEMS).await.unwrap();

        assert_eq!(body, json!({"ok": true}));
        assert_eq!(session(&store), Some(("T2".into(), "R2".into())));
    }

    #[tokio::test]
    async fn test_replayed_401_does_not_refresh_twice() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 2).await;
        mount_refresh(&server, refreshed_pair(), 1).await;

        let retry = RetryPolicy {
            replay_after_refresh: true,
            ..RetryPolicy::default()
        };
        let store = logged_in();
        let client = client_with(&server, store.clone(), retry);
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        assert!(matches!(err, ApiRestError::SessionExpired(_)));
        assert!(session(&store).is_none());
    }

    #[tokio::test]
    async fn test_larger_retry_budget_still_refreshes_once() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 2).await;
        mount_refresh(&server, refreshed_pair(), 1).await;

        let retry = RetryPolicy {
            retries: 3,
            replay_after_refresh: true,
            ..RetryPolicy::default()
        };
        let store = logged_in();
        let client = client_with(&server, store.clone(), retry);
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        assert!(matches!(err, ApiRestError::SessionExpired(_)));
        assert!(session(&store).is_none());
    }

    #[tokio::test]
    async fn test_refresh_garbage_body_keeps_session() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 1).await;
        mount_refresh(
            &server,
            ResponseTemplate::new(200).set_body_string("garbage"),
            1,
        )
        .await;

        let store = logged_in();
        let client = client_for(&server, store.clone());
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        assert!(matches!(err, ApiRestError::RefreshTransient { .. }));
        assert_eq!(session(&store), Some(("T1".into(), "R1".into())));
    }

    #[tokio::test]
    async fn test_refresh_network_error_keeps_session() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 1).await;

        // Bind then drop a listener to get a port nothing is serving on
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let refresh_url = format!("http://{}/api/auth/refresh", closed.local_addr().unwrap());
        drop(closed);

        let config = RuntimeConfig {
            rest_api_url: server.uri(),
            refresh_path: refresh_url,
            ..RuntimeConfig::default()
        };
        let store = logged_in();
        let client = ApiClient::new(&config, store.clone()).unwrap();
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        match &err {
            ApiRestError::RefreshTransient { original, .. } => {
                assert_eq!(original.status, StatusCode::UNAUTHORIZED);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session(&store), Some(("T1".into(), "R1".into())));
    }

    #[tokio::test]
    async fn test_other_error_clears_display_and_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ITEMS))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .expect(1)
            .mount(&server)
            .await;

        let mut display = MockErrorDisplay::new();
        display.expect_clear().times(1).return_const(());

        let store = logged_in();
        let client = client_for(&server, store.clone()).with_error_display(Arc::new(display));
        let err = client.get::<Value>(ITEMS).await.unwrap_err();

        match err {
            ApiRestError::Http(failure) => {
                assert_eq!(failure.status, StatusCode::NOT_FOUND);
                assert_eq!(failure.body, "missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session(&store), Some(("T1".into(), "R1".into())));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_leave_complete_session() {
        let server = MockServer::start().await;
        mount_items_unauthorized(&server, 2).await;
        // Either call may refresh with R1 or with the R2 the other one stored
        Mock::given(method("POST"))
            .and(path(REFRESH))
            .respond_with(refreshed_pair())
            .expect(2)
            .mount(&server)
            .await;

        let store = logged_in();
        let client = client_for(&server, store.clone());
        let (a, b) = tokio::join!(client.get::<Value>(ITEMS), client.get::<Value>(ITEMS));

        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(session(&store), Some(("T2".into(), "R2".into())));
    }

    #[tokio::test]
    async fn test_explicit_refresh_requires_session() {
        let server = MockServer::start().await;
        let client = client_for(&server, Arc::new(AuthStore::new()));

        assert!(matches!(
            client.refresh_credentials().await,
            Err(ApiRestError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_targets_join_under_base_path() {
        let config = RuntimeConfig {
            rest_api_url: "https://api.example.com/v1".to_string(),
            ..RuntimeConfig::default()
        };
        let client = ApiClient::new(&config, Arc::new(AuthStore::new())).unwrap();

        assert_eq!(
            client.url_for("/api/auth/refresh").unwrap().as_str(),
            "https://api.example.com/v1/api/auth/refresh"
        );
        assert_eq!(
            client.url_for("items?page=2").unwrap().as_str(),
            "https://api.example.com/v1/items?page=2"
        );
    }
}
