//! Jira API client.
//!
//! [`JiraClient`] is the public entry point. It owns one [`Gateway`] and
//! exposes the typed resource operations on top of it. Rate-limited
//! requests are retried by the gateway for every HTTP method, POST and PUT
//! included: a throttled request is assumed to have had no effect.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use super::auth::Auth;
use super::error::{ApiError, Result};
use super::gateway::{Classified, Gateway, Raw, Request, ResponseMode};
use super::retry::RetryPolicy;
use super::session::{SessionSlot, SessionState};
use crate::config::{ClientConfig, CredentialInput, Credentials};

/// The Jira API client.
///
/// `M` selects what operations return: [`Classified`] (the default) yields
/// typed values and classified errors, [`Raw`] yields the untouched HTTP
/// response.
///
/// ```no_run
/// # async fn run() -> jira_gateway::api::Result<()> {
/// use jira_gateway::JiraClient;
///
/// let client = JiraClient::builder()
///     .url("https://company.atlassian.net")
///     .user("me@company.com")
///     .token("api-token")
///     .max_retries(5)
///     .build()?;
///
/// let fields = client.get_fields().await?;
/// println!("{} fields", fields.len());
/// # Ok(())
/// # }
/// ```
pub struct JiraClient<M: ResponseMode = Classified> {
    gateway: Gateway,
    user: String,
    mode: PhantomData<fn() -> M>,
}

impl JiraClient {
    /// A builder with default settings.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// A client with default settings and credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] if `JIRA_URL`, `JIRA_USER` or
    /// `JIRA_API_TOKEN` is missing or invalid.
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }
}

impl<M: ResponseMode> JiraClient<M> {
    /// Send a request through the gateway.
    ///
    /// This is the escape hatch for endpoints without a typed operation.
    pub async fn send(&self, request: Request) -> Result<M::Reply> {
        M::send(&self.gateway, request).await
    }

    /// Send a request and decode the reply in this client's mode.
    pub(crate) async fn call<T: DeserializeOwned>(&self, request: Request) -> Result<M::Output<T>> {
        let reply = self.send(request).await?;
        M::decode(reply)
    }

    /// Open the session now instead of on the first request.
    pub fn open(&self) -> Result<()> {
        self.gateway.session().acquire().map(|_| ())
    }

    /// Close the session. The next request opens a new one.
    pub fn close(&self) {
        self.gateway.session().close();
    }

    /// Whether a session is currently open.
    pub fn session_state(&self) -> SessionState {
        self.gateway.session().state()
    }

    /// Open the session and close it again when the guard is dropped.
    ///
    /// The session is closed on every exit path, including early returns
    /// through `?` and panics.
    ///
    /// ```no_run
    /// # async fn run(client: jira_gateway::JiraClient) -> jira_gateway::api::Result<()> {
    /// let scoped = client.scoped()?;
    /// let issue = scoped.get_issue("PROJ-1", Default::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn scoped(&self) -> Result<ScopedClient<'_, M>> {
        self.open()?;
        Ok(ScopedClient { client: self })
    }

    /// The Jira instance URL.
    pub fn base_url(&self) -> &str {
        self.gateway.base_url()
    }

    /// The authenticated user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The rate-limit retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.gateway.retry_policy()
    }
}

impl<M: ResponseMode> fmt::Debug for JiraClient<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url())
            .field("user", &self.user)
            .field("mode", &std::any::type_name::<M>())
            .field("session", &self.session_state())
            .finish()
    }
}

/// A borrowed client whose session closes when it goes out of scope.
///
/// Created by [`JiraClient::scoped`]. Derefs to the client.
#[derive(Debug)]
pub struct ScopedClient<'a, M: ResponseMode = Classified> {
    client: &'a JiraClient<M>,
}

impl<M: ResponseMode> Deref for ScopedClient<'_, M> {
    type Target = JiraClient<M>;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl<M: ResponseMode> Drop for ScopedClient<'_, M> {
    fn drop(&mut self) {
        self.client.close();
    }
}

/// Builder for [`JiraClient`].
///
/// Credentials set here win over the `[jira]` table of a config file, which
/// wins over the environment.
pub struct ClientBuilder<M: ResponseMode = Classified> {
    credentials: CredentialInput,
    config: ClientConfig,
    mode: PhantomData<fn() -> M>,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            credentials: CredentialInput::default(),
            config: ClientConfig::default(),
            mode: PhantomData,
        }
    }

    /// Switch to raw-response mode.
    ///
    /// Operations then send each request once and hand back the
    /// `reqwest::Response` whatever its status: no classification, no
    /// rate-limit retry.
    pub fn raw_response(self) -> ClientBuilder<Raw> {
        ClientBuilder {
            credentials: self.credentials,
            config: self.config,
            mode: PhantomData,
        }
    }
}

impl<M: ResponseMode> ClientBuilder<M> {
    /// Set the Jira instance URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.credentials.url = Some(url.into());
        self
    }

    /// Set the user's email address.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.credentials.user = Some(user.into());
        self
    }

    /// Set the API token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.credentials.token = Some(token.into());
        self
    }

    /// Replace all tunables, e.g. with a loaded config file.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// How many times a rate-limited request is retried.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Backoff before the first rate-limit retry.
    pub fn initial_retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.initial_retry_delay = delay.as_secs_f64();
        self
    }

    /// Upper bound for the rate-limit backoff.
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_retry_delay = delay.as_secs_f64();
        self
    }

    /// TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.connect_timeout = timeout.as_secs_f64();
        self
    }

    /// Whole-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.request_timeout = timeout.as_secs_f64();
        self
    }

    /// Backoff factor for transport-level server-error retries.
    pub fn server_error_backoff(mut self, factor: Duration) -> Self {
        self.config.transport.server_error_backoff = factor.as_secs_f64();
        self
    }

    /// Build the client, reading missing credentials from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Authentication`] if credentials are missing or invalid.
    /// - [`ApiError::InvalidRequest`] if a tunable is out of range.
    pub fn build(self) -> Result<JiraClient<M>> {
        self.build_with_env(|var| std::env::var(var).ok())
    }

    /// Build the client, reading missing credentials through `lookup`.
    #[instrument(skip_all)]
    pub fn build_with_env<F>(self, lookup: F) -> Result<JiraClient<M>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ClientBuilder {
            credentials,
            config,
            ..
        } = self;

        config
            .validate()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let input = CredentialInput {
            url: credentials.url.or_else(|| config.jira.url.clone()),
            user: credentials.user.or_else(|| config.jira.user.clone()),
            token: credentials.token,
        };
        let credentials = Credentials::resolve(input, lookup)?;
        let auth = Auth::from_credentials(&credentials)?;

        let retry = RetryPolicy::from(&config.retry);
        debug!(
            max_retries = retry.max_retries,
            initial_delay_ms = retry.initial_delay.as_millis() as u64,
            max_delay_ms = retry.max_delay.as_millis() as u64,
            "Retry policy"
        );

        let session = SessionSlot::new(auth, config.transport);
        let gateway = Gateway::new(credentials.base_url().to_string(), session, retry);

        info!(base_url = %credentials.base_url(), user = %credentials.user(), "JIRA client created");

        Ok(JiraClient {
            gateway,
            user: credentials.user().to_string(),
            mode: PhantomData,
        })
    }
}

impl<M: ResponseMode> fmt::Debug for ClientBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.credentials.url)
            .field("user", &self.credentials.user)
            .field("token", &self.credentials.token.as_ref().map(|_| "<redacted>"))
            .field("config", &self.config)
            .field("mode", &std::any::type_name::<M>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ErrorKind, Reply};
    use crate::config::{ENV_TOKEN, ENV_URL, ENV_USER};
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use reqwest::StatusCode;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn client(base_url: &str, max_retries: u32) -> JiraClient {
        JiraClient::builder()
            .url(base_url)
            .user("test@example.com")
            .token("test-token")
            .max_retries(max_retries)
            .initial_retry_delay(Duration::from_millis(10))
            .max_retry_delay(Duration::from_millis(20))
            .server_error_backoff(Duration::ZERO)
            .build_with_env(no_env)
            .unwrap()
    }

    fn fail_after_open(client: &JiraClient) -> Result<()> {
        let _scoped = client.scoped()?;
        Err(ApiError::InvalidRequest("stop".to_string()))
    }

    #[test]
    fn test_build_without_credentials_fails() {
        let err = JiraClient::builder().build_with_env(no_env).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.to_string().contains("JIRA_API_TOKEN"));
    }

    #[test]
    fn test_build_from_env_lookup() {
        let client = JiraClient::builder()
            .build_with_env(|var| match var {
                v if v == ENV_URL => Some("https://env.atlassian.net/".to_string()),
                v if v == ENV_USER => Some("env@example.com".to_string()),
                v if v == ENV_TOKEN => Some("env-token".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(client.base_url(), "https://env.atlassian.net");
        assert_eq!(client.user(), "env@example.com");
        assert_eq!(client.session_state(), SessionState::Absent);
    }

    #[test]
    fn test_config_file_credentials_are_fallback() -> anyhow::Result<()> {
        let config = ClientConfig::from_toml_str(
            r#"
            [jira]
            url = "https://file.atlassian.net"
            user = "file@example.com"

            [retry]
            max_retries = 7
            "#,
        )?;

        let client = JiraClient::builder()
            .config(config)
            .user("explicit@example.com")
            .token("t")
            .build_with_env(no_env)?;

        assert_eq!(client.base_url(), "https://file.atlassian.net");
        assert_eq!(client.user(), "explicit@example.com");
        assert_eq!(client.retry_policy().max_retries, 7);
        Ok(())
    }

    #[test]
    fn test_invalid_tunables_rejected() {
        let err = JiraClient::builder()
            .url("https://test.atlassian.net")
            .user("test@example.com")
            .token("t")
            .initial_retry_delay(Duration::from_secs(10))
            .max_retry_delay(Duration::from_secs(1))
            .build_with_env(no_env)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_unrepresentable_durations_rejected() {
        let base = || {
            JiraClient::builder()
                .url("https://test.atlassian.net")
                .user("test@example.com")
                .token("t")
        };

        let err = base()
            .max_retry_delay(Duration::MAX)
            .build_with_env(no_env)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = base()
            .request_timeout(Duration::MAX)
            .build_with_env(no_env)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = base()
            .server_error_backoff(Duration::MAX)
            .build_with_env(no_env)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_debug_redacts_token() {
        let builder = JiraClient::builder().token("super-secret");
        assert!(!format!("{:?}", builder).contains("super-secret"));

        let client = client("https://test.atlassian.net", 3);
        assert!(!format!("{:?}", client).contains("test-token"));
    }

    #[test]
    fn test_open_and_close() {
        let client = client("https://test.atlassian.net", 3);
        client.open().unwrap();
        assert_eq!(client.session_state(), SessionState::Active);
        client.close();
        client.close();
        assert_eq!(client.session_state(), SessionState::Absent);
    }

    #[test]
    fn test_scoped_closes_on_drop() {
        let client = client("https://test.atlassian.net", 3);
        {
            let scoped = client.scoped().unwrap();
            assert_eq!(scoped.session_state(), SessionState::Active);
        }
        assert_eq!(client.session_state(), SessionState::Absent);
    }

    #[test]
    fn test_scoped_closes_on_error_return() {
        let client = client("https://test.atlassian.net", 3);
        assert!(fail_after_open(&client).is_err());
        assert_eq!(client.session_state(), SessionState::Absent);
    }

    #[test]
    fn test_scoped_closes_on_panic() {
        let client = client("https://test.atlassian.net", 3);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scoped = client.scoped().unwrap();
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(client.session_state(), SessionState::Absent);
    }

    #[tokio::test]
    async fn test_request_reopens_after_close() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/rest/api/3/field");
            then.status(200).json_body(json!([]));
        });

        let client = client(&server.base_url(), 3);
        client.send(Request::get("field")).await.unwrap();
        assert_eq!(client.session_state(), SessionState::Active);

        client.close();
        client.send(Request::get("field")).await.unwrap();
        assert_eq!(client.session_state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_three_rate_limits_then_success() {
        crate::logging::init_test_logging();

        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/api/3/field")
                .header_missing("x-retry-attempt");
            then.status(429).header("Retry-After", "0");
        });
        let limited: Vec<_> = ["1", "2"]
            .into_iter()
            .map(|n| {
                server.mock(|when, then| {
                    when.method(GET)
                        .path("/rest/api/3/field")
                        .header("x-retry-attempt", n);
                    then.status(429).header("Retry-After", "0");
                })
            })
            .collect();
        let success = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/api/3/field")
                .header("x-retry-attempt", "3");
            then.status(200).json_body(json!([{"id": "summary"}]));
        });

        let reply = client(&server.base_url(), 3)
            .send(Request::get("field"))
            .await
            .unwrap();

        assert_eq!(reply, Reply::Json(json!([{"id": "summary"}])));
        assert_eq!(first.calls(), 1);
        assert!(limited.iter().all(|m| m.calls() == 1));
        assert_eq!(success.calls(), 1);
    }

    #[tokio::test]
    async fn test_three_rate_limits_exhaust_two_retries() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/rest/api/3/field");
            then.status(429).header("Retry-After", "0").body("limited");
        });

        let err = client(&server.base_url(), 2)
            .send(Request::get("field"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_raw_client_returns_error_status_untouched() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/rest/api/3/issue/NOPE-1");
            then.status(404).body("missing");
        });

        let client = JiraClient::builder()
            .raw_response()
            .url(server.base_url())
            .user("test@example.com")
            .token("test-token")
            .build_with_env(no_env)
            .unwrap();

        let response = client.send(Request::get("issue/NOPE-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.text().await.unwrap(), "missing");
        assert_eq!(mock.calls(), 1);
    }
}
