//! The request gateway.
//!
//! Every API call goes through [`Gateway`]: it builds the endpoint URL,
//! prunes absent values from the query and body, dispatches on the session,
//! retries rate-limited requests and classifies the outcome.
//!
//! Retrying a 429 is done regardless of HTTP method. This relies on Jira
//! rejecting throttled requests before they have any effect, which also
//! makes retried POST and PUT requests safe.

use std::future::Future;

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use super::error::{ApiError, Result};
use super::retry::{retry_after_hint, RetryPolicy};
use super::session::{Outgoing, SessionSlot};
use super::url::endpoint_url;

/// A request against the Jira REST API.
///
/// `path` is relative to `/rest/api/3/`. Query and body must be JSON
/// objects. Top-level `null` entries mean "absent" and are dropped before
/// sending; `false`, `0`, `""`, `[]` and `{}` are sent as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<Value>,
    body: Option<Value>,
}

impl Request {
    /// Create a request with no query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            body: None,
        }
    }

    /// A `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A `PUT` request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// A `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set the query parameters.
    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Set the JSON body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The API-relative path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A classified successful outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `200 OK` with a JSON body.
    Json(Value),
    /// `204 No Content`: the operation succeeded without a payload.
    NoContent,
}

impl Reply {
    /// The JSON body, if there was one.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Reply::Json(value) => Some(value),
            Reply::NoContent => None,
        }
    }

    /// Decode into a typed value. No content decodes as JSON `null`, so it
    /// fits `()` and `Option<T>`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.into_json().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| ApiError::Decode(format!("Failed to parse response: {}", e)))
    }
}

/// How a client hands results back.
///
/// [`Classified`] checks status codes, retries rate limiting and decodes
/// JSON. [`Raw`] sends once and returns the untouched response.
pub trait ResponseMode: Send + Sync + 'static {
    /// What [`JiraClient::send`](crate::JiraClient::send) returns.
    type Reply: Send;
    /// What a typed resource operation returns.
    type Output<T>;

    /// Dispatch a request through the gateway.
    fn send(gateway: &Gateway, request: Request) -> impl Future<Output = Result<Self::Reply>> + Send;

    /// Turn a reply into a resource operation's result.
    fn decode<T: DeserializeOwned>(reply: Self::Reply) -> Result<Self::Output<T>>;
}

/// Status-classifying mode. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classified;

/// Raw-response mode: no classification, no rate-limit retry.
///
/// Transport failures come back as [`ApiError::Network`] holding the
/// untouched `reqwest::Error`; every status code is the caller's to
/// interpret.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl ResponseMode for Classified {
    type Reply = Reply;
    type Output<T> = T;

    async fn send(gateway: &Gateway, request: Request) -> Result<Reply> {
        gateway.send(request).await
    }

    fn decode<T: DeserializeOwned>(reply: Reply) -> Result<T> {
        reply.decode()
    }
}

impl ResponseMode for Raw {
    type Reply = Response;
    type Output<T> = Response;

    async fn send(gateway: &Gateway, request: Request) -> Result<Response> {
        gateway.send_raw(request).await
    }

    fn decode<T: DeserializeOwned>(reply: Response) -> Result<Response> {
        Ok(reply)
    }
}

/// A request after validation and pruning, ready to go on the wire.
#[derive(Debug)]
struct Prepared {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    body: Option<String>,
}

impl Prepared {
    fn outgoing(&self, retry_attempt: u32) -> Outgoing<'_> {
        Outgoing {
            method: self.method.clone(),
            url: &self.url,
            query: &self.query,
            body: self.body.as_deref(),
            retry_attempt,
        }
    }
}

/// The component that owns transport, retry and response classification.
#[derive(Debug)]
pub struct Gateway {
    base_url: String,
    session: SessionSlot,
    retry: RetryPolicy,
}

impl Gateway {
    pub(crate) fn new(base_url: String, session: SessionSlot, retry: RetryPolicy) -> Self {
        Self {
            base_url,
            session,
            retry,
        }
    }

    /// The session owned by this gateway.
    pub fn session(&self) -> &SessionSlot {
        &self.session
    }

    /// The rate-limit retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The Jira instance URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and classify the response.
    ///
    /// - `200` decodes the JSON body.
    /// - `204` yields [`Reply::NoContent`].
    /// - `429` is retried after a delay until the retry budget runs out,
    ///   then fails with [`ApiError::RateLimited`].
    /// - anything else fails at once with [`ApiError::Http`].
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: Request) -> Result<Reply> {
        let prepared = self.prepare(request)?;
        let session = self.session.acquire()?;
        let mut attempt = 0;

        loop {
            debug!(
                "Request attempt {}/{}",
                attempt + 1,
                self.retry.max_retries.saturating_add(1)
            );

            let response = session.execute(&prepared.outgoing(attempt)).await?;
            let status = response.status();

            match status {
                StatusCode::OK => {
                    return response
                        .json::<Value>()
                        .await
                        .map(Reply::Json)
                        .map_err(|e| ApiError::Decode(format!("Failed to parse response: {}", e)));
                }
                StatusCode::NO_CONTENT => return Ok(Reply::NoContent),
                StatusCode::TOO_MANY_REQUESTS => {
                    let hint = retry_after_hint(response.headers());
                    let body = read_body(response).await;

                    if !self.retry.allows_retry(attempt) {
                        warn!("Rate limited, giving up after {} retries", attempt);
                        return Err(ApiError::RateLimited { status, body });
                    }

                    let delay = self.retry.delay(attempt, hint.as_deref());
                    warn!(
                        "Rate limited (attempt {}), retrying in {}ms",
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => {
                    let body = read_body(response).await;
                    debug!("Error response body: {}", body);
                    return Err(ApiError::Http { status, body });
                }
            }
        }
    }

    /// Send a request once and return the response unclassified.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send_raw(&self, request: Request) -> Result<Response> {
        let prepared = self.prepare(request)?;
        let session = self.session.acquire()?;
        let response = session.execute(&prepared.outgoing(0)).await?;
        debug!(status = %response.status(), "Raw response");
        Ok(response)
    }

    fn prepare(&self, request: Request) -> Result<Prepared> {
        let url = endpoint_url(&self.base_url, &request.path)?;

        let query = match object_or_absent(request.query, "query")? {
            Some(map) => query_pairs(prune_absent(map)),
            None => Vec::new(),
        };

        let body = object_or_absent(request.body, "body")?
            .map(|map| serde_json::to_string(&Value::Object(prune_absent(map))))
            .transpose()
            .map_err(|e| ApiError::InvalidRequest(format!("body is not serializable: {}", e)))?;

        Ok(Prepared {
            method: request.method,
            url,
            query,
            body,
        })
    }
}

/// Read an error response's body as text.
///
/// The status is what classifies the response, so a body that cannot be
/// read is logged and reported as empty.
async fn read_body(response: Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(%status, error = %e, "Failed to read error response body");
            String::new()
        }
    }
}

fn object_or_absent(value: Option<Value>, what: &str) -> Result<Option<Map<String, Value>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(ApiError::InvalidRequest(format!(
            "{} must be a JSON object, got {}",
            what, other
        ))),
    }
}

/// Drop top-level entries whose value is `null`.
pub fn prune_absent(mut map: Map<String, Value>) -> Map<String, Value> {
    map.retain(|_, value| !value.is_null());
    map
}

/// Render query parameters as string pairs. Arrays become repeated keys.
fn query_pairs(map: Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                for item in items.into_iter().filter(|item| !item.is_null()) {
                    pairs.push((key.clone(), query_value(item)));
                }
            }
            other => pairs.push((key, query_value(other))),
        }
    }
    pairs
}

fn query_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
