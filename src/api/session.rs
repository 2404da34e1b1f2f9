//! The authenticated transport session.
//!
//! A client owns one [`SessionSlot`]. The slot is either empty or holds a
//! live [`Session`]: an HTTP client with the default Jira headers, timeouts
//! and a small retry budget for transient server errors. Sessions are built
//! on first use and torn down by [`SessionSlot::close`].

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, warn};

use super::auth::Auth;
use super::error::{ApiError, Result};
use super::retry::RETRY_ATTEMPT_HEADER;
use crate::config::TransportSettings;

/// Statuses the transport re-sends on its own, before the gateway sees them.
const SERVER_ERROR_STATUSES: [StatusCode; 4] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// How many times the transport re-sends on a server error.
const SERVER_ERROR_RETRIES: u32 = 3;

const USER_AGENT: &str = concat!("jira-gateway/", env!("CARGO_PKG_VERSION"));

/// Whether a client currently holds a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session; the next request creates one.
    Absent,
    /// A session is open.
    Active,
}

/// A live, authenticated HTTP session.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Session {
    http: Client,
    server_error_backoff: Duration,
}

/// One outgoing HTTP exchange.
#[derive(Debug)]
pub(crate) struct Outgoing<'a> {
    pub method: Method,
    pub url: &'a str,
    pub query: &'a [(String, String)],
    pub body: Option<&'a str>,
    /// Gateway-level retry number, sent as `X-Retry-Attempt` when non-zero.
    pub retry_attempt: u32,
}

impl Session {
    fn open(auth: &Auth, settings: &TransportSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::AUTHORIZATION, auth.header_value().clone());

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http,
            server_error_backoff: settings.server_error_backoff(),
        })
    }

    /// Send one request, re-sending idempotent requests that hit a transient
    /// server error.
    ///
    /// Once the server-error budget is spent the last response is returned
    /// as-is. Network failures are returned unchanged.
    pub(crate) async fn execute(&self, outgoing: &Outgoing<'_>) -> reqwest::Result<Response> {
        let mut retries = 0;

        loop {
            let mut request = self.http.request(outgoing.method.clone(), outgoing.url);
            if !outgoing.query.is_empty() {
                request = request.query(outgoing.query);
            }
            if let Some(body) = outgoing.body {
                request = request.body(body.to_string());
            }
            if outgoing.retry_attempt > 0 {
                request = request.header(RETRY_ATTEMPT_HEADER, outgoing.retry_attempt);
            }

            let response = request.send().await?;
            let status = response.status();

            if SERVER_ERROR_STATUSES.contains(&status)
                && is_idempotent(&outgoing.method)
                && retries < SERVER_ERROR_RETRIES
            {
                let delay = server_error_delay(self.server_error_backoff, retries);
                retries += 1;
                warn!(
                    %status,
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, re-sending request"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Ok(response);
        }
    }
}

/// `factor * 2^retries`, saturating at `Duration::MAX`.
fn server_error_delay(factor: Duration, retries: u32) -> Duration {
    factor.saturating_mul(2u32.saturating_pow(retries))
}

/// Methods that are safe to re-send after a server error.
fn is_idempotent(method: &Method) -> bool {
    [
        Method::GET,
        Method::HEAD,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
        Method::TRACE,
    ]
    .contains(method)
}

#[derive(Debug)]
enum Slot {
    Absent,
    Active(Session),
}

/// Owner of a client's session: `Absent` or `Active`.
///
/// Transitions are serialized by a mutex. Requests run on a cloned
/// [`Session`] outside the lock.
#[derive(Debug)]
pub struct SessionSlot {
    auth: Auth,
    settings: TransportSettings,
    slot: Mutex<Slot>,
}

impl SessionSlot {
    pub(crate) fn new(auth: Auth, settings: TransportSettings) -> Self {
        Self {
            auth,
            settings,
            slot: Mutex::new(Slot::Absent),
        }
    }

    /// Return the live session, opening one if there is none.
    pub fn acquire(&self) -> Result<Session> {
        let mut slot = self.lock();
        if let Slot::Active(session) = &*slot {
            return Ok(session.clone());
        }

        debug!(user = %self.auth.email(), "Opening session");
        let session = Session::open(&self.auth, &self.settings)?;
        *slot = Slot::Active(session.clone());
        Ok(session)
    }

    /// Drop the live session, if any. Safe to call repeatedly.
    pub fn close(&self) {
        let mut slot = self.lock();
        if let Slot::Active(_) = std::mem::replace(&mut *slot, Slot::Absent) {
            debug!("Session closed");
        }
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        match &*self.lock() {
            Slot::Absent => SessionState::Absent,
            Slot::Active(_) => SessionState::Active,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
