//! A typed client for the Jira Cloud REST API (v3).
//!
//! Every call goes through one request gateway that owns the authenticated
//! session, builds endpoint URLs, prunes absent values, classifies responses
//! and retries rate-limited requests with backoff.
//!
//! ```no_run
//! # async fn run() -> jira_gateway::api::Result<()> {
//! use jira_gateway::{JiraClient, SearchRequest};
//!
//! // JIRA_URL, JIRA_USER and JIRA_API_TOKEN fill in anything not set here.
//! let client = JiraClient::builder().max_retries(5).build()?;
//!
//! let results = client
//!     .enhanced_search(SearchRequest::new("assignee = currentUser()").fields(["summary"]))
//!     .await?;
//! for issue in &results.issues {
//!     println!("{:?}: {:?}", issue.key, issue.summary());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through `tracing`; install a subscriber to see it.

pub mod api;
pub mod config;

#[cfg(test)]
mod logging;

pub use api::{
    ApiError, ClientBuilder, Classified, ErrorKind, JiraClient, Raw, Reply, Request, ScopedClient,
    SearchRequest,
};
pub use config::{ClientConfig, ConfigError};
