//! JIRA API client and types.
//!
//! Requests flow one way: resource operations build a [`Request`], the
//! [`Gateway`] sends it on the client's [`Session`] and classifies the
//! response.

mod auth;
mod client;
mod error;
mod gateway;
mod resources;
mod retry;
mod session;
mod types;
mod url;

pub use auth::Auth;
pub use client::{ClientBuilder, JiraClient, ScopedClient};
pub use error::{ApiError, ErrorKind, Result};
pub use gateway::{prune_absent, Classified, Gateway, Raw, Reply, Request, ResponseMode};
pub use retry::{parse_retry_after, retry_after_hint, RetryPolicy, RATE_LIMIT_RESET, RETRY_ATTEMPT_HEADER};
pub use session::{Session, SessionSlot, SessionState};
pub use types::{
    adf_to_plain_text, field_id_by_name, field_name_by_id, ChangeItem, Changelog, ChangelogPage,
    Comment, CommentBody, CommentPage, CommentQuery, EditIssue, Field, Issue, IssueQuery,
    SearchRequest, SearchResults,
};
pub use url::{endpoint_url, API_VERSION};
