//! Endpoint URL construction.

use super::error::{ApiError, Result};

/// The Jira REST API version every endpoint is served under.
pub const API_VERSION: &str = "3";

/// Build the absolute URL for an API path.
///
/// At most one trailing `/` is stripped from `base`; whitespace and all
/// leading and trailing `/` are stripped from `path`.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] if nothing is left of `path`.
pub fn endpoint_url(base: &str, path: &str) -> Result<String> {
    let base = base.strip_suffix('/').unwrap_or(base);
    let path = path.trim().trim_matches('/').trim();

    if path.is_empty() {
        return Err(ApiError::InvalidRequest("path cannot be empty".to_string()));
    }

    Ok(format!("{}/rest/api/{}/{}", base, API_VERSION, path))
}
