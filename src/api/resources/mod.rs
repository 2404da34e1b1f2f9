//! Typed Jira resource operations.
//!
//! Each submodule adds methods to [`JiraClient`](super::JiraClient) for one
//! API group. Operations translate their parameters into a
//! [`Request`](super::Request) and leave transport, retry and classification
//! to the gateway.

mod comments;
mod fields;
mod issues;
mod search;

use serde::Serialize;
use serde_json::Value;

use super::error::{ApiError, Result};

/// Serialize operation parameters. `None` fields become `null` and are
/// pruned by the gateway.
fn to_json<T: Serialize>(params: &T) -> Result<Value> {
    serde_json::to_value(params)
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize parameters: {}", e)))
}

/// The path segment for an issue ID or key.
fn issue_path(issue_id: &str, rest: &str) -> Result<String> {
    let issue_id = issue_id.trim();
    if issue_id.is_empty() {
        return Err(ApiError::InvalidRequest(
            "issue id cannot be empty".to_string(),
        ));
    }

    let encoded = urlencoding::encode(issue_id);
    Ok(if rest.is_empty() {
        format!("issue/{}", encoded)
    } else {
        format!("issue/{}/{}", encoded, rest)
    })
}
