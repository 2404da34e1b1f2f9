//! Issue comments: `/rest/api/3/issue/{issueIdOrKey}/comment`.

use serde_json::json;
use tracing::{debug, instrument};

use super::{issue_path, to_json};
use crate::api::error::Result;
use crate::api::gateway::{Request, ResponseMode};
use crate::api::types::{Comment, CommentBody, CommentPage, CommentQuery};
use crate::api::JiraClient;

impl<M: ResponseMode> JiraClient<M> {
    /// Get one page of an issue's comments.
    #[instrument(skip(self, query), fields(issue_id = %issue_id))]
    pub async fn get_comments(&self, issue_id: &str, query: CommentQuery) -> Result<M::Output<CommentPage>> {
        debug!("Fetching comments");
        let request = Request::get(issue_path(issue_id, "comment")?).query(to_json(&query)?);
        self.call(request).await
    }

    /// Add a comment to an issue.
    ///
    /// Plain text is wrapped into a single-paragraph Atlassian document.
    ///
    /// Jira Cloud answers a created comment with `201 Created`, which a
    /// classified client reports as [`ApiError::Http`](crate::ApiError::Http)
    /// carrying the status and the new comment's JSON in `body`. Use a
    /// client built with
    /// [`raw_response`](crate::ClientBuilder::raw_response) to read the
    /// created comment from the response directly.
    #[instrument(skip(self, body), fields(issue_id = %issue_id))]
    pub async fn add_comment(&self, issue_id: &str, body: impl Into<CommentBody>) -> Result<M::Output<Comment>> {
        debug!("Adding comment");
        let request = Request::post(issue_path(issue_id, "comment")?)
            .body(json!({"body": body.into().into_document()}));
        self.call(request).await
    }
}
