//! Issue search: `/rest/api/3/search/jql`.

use tracing::{debug, instrument};

use super::to_json;
use crate::api::error::Result;
use crate::api::gateway::{Classified, Request, ResponseMode};
use crate::api::types::{Issue, SearchRequest, SearchResults};
use crate::api::JiraClient;

impl<M: ResponseMode> JiraClient<M> {
    /// Search for issues with JQL, one page at a time.
    ///
    /// Pass the returned `next_page_token` back through
    /// [`SearchRequest::next_page_token`] to read the following page.
    #[instrument(skip(self, request), fields(jql = %request.jql))]
    pub async fn enhanced_search(&self, request: SearchRequest) -> Result<M::Output<SearchResults>> {
        debug!(
            max_results = request.max_results,
            paged = request.next_page_token.is_some(),
            "Searching issues"
        );
        let body = to_json(&request)?;
        self.call(Request::post("search/jql").body(body)).await
    }
}

impl JiraClient<Classified> {
    /// Search for issues with JQL and follow every page.
    ///
    /// Stops after `limit` issues when one is given. Each page is a separate
    /// request, so each is retried on its own when rate limited.
    #[instrument(skip(self, request), fields(jql = %request.jql))]
    pub async fn search_all(&self, request: SearchRequest, limit: Option<usize>) -> Result<Vec<Issue>> {
        let mut request = request;
        let mut issues = Vec::new();

        loop {
            let page = self.enhanced_search(request.clone()).await?;
            let fetched = page.issues.len();
            let more = page.has_more() && fetched > 0;
            let token = page.next_page_token.clone();
            issues.extend(page.issues);

            if let Some(limit) = limit {
                if issues.len() >= limit {
                    issues.truncate(limit);
                    break;
                }
            }

            match token {
                Some(token) if more => request.next_page_token = Some(token),
                _ => break,
            }
        }

        debug!("Fetched {} issues", issues.len());
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::resources::test_support::client;
    use crate::api::types::SearchRequest;
    use crate::api::ErrorKind;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_enhanced_search_default_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/api/3/search/jql")
                .json_body(json!({
                    "jql": "project = TEST",
                    "maxResults": 50,
                    "fieldsByKeys": false,
                    "failFast": false,
                    "reconcileIssues": [],
                }));
            then.status(200).json_body(json!({
                "issues": [{"id": "10001", "key": "TEST-1", "fields": {"summary": "First"}}],
                "isLast": true,
            }));
        });

        let results = client(&server.base_url())
            .enhanced_search(SearchRequest::new("project = TEST"))
            .await
            .unwrap();

        assert_eq!(results.issues.len(), 1);
        assert_eq!(results.issues[0].summary(), Some("First"));
        assert!(!results.has_more());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_enhanced_search_with_options() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/api/3/search/jql")
                .json_body(json!({
                    "jql": "project = TEST",
                    "nextPageToken": "token-2",
                    "maxResults": 10,
                    "fields": ["summary", "status"],
                    "expand": "names",
                    "fieldsByKeys": true,
                    "failFast": true,
                    "reconcileIssues": [10001],
                }));
            then.status(200).json_body(json!({"issues": []}));
        });

        client(&server.base_url())
            .enhanced_search(
                SearchRequest::new("project = TEST")
                    .next_page_token("token-2")
                    .max_results(10)
                    .fields(["summary", "status"])
                    .expand("names")
                    .fields_by_keys(true)
                    .fail_fast(true)
                    .reconcile_issues([10001]),
            )
            .await
            .unwrap();

        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_enhanced_search_bad_jql() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/rest/api/3/search/jql");
            then.status(400)
                .json_body(json!({"errorMessages": ["Error in the JQL Query"]}));
        });

        let err = client(&server.base_url())
            .enhanced_search(SearchRequest::new("project = "))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Request);
        assert_eq!(err.jira_messages().as_deref(), Some("Error in the JQL Query"));
    }

    #[tokio::test]
    async fn test_search_all_follows_tokens() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/api/3/search/jql")
                .body_includes(r#""jql":"project = TEST""#)
                .body_excludes("nextPageToken");
            then.status(200).json_body(json!({
                "issues": [{"key": "TEST-1"}, {"key": "TEST-2"}],
                "nextPageToken": "page-2",
            }));
        });
        let second = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/api/3/search/jql")
                .body_includes(r#""nextPageToken":"page-2""#);
            then.status(200).json_body(json!({
                "issues": [{"key": "TEST-3"}],
                "isLast": true,
            }));
        });

        let issues = client(&server.base_url())
            .search_all(SearchRequest::new("project = TEST"), None)
            .await
            .unwrap();

        let keys: Vec<_> = issues.iter().filter_map(|i| i.key.as_deref()).collect();
        assert_eq!(keys, ["TEST-1", "TEST-2", "TEST-3"]);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn test_search_all_respects_limit() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/rest/api/3/search/jql");
            then.status(200).json_body(json!({
                "issues": [{"key": "TEST-1"}, {"key": "TEST-2"}],
                "nextPageToken": "more",
            }));
        });

        let issues = client(&server.base_url())
            .search_all(SearchRequest::new("project = TEST"), Some(1))
            .await
            .unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(mock.calls(), 1);
    }
}
