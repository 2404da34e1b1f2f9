//! Issue fields: `/rest/api/3/field`.

use tracing::{debug, instrument};

use crate::api::error::Result;
use crate::api::gateway::{Request, ResponseMode};
use crate::api::types::Field;
use crate::api::JiraClient;

impl<M: ResponseMode> JiraClient<M> {
    /// Get all system and custom issue fields.
    #[instrument(skip(self))]
    pub async fn get_fields(&self) -> Result<M::Output<Vec<Field>>> {
        debug!("Fetching fields");
        self.call(Request::get("field")).await
    }
}

#[cfg(test)]
mod tests {
    use crate::api::resources::test_support::{client, raw_client};
    use crate::api::ErrorKind;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use reqwest::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_fields() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/api/3/field")
                .header_exists("authorization");
            then.status(200).json_body(json!([
                {"id": "summary", "name": "Summary", "custom": false},
                {"id": "customfield_10016", "name": "Story Points", "custom": true},
            ]));
        });

        let fields = client(&server.base_url()).get_fields().await.unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].name.as_deref(), Some("Story Points"));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_fields_unauthorized() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/rest/api/3/field");
            then.status(401).body("Unauthorized");
        });

        let err = client(&server.base_url()).get_fields().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Request);
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_get_fields_raw() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/rest/api/3/field");
            then.status(200).json_body(json!([{"id": "summary"}]));
        });

        let response = raw_client(&server.base_url()).get_fields().await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, json!([{"id": "summary"}]));
    }
}
