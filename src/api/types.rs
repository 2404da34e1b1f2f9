//! Jira API request and response types.
//!
//! Payloads are kept permissive: the well-known keys are typed, everything
//! else lands in `extra` so nothing the service sends is lost.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A system or custom issue field.
///
/// Returned by `GET /rest/api/3/field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// The field ID (e.g., "summary" or "customfield_10016").
    #[serde(default)]
    pub id: Option<String>,
    /// The field key.
    #[serde(default)]
    pub key: Option<String>,
    /// The display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether this is a custom field.
    #[serde(default)]
    pub custom: Option<bool>,
    /// The field's type description.
    #[serde(default)]
    pub schema: Option<Value>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Find a field's ID by its display name.
pub fn field_id_by_name<'a>(fields: &'a [Field], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|f| f.name.as_deref() == Some(name))
        .and_then(|f| f.id.as_deref())
}

/// Find a field's display name by its ID.
pub fn field_name_by_id<'a>(fields: &'a [Field], id: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|f| f.id.as_deref() == Some(id))
        .and_then(|f| f.name.as_deref())
}

/// Map a field key to its ID. IDs win over display names; unknown keys
/// are kept as they are.
fn resolve_field_key(fields: &[Field], key: String) -> String {
    if field_name_by_id(fields, &key).is_some() {
        return key;
    }
    match field_id_by_name(fields, &key) {
        Some(id) => id.to_string(),
        None => key,
    }
}

/// Start index of the page after one that began at `start` and held `len`
/// items.
fn advance(start: u32, len: usize) -> u32 {
    start.saturating_add(u32::try_from(len).unwrap_or(u32::MAX))
}

/// A Jira issue.
///
/// Returned by `GET /rest/api/3/issue/{issueIdOrKey}` or as part of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// The issue ID.
    #[serde(default)]
    pub id: Option<String>,
    /// The issue key (e.g., "PROJ-123").
    #[serde(default)]
    pub key: Option<String>,
    /// URL of the issue resource.
    #[serde(rename = "self", default)]
    pub self_url: Option<String>,
    /// Field values keyed by field ID.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Field display names, present with `expand=names`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Map<String, Value>>,
    /// Any other keys (`changelog`, `renderedFields`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Issue {
    /// A field value by ID.
    pub fn field(&self, id: &str) -> Option<&Value> {
        self.fields.get(id)
    }

    /// A field value by ID or display name.
    ///
    /// Display names resolve only when the issue was fetched with
    /// `expand=names`.
    pub fn field_by_name(&self, name: &str) -> Option<&Value> {
        self.field(name).or_else(|| {
            let names = self.names.as_ref()?;
            let id = names
                .iter()
                .find(|(_, display)| display.as_str() == Some(name))
                .map(|(id, _)| id)?;
            self.field(id)
        })
    }

    /// The summary, if it was requested.
    pub fn summary(&self) -> Option<&str> {
        self.field("summary").and_then(Value::as_str)
    }
}

/// One page of `POST /rest/api/3/search/jql` results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// The matching issues.
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// Token for the next page; absent on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Whether this is the last page.
    #[serde(default)]
    pub is_last: Option<bool>,
    /// Field display names, present with `expand=names`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Map<String, Value>>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchResults {
    /// Check if there are more pages of results.
    pub fn has_more(&self) -> bool {
        self.next_page_token.is_some() && self.is_last != Some(true)
    }
}

/// Parameters for an enhanced JQL search.
///
/// ```
/// use jira_gateway::SearchRequest;
///
/// let request = SearchRequest::new("project = PROJ ORDER BY created DESC")
///     .fields(["summary", "status"])
///     .max_results(25);
/// assert_eq!(request.max_results, 25);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// The JQL query.
    pub jql: String,
    /// Token of the page to fetch.
    pub next_page_token: Option<String>,
    /// Maximum issues per page.
    pub max_results: u32,
    /// Fields to return; `*all` for every field.
    pub fields: Option<Vec<String>>,
    /// Comma-separated entities to expand.
    pub expand: Option<String>,
    /// Issue properties to return.
    pub properties: Option<Vec<String>>,
    /// Reference fields by key instead of ID.
    pub fields_by_keys: bool,
    /// Fail on the first invalid JQL clause.
    pub fail_fast: bool,
    /// Issue IDs that must reflect recent writes.
    pub reconcile_issues: Vec<u64>,
}

impl SearchRequest {
    /// Default page size.
    pub const DEFAULT_MAX_RESULTS: u32 = 50;

    /// A search for `jql` with default options.
    pub fn new(jql: impl Into<String>) -> Self {
        Self {
            jql: jql.into(),
            next_page_token: None,
            max_results: Self::DEFAULT_MAX_RESULTS,
            fields: None,
            expand: None,
            properties: None,
            fields_by_keys: false,
            fail_fast: false,
            reconcile_issues: Vec::new(),
        }
    }

    /// Continue from a previous page.
    pub fn next_page_token(mut self, token: impl Into<String>) -> Self {
        self.next_page_token = Some(token.into());
        self
    }

    /// Set the page size.
    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// Select the returned fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Expand entities, e.g. `"names,changelog"`.
    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    /// Select the returned issue properties.
    pub fn properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Reference fields by key.
    pub fn fields_by_keys(mut self, yes: bool) -> Self {
        self.fields_by_keys = yes;
        self
    }

    /// Fail fast on invalid JQL.
    pub fn fail_fast(mut self, yes: bool) -> Self {
        self.fail_fast = yes;
        self
    }

    /// Require read-after-write consistency for these issue IDs.
    pub fn reconcile_issues(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.reconcile_issues = ids.into_iter().collect();
        self
    }
}

/// Options for reading a single issue.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueQuery {
    /// Comma-separated fields to return.
    pub fields: Option<String>,
    /// Reference fields by key.
    pub fields_by_keys: Option<bool>,
    /// Comma-separated entities to expand.
    pub expand: Option<String>,
    /// Comma-separated issue properties to return.
    pub properties: Option<String>,
    /// Record the view in the user's issue history.
    pub update_history: Option<bool>,
}

/// An issue edit.
///
/// Sent as `PUT /rest/api/3/issue/{issueIdOrKey}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditIssue {
    /// New field values keyed by field ID.
    pub fields: Map<String, Value>,
    /// Field operations (`add`, `remove`, `set`, ...).
    pub update: Option<Map<String, Value>>,
    /// Send notification emails.
    pub notify_users: bool,
    /// Return the updated issue instead of `204 No Content`.
    pub return_issue: bool,
    /// Entities to expand in the returned issue.
    pub expand: Option<String>,
}

impl EditIssue {
    /// An edit setting `fields`, without notifications.
    pub fn fields(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Toggle notification emails.
    pub fn notify_users(mut self, yes: bool) -> Self {
        self.notify_users = yes;
        self
    }

    /// Ask for the updated issue in the response.
    pub fn return_issue(mut self, yes: bool) -> Self {
        self.return_issue = yes;
        self
    }

    /// Rewrite display-name keys in `fields` and `update` to field IDs.
    ///
    /// Keys that already are field IDs, or match no field, are left alone.
    pub fn resolve_field_names(mut self, known: &[Field]) -> Self {
        let resolve = |map: Map<String, Value>| -> Map<String, Value> {
            map.into_iter()
                .map(|(key, value)| (resolve_field_key(known, key), value))
                .collect()
        };
        self.fields = resolve(self.fields);
        self.update = self.update.map(resolve);
        self
    }
}

/// One page of an issue's changelog.
///
/// Returned by `GET /rest/api/3/issue/{issueIdOrKey}/changelog`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogPage {
    /// The index of the first result.
    #[serde(default)]
    pub start_at: u32,
    /// Maximum results requested.
    #[serde(default)]
    pub max_results: u32,
    /// Total number of changelog entries.
    #[serde(default)]
    pub total: u32,
    /// Whether this is the last page.
    #[serde(default)]
    pub is_last: Option<bool>,
    /// The changelog entries.
    #[serde(default)]
    pub values: Vec<Changelog>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChangelogPage {
    /// Check if there are more pages of results.
    pub fn has_more(&self) -> bool {
        match self.is_last {
            Some(is_last) => !is_last,
            None => advance(self.start_at, self.values.len()) < self.total,
        }
    }

    /// Get the starting index for the next page.
    pub fn next_start(&self) -> u32 {
        advance(self.start_at, self.values.len())
    }
}

/// One changelog entry: a set of field changes made together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changelog {
    /// The entry ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Who made the change.
    #[serde(default)]
    pub author: Option<Value>,
    /// When the change was made.
    #[serde(default)]
    pub created: Option<String>,
    /// The individual field changes.
    #[serde(default)]
    pub items: Vec<ChangeItem>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single field change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeItem {
    /// The changed field's name.
    #[serde(default)]
    pub field: Option<String>,
    /// The changed field's ID.
    #[serde(default)]
    pub field_id: Option<String>,
    /// The previous value, as text.
    #[serde(default)]
    pub from_string: Option<String>,
    /// The new value, as text.
    #[serde(default)]
    pub to_string: Option<String>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Options for listing an issue's comments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuery {
    /// Index of the first comment to return.
    pub start_at: Option<u32>,
    /// Maximum comments per page.
    pub max_results: Option<u32>,
    /// Sort order, e.g. `-created`.
    pub order_by: Option<String>,
    /// Entities to expand, e.g. `renderedBody`.
    pub expand: Option<String>,
}

/// A comment on a Jira issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// The comment ID.
    #[serde(default)]
    pub id: Option<String>,
    /// The author.
    #[serde(default)]
    pub author: Option<Value>,
    /// The body, an Atlassian document in API v3.
    #[serde(default)]
    pub body: Option<Value>,
    /// When the comment was created.
    #[serde(default)]
    pub created: Option<String>,
    /// When the comment was last updated.
    #[serde(default)]
    pub updated: Option<String>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Comment {
    /// The body as plain text.
    pub fn body_text(&self) -> String {
        match &self.body {
            Some(Value::String(text)) => text.clone(),
            Some(doc) => adf_to_plain_text(doc),
            None => String::new(),
        }
    }
}

/// One page of an issue's comments.
///
/// Returned by `GET /rest/api/3/issue/{issueIdOrKey}/comment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    /// The index of the first result.
    #[serde(default)]
    pub start_at: u32,
    /// Maximum results requested.
    #[serde(default)]
    pub max_results: u32,
    /// Total number of comments.
    #[serde(default)]
    pub total: u32,
    /// The comments.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommentPage {
    /// Check if there are more pages of results.
    pub fn has_more(&self) -> bool {
        advance(self.start_at, self.comments.len()) < self.total
    }
}

/// A comment body to post.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentBody {
    /// Plain text, wrapped into a one-paragraph Atlassian document.
    Text(String),
    /// A ready-made Atlassian document.
    Document(Value),
}

impl CommentBody {
    /// The Atlassian document to send.
    pub fn into_document(self) -> Value {
        match self {
            CommentBody::Document(doc) => doc,
            CommentBody::Text(text) => serde_json::json!({
                "type": "doc",
                "version": 1,
                "content": [{
                    "type": "paragraph",
                    "content": [{"type": "text", "text": text}],
                }],
            }),
        }
    }
}

impl From<&str> for CommentBody {
    fn from(text: &str) -> Self {
        CommentBody::Text(text.to_string())
    }
}

impl From<String> for CommentBody {
    fn from(text: String) -> Self {
        CommentBody::Text(text)
    }
}

impl From<Value> for CommentBody {
    fn from(doc: Value) -> Self {
        CommentBody::Document(doc)
    }
}

/// Extract the text of an Atlassian document.
///
/// Paragraphs and headings end with a newline, list items get a bullet,
/// mentions render as `@name`. Media nodes are skipped.
pub fn adf_to_plain_text(doc: &Value) -> String {
    let mut out = String::new();
    collect_text(doc, &mut out);
    out.trim().to_string()
}

fn collect_text(node: &Value, out: &mut String) {
    let children = |out: &mut String| {
        if let Some(items) = node.get("content").and_then(Value::as_array) {
            for item in items {
                collect_text(item, out);
            }
        }
    };

    if let Value::Array(items) = node {
        for item in items {
            collect_text(item, out);
        }
        return;
    }

    match node.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        Some("hardBreak") => out.push('\n'),
        Some("mention") => {
            if let Some(text) = node.pointer("/attrs/text").and_then(Value::as_str) {
                if !text.starts_with('@') {
                    out.push('@');
                }
                out.push_str(text);
            }
        }
        Some("listItem") => {
            out.push_str("• ");
            children(out);
        }
        Some("paragraph") | Some("heading") | Some("codeBlock") => {
            children(out);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
        }
        Some("mediaGroup") | Some("mediaSingle") | Some("inlineCard") => {}
        _ => children(out),
    }
}
