//! Issues: `/rest/api/3/issue/{issueIdOrKey}` and its changelog.

use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{issue_path, to_json};
use crate::api::error::Result;
use crate::api::gateway::{Classified, Request, ResponseMode};
use crate::api::types::{ChangeItem, Changelog, ChangelogPage, EditIssue, Issue, IssueQuery};
use crate::api::JiraClient;

impl<M: ResponseMode> JiraClient<M> {
    /// Get a single issue by ID or key.
    #[instrument(skip(self, query), fields(issue_id = %issue_id))]
    pub async fn get_issue(&self, issue_id: &str, query: IssueQuery) -> Result<M::Output<Issue>> {
        debug!("Fetching issue");
        let request = Request::get(issue_path(issue_id, "")?).query(to_json(&query)?);
        self.call(request).await
    }

    /// Get one page of an issue's changelog, oldest first.
    #[instrument(skip(self), fields(issue_id = %issue_id))]
    pub async fn get_changelogs(
        &self,
        issue_id: &str,
        start_at: Option<u32>,
        max_results: Option<u32>,
    ) -> Result<M::Output<ChangelogPage>> {
        debug!("Fetching changelog page");
        let request = Request::get(issue_path(issue_id, "changelog")?).query(json!({
            "startAt": start_at,
            "maxResults": max_results,
        }));
        self.call(request).await
    }

    /// Edit an issue's fields.
    ///
    /// Returns the updated issue when [`EditIssue::return_issue`] is set and
    /// `None` when Jira answers `204 No Content`.
    #[instrument(skip(self, edit), fields(issue_id = %issue_id))]
    pub async fn edit_issue(&self, issue_id: &str, edit: EditIssue) -> Result<M::Output<Option<Issue>>> {
        debug!(fields = edit.fields.len(), "Editing issue");
        let EditIssue {
            fields,
            update,
            notify_users,
            return_issue,
            expand,
        } = edit;

        let request = Request::put(issue_path(issue_id, "")?)
            .query(json!({
                "notifyUsers": notify_users,
                "returnIssue": return_issue,
                "expand": expand,
            }))
            .body(json!({
                "fields": Value::Object(fields),
                "update": update.map(Value::Object),
            }));
        self.call(request).await
    }
}

impl JiraClient<Classified> {
    /// Edit an issue, accepting field display names as keys.
    ///
    /// Fetches the field list and rewrites keys such as `"Story Points"` to
    /// their IDs before sending the edit.
    #[instrument(skip(self, edit), fields(issue_id = %issue_id))]
    pub async fn edit_issue_by_name(&self, issue_id: &str, edit: EditIssue) -> Result<Option<Issue>> {
        let known = self.get_fields().await?;
        self.edit_issue(issue_id, edit.resolve_field_names(&known)).await
    }

    /// Read an issue's whole changelog, following every page.
    ///
    /// With `field`, only entries touching that field are kept, each
    /// trimmed to the matching items.
    #[instrument(skip(self), fields(issue_id = %issue_id))]
    pub async fn get_all_changelogs(&self, issue_id: &str, field: Option<&str>) -> Result<Vec<Changelog>> {
        let mut start_at = 0;
        let mut changelog = Vec::new();

        loop {
            let page = self.get_changelogs(issue_id, Some(start_at), None).await?;
            let more = page.has_more() && !page.values.is_empty();
            start_at = page.next_start();
            changelog.extend(page.values);

            if !more {
                break;
            }
        }

        debug!("Fetched {} changelog entries", changelog.len());

        Ok(match field {
            Some(field) => changelog
                .into_iter()
                .filter_map(|entry| retain_field(entry, field))
                .collect(),
            None => changelog,
        })
    }
}

/// Keep only the items of `entry` that change `field`; `None` if there are none.
fn retain_field(mut entry: Changelog, field: &str) -> Option<Changelog> {
    let matches = |item: &ChangeItem| {
        item.field.as_deref() == Some(field) || item.field_id.as_deref() == Some(field)
    };
    entry.items.retain(matches);
    (!entry.items.is_empty()).then_some(entry)
}
