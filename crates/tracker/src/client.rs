//! Tracker traits and the REST implementation.

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::format::to_adf;
use crate::models::{Board, CreatedIssue, Issue, IssuePage, NewIssue, Page, Sprint, SprintState};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

/// Upper bound on pages walked by [`TrackerRead::get_all_sprint_issues`].
const MAX_PAGES: usize = 20;

/// Read access to the tracking system.
#[async_trait]
pub trait TrackerRead: Send + Sync {
    /// Base URL used to build human-facing links.
    fn base_url(&self) -> &str;

    async fn get_board(&self, board_id: u64) -> TrackerResult<Board>;

    async fn get_board_issues(
        &self,
        board_id: u64,
        page: Page,
        jql: Option<&str>,
    ) -> TrackerResult<IssuePage>;

    async fn get_all_boards(&self, max_results: u32) -> TrackerResult<Vec<Board>>;

    async fn get_sprints(
        &self,
        board_id: u64,
        state: Option<SprintState>,
    ) -> TrackerResult<Vec<Sprint>>;

    async fn get_sprint_issues(&self, sprint_id: u64, page: Page) -> TrackerResult<IssuePage>;

    async fn get_issue(&self, issue_key: &str) -> TrackerResult<Issue>;

    async fn search_issues(
        &self,
        jql: &str,
        page: Page,
        fields: Option<&[&str]>,
    ) -> TrackerResult<IssuePage>;

    /// The first active sprint on a board, or `None` when there is none.
    async fn get_active_sprint(&self, board_id: u64) -> TrackerResult<Option<Sprint>> {
        let sprints = self.get_sprints(board_id, Some(SprintState::Active)).await?;
        Ok(first_active(sprints))
    }

    /// Every issue in a sprint, following pagination.
    async fn get_all_sprint_issues(&self, sprint_id: u64) -> TrackerResult<Vec<Issue>> {
        let mut page = Page::default();
        let mut issues = Vec::new();

        for _ in 0..MAX_PAGES {
            let batch = self.get_sprint_issues(sprint_id, page).await?;
            let more = batch.has_more();
            issues.extend(batch.issues);
            if !more {
                break;
            }
            page = page.next();
        }

        Ok(issues)
    }
}

/// Write access to the tracking system.
#[async_trait]
pub trait TrackerWrite: Send + Sync {
    async fn create_issue(&self, issue: &NewIssue) -> TrackerResult<CreatedIssue>;
}

/// First sprint whose state is active, in the order the tracker returned them.
pub fn first_active(sprints: Vec<Sprint>) -> Option<Sprint> {
    sprints
        .into_iter()
        .find(|sprint| sprint.state == SprintState::Active)
}

#[derive(Deserialize)]
struct ValuesPage<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
}

/// REST client for Jira Cloud style agile and platform APIs.
pub struct JiraClient {
    base_url: String,
    email: String,
    api_token: String,
    http_client: reqwest::Client,
}

impl JiraClient {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_token: config.api_token.clone(),
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> TrackerResult<T> {
        let request = self.http_client.get(self.url(path)).query(query);
        self.send(operation, path, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        resource: &str,
        request: reqwest::RequestBuilder,
    ) -> TrackerResult<T> {
        debug!(operation, resource, "Tracker request");

        let response = request
            .basic_auth(&self.email, Some(&self.api_token))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(operation, error = %e, "Tracker request failed");
                TrackerError::Transport {
                    operation,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(operation, status = %status, "Tracker returned an error status");
            return Err(if status == reqwest::StatusCode::NOT_FOUND {
                TrackerError::NotFound {
                    operation,
                    resource: resource.to_string(),
                }
            } else {
                TrackerError::Status {
                    operation,
                    status: status.as_u16(),
                    body,
                }
            });
        }

        response.json::<T>().await.map_err(|e| {
            warn!(operation, error = %e, "Tracker response did not decode");
            TrackerError::Decode {
                operation,
                message: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl TrackerRead for JiraClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_board(&self, board_id: u64) -> TrackerResult<Board> {
        self.get_json(
            "get_board",
            &format!("/rest/agile/1.0/board/{}", board_id),
            &[],
        )
        .await
    }

    async fn get_board_issues(
        &self,
        board_id: u64,
        page: Page,
        jql: Option<&str>,
    ) -> TrackerResult<IssuePage> {
        let mut query = vec![
            ("maxResults", page.max_results.to_string()),
            ("startAt", page.start_at.to_string()),
        ];
        if let Some(jql) = jql.filter(|q| !q.trim().is_empty()) {
            query.push(("jql", jql.to_string()));
        }

        self.get_json(
            "get_board_issues",
            &format!("/rest/agile/1.0/board/{}/issue", board_id),
            &query,
        )
        .await
    }

    async fn get_all_boards(&self, max_results: u32) -> TrackerResult<Vec<Board>> {
        let page: ValuesPage<Board> = self
            .get_json(
                "get_all_boards",
                "/rest/agile/1.0/board",
                &[("maxResults", max_results.to_string())],
            )
            .await?;
        Ok(page.values)
    }

    async fn get_sprints(
        &self,
        board_id: u64,
        state: Option<SprintState>,
    ) -> TrackerResult<Vec<Sprint>> {
        let query: Vec<(&str, String)> = state
            .filter(|s| *s != SprintState::Unknown)
            .map(|s| vec![("state", s.as_str().to_string())])
            .unwrap_or_default();

        let page: ValuesPage<Sprint> = self
            .get_json(
                "get_sprints",
                &format!("/rest/agile/1.0/board/{}/sprint", board_id),
                &query,
            )
            .await?;
        Ok(page.values)
    }

    async fn get_sprint_issues(&self, sprint_id: u64, page: Page) -> TrackerResult<IssuePage> {
        self.get_json(
            "get_sprint_issues",
            &format!("/rest/agile/1.0/sprint/{}/issue", sprint_id),
            &[
                ("maxResults", page.max_results.to_string()),
                ("startAt", page.start_at.to_string()),
            ],
        )
        .await
    }

    async fn get_issue(&self, issue_key: &str) -> TrackerResult<Issue> {
        self.get_json(
            "get_issue",
            &format!("/rest/api/3/issue/{}", issue_key),
            &[],
        )
        .await
    }

    async fn search_issues(
        &self,
        jql: &str,
        page: Page,
        fields: Option<&[&str]>,
    ) -> TrackerResult<IssuePage> {
        let mut payload = serde_json::json!({
            "jql": jql,
            "maxResults": page.max_results,
            "startAt": page.start_at,
        });
        if let Some(fields) = fields.filter(|f| !f.is_empty()) {
            payload["fields"] = serde_json::json!(fields);
        }

        let path = "/rest/api/3/search";
        let request = self.http_client.post(self.url(path)).json(&payload);
        self.send("search_issues", path, request).await
    }
}

#[async_trait]
impl TrackerWrite for JiraClient {
    async fn create_issue(&self, issue: &NewIssue) -> TrackerResult<CreatedIssue> {
        let payload = serde_json::json!({
            "fields": {
                "project": { "key": issue.project_key },
                "summary": issue.summary,
                "description": to_adf(&issue.description),
                "issuetype": { "name": issue.issue_type },
            }
        });

        let path = "/rest/api/3/issue";
        let request = self.http_client.post(self.url(path)).json(&payload);
        self.send("create_issue", path, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprint(id: u64, state: SprintState) -> Sprint {
        Sprint {
            id,
            name: format!("Sprint {}", id),
            state,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_active_picks_first_active() {
        let sprints = vec![
            sprint(1, SprintState::Closed),
            sprint(2, SprintState::Active),
            sprint(3, SprintState::Active),
        ];
        assert_eq!(first_active(sprints).map(|s| s.id), Some(2));
    }

    #[test]
    fn test_first_active_empty() {
        assert!(first_active(vec![]).is_none());
        assert!(first_active(vec![sprint(1, SprintState::Future)]).is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = JiraClient::new(&TrackerConfig::new("https://x.atlassian.net/", "e", "t"));
        assert_eq!(client.base_url(), "https://x.atlassian.net");
        assert_eq!(
            client.url("/rest/api/3/issue/A-1"),
            "https://x.atlassian.net/rest/api/3/issue/A-1"
        );
    }
}
