//! Roster pull from a Canvas-style gradebook API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, RollcallError};
use crate::models::roster::{RosterKind, RosterRow};

use super::RosterSource;

const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct GradebookUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sortable_name: Option<String>,
    #[serde(default)]
    sis_user_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    login_id: Option<String>,
}

impl GradebookUser {
    fn into_row(self) -> RosterRow {
        let (first_name, last_name) = split_name(self.sortable_name.as_deref(), self.name.as_deref());
        RosterRow {
            external_id: self.sis_user_id,
            email: self
                .email
                .or(self.login_id.filter(|login| login.contains('@'))),
            first_name,
            last_name,
        }
    }
}

/// "Last, First" when available, otherwise the display name's last word is the surname.
fn split_name(sortable: Option<&str>, display: Option<&str>) -> (String, String) {
    if let Some((last, first)) = sortable.and_then(|s| s.split_once(',')) {
        return (first.trim().to_string(), last.trim().to_string());
    }
    let display = display.or(sortable).unwrap_or_default().trim();
    match display.rsplit_once(' ') {
        Some((first, last)) => (first.trim().to_string(), last.to_string()),
        None => (String::new(), display.to_string()),
    }
}

pub struct GradebookRosterSource {
    base_url: String,
    api_token: String,
    course_id: String,
    kind: RosterKind,
    http: Client,
}

impl GradebookRosterSource {
    pub fn new(base_url: &str, api_token: &str, course_id: &str, kind: RosterKind) -> Self {
        Self::with_http_client(base_url, api_token, course_id, kind, Client::new())
    }

    /// Create a source with a custom reqwest::Client (useful for testing).
    pub fn with_http_client(
        base_url: &str,
        api_token: &str,
        course_id: &str,
        kind: RosterKind,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            course_id: course_id.to_string(),
            kind,
            http,
        }
    }

    fn enrollment_filter(&self) -> &'static str {
        match self.kind {
            RosterKind::Student => "enrollment_type[]=student",
            RosterKind::Staff => "enrollment_type[]=teacher&enrollment_type[]=ta",
        }
    }
}

#[async_trait]
impl RosterSource for GradebookRosterSource {
    async fn fetch_rows(&self) -> Result<Vec<RosterRow>> {
        let mut rows = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/api/v1/courses/{}/users?{}&per_page={PER_PAGE}&page={page}",
                self.base_url,
                self.course_id,
                self.enrollment_filter()
            );
            debug!(url = %url, "Fetching gradebook page");

            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.api_token)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, course_id = %self.course_id, "Gradebook request failed");
                return Err(RollcallError::Import(format!(
                    "gradebook request failed with status {status}: {body}"
                )));
            }

            let users: Vec<GradebookUser> = response.json().await.map_err(|e| {
                RollcallError::Import(format!("failed to parse gradebook users: {e}"))
            })?;
            let count = users.len();
            rows.extend(users.into_iter().map(GradebookUser::into_row));

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(rows)
    }

    fn source_name(&self) -> &str {
        "gradebook"
    }
}
