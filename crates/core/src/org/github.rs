//! GitHub REST implementation of [`OrgClient`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Result, RollcallError};

use super::{OrgClient, OrgMember, OrgRole, OrgUser};

const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
}

pub struct GithubOrgClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl GithubOrgClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self::with_http_client(base_url, token, Client::new())
    }

    /// Create a client with a custom reqwest::Client (useful for testing).
    pub fn with_http_client(base_url: &str, token: Option<&str>, http: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            http,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "Rollcall/1.0");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn list_members_with_role(&self, org: &str, role: OrgRole) -> Result<Vec<OrgMember>> {
        let role_param = match role {
            OrgRole::Admin => "admin",
            OrgRole::Member => "member",
        };
        let mut members = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/orgs/{org}/members?role={role_param}&per_page={PER_PAGE}&page={page}",
                self.base_url
            );
            debug!(url = %url, "Fetching organization members");
            let response = self.authorized(self.http.get(&url)).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(RollcallError::Org(format!(
                    "listing members of {org} failed with status {status}: {body}"
                )));
            }

            let users: Vec<GithubUser> = response
                .json()
                .await
                .map_err(|e| RollcallError::Org(format!("failed to parse members: {e}")))?;
            let count = users.len();
            members.extend(users.into_iter().map(|u| OrgMember {
                id: u.id,
                login: u.login,
                role,
            }));

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(members)
    }
}

#[async_trait]
impl OrgClient for GithubOrgClient {
    async fn lookup_user(&self, login: &str) -> Result<Option<OrgUser>> {
        let url = format!("{}/users/{login}", self.base_url);
        let response = self.authorized(self.http.get(&url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(RollcallError::Org(format!(
                "user lookup for {login} failed with status {status}"
            )));
        }

        let user: GithubUser = response
            .json()
            .await
            .map_err(|e| RollcallError::Org(format!("failed to parse user: {e}")))?;
        Ok(Some(OrgUser {
            id: user.id,
            login: user.login,
        }))
    }

    async fn invite_member(&self, org: &str, user_id: i64) -> Result<()> {
        let url = format!("{}/orgs/{org}/invitations", self.base_url);
        let response = self
            .authorized(self.http.post(&url))
            .json(&json!({ "invitee_id": user_id, "role": "direct_member" }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(org, user_id, status = %status, "Invitation request failed");
            return Err(RollcallError::Org(format!(
                "invitation to {org} failed with status {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn remove_member(&self, org: &str, login: &str) -> Result<()> {
        let url = format!("{}/orgs/{org}/members/{login}", self.base_url);
        let response = self.authorized(self.http.delete(&url)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RollcallError::Org(format!(
                "removing {login} from {org} failed with status {status}"
            )));
        }
        Ok(())
    }

    async fn list_members(&self, org: &str) -> Result<Vec<OrgMember>> {
        let mut members = self.list_members_with_role(org, OrgRole::Admin).await?;
        members.extend(self.list_members_with_role(org, OrgRole::Member).await?);
        Ok(members)
    }
}
