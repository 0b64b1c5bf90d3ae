//! Client boundary for the external GitHub-style organization.

pub mod github;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An account on the external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUser {
    pub id: i64,
    pub login: String,
}

/// Role of a current organization member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMember {
    pub id: i64,
    pub login: String,
    pub role: OrgRole,
}

/// Operations Rollcall needs from the organization provider.
#[async_trait]
pub trait OrgClient: Send + Sync {
    async fn lookup_user(&self, login: &str) -> Result<Option<OrgUser>>;
    async fn invite_member(&self, org: &str, user_id: i64) -> Result<()>;
    async fn remove_member(&self, org: &str, login: &str) -> Result<()>;
    async fn list_members(&self, org: &str) -> Result<Vec<OrgMember>>;
}
