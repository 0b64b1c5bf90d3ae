use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two independent identity pools of a course.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RosterKind {
    Student,
    Staff,
}

/// Whether a record came from an import or was entered by hand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    /// Hand-entered; never dropped by an import.
    Manual,
    /// Present in the latest import.
    Active,
    /// Absent from the latest import.
    Dropped,
}

/// A member's relationship to the external organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrgStatus {
    None,
    Pending,
    /// The course integration is installed and the member may join on their own.
    #[serde(rename = "joincourse")]
    SelfJoinEligible,
    Invited,
    Member,
    Owner,
    Expired,
}

impl OrgStatus {
    /// Member or owner of the organization.
    pub fn is_linked(self) -> bool {
        matches!(self, OrgStatus::Member | OrgStatus::Owner)
    }
}

/// A course member's reconciled profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: String,
    pub course_id: String,
    pub kind: RosterKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_login: Option<String>,
    pub lifecycle_status: LifecycleStatus,
    pub org_status: OrgStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A normalized row yielded by an import source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RosterRow {
    pub fn new(external_id: Option<&str>, email: Option<&str>, first: &str, last: &str) -> Self {
        Self {
            external_id: external_id.map(String::from),
            email: email.map(String::from),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    /// Trim every field, drop blank keys, and lower-case the email.
    pub fn normalized(&self) -> Self {
        Self {
            external_id: clean_key(self.external_id.as_deref()),
            email: clean_key(self.email.as_deref()).map(|e| e.to_lowercase()),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
        }
    }
}

fn clean_key(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
