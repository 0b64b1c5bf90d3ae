use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course whose roster is synchronized against an external organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    /// Login of the external organization the course is linked to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_org_ref: Option<String>,
    /// Installation id of the organization integration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_ref: Option<String>,
    /// Remote gradebook course that roster pulls read from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradebook_course_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn new(id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            external_org_ref: None,
            installation_ref: None,
            gradebook_course_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the organization integration is installed for this course.
    pub fn is_linked(&self) -> bool {
        self.installation_ref.is_some()
    }
}
