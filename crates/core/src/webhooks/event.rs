use serde_json::Value;

use crate::models::roster::OrgStatus;

/// The subset of organization events Rollcall acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A member's organization status changed.
    MemberStatus {
        installation_id: String,
        login: String,
        status: OrgStatus,
    },
    /// The app was uninstalled from an organization.
    InstallationDeleted { installation_id: String },
    /// Anything else, including structurally incomplete payloads.
    Ignored,
}

impl WebhookEvent {
    pub fn parse(payload: &Value) -> Self {
        let Some(action) = payload.get("action").and_then(Value::as_str) else {
            return Self::Ignored;
        };
        let Some(installation_id) = installation_id(payload) else {
            return Self::Ignored;
        };

        match action {
            "member_added" => {
                let status = match str_at(payload, &["membership", "role"]) {
                    Some("admin") => OrgStatus::Owner,
                    Some("direct_member") | Some("member") => OrgStatus::Member,
                    _ => return Self::Ignored,
                };
                let login = str_at(payload, &["membership", "user", "login"])
                    .or_else(|| str_at(payload, &["user", "login"]));
                match login {
                    Some(login) => Self::MemberStatus {
                        installation_id,
                        login: login.to_string(),
                        status,
                    },
                    None => Self::Ignored,
                }
            }
            "member_invited" => {
                let login = str_at(payload, &["user", "login"])
                    .or_else(|| str_at(payload, &["invitation", "login"]));
                match login {
                    Some(login) => Self::MemberStatus {
                        installation_id,
                        login: login.to_string(),
                        status: OrgStatus::Invited,
                    },
                    None => Self::Ignored,
                }
            }
            "deleted" if payload.get("repository").is_none() => {
                Self::InstallationDeleted { installation_id }
            }
            _ => Self::Ignored,
        }
    }
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

// Installation ids arrive as numbers; stored refs are text.
fn installation_id(payload: &Value) -> Option<String> {
    match payload.get("installation")?.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
