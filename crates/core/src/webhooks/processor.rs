use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::db::repository::{CourseRepository, RosterRepository};
use crate::error::Result;
use crate::membership::can_transition;
use crate::models::roster::{IdentityRecord, OrgStatus, RosterKind};

use super::crypto::verify_signature;
use super::event::WebhookEvent;

/// Answer sent back to the webhook provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookReply {
    Ok(String),
    /// Missing or mismatched signature.
    Unauthorized,
    /// Body was not JSON.
    BadRequest,
}

impl WebhookReply {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Ok(_) => 200,
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Ok(text) => text,
            Self::Unauthorized => "Unauthorized: Invalid signature",
            Self::BadRequest => "Invalid JSON",
        }
    }

    fn success() -> Self {
        Self::Ok("success".to_string())
    }
}

/// Applies signed organization events to course records.
pub struct WebhookProcessor<R> {
    repo: Arc<R>,
    secret: String,
}

impl<R> WebhookProcessor<R>
where
    R: CourseRepository + RosterRepository,
{
    pub fn new(repo: Arc<R>, secret: impl Into<String>) -> Self {
        Self {
            repo,
            secret: secret.into(),
        }
    }

    /// Verify, parse and apply one delivery. Errors are storage failures only.
    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookReply> {
        if !verify_signature(&self.secret, body, signature) {
            warn!("webhook rejected: invalid signature");
            return Ok(WebhookReply::Unauthorized);
        }

        let payload: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "webhook rejected: invalid JSON");
                return Ok(WebhookReply::BadRequest);
            }
        };

        match WebhookEvent::parse(&payload) {
            WebhookEvent::MemberStatus {
                installation_id,
                login,
                status,
            } => self.apply_member_status(&installation_id, &login, status).await,
            WebhookEvent::InstallationDeleted { installation_id } => {
                self.remove_installation(&installation_id).await
            }
            WebhookEvent::Ignored => {
                debug!("webhook ignored");
                Ok(WebhookReply::success())
            }
        }
    }

    async fn apply_member_status(
        &self,
        installation_id: &str,
        login: &str,
        status: OrgStatus,
    ) -> Result<WebhookReply> {
        let courses = self.repo.list_courses_by_installation(installation_id).await?;
        let mut changed = 0;

        for course in &courses {
            let Some(record) = self.find_member(&course.id, login).await? else {
                continue;
            };
            if record.org_status == status {
                debug!(record_id = %record.id, "webhook status already applied");
                continue;
            }
            if !can_transition(record.org_status, status) {
                warn!(
                    record_id = %record.id,
                    from = ?record.org_status,
                    to = ?status,
                    "applying unusual membership transition from webhook"
                );
            }
            self.repo.update_org_status(&record.id, status).await?;
            info!(
                course_id = %course.id,
                record_id = %record.id,
                login,
                status = ?status,
                "membership updated from webhook"
            );
            changed += 1;
        }

        if changed > 0 {
            Ok(WebhookReply::Ok("member updated".to_string()))
        } else {
            Ok(WebhookReply::success())
        }
    }

    // Students are searched before staff.
    async fn find_member(&self, course_id: &str, login: &str) -> Result<Option<IdentityRecord>> {
        for kind in [RosterKind::Student, RosterKind::Staff] {
            if let Some(record) = self
                .repo
                .find_by_github_login(course_id, kind, login)
                .await?
            {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn remove_installation(&self, installation_id: &str) -> Result<WebhookReply> {
        let courses = self.repo.list_courses_by_installation(installation_id).await?;
        if courses.is_empty() {
            return Ok(WebhookReply::success());
        }
        for course in &courses {
            self.repo.clear_org_link(&course.id).await?;
            info!(course_id = %course.id, installation_id, "installation removed from course");
        }
        Ok(WebhookReply::Ok("installation removed".to_string()))
    }
}
