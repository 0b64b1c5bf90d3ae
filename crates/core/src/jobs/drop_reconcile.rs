use std::sync::Arc;

use async_trait::async_trait;

use crate::db::repository::{CourseRepository, RosterRepository};
use crate::error::{Result, RollcallError};
use crate::models::roster::{LifecycleStatus, OrgStatus};
use crate::org::OrgClient;

use super::{JobLogger, UnitOfWork};

pub const KIND: &str = "drop_reconcile";

/// Removes newly dropped roster members from the course organization.
pub struct DropReconcileJob<R> {
    repo: Arc<R>,
    client: Arc<dyn OrgClient>,
    course_id: String,
    record_ids: Vec<String>,
}

impl<R> DropReconcileJob<R> {
    pub fn new(
        repo: Arc<R>,
        client: Arc<dyn OrgClient>,
        course_id: &str,
        record_ids: Vec<String>,
    ) -> Self {
        Self {
            repo,
            client,
            course_id: course_id.to_string(),
            record_ids,
        }
    }
}

#[async_trait]
impl<R> UnitOfWork for DropReconcileJob<R>
where
    R: CourseRepository + RosterRepository + 'static,
{
    fn kind(&self) -> &str {
        KIND
    }

    async fn run(&self, log: &JobLogger) -> Result<()> {
        let course = self
            .repo
            .get_course(&self.course_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("course {}", self.course_id)))?;

        log.append(&format!(
            "reconciling {} dropped records in course {}",
            self.record_ids.len(),
            course.id
        ))
        .await?;

        let Some(org) = course.external_org_ref.as_deref() else {
            log.append("course has no organization, nothing to remove")
                .await?;
            return Ok(());
        };

        let mut removed = 0usize;
        let mut failures = 0usize;

        for id in &self.record_ids {
            let Some(record) = self.repo.get_record(id).await? else {
                continue;
            };
            // Re-imported since the job was queued.
            if record.lifecycle_status != LifecycleStatus::Dropped {
                continue;
            }
            let Some(login) = record.github_login.as_deref() else {
                continue;
            };
            if !matches!(
                record.org_status,
                OrgStatus::Invited | OrgStatus::Member | OrgStatus::Owner
            ) {
                continue;
            }

            match self.client.remove_member(org, login).await {
                Ok(()) => {
                    self.repo.update_org_status(&record.id, OrgStatus::None).await?;
                    log.append(&format!("removed {login} from {org}")).await?;
                    removed += 1;
                }
                Err(e) => {
                    log.append(&format!("failed to remove {login}: {e}"))
                        .await?;
                    failures += 1;
                }
            }
        }

        log.append(&format!("{removed} removed, {failures} failed"))
            .await?;
        if failures > 0 {
            return Err(RollcallError::Job(format!(
                "{failures} member removals failed"
            )));
        }
        Ok(())
    }
}
