use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::db::repository::{CourseRepository, RosterRepository};
use crate::error::{Result, RollcallError};
use crate::models::roster::{OrgStatus, RosterKind};
use crate::org::{OrgClient, OrgRole};

use super::{JobLogger, UnitOfWork};

pub const KIND: &str = "org_audit";

/// Brings MEMBER/OWNER statuses in line with the organization's member list.
pub struct OrgAuditJob<R> {
    repo: Arc<R>,
    client: Arc<dyn OrgClient>,
    course_id: String,
}

impl<R> OrgAuditJob<R> {
    pub fn new(repo: Arc<R>, client: Arc<dyn OrgClient>, course_id: &str) -> Self {
        Self {
            repo,
            client,
            course_id: course_id.to_string(),
        }
    }
}

#[async_trait]
impl<R> UnitOfWork for OrgAuditJob<R>
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
        let org = course
            .external_org_ref
            .as_deref()
            .ok_or_else(|| RollcallError::NotSetUp(course.id.clone()))?;

        let members = self.client.list_members(org).await?;
        log.append(&format!("{} members in {org}", members.len()))
            .await?;
        let roles: HashMap<String, OrgRole> = members
            .into_iter()
            .map(|m| (m.login.to_lowercase(), m.role))
            .collect();

        let mut changed = 0usize;
        for kind in [RosterKind::Student, RosterKind::Staff] {
            for record in self.repo.list_records(&course.id, kind).await? {
                let Some(login) = record.github_login.as_deref() else {
                    continue;
                };
                let target = match roles.get(&login.to_lowercase()) {
                    Some(OrgRole::Admin) => OrgStatus::Owner,
                    Some(OrgRole::Member) => OrgStatus::Member,
                    None => continue,
                };
                if record.org_status != target {
                    self.repo.update_org_status(&record.id, target).await?;
                    log.append(&format!("{login}: {:?} -> {target:?}", record.org_status))
                        .await?;
                    changed += 1;
                }
            }
        }

        log.append(&format!("audit complete, {changed} records updated"))
            .await
    }
}
