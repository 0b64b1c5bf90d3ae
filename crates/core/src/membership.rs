//! Organization membership state machine and the explicit invite/unlink operations.
//!
//! `OrgStatus` moves NONE → PENDING/JOINCOURSE → INVITED → MEMBER/OWNER, and from
//! there either to EXPIRED or back to NONE when a member is removed. Webhook
//! events apply their target status directly (last write wins); the table in
//! [`can_transition`] is what application code is allowed to do on its own.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::repository::{CourseRepository, RosterRepository};
use crate::error::{Result, RollcallError};
use crate::models::course::Course;
use crate::models::roster::{IdentityRecord, OrgStatus};
use crate::org::OrgClient;

/// Status given to a record the first time it is reconciled into a course.
pub fn initial_status(course: &Course) -> OrgStatus {
    if course.is_linked() {
        OrgStatus::SelfJoinEligible
    } else {
        OrgStatus::Pending
    }
}

/// Status of an existing record after it is matched by an import.
///
/// Only the pre-invitation states follow the course's installation; anything
/// from INVITED onwards is kept.
pub fn refresh_status(current: OrgStatus, course: &Course) -> OrgStatus {
    match current {
        OrgStatus::None | OrgStatus::Pending | OrgStatus::SelfJoinEligible => {
            initial_status(course)
        }
        other => other,
    }
}

pub fn can_transition(from: OrgStatus, to: OrgStatus) -> bool {
    use OrgStatus::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (None, Pending | SelfJoinEligible)
            | (Pending, SelfJoinEligible)
            | (SelfJoinEligible, Pending)
            | (Pending | SelfJoinEligible, Invited)
            | (Pending | SelfJoinEligible, Member | Owner)
            | (Invited, Member | Owner | Expired)
            | (Member, Owner)
            | (Owner, Member)
            | (Expired, Invited)
            | (Invited | Member | Owner | Expired, None)
    )
}

/// Result of an invitation request that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum InviteOutcome {
    Invited(IdentityRecord),
    /// Already a member or owner; nothing was changed.
    AlreadyLinked(IdentityRecord),
}

/// Explicit, application-triggered membership operations.
pub struct MembershipService<R> {
    repo: Arc<R>,
    client: Arc<dyn OrgClient>,
}

impl<R> MembershipService<R>
where
    R: CourseRepository + RosterRepository,
{
    pub fn new(repo: Arc<R>, client: Arc<dyn OrgClient>) -> Self {
        Self { repo, client }
    }

    /// Invite the owner of `github_login` into the record's course organization.
    pub async fn invite(&self, record_id: &str, github_login: &str) -> Result<InviteOutcome> {
        let record = self
            .repo
            .get_record(record_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("record {record_id}")))?;
        let course = self
            .repo
            .get_course(&record.course_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("course {}", record.course_id)))?;

        let org = match (&course.installation_ref, &course.external_org_ref) {
            (Some(_), Some(org)) => org.clone(),
            _ => return Err(RollcallError::NotSetUp(course.id.clone())),
        };

        if record.org_status.is_linked() {
            info!(record_id, "invite skipped, record already linked");
            return Ok(InviteOutcome::AlreadyLinked(record));
        }

        let user = self
            .client
            .lookup_user(github_login)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("GitHub user {github_login}")))?;

        if let Err(e) = self.client.invite_member(&org, user.id).await {
            warn!(record_id, org = %org, error = %e, "organization invite failed");
            self.repo
                .record_github_account(record_id, user.id, &user.login, None)
                .await?;
            return Err(RollcallError::InviteFailed(e.to_string()));
        }

        // Touches only the account and status columns.
        self.repo
            .record_github_account(record_id, user.id, &user.login, Some(OrgStatus::Invited))
            .await?;
        let record = self
            .repo
            .get_record(record_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("record {record_id}")))?;
        info!(record_id, org = %org, login = %user.login, status = ?record.org_status, "member invited");
        if record.org_status.is_linked() {
            return Ok(InviteOutcome::AlreadyLinked(record));
        }
        Ok(InviteOutcome::Invited(record))
    }

    /// Detach a course from its organization. Member records keep their status.
    pub async fn unlink(&self, course_id: &str) -> Result<Course> {
        if !self.repo.clear_org_link(course_id).await? {
            return Err(RollcallError::NotFound(format!("course {course_id}")));
        }
        info!(course_id, "course unlinked from organization");
        self.repo
            .get_course(course_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("course {course_id}")))
    }
}
