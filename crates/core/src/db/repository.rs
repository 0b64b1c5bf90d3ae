use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    course::Course,
    job::{Job, JobStatus},
    roster::{IdentityRecord, OrgStatus, RosterKind},
};

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn upsert_course(&self, course: &Course) -> Result<()>;
    async fn get_course(&self, id: &str) -> Result<Option<Course>>;
    async fn list_courses(&self) -> Result<Vec<Course>>;
    async fn list_courses_by_installation(&self, installation_ref: &str) -> Result<Vec<Course>>;
    /// Deletes the course and, by cascade, its roster.
    async fn delete_course(&self, id: &str) -> Result<bool>;
    async fn set_org_link(
        &self,
        id: &str,
        external_org_ref: &str,
        installation_ref: &str,
    ) -> Result<bool>;
    /// Clears `installation_ref` and `external_org_ref`. Member records are untouched.
    async fn clear_org_link(&self, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait RosterRepository: Send + Sync {
    async fn upsert_record(&self, record: &IdentityRecord) -> Result<()>;
    async fn get_record(&self, id: &str) -> Result<Option<IdentityRecord>>;
    async fn list_records(&self, course_id: &str, kind: RosterKind)
        -> Result<Vec<IdentityRecord>>;
    async fn find_by_external_id(
        &self,
        course_id: &str,
        kind: RosterKind,
        external_id: &str,
    ) -> Result<Option<IdentityRecord>>;
    async fn find_by_email(
        &self,
        course_id: &str,
        kind: RosterKind,
        email: &str,
    ) -> Result<Option<IdentityRecord>>;
    /// Case-insensitive match on the linked account login.
    async fn find_by_github_login(
        &self,
        course_id: &str,
        kind: RosterKind,
        login: &str,
    ) -> Result<Option<IdentityRecord>>;
    async fn update_org_status(&self, id: &str, status: OrgStatus) -> Result<bool>;
    /// Store the resolved account and, when given, a new org status.
    ///
    /// The status is left alone if the stored one is MEMBER or OWNER.
    async fn record_github_account(
        &self,
        id: &str,
        github_id: i64,
        github_login: &str,
        status: Option<OrgStatus>,
    ) -> Result<bool>;
    /// Write a reconciled batch in one transaction.
    ///
    /// Stored INVITED/MEMBER/OWNER/EXPIRED statuses and linked accounts win
    /// over the batch's values.
    async fn apply_roster_batch(&self, records: &[IdentityRecord]) -> Result<()>;
    async fn delete_record(&self, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create_job(&self, kind: &str, created_by: &str) -> Result<Job>;
    async fn get_job(&self, id: i64) -> Result<Option<Job>>;
    async fn list_jobs(&self, limit: i64) -> Result<Vec<Job>>;
    /// Appends one line to a running job. Returns false if the job is terminal or missing.
    async fn append_job_log(&self, id: i64, line: &str) -> Result<bool>;
    /// Moves a running job to a terminal status. Returns false if it was not running.
    async fn finish_job(&self, id: i64, status: JobStatus) -> Result<bool>;
    async fn delete_job(&self, id: i64) -> Result<bool>;
}

/// Combined repository trait for all entity types.
pub trait RollcallRepository: CourseRepository + RosterRepository + JobRepository {}
