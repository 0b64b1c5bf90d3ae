use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::{
    course::Course,
    job::{Job, JobStatus},
    roster::{IdentityRecord, LifecycleStatus, OrgStatus, RosterKind},
};

use super::repository::{CourseRepository, JobRepository, RollcallRepository, RosterRepository};

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RollcallRepository for SqliteRepository {}

// -- Helper functions for parsing enums from DB strings --

fn parse_roster_kind(s: &str) -> RosterKind {
    match s {
        "staff" => RosterKind::Staff,
        _ => RosterKind::Student,
    }
}

fn roster_kind_to_str(k: RosterKind) -> &'static str {
    match k {
        RosterKind::Student => "student",
        RosterKind::Staff => "staff",
    }
}

fn parse_lifecycle_status(s: &str) -> LifecycleStatus {
    match s {
        "manual" => LifecycleStatus::Manual,
        "dropped" => LifecycleStatus::Dropped,
        _ => LifecycleStatus::Active,
    }
}

fn lifecycle_status_to_str(s: LifecycleStatus) -> &'static str {
    match s {
        LifecycleStatus::Manual => "manual",
        LifecycleStatus::Active => "active",
        LifecycleStatus::Dropped => "dropped",
    }
}

fn parse_org_status(s: &str) -> OrgStatus {
    match s {
        "pending" => OrgStatus::Pending,
        "joincourse" => OrgStatus::SelfJoinEligible,
        "invited" => OrgStatus::Invited,
        "member" => OrgStatus::Member,
        "owner" => OrgStatus::Owner,
        "expired" => OrgStatus::Expired,
        _ => OrgStatus::None,
    }
}

fn org_status_to_str(s: OrgStatus) -> &'static str {
    match s {
        OrgStatus::None => "none",
        OrgStatus::Pending => "pending",
        OrgStatus::SelfJoinEligible => "joincourse",
        OrgStatus::Invited => "invited",
        OrgStatus::Member => "member",
        OrgStatus::Owner => "owner",
        OrgStatus::Expired => "expired",
    }
}

fn parse_job_status(s: &str) -> JobStatus {
    match s {
        "complete" => JobStatus::Complete,
        "error" => JobStatus::Error,
        _ => JobStatus::Running,
    }
}

fn job_status_to_str(s: JobStatus) -> &'static str {
    match s {
        JobStatus::Running => "running",
        JobStatus::Complete => "complete",
        JobStatus::Error => "error",
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn datetime_to_str(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_course(r: &SqliteRow) -> Course {
    Course {
        id: r.get("id"),
        name: r.get("name"),
        external_org_ref: r.get("external_org_ref"),
        installation_ref: r.get("installation_ref"),
        gradebook_course_id: r.get("gradebook_course_id"),
        created_at: parse_datetime(r.get("created_at")),
        updated_at: parse_datetime(r.get("updated_at")),
    }
}

fn row_to_record(r: &SqliteRow) -> IdentityRecord {
    IdentityRecord {
        id: r.get("id"),
        course_id: r.get("course_id"),
        kind: parse_roster_kind(r.get("kind")),
        external_id: r.get("external_id"),
        email: r.get("email"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        github_id: r.get::<Option<i64>, _>("github_id"),
        github_login: r.get("github_login"),
        lifecycle_status: parse_lifecycle_status(r.get("lifecycle_status")),
        org_status: parse_org_status(r.get("org_status")),
        created_at: parse_datetime(r.get("created_at")),
        updated_at: parse_datetime(r.get("updated_at")),
    }
}

fn row_to_job(r: &SqliteRow) -> Job {
    Job {
        id: r.get::<i64, _>("id"),
        kind: r.get("kind"),
        status: parse_job_status(r.get("status")),
        log: r.get("log"),
        created_by: r.get("created_by"),
        created_at: parse_datetime(r.get("created_at")),
        updated_at: parse_datetime(r.get("updated_at")),
        completed_at: r
            .get::<Option<String>, _>("completed_at")
            .map(|s| parse_datetime(&s)),
    }
}

const COURSE_COLUMNS: &str =
    "id, name, external_org_ref, installation_ref, gradebook_course_id, created_at, updated_at";

const RECORD_COLUMNS: &str = "id, course_id, kind, external_id, email, first_name, last_name, github_id, github_login, lifecycle_status, org_status, created_at, updated_at";

const JOB_COLUMNS: &str =
    "id, kind, status, log, created_by, created_at, updated_at, completed_at";

const UPSERT_RECORD_SQL: &str = "INSERT INTO roster_records (id, course_id, kind, external_id, email, first_name, last_name, github_id, github_login, lifecycle_status, org_status, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
     ON CONFLICT(id) DO UPDATE SET
        external_id = excluded.external_id,
        email = excluded.email,
        first_name = excluded.first_name,
        last_name = excluded.last_name,
        github_id = excluded.github_id,
        github_login = excluded.github_login,
        lifecycle_status = excluded.lifecycle_status,
        org_status = excluded.org_status,
        updated_at = excluded.updated_at";

/// Upsert used by roster batches. A concurrent webhook or invitation may have
/// advanced the stored status or linked an account since the snapshot was read.
const BATCH_UPSERT_RECORD_SQL: &str = "INSERT INTO roster_records (id, course_id, kind, external_id, email, first_name, last_name, github_id, github_login, lifecycle_status, org_status, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
     ON CONFLICT(id) DO UPDATE SET
        external_id = excluded.external_id,
        email = excluded.email,
        first_name = excluded.first_name,
        last_name = excluded.last_name,
        github_id = COALESCE(roster_records.github_id, excluded.github_id),
        github_login = COALESCE(roster_records.github_login, excluded.github_login),
        lifecycle_status = excluded.lifecycle_status,
        org_status = CASE
            WHEN roster_records.org_status IN ('invited', 'member', 'owner', 'expired')
            THEN roster_records.org_status
            ELSE excluded.org_status
        END,
        updated_at = excluded.updated_at";

fn bind_record<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    record: &'q IdentityRecord,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&record.id)
        .bind(&record.course_id)
        .bind(roster_kind_to_str(record.kind))
        .bind(&record.external_id)
        .bind(&record.email)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(record.github_id)
        .bind(&record.github_login)
        .bind(lifecycle_status_to_str(record.lifecycle_status))
        .bind(org_status_to_str(record.org_status))
        .bind(datetime_to_str(&record.created_at))
        .bind(datetime_to_str(&record.updated_at))
}

// -- CourseRepository --

#[async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<()> {
        sqlx::query(
            "INSERT INTO courses (id, name, external_org_ref, installation_ref, gradebook_course_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                external_org_ref = excluded.external_org_ref,
                installation_ref = excluded.installation_ref,
                gradebook_course_id = excluded.gradebook_course_id,
                updated_at = excluded.updated_at",
        )
        .bind(&course.id)
        .bind(&course.name)
        .bind(&course.external_org_ref)
        .bind(&course.installation_ref)
        .bind(&course.gradebook_course_id)
        .bind(datetime_to_str(&course.created_at))
        .bind(datetime_to_str(&course.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_course(&self, id: &str) -> Result<Option<Course>> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_course))
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_course).collect())
    }

    async fn list_courses_by_installation(&self, installation_ref: &str) -> Result<Vec<Course>> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE installation_ref = ?1 ORDER BY id"
        ))
        .bind(installation_ref)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_course).collect())
    }

    async fn delete_course(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_org_link(
        &self,
        id: &str,
        external_org_ref: &str,
        installation_ref: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE courses SET external_org_ref = ?1, installation_ref = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(external_org_ref)
        .bind(installation_ref)
        .bind(datetime_to_str(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_org_link(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE courses SET external_org_ref = NULL, installation_ref = NULL, updated_at = ?1 WHERE id = ?2",
        )
        .bind(datetime_to_str(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// -- RosterRepository --

#[async_trait]
impl RosterRepository for SqliteRepository {
    async fn upsert_record(&self, record: &IdentityRecord) -> Result<()> {
        bind_record(sqlx::query(UPSERT_RECORD_SQL), record)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_record(&self, id: &str) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM roster_records WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn list_records(
        &self,
        course_id: &str,
        kind: RosterKind,
    ) -> Result<Vec<IdentityRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM roster_records WHERE course_id = ?1 AND kind = ?2 ORDER BY last_name, first_name, id"
        ))
        .bind(course_id)
        .bind(roster_kind_to_str(kind))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn find_by_external_id(
        &self,
        course_id: &str,
        kind: RosterKind,
        external_id: &str,
    ) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM roster_records WHERE course_id = ?1 AND kind = ?2 AND external_id = ?3"
        ))
        .bind(course_id)
        .bind(roster_kind_to_str(kind))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn find_by_email(
        &self,
        course_id: &str,
        kind: RosterKind,
        email: &str,
    ) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM roster_records WHERE course_id = ?1 AND kind = ?2 AND email = ?3"
        ))
        .bind(course_id)
        .bind(roster_kind_to_str(kind))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn find_by_github_login(
        &self,
        course_id: &str,
        kind: RosterKind,
        login: &str,
    ) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM roster_records WHERE course_id = ?1 AND kind = ?2 AND github_login = ?3 COLLATE NOCASE LIMIT 1"
        ))
        .bind(course_id)
        .bind(roster_kind_to_str(kind))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn update_org_status(&self, id: &str, status: OrgStatus) -> Result<bool> {
        let result =
            sqlx::query("UPDATE roster_records SET org_status = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(org_status_to_str(status))
                .bind(datetime_to_str(&Utc::now()))
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_github_account(
        &self,
        id: &str,
        github_id: i64,
        github_login: &str,
        status: Option<OrgStatus>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE roster_records SET
                github_id = ?1,
                github_login = ?2,
                org_status = CASE
                    WHEN ?3 IS NULL OR org_status IN ('member', 'owner') THEN org_status
                    ELSE ?3
                END,
                updated_at = ?4
             WHERE id = ?5",
        )
        .bind(github_id)
        .bind(github_login)
        .bind(status.map(org_status_to_str))
        .bind(datetime_to_str(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_roster_batch(&self, records: &[IdentityRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Release the keys of every touched record first so that re-keyed
        // records never collide with their own previous values mid-batch.
        for record in records {
            sqlx::query("UPDATE roster_records SET external_id = NULL, email = NULL WHERE id = ?1")
                .bind(&record.id)
                .execute(&mut *tx)
                .await?;
        }

        for record in records {
            bind_record(sqlx::query(BATCH_UPSERT_RECORD_SQL), record)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_record(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roster_records WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// -- JobRepository --

#[async_trait]
impl JobRepository for SqliteRepository {
    async fn create_job(&self, kind: &str, created_by: &str) -> Result<Job> {
        let now = datetime_to_str(&Utc::now());
        let result = sqlx::query(
            "INSERT INTO jobs (kind, status, log, created_by, created_at, updated_at)
             VALUES (?1, ?2, '', ?3, ?4, ?4)",
        )
        .bind(kind)
        .bind(job_status_to_str(JobStatus::Running))
        .bind(created_by)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        Ok(Job {
            id,
            kind: kind.to_string(),
            status: JobStatus::Running,
            log: String::new(),
            created_by: created_by.to_string(),
            created_at: parse_datetime(&now),
            updated_at: parse_datetime(&now),
            completed_at: None,
        })
    }

    async fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_job))
    }

    async fn list_jobs(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_job).collect())
    }

    async fn append_job_log(&self, id: i64, line: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET log = log || ?1, updated_at = ?2 WHERE id = ?3 AND status = 'running'",
        )
        .bind(format!("{line}\n"))
        .bind(datetime_to_str(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn finish_job(&self, id: i64, status: JobStatus) -> Result<bool> {
        let now = datetime_to_str(&Utc::now());
        let result = sqlx::query(
            "UPDATE jobs SET status = ?1, updated_at = ?2, completed_at = ?2 WHERE id = ?3 AND status = 'running'",
        )
        .bind(job_status_to_str(status))
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_job(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
