use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::connectors::RosterSource;
use crate::db::repository::RollcallRepository;
use crate::error::{Result, RollcallError};
use crate::jobs::{DropReconcileJob, JobEngine, OrgAuditJob};
use crate::models::job::Job;
use crate::models::roster::{IdentityRecord, LifecycleStatus, RosterKind, RosterRow};
use crate::org::OrgClient;
use crate::reconcile::{Reconciler, RejectedRow};

/// Counts of an applied import and the follow-up job, if one was launched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub dropped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
}

#[derive(Debug, Clone)]
pub enum ImportOutcome {
    /// At least one row conflicted; nothing was written.
    Rejected(Vec<RejectedRow>),
    Applied(ImportSummary),
}

/// Result of entering a single record by hand.
#[derive(Debug, Clone)]
pub enum ManualEntry {
    Saved(IdentityRecord),
    Rejected(RejectedRow),
}

/// Runs bulk roster imports end to end.
pub struct SyncOrchestrator<R> {
    repo: Arc<R>,
    client: Arc<dyn OrgClient>,
    jobs: JobEngine<R>,
}

impl<R> SyncOrchestrator<R>
where
    R: RollcallRepository + 'static,
{
    pub fn new(repo: Arc<R>, client: Arc<dyn OrgClient>) -> Self {
        let jobs = JobEngine::new(repo.clone());
        Self { repo, client, jobs }
    }

    pub fn jobs(&self) -> &JobEngine<R> {
        &self.jobs
    }

    /// Pull rows from `source` and import them.
    pub async fn import_from(
        &self,
        course_id: &str,
        kind: RosterKind,
        source: &dyn RosterSource,
        created_by: &str,
    ) -> Result<ImportOutcome> {
        let rows = source.fetch_rows().await?;
        info!(
            course_id,
            source = source.source_name(),
            rows = rows.len(),
            "Fetched roster rows"
        );
        self.import_rows(course_id, kind, &rows, created_by).await
    }

    /// Reconcile `rows` as the complete current roster of `(course_id, kind)`.
    ///
    /// Active records missing from `rows` are dropped; manual records are kept.
    pub async fn import_rows(
        &self,
        course_id: &str,
        kind: RosterKind,
        rows: &[RosterRow],
        created_by: &str,
    ) -> Result<ImportOutcome> {
        let course = self
            .repo
            .get_course(course_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("course {course_id}")))?;

        let mut snapshot = self.repo.list_records(course_id, kind).await?;
        let mut previously_active = HashSet::new();
        for record in &mut snapshot {
            if record.lifecycle_status == LifecycleStatus::Active {
                previously_active.insert(record.id.clone());
                record.lifecycle_status = LifecycleStatus::Dropped;
            }
        }

        let result =
            Reconciler::reconcile(&course, kind, &snapshot, rows, LifecycleStatus::Active);
        if !result.is_clean() {
            warn!(
                course_id,
                kind = ?kind,
                rejected = result.rejected.len(),
                "Import rejected, nothing persisted"
            );
            return Ok(ImportOutcome::Rejected(result.rejected));
        }

        let touched: HashSet<&str> = result.touched().map(|r| r.id.as_str()).collect();
        let now = Utc::now();
        let dropped: Vec<_> = snapshot
            .into_iter()
            .filter(|r| previously_active.contains(&r.id) && !touched.contains(r.id.as_str()))
            .map(|mut r| {
                r.updated_at = now;
                r
            })
            .collect();

        let mut batch = Vec::with_capacity(result.inserted.len() + result.updated.len() + dropped.len());
        batch.extend(result.inserted.iter().cloned());
        batch.extend(result.updated.iter().cloned());
        batch.extend(dropped.iter().cloned());
        self.repo.apply_roster_batch(&batch).await?;

        info!(
            course_id,
            kind = ?kind,
            inserted = result.inserted.len(),
            updated = result.updated.len(),
            dropped = dropped.len(),
            "Roster import applied"
        );

        let job = if dropped.is_empty() {
            None
        } else {
            let ids = dropped.iter().map(|r| r.id.clone()).collect();
            let work = DropReconcileJob::new(self.repo.clone(), self.client.clone(), course_id, ids);
            Some(self.jobs.run_as_job(Box::new(work), created_by).await?)
        };

        Ok(ImportOutcome::Applied(ImportSummary {
            inserted: result.inserted.len(),
            updated: result.updated.len(),
            dropped: dropped.len(),
            job,
        }))
    }

    /// Add or claim one record as MANUAL, so later imports never drop it.
    ///
    /// The row goes through the same matching as an import: it either creates a
    /// record or updates the one its keys identify.
    pub async fn add_manual_record(
        &self,
        course_id: &str,
        kind: RosterKind,
        row: &RosterRow,
    ) -> Result<ManualEntry> {
        let course = self
            .repo
            .get_course(course_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("course {course_id}")))?;
        let snapshot = self.repo.list_records(course_id, kind).await?;

        let mut result = Reconciler::reconcile(
            &course,
            kind,
            &snapshot,
            std::slice::from_ref(row),
            LifecycleStatus::Manual,
        );
        if let Some(rejected) = result.rejected.pop() {
            return Ok(ManualEntry::Rejected(rejected));
        }
        let Some(record) = result.inserted.pop().or_else(|| result.updated.pop()) else {
            return Err(RollcallError::Import("manual entry produced no record".into()));
        };

        self.repo.apply_roster_batch(std::slice::from_ref(&record)).await?;
        info!(course_id, record_id = %record.id, "Manual record saved");
        Ok(ManualEntry::Saved(record))
    }

    /// Launch an organization audit for a linked course.
    pub async fn audit_course(&self, course_id: &str, created_by: &str) -> Result<Job> {
        let course = self
            .repo
            .get_course(course_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("course {course_id}")))?;
        if !course.is_linked() || course.external_org_ref.is_none() {
            return Err(RollcallError::NotSetUp(course.id));
        }
        let work = OrgAuditJob::new(self.repo.clone(), self.client.clone(), course_id);
        self.jobs.run_as_job(Box::new(work), created_by).await
    }
}
