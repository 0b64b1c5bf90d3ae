//! Asynchronous jobs with a persisted status and line log.
//!
//! A job is created RUNNING, handed to a tokio task together with a
//! [`JobLogger`], and finished exactly once as COMPLETE or ERROR. Callers get
//! the RUNNING snapshot back immediately and poll the repository afterwards.

pub mod drop_reconcile;
pub mod org_audit;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::db::repository::JobRepository;
use crate::error::{Result, RollcallError};
use crate::models::job::{Job, JobStatus};

pub use drop_reconcile::DropReconcileJob;
pub use org_audit::OrgAuditJob;

/// A unit of long-running work executed inside a job.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Short machine name stored as the job kind.
    fn kind(&self) -> &str;
    async fn run(&self, log: &JobLogger) -> Result<()>;
}

/// Appends lines to one job's log. Every line is persisted immediately.
#[derive(Clone)]
pub struct JobLogger {
    job_id: i64,
    repo: Arc<dyn JobRepository>,
}

impl JobLogger {
    pub fn new(job_id: i64, repo: Arc<dyn JobRepository>) -> Self {
        Self { job_id, repo }
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    pub async fn append(&self, line: &str) -> Result<()> {
        info!(job_id = self.job_id, "{line}");
        if !self.repo.append_job_log(self.job_id, line).await? {
            warn!(job_id = self.job_id, "log line dropped, job is no longer running");
        }
        Ok(())
    }
}

/// Launches units of work and answers status queries about them.
pub struct JobEngine<R> {
    repo: Arc<R>,
}

impl<R> Clone for JobEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R> JobEngine<R>
where
    R: JobRepository + 'static,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Persist a RUNNING job, start `work` in the background and return at once.
    pub async fn run_as_job(&self, work: Box<dyn UnitOfWork>, created_by: &str) -> Result<Job> {
        let job = self.repo.create_job(work.kind(), created_by).await?;
        let job_id = job.id;
        let repo: Arc<dyn JobRepository> = self.repo.clone();
        let logger = JobLogger::new(job_id, repo.clone());
        info!(job_id, kind = %job.kind, created_by, "job started");

        tokio::spawn(async move {
            let worker_logger = logger.clone();
            let outcome = tokio::spawn(async move { work.run(&worker_logger).await }).await;

            let status = match outcome {
                Ok(Ok(())) => JobStatus::Complete,
                Ok(Err(e)) => {
                    record_failure(&logger, &format!("ERROR: {e}")).await;
                    JobStatus::Error
                }
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        panic_message(join_err.into_panic())
                    } else {
                        "worker cancelled".to_string()
                    };
                    record_failure(&logger, &format!("ERROR: job panicked: {reason}")).await;
                    JobStatus::Error
                }
            };

            match repo.finish_job(job_id, status).await {
                Ok(true) => info!(job_id, status = ?status, "job finished"),
                Ok(false) => warn!(job_id, "job was no longer running at finish"),
                Err(e) => error!(job_id, error = %e, "failed to record job status"),
            }
        });

        Ok(job)
    }

    pub async fn get_job(&self, id: i64) -> Result<Option<Job>> {
        self.repo.get_job(id).await
    }

    pub async fn list_jobs(&self, limit: i64) -> Result<Vec<Job>> {
        self.repo.list_jobs(limit).await
    }

    pub async fn delete_job(&self, id: i64) -> Result<bool> {
        self.repo.delete_job(id).await
    }

    /// Poll until the job is terminal or `timeout` elapses.
    pub async fn wait_for_completion(
        &self,
        id: i64,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Job> {
        let deadline = Instant::now() + timeout;
        loop {
            let job = self
                .repo
                .get_job(id)
                .await?
                .ok_or_else(|| RollcallError::NotFound(format!("job {id}")))?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            if Instant::now() >= deadline {
                return Err(RollcallError::Job(format!(
                    "timed out waiting for job {id}"
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }
}

async fn record_failure(logger: &JobLogger, line: &str) {
    error!(job_id = logger.job_id(), "{line}");
    if let Err(e) = logger.append(line).await {
        error!(job_id = logger.job_id(), error = %e, "failed to append job error");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteRepository;
    use crate::db::DatabasePool;
    use tokio::sync::Notify;

    async fn engine() -> JobEngine<SqliteRepository> {
        let repo = DatabasePool::new_sqlite_memory()
            .await
            .unwrap()
            .into_repository();
        JobEngine::new(Arc::new(repo))
    }

    async fn wait(engine: &JobEngine<SqliteRepository>, id: i64) -> Job {
        engine
            .wait_for_completion(id, Duration::from_millis(10), Duration::from_secs(5))
            .await
            .unwrap()
    }

    struct Steps {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl UnitOfWork for Steps {
        fn kind(&self) -> &str {
            "steps"
        }

        async fn run(&self, log: &JobLogger) -> Result<()> {
            log.append("step 1").await?;
            self.gate.notified().await;
            log.append("step 2").await?;
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl UnitOfWork for Failing {
        fn kind(&self) -> &str {
            "failing"
        }

        async fn run(&self, log: &JobLogger) -> Result<()> {
            log.append("starting").await?;
            Err(RollcallError::Org("remote said no".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl UnitOfWork for Panicking {
        fn kind(&self) -> &str {
            "panicking"
        }

        async fn run(&self, _log: &JobLogger) -> Result<()> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn job_is_running_first_then_complete_with_ordered_log() {
        let engine = engine().await;
        let gate = Arc::new(Notify::new());
        let job = engine
            .run_as_job(Box::new(Steps { gate: gate.clone() }), "tester")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.kind, "steps");
        assert_eq!(job.created_by, "tester");
        let polled = engine.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(polled.status, JobStatus::Running);

        gate.notify_one();
        let done = wait(&engine, job.id).await;
        assert_eq!(done.status, JobStatus::Complete);
        assert_eq!(done.log_lines(), vec!["step 1", "step 2"]);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn failing_work_ends_in_error_with_message() {
        let engine = engine().await;
        let job = engine.run_as_job(Box::new(Failing), "tester").await.unwrap();

        let done = wait(&engine, job.id).await;
        assert_eq!(done.status, JobStatus::Error);
        let lines = done.log_lines();
        assert_eq!(lines[0], "starting");
        assert!(lines[1].starts_with("ERROR:"));
        assert!(lines[1].contains("remote said no"));
    }

    #[tokio::test]
    async fn panic_is_recorded_as_error() {
        let engine = engine().await;
        let job = engine
            .run_as_job(Box::new(Panicking), "tester")
            .await
            .unwrap();

        let done = wait(&engine, job.id).await;
        assert_eq!(done.status, JobStatus::Error);
        assert!(done.log.contains("boom"));
    }

    #[tokio::test]
    async fn terminal_job_ignores_late_log_lines() {
        let engine = engine().await;
        let job = engine.run_as_job(Box::new(Failing), "tester").await.unwrap();
        let done = wait(&engine, job.id).await;

        let logger = JobLogger::new(job.id, engine.repo.clone());
        logger.append("too late").await.unwrap();
        let after = engine.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(after.log, done.log);
        assert_eq!(after.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn wait_for_missing_job_is_not_found() {
        let engine = engine().await;
        let err = engine
            .wait_for_completion(42, Duration::from_millis(5), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, RollcallError::NotFound(_)));
    }

    #[tokio::test]
    async fn wait_times_out_on_running_job() {
        let engine = engine().await;
        let gate = Arc::new(Notify::new());
        let job = engine
            .run_as_job(Box::new(Steps { gate: gate.clone() }), "tester")
            .await
            .unwrap();

        let err = engine
            .wait_for_completion(job.id, Duration::from_millis(5), Duration::from_millis(40))
            .await
            .unwrap_err();
        assert!(matches!(err, RollcallError::Job(_)));
        gate.notify_one();
    }

    #[tokio::test]
    async fn list_and_delete_jobs() {
        let engine = engine().await;
        let a = engine.run_as_job(Box::new(Failing), "a").await.unwrap();
        let b = engine.run_as_job(Box::new(Failing), "b").await.unwrap();
        wait(&engine, a.id).await;
        wait(&engine, b.id).await;

        assert_eq!(engine.list_jobs(10).await.unwrap().len(), 2);
        assert!(engine.delete_job(a.id).await.unwrap());
        assert!(!engine.delete_job(a.id).await.unwrap());
        let remaining = engine.list_jobs(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);
    }
}
