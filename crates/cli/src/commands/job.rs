use std::time::Duration;

use rollcall_core::jobs::JobEngine;
use rollcall_core::models::job::Job;
use rollcall_core::sync::SyncOrchestrator;

use super::{load_config, open_repository, org_client};

const WAIT_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Run the `audit` command. Waits for the job, since it lives on this process's runtime.
pub async fn audit(config_path: &str, course_id: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config).await?;
    let orchestrator = SyncOrchestrator::new(repo, org_client(&config));

    let job = orchestrator.audit_course(course_id, "cli").await?;
    println!("Started audit job {}", job.id);
    let finished = orchestrator
        .jobs()
        .wait_for_completion(job.id, POLL_INTERVAL, WAIT_TIMEOUT)
        .await?;
    print_job(&finished);
    Ok(())
}

/// Run the `job` command.
pub async fn show(config_path: &str, id: i64, wait: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = JobEngine::new(open_repository(&config).await?);

    let job = if wait {
        engine
            .wait_for_completion(id, POLL_INTERVAL, WAIT_TIMEOUT)
            .await?
    } else {
        engine
            .get_job(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job {id} not found"))?
    };
    print_job(&job);
    Ok(())
}

fn print_job(job: &Job) {
    println!("{}", header(job));
    println!("Started:  {}", job.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(completed) = job.completed_at {
        println!("Finished: {}", completed.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    for line in job.log_lines() {
        println!("  {}", line);
    }
}

fn header(job: &Job) -> String {
    format!(
        "Job {} [{}] {:?} (by {})",
        job.id, job.kind, job.status, job.created_by
    )
}
