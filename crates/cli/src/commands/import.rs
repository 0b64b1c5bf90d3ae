use std::path::Path;
use std::time::{Duration, Instant};

use rollcall_core::connectors::CsvRosterSource;
use rollcall_core::models::roster::RosterKind;
use rollcall_core::reconcile::RejectionReason;
use rollcall_core::sync::{ImportOutcome, SyncOrchestrator};
use tracing::{error, info};

use super::{load_config, open_repository, org_client};

const JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// Run the `import` command: reconcile a roster CSV against a course.
pub async fn run(
    config_path: &str,
    course_id: &str,
    kind: RosterKind,
    csv_path: &str,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config).await?;
    let orchestrator = SyncOrchestrator::new(repo, org_client(&config));

    println!("Reading roster from: {}", csv_path);
    let source = CsvRosterSource::from_path(Path::new(csv_path))?;

    let start = Instant::now();
    let outcome = orchestrator
        .import_from(course_id, kind, &source, "cli")
        .await?;

    let summary = match outcome {
        ImportOutcome::Applied(summary) => summary,
        ImportOutcome::Rejected(rows) => {
            println!("Import rejected; nothing was written.");
            for rejected in &rows {
                println!("  {}", describe_rejection(&rejected.reason, &rejected.row));
            }
            error!(course_id, rejected = rows.len(), "Import rejected");
            anyhow::bail!("{} rows could not be matched unambiguously", rows.len());
        }
    };

    println!("\nImport completed in {:.1}s", start.elapsed().as_secs_f64());
    println!("  Inserted: {}", summary.inserted);
    println!("  Updated:  {}", summary.updated);
    println!("  Dropped:  {}", summary.dropped);

    // The job runs on this runtime, so wait for it before the process exits.
    if let Some(job) = summary.job {
        println!("  Removing dropped members (job {})...", job.id);
        let finished = orchestrator
            .jobs()
            .wait_for_completion(job.id, Duration::from_millis(250), JOB_TIMEOUT)
            .await?;
        info!(job_id = finished.id, status = ?finished.status, "Drop job finished");
        for line in finished.log_lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

fn describe_rejection(
    reason: &RejectionReason,
    row: &rollcall_core::models::roster::RosterRow,
) -> String {
    let who = format!(
        "{} {} <{}> [{}]",
        row.first_name,
        row.last_name,
        row.email.as_deref().unwrap_or("-"),
        row.external_id.as_deref().unwrap_or("-"),
    );
    match reason {
        RejectionReason::AmbiguousIdentity { id_match, email_match } => format!(
            "{who}: id matches record {id_match} but email matches record {email_match}"
        ),
        RejectionReason::MissingIdentity => format!("{who}: no external id or email"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::course;
    use crate::commands::test_support::write_config;
    use rollcall_core::db::repository::RosterRepository;

    #[tokio::test]
    async fn import_csv_into_course() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = write_config(temp.path());
        course::add(&config_path, "cs101", "Intro", None).await.unwrap();

        let csv = temp.path().join("roster.csv");
        std::fs::write(
            &csv,
            "external_id,email,first_name,last_name\nA1,ada@x.edu,Ada,L\nB2,bob@x.edu,Bob,M\n",
        )
        .unwrap();
        run(&config_path, "cs101", RosterKind::Student, &csv.to_string_lossy())
            .await
            .unwrap();

        let config = load_config(&config_path).unwrap();
        let repo = open_repository(&config).await.unwrap();
        let records = repo.list_records("cs101", RosterKind::Student).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn conflicting_import_fails() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = write_config(temp.path());
        course::add(&config_path, "cs101", "Intro", None).await.unwrap();

        let csv = temp.path().join("roster.csv");
        std::fs::write(&csv, "external_id,email\nX,p@q\nY,r@s\n").unwrap();
        run(&config_path, "cs101", RosterKind::Student, &csv.to_string_lossy())
            .await
            .unwrap();

        std::fs::write(&csv, "external_id,email\nX,r@s\n").unwrap();
        let err = run(&config_path, "cs101", RosterKind::Student, &csv.to_string_lossy())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 rows"));
    }

    #[test]
    fn rejection_descriptions() {
        let row = rollcall_core::models::roster::RosterRow::new(Some("X"), None, "Ada", "L");
        let text = describe_rejection(&RejectionReason::MissingIdentity, &row);
        assert_eq!(text, "Ada L <-> [X]: no external id or email");
    }
}
