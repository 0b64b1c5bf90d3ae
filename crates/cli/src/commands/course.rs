use rollcall_core::db::repository::CourseRepository;
use rollcall_core::models::course::Course;
use tracing::info;

use super::{load_config, open_repository};

/// Run `course add`.
pub async fn add(
    config_path: &str,
    id: &str,
    name: &str,
    gradebook_course_id: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config).await?;

    if repo.get_course(id).await?.is_some() {
        anyhow::bail!("course '{id}' already exists");
    }
    let mut course = Course::new(id, name);
    course.gradebook_course_id = gradebook_course_id;
    repo.upsert_course(&course).await?;
    info!(course_id = id, "course created");

    println!("Created course {} ({})", course.id, course.name);
    Ok(())
}

/// Run `course list`.
pub async fn list(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config).await?;

    let courses = repo.list_courses().await?;
    if courses.is_empty() {
        println!("No courses registered.");
        return Ok(());
    }
    for course in courses {
        println!("{}", describe(&course));
    }
    Ok(())
}

/// Run `course link`.
pub async fn link(
    config_path: &str,
    id: &str,
    org: &str,
    installation: &str,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config).await?;

    if !repo.set_org_link(id, org, installation).await? {
        anyhow::bail!("course '{id}' not found");
    }
    println!("Linked {} to organization {} (installation {})", id, org, installation);
    Ok(())
}

fn describe(course: &Course) -> String {
    match (&course.external_org_ref, &course.installation_ref) {
        (Some(org), Some(installation)) => format!(
            "{:<16} {:<32} org={} installation={}",
            course.id, course.name, org, installation
        ),
        _ => format!("{:<16} {:<32} (not linked)", course.id, course.name),
    }
}
