use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "rollcall", about = "Course roster and GitHub organization sync", version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "rollcall.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum Kind {
    Student,
    Staff,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Initialize the data directory, configuration and database
    Init {
        /// Data directory path
        #[arg(long, default_value = "/var/lib/rollcall")]
        data_dir: String,
    },
    /// Start the webhook endpoint and admin API
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },
    /// Import a roster CSV as the complete roster of a course
    Import {
        #[arg(long)]
        course: String,
        #[arg(long, value_enum, default_value = "student")]
        kind: Kind,
        /// CSV file with external_id, email, first_name, last_name columns
        #[arg(long)]
        csv: String,
    },
    /// Start an organization audit for a linked course
    Audit {
        #[arg(long)]
        course: String,
    },
    /// Show a background job
    Job {
        id: i64,
        /// Poll until the job finishes
        #[arg(long)]
        wait: bool,
    },
}

#[derive(clap::Subcommand)]
enum CourseAction {
    /// Register a course
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Remote gradebook course id
        #[arg(long)]
        gradebook_course_id: Option<String>,
    },
    /// List registered courses
    List,
    /// Link a course to a GitHub organization installation
    Link {
        #[arg(long)]
        id: String,
        #[arg(long)]
        org: String,
        #[arg(long)]
        installation: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => {
            commands::init::run(&data_dir).await?;
        }
        Commands::Serve { port } => {
            commands::serve::run(&cli.config, port).await?;
        }
        Commands::Course { action } => match action {
            CourseAction::Add {
                id,
                name,
                gradebook_course_id,
            } => {
                commands::course::add(&cli.config, &id, &name, gradebook_course_id).await?;
            }
            CourseAction::List => {
                commands::course::list(&cli.config).await?;
            }
            CourseAction::Link {
                id,
                org,
                installation,
            } => {
                commands::course::link(&cli.config, &id, &org, &installation).await?;
            }
        },
        Commands::Import { course, kind, csv } => {
            commands::import::run(&cli.config, &course, kind.into(), &csv).await?;
        }
        Commands::Audit { course } => {
            commands::job::audit(&cli.config, &course).await?;
        }
        Commands::Job { id, wait } => {
            commands::job::show(&cli.config, id, wait).await?;
        }
    }

    Ok(())
}

impl From<Kind> for rollcall_core::models::roster::RosterKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Student => Self::Student,
            Kind::Staff => Self::Staff,
        }
    }
}
