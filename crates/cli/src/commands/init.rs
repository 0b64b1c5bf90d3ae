use std::path::Path;

use rollcall_core::config::RollcallConfig;
use rollcall_core::db::DatabasePool;
use tracing::info;

/// Run the `init` command: create data directory, write default config, and set up the database.
pub async fn run(data_dir: &str) -> anyhow::Result<()> {
    let data_path = Path::new(data_dir);

    if !data_path.exists() {
        std::fs::create_dir_all(data_path)?;
        info!("Created data directory: {}", data_dir);
    }

    let config_path = data_path.join("rollcall.toml");
    if config_path.exists() {
        anyhow::bail!(
            "{} already exists; refusing to overwrite it",
            config_path.display()
        );
    }

    let db_path = data_path.join("rollcall.db");
    let db_path_str = db_path.to_string_lossy().to_string();

    let mut config = RollcallConfig::generate_default();
    config.rollcall.data_dir = data_dir.to_string();
    config.rollcall.database.path = Some(db_path_str.clone());

    let toml_str = toml::to_string_pretty(&config)?;
    std::fs::write(&config_path, &toml_str)?;
    info!("Wrote configuration to {}", config_path.display());

    DatabasePool::new_sqlite(&db_path_str).await?;
    info!("Database initialized at {}", db_path_str);

    println!("Rollcall initialized successfully!");
    println!("  Data directory: {}", data_dir);
    println!("  Configuration:  {}", config_path.display());
    println!("  Database:       {}", db_path_str);
    println!("  Webhook secret: {}", config.github.webhook_secret);
    println!();
    println!("Next steps:");
    println!(
        "  1. Add a GitHub token to {} for invitations and audits",
        config_path.display()
    );
    println!("  2. Point your organization webhook at /webhooks/github");
    println!("  3. Run `rollcall course add` and `rollcall import` to load a roster");

    Ok(())
}
