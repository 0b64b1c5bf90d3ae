pub mod course;
pub mod import;
pub mod init;
pub mod job;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use rollcall_core::config::RollcallConfig;
use rollcall_core::db::sqlite::SqliteRepository;
use rollcall_core::db::DatabasePool;
use rollcall_core::org::github::GithubOrgClient;
use rollcall_core::org::OrgClient;
use tracing::info;

/// Load and validate the configuration file.
pub fn load_config(config_path: &str) -> anyhow::Result<RollcallConfig> {
    let config = RollcallConfig::load(Path::new(config_path))?;
    config.validate()?;
    info!("Loaded configuration from {}", config_path);
    Ok(config)
}

/// Open the configured database, running migrations.
pub async fn open_repository(config: &RollcallConfig) -> anyhow::Result<Arc<SqliteRepository>> {
    let pool = DatabasePool::new_sqlite(config.database_path()).await?;
    Ok(Arc::new(pool.into_repository()))
}

pub fn org_client(config: &RollcallConfig) -> Arc<dyn OrgClient> {
    Arc::new(GithubOrgClient::new(
        &config.github.api_base_url,
        config.github.token.as_deref(),
    ))
}
