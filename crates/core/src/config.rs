//! TOML-based configuration system for Rollcall.

use crate::error::{Result, RollcallError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level Rollcall configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollcallConfig {
    pub rollcall: RollcallSection,
    pub github: GithubConfig,
    #[serde(default)]
    pub gradebook: GradebookConfig,
}

/// Core instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollcallSection {
    pub instance_name: String,
    pub data_dir: String,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Some("/var/lib/rollcall/rollcall.db".into()),
        }
    }
}

/// GitHub organization integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Shared secret for `X-Hub-Signature-256`.
    pub webhook_secret: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_api_base_url() -> String {
    "https://api.github.com".into()
}

/// Remote gradebook (Canvas-style) roster pulls.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GradebookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
}

impl RollcallConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RollcallError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Validate the configuration, returning an error for invalid combinations.
    pub fn validate(&self) -> Result<()> {
        if self.rollcall.instance_name.is_empty() {
            return Err(RollcallError::Config(
                "rollcall.instance_name must not be empty".into(),
            ));
        }

        if self.rollcall.data_dir.is_empty() {
            return Err(RollcallError::Config(
                "rollcall.data_dir must not be empty".into(),
            ));
        }

        if self
            .rollcall
            .database
            .path
            .as_deref()
            .map_or(true, str::is_empty)
        {
            return Err(RollcallError::Config(
                "rollcall.database.path is required".into(),
            ));
        }

        if self.github.webhook_secret.is_empty() {
            return Err(RollcallError::Config(
                "github.webhook_secret must not be empty".into(),
            ));
        }

        if self.gradebook.enabled {
            if self.gradebook.base_url.is_empty() {
                return Err(RollcallError::Config(
                    "gradebook.base_url is required when the gradebook is enabled".into(),
                ));
            }
            if self.gradebook.api_token.is_empty() {
                return Err(RollcallError::Config(
                    "gradebook.api_token is required when the gradebook is enabled".into(),
                ));
            }
        }

        Ok(())
    }

    /// Generate a sensible default configuration with a fresh webhook secret.
    pub fn generate_default() -> Self {
        Self {
            rollcall: RollcallSection {
                instance_name: "My Department".into(),
                data_dir: "/var/lib/rollcall".into(),
                database: DatabaseConfig::default(),
            },
            github: GithubConfig {
                webhook_secret: uuid::Uuid::new_v4().simple().to_string(),
                api_base_url: default_api_base_url(),
                token: None,
            },
            gradebook: GradebookConfig::default(),
        }
    }

    pub fn database_path(&self) -> &str {
        self.rollcall.database.path.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[rollcall]
instance_name = "CS Department"
data_dir = "/srv/rollcall"

[rollcall.database]
path = "/srv/rollcall/rollcall.db"

[github]
webhook_secret = "whsec"
token = "ghp_example"

[gradebook]
enabled = true
base_url = "https://canvas.example.edu"
api_token = "canvas-token"
"#;

    fn parse_sample() -> RollcallConfig {
        toml::from_str(SAMPLE).expect("sample config should parse")
    }

    #[test]
    fn parse_full_config() {
        let cfg = parse_sample();
        assert_eq!(cfg.rollcall.instance_name, "CS Department");
        assert_eq!(cfg.database_path(), "/srv/rollcall/rollcall.db");
        assert_eq!(cfg.github.webhook_secret, "whsec");
        assert_eq!(cfg.github.api_base_url, "https://api.github.com");
        assert_eq!(cfg.github.token.as_deref(), Some("ghp_example"));
        assert!(cfg.gradebook.enabled);
        cfg.validate().unwrap();
    }

    #[test]
    fn gradebook_section_is_optional() {
        let cfg: RollcallConfig = toml::from_str(
            r#"
[rollcall]
instance_name = "x"
data_dir = "/tmp"
[github]
webhook_secret = "s"
"#,
        )
        .unwrap();
        assert!(!cfg.gradebook.enabled);
        assert_eq!(cfg.database_path(), "/var/lib/rollcall/rollcall.db");
        cfg.validate().unwrap();
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cfg = RollcallConfig::load(file.path()).unwrap();
        assert_eq!(cfg.rollcall.data_dir, "/srv/rollcall");
    }

    #[test]
    fn load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[rollcall\ninstance_name = ").unwrap();
        let err = RollcallConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn roundtrip_serialization() {
        let cfg = parse_sample();
        let serialized = toml::to_string(&cfg).expect("should serialize");
        let back: RollcallConfig = toml::from_str(&serialized).expect("should deserialize");
        assert_eq!(back.rollcall.instance_name, cfg.rollcall.instance_name);
        assert_eq!(back.gradebook.base_url, cfg.gradebook.base_url);
    }

    #[test]
    fn generate_default_is_valid() {
        let cfg = RollcallConfig::generate_default();
        cfg.validate().expect("default config should be valid");
        assert_eq!(cfg.github.webhook_secret.len(), 32);
        assert_ne!(
            cfg.github.webhook_secret,
            RollcallConfig::generate_default().github.webhook_secret
        );
    }

    #[test]
    fn validate_requires_instance_name() {
        let mut cfg = RollcallConfig::generate_default();
        cfg.rollcall.instance_name = String::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("instance_name"));
    }

    #[test]
    fn validate_requires_data_dir() {
        let mut cfg = RollcallConfig::generate_default();
        cfg.rollcall.data_dir = String::new();
        assert!(cfg.validate().unwrap_err().to_string().contains("data_dir"));
    }

    #[test]
    fn validate_requires_database_path() {
        let mut cfg = RollcallConfig::generate_default();
        cfg.rollcall.database.path = None;
        assert!(cfg.validate().unwrap_err().to_string().contains("path"));
    }

    #[test]
    fn validate_requires_webhook_secret() {
        let mut cfg = RollcallConfig::generate_default();
        cfg.github.webhook_secret = String::new();
        assert!(cfg
            .validate()
            .unwrap_err()
            .to_string()
            .contains("webhook_secret"));
    }

    #[test]
    fn validate_enabled_gradebook_needs_url_and_token() {
        let mut cfg = RollcallConfig::generate_default();
        cfg.gradebook.enabled = true;
        assert!(cfg.validate().unwrap_err().to_string().contains("base_url"));
        cfg.gradebook.base_url = "https://canvas.example.edu".into();
        assert!(cfg.validate().unwrap_err().to_string().contains("api_token"));
        cfg.gradebook.api_token = "t".into();
        cfg.validate().unwrap();
    }
}
