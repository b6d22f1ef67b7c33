//! YAML run configuration.
//!
//! Source URLs usually carry SAS tokens, so they are resolved from
//! environment variables (`url_env`) at run time rather than written
//! into the config file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::datekey::is_valid_date_key;
use crate::fetch::DEFAULT_MAX_ATTEMPTS;

/// One remote log source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name; also the partition directory name under `data_dir`.
    pub name: String,
    /// Inline source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Environment variable holding the source URL. Takes precedence
    /// over `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_env: Option<String>,
    /// Default inclusive date bounds (`YYYYMMDD`) for this source;
    /// command-line flags override them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl SourceConfig {
    /// The source URL, from the environment when `url_env` is set.
    pub fn resolve_url(&self) -> Result<String> {
        if let Some(env_name) = &self.url_env {
            return std::env::var(env_name).with_context(|| {
                format!(
                    "Environment variable {} for source {} is not set",
                    env_name, self.name
                )
            });
        }
        self.url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Source {} has neither url nor url_env", self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LakeConfig {
    /// Root directory for durable partitions, one subdirectory per source.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory for the mirrored log file.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Fetch attempts per object.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    pub sources: Vec<SourceConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./parquet_data")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./app_logs")
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

/// Load configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LakeConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let config: LakeConfig =
        serde_yaml_ng::from_str(&content).with_context(|| "Failed to parse YAML configuration")?;

    validate_config(&config)?;
    Ok(config)
}

pub(crate) fn validate_config(config: &LakeConfig) -> Result<()> {
    if config.sources.is_empty() {
        anyhow::bail!("At least one source must be configured");
    }
    if config.max_attempts == 0 {
        anyhow::bail!("max_attempts must be greater than 0");
    }
    for source in &config.sources {
        if source.name.is_empty() {
            anyhow::bail!("Source name cannot be empty");
        }
        if source.url.is_none() && source.url_env.is_none() {
            anyhow::bail!("Source {} must set url or url_env", source.name);
        }
        for bound in [&source.start_date, &source.end_date].into_iter().flatten() {
            if !is_valid_date_key(bound) {
                anyhow::bail!(
                    "Source {} date bound '{}' is not a valid YYYYMMDD date",
                    source.name,
                    bound
                );
            }
        }
    }
    Ok(())
}

/// Write an example configuration file.
pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let example = r#"# loglake configuration
#
# Each source is one remote container of newline-delimited JSON log
# objects, named with embedded y=YYYY/m=MM/d=DD date segments.

data_dir: ./parquet_data
log_dir: ./app_logs
max_attempts: 3

sources:
  - name: insights-logs-signinlogs
    # SAS URL supplied via the environment
    url_env: SIGNIN_LOGS_URI
    start_date: "20240618"
    end_date: "20240801"
  - name: insights-logs-auditlogs
    url_env: AUDIT_LOGS_URI
    start_date: "20240618"
    end_date: "20240801"
"#;
    std::fs::write(&path, example)
        .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
sources:
  - name: insights-logs-signinlogs
    url: ./local-data
"#;
        let config: LakeConfig = serde_yaml_ng::from_str(yaml).unwrap();
        validate_config(&config).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./parquet_data"));
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.sources[0].resolve_url().unwrap(), "./local-data");
    }

    #[test]
    fn test_missing_env_url_is_an_error() {
        let source = SourceConfig {
            name: "s".to_string(),
            url: None,
            url_env: Some("LOGLAKE_TEST_SURELY_UNSET".to_string()),
            start_date: None,
            end_date: None,
        };
        assert!(source.resolve_url().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_config() {
        let empty: LakeConfig = serde_yaml_ng::from_str("sources: []").unwrap();
        assert!(validate_config(&empty).is_err());

        let no_url: LakeConfig = serde_yaml_ng::from_str(
            r#"
sources:
  - name: s
"#,
        )
        .unwrap();
        assert!(validate_config(&no_url).is_err());

        let bad_date: LakeConfig = serde_yaml_ng::from_str(
            r#"
sources:
  - name: s
    url: ./x
    start_date: "2024-06-18"
"#,
        )
        .unwrap();
        assert!(validate_config(&bad_date).is_err());
    }

    #[test]
    fn test_example_config_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("loglake.yaml");
        create_example_config(&path).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "insights-logs-signinlogs");
    }
}
