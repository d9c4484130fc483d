//! Typed configuration, loaded from YAML with `${VAR}`-style environment
//! indirection for secrets. Shaped after the per-sink `Config` structs the
//! teacher derives with `serde` (e.g. the knobs gathered under
//! `archive`/`inbox`/`db`/`broker` sections in the original `CONF` ini file,
//! folded here into one typed root).

use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub database: DatabaseConfig,
    pub inbox: StorageConfig,
    pub archive: StorageConfig,
    pub broker: BrokerConfig,
    pub keys: KeyConfig,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string; may contain `${VAR}` references.
    pub connection: String,
    #[serde(default = "default_try_interval_secs")]
    pub try_interval_secs: u64,
    #[serde(default = "default_try_attempts")]
    pub try_attempts: u32,
}

fn default_try_interval_secs() -> u64 {
    1
}

fn default_try_attempts() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum StorageConfig {
    File(FileStorageConfig),
    S3(S3StorageConfig),
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileStorageConfig {
    /// Root directory this backend is rooted at.
    pub location: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    /// May contain a `${VAR}` reference; resolved before use.
    pub secret_key: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: u64,
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_multipart_threshold() -> u64 {
    32 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    pub connection: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
    pub files_queue: FilesQueueConfig,
    pub archived_queue: ArchivedQueueConfig,
    pub stable_ids_queue: StableIdsQueueConfig,
}

fn default_exchange() -> String {
    "localega.v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesQueueConfig {
    #[serde(default = "default_files_queue_name")]
    pub queue: String,
    #[serde(default = "default_archived_routing_key")]
    pub publish_routing_key: String,
}

fn default_files_queue_name() -> String {
    "files".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchivedQueueConfig {
    #[serde(default = "default_archived_queue_name")]
    pub queue: String,
    #[serde(default = "default_completed_routing_key")]
    pub publish_routing_key: String,
}

fn default_archived_queue_name() -> String {
    "archived".to_string()
}

fn default_archived_routing_key() -> String {
    "archived".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StableIdsQueueConfig {
    #[serde(default = "default_stable_ids_queue_name")]
    pub queue: String,
    #[serde(default = "default_completed_routing_key")]
    pub publish_routing_key: String,
}

fn default_stable_ids_queue_name() -> String {
    "stableIDs".to_string()
}

fn default_completed_routing_key() -> String {
    "completed".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "loader", rename_all = "snake_case")]
pub enum KeyConfig {
    File(FileKeyConfig),
    Vault(RemoteKeyConfig),
    Https(RemoteKeyConfig),
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileKeyConfig {
    pub path: String,
    /// May contain a `${VAR}` reference; resolved before use.
    pub passphrase: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteKeyConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("failed to read config file {path}: {source}"))]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse config: {source}"))]
    Parse { source: serde_yaml::Error },
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).context(ReadSnafu {
            path: path.display().to_string(),
        })?;
        serde_yaml::from_str(&raw).context(ParseSnafu)
    }
}

/// Expands a single `${VAR}` reference against the process environment,
/// leaving the value untouched if it isn't of that shape. Used for secret
/// fields (`database.connection` password component, S3 `secret_key`, key
/// `passphrase`) so plaintext YAML never needs to carry them directly.
pub fn resolve_env_ref(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(var_name) = trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        std::env::var(var_name).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_ref_passes_through_plain_values() {
        assert_eq!(resolve_env_ref("plain-value"), "plain-value");
    }

    #[test]
    fn resolve_env_ref_expands_known_variable() {
        std::env::set_var("INGEST_CORE_TEST_SECRET", "s3kr3t");
        assert_eq!(
            resolve_env_ref("${INGEST_CORE_TEST_SECRET}"),
            "s3kr3t"
        );
        std::env::remove_var("INGEST_CORE_TEST_SECRET");
    }

    #[test]
    fn parses_a_minimal_config_document() {
        let yaml = r#"
database:
  connection: "postgres://localhost/lega"
inbox:
  driver: file
  location: "/inbox"
archive:
  driver: file
  location: "/archive"
broker:
  connection: "amqp://localhost"
  files_queue:
    queue: files
    publish_routing_key: archived
  archived_queue:
    queue: archived
    publish_routing_key: completed
  stable_ids_queue:
    queue: stableIDs
    publish_routing_key: completed
keys:
  loader: file
  path: "/keys/archive.sec"
  passphrase: "${ARCHIVE_KEY_PASSPHRASE}"
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_filter, "info");
        match config.inbox {
            StorageConfig::File(f) => assert_eq!(f.location, "/inbox"),
            _ => panic!("expected file storage"),
        }
    }
}
