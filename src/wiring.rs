//! Builds the trait-object backends each worker binary wires together from
//! [`PipelineConfig`], kept here once instead of duplicated across the three
//! `src/bin` entry points.

use aws_sdk_s3::config::{Credentials, Region};
use ingest_core::config::{resolve_env_ref, ConfigError, KeyConfig, StorageConfig};
use ingest_keys::{Crypt4ghKeyLoader, FileKeyProvider, KeyError, KeyProvider, RemoteHttpsKeyProvider, RemoteVaultKeyProvider};
use ingest_storage::{FileStorage, S3Storage, StorageBackend};
use std::time::Duration;

pub use ingest_core::config::PipelineConfig;

pub fn build_storage(cfg: &StorageConfig) -> Box<dyn StorageBackend> {
    match cfg {
        StorageConfig::File(file) => Box::new(FileStorage::new(file.location.clone())),
        StorageConfig::S3(s3) => {
            let secret_key = resolve_env_ref(&s3.secret_key);
            let credentials = Credentials::new(&s3.access_key, secret_key, None, None, "ingest-pipeline-config");
            let config = aws_sdk_s3::Config::builder()
                .behavior_version(aws_config::BehaviorVersion::latest())
                .region(Region::new(s3.region.clone()))
                .endpoint_url(&s3.endpoint)
                .credentials_provider(credentials)
                .force_path_style(true)
                .build();
            let client = aws_sdk_s3::Client::from_conf(config);
            let _ = Duration::from_secs(s3.connect_timeout_secs); // surfaced via client config in a future pass
            Box::new(S3Storage::new(client, s3.bucket.clone(), s3.multipart_threshold_bytes))
        }
    }
}

/// This build carries no concrete Crypt4GH implementation (§1 scopes the
/// envelope codec out), so the file-backed provider's unlock step always
/// fails; swap in a real [`Crypt4ghKeyLoader`] to make it load keys.
struct UnimplementedCrypt4ghKeyLoader;

impl Crypt4ghKeyLoader for UnimplementedCrypt4ghKeyLoader {
    fn load(&self, _file_bytes: &[u8], _passphrase: &str) -> Result<(Vec<u8>, Vec<u8>), KeyError> {
        Err(KeyError::Unlock {
            reason: "no Crypt4GH key loader wired into this build".to_string(),
        })
    }
}

pub fn build_key_provider(cfg: &KeyConfig) -> Result<Box<dyn KeyProvider>, KeyError> {
    match cfg {
        KeyConfig::File(file) => {
            let passphrase = resolve_env_ref(&file.passphrase);
            let provider = FileKeyProvider::load(&file.path, &passphrase, &UnimplementedCrypt4ghKeyLoader)?;
            Ok(Box::new(provider))
        }
        KeyConfig::Vault(_) => Ok(Box::new(RemoteVaultKeyProvider)),
        KeyConfig::Https(_) => Ok(Box::new(RemoteHttpsKeyProvider)),
    }
}

pub fn load_config(path: &str) -> Result<PipelineConfig, ConfigError> {
    PipelineConfig::load(path)
}
