use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use lanferry_common::store::{FileStore, StoreError};
use lanferry_common::tokens::{TokenRegistry, TokenRegistryOptions};

use crate::config::{Config, ConfigError};

/// Extra request-body headroom for multipart framing on top of the file
/// size limit.
const MULTIPART_OVERHEAD_BYTES: u64 = 2 * 1024 * 1024;

const TOKEN_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("store init error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Main service state - everything the HTTP handlers need, cheap to clone.
#[derive(Clone)]
pub struct ServiceState {
    store: Arc<FileStore>,
    tokens: Arc<TokenRegistry>,
    upload_permits: Arc<Semaphore>,
    transcode_permits: Arc<Semaphore>,
    max_file_bytes: u64,
    download_ttl: Duration,
    bridge_ttl: Duration,
    external_origin: String,
}

impl ServiceState {
    pub fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        let external_origin = config.external_origin()?;
        let store = FileStore::new(config.limits.max_files, config.max_total_bytes())?;
        let tokens = TokenRegistry::new(TokenRegistryOptions {
            cleanup_interval: Some(TOKEN_CLEANUP_INTERVAL),
            rng: None,
        });

        Ok(Self {
            store: Arc::new(store),
            tokens: Arc::new(tokens),
            upload_permits: Arc::new(Semaphore::new(config.limits.upload_concurrency)),
            transcode_permits: Arc::new(Semaphore::new(config.limits.transcode_concurrency)),
            max_file_bytes: config.max_file_bytes(),
            download_ttl: config.download_ttl(),
            bridge_ttl: config.bridge_ttl(),
            external_origin,
        })
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    /// Upload admission permits. Used strictly in try-acquire mode; the
    /// service answers "busy" rather than queueing.
    pub fn upload_permits(&self) -> &Semaphore {
        &self.upload_permits
    }

    pub fn transcode_permits(&self) -> &Semaphore {
        &self.transcode_permits
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    pub fn max_request_bytes(&self) -> u64 {
        self.max_file_bytes + MULTIPART_OVERHEAD_BYTES
    }

    pub fn download_ttl(&self) -> Duration {
        self.download_ttl
    }

    pub fn bridge_ttl(&self) -> Duration {
        self.bridge_ttl
    }

    pub fn external_origin(&self) -> &str {
        &self.external_origin
    }
}
