use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::router::AppState;
use crate::application::{
    ports::{Inspectable, ObjectStore},
    rate_limiter::RateLimiter,
    use_cases::{DeleteObjectUseCase, DownloadObjectUseCase, StatObjectsUseCase, UploadObjectUseCase},
};
use crate::config::{Config, StorageBackendKind};
use crate::infrastructure::{
    index::RedisMetadataIndex,
    storage::{IndexedFilesystemStore, InMemoryObjectStore, LocalFilesystemStore},
};

pub type BuildError = Box<dyn std::error::Error + Send + Sync>;

/// Application builder for clean dependency injection and setup
pub struct ApplicationBuilder {
    config: Config,
    shutdown: CancellationToken,
    store: Option<Arc<dyn ObjectStore>>,
    inspector: Option<Arc<dyn Inspectable>>,
    limiter: Option<Arc<RateLimiter>>,
}

impl ApplicationBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            store: None,
            inspector: None,
            limiter: None,
        }
    }

    /// Root token; uploads in flight are abandoned when it is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Initialize the configured storage backend
    pub async fn with_storage(mut self) -> Result<Self, BuildError> {
        let config = &self.config;

        match config.backend {
            StorageBackendKind::Memory => {
                self.store = Some(Arc::new(InMemoryObjectStore::with_key_algorithm(
                    config.hash_algorithm,
                )));
            }
            StorageBackendKind::Filesystem => {
                let fs = self.filesystem_store().await?;
                self.store = Some(Arc::new(fs));
            }
            StorageBackendKind::Indexed => {
                let url = config
                    .redis_url()
                    .ok_or("the indexed backend requires a redis host")?;
                let fs = self.filesystem_store().await?;
                let index = RedisMetadataIndex::connect(&url).await?;

                let store = Arc::new(
                    IndexedFilesystemStore::new(fs, Arc::new(index))
                        .with_strict_download_accounting(self.config.strict_download_accounting),
                );
                self.inspector = Some(Arc::clone(&store) as Arc<dyn Inspectable>);
                self.store = Some(store);
            }
        }

        info!(
            backend = self.config.backend.as_str(),
            hash = %self.config.hash_algorithm,
            "Storage layer initialized"
        );
        Ok(self)
    }

    async fn filesystem_store(&self) -> Result<LocalFilesystemStore, BuildError> {
        let fs = LocalFilesystemStore::with_options(
            self.config.storage_root.clone(),
            self.config.hash_algorithm,
            self.config.durable_writes,
            true,
        );
        fs.init().await?;
        info!(root = %fs.root().display(), "Filesystem store ready");
        Ok(fs)
    }

    /// Use an already constructed backend; `inspector` is its statistics
    /// capability, if it has one
    pub fn with_store(
        mut self,
        store: Arc<dyn ObjectStore>,
        inspector: Option<Arc<dyn Inspectable>>,
    ) -> Self {
        self.store = Some(store);
        self.inspector = inspector;
        self
    }

    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build application state with all use cases
    pub fn build(self) -> Result<AppState, BuildError> {
        let store = self.store.ok_or("Storage backend not initialized")?;
        let backend = store.backend_name();
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(self.config.limiter_options())));

        let upload_use_case = Arc::new(UploadObjectUseCase::with_shutdown(
            Arc::clone(&store),
            self.config.max_file_size_bytes,
            self.shutdown,
        ));
        let download_use_case = Arc::new(DownloadObjectUseCase::new(Arc::clone(&store)));
        let delete_use_case = Arc::new(DeleteObjectUseCase::new(Arc::clone(&store)));
        let stat_use_case = Arc::new(StatObjectsUseCase::new(self.inspector, backend));

        info!(
            backend,
            statistics = stat_use_case.is_supported(),
            "Application layer initialized"
        );

        Ok(AppState {
            upload_use_case,
            download_use_case,
            delete_use_case,
            stat_use_case,
            limiter,
            backend,
        })
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(backend: StorageBackendKind, root: &std::path::Path) -> Config {
        let mut config = Config::from_lookup(|_| None);
        config.backend = backend;
        config.storage_root = root.to_path_buf();
        config.durable_writes = false;
        config
    }

    #[tokio::test]
    async fn test_memory_backend_has_no_statistics() {
        let dir = TempDir::new().unwrap();
        let state = ApplicationBuilder::new(config(StorageBackendKind::Memory, dir.path()))
            .with_storage()
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(state.backend, "memory");
        assert!(!state.stat_use_case.is_supported());
    }

    #[tokio::test]
    async fn test_filesystem_backend_initializes_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("objects");
        let state = ApplicationBuilder::new(config(StorageBackendKind::Filesystem, &root))
            .with_storage()
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(state.backend, "filesystem");
        assert!(root.join("temp").is_dir());
        assert!(root.join("ab").is_dir());
    }

    #[tokio::test]
    async fn test_build_without_storage_fails() {
        let dir = TempDir::new().unwrap();
        let builder = ApplicationBuilder::new(config(StorageBackendKind::Memory, dir.path()));
        assert!(builder.build().is_err());
    }
}
