use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::ports::{BlobReader, ObjectStore, ObjectWriter, StorageError};
use crate::domain::value_objects::{HashAlgorithm, ObjectKey};
use crate::infrastructure::storage::{DigestSet, PathBuilder, BUFFER_SIZE};

struct StoreInner {
    path_builder: PathBuilder,
    key_algorithm: HashAlgorithm,
    durable_writes: bool,
    // Directories known to exist, to skip create_dir_all on the hot path
    created_dirs: RwLock<HashSet<PathBuf>>,
}

impl StoreInner {
    async fn ensure_dir(&self, dir: &Path) -> Result<(), StorageError> {
        if self.created_dirs.read().contains(dir) {
            return Ok(());
        }

        fs::create_dir_all(dir)
            .await
            .map_err(StorageError::io("create directory"))?;
        self.created_dirs.write().insert(dir.to_path_buf());
        Ok(())
    }

    /// Move a finished temp file to its content-addressed location
    async fn commit(&self, temp_path: &Path, key: &ObjectKey) -> Result<(), StorageError> {
        let final_path = self.path_builder.final_path(key);
        self.ensure_dir(&self.path_builder.shard_dir(key.prefix()))
            .await?;

        if fs::try_exists(&final_path).await.unwrap_or(false) {
            debug!(key = %key, "object already stored, discarding duplicate upload");
            if let Err(e) = fs::remove_file(temp_path).await {
                warn!(path = ?temp_path, error = %e, "failed to remove duplicate temp file");
            }
            return Ok(());
        }

        debug!(key = %key, path = ?final_path, "moving object to final location");
        fs::rename(temp_path, &final_path)
            .await
            .map_err(StorageError::io("rename into place"))?;

        // Persist the rename itself
        if self.durable_writes {
            if let Some(parent) = final_path.parent() {
                match File::open(parent).await {
                    Ok(dir) => {
                        if let Err(e) = dir.sync_all().await {
                            warn!("Failed to sync shard directory after rename: {}", e);
                        }
                    }
                    Err(e) => warn!("Failed to open shard directory for sync: {}", e),
                }
            }
        }

        Ok(())
    }
}

/// Local filesystem object store.
///
/// Layout: `{root}/{key[0..2]}/{key}` for committed objects and
/// `{root}/temp/{uuid}` for uploads in progress. Publishing is a single
/// `rename`, so readers see either nothing or the complete object.
#[derive(Clone)]
pub struct LocalFilesystemStore {
    inner: Arc<StoreInner>,
    precreate_dirs: bool,
}

impl LocalFilesystemStore {
    pub fn new(root: PathBuf) -> Self {
        Self::with_options(root, HashAlgorithm::default(), true, false)
    }

    pub fn with_durability(root: PathBuf, durable_writes: bool) -> Self {
        Self::with_options(root, HashAlgorithm::default(), durable_writes, false)
    }

    pub fn with_options(
        root: PathBuf,
        key_algorithm: HashAlgorithm,
        durable_writes: bool,
        precreate_dirs: bool,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path_builder: PathBuilder::new(root),
                key_algorithm,
                durable_writes,
                created_dirs: RwLock::new(HashSet::new()),
            }),
            precreate_dirs,
        }
    }

    pub fn root(&self) -> &Path {
        self.inner.path_builder.root()
    }

    /// Initialize storage directories
    pub async fn init(&self) -> Result<(), StorageError> {
        let builder = &self.inner.path_builder;
        self.inner.ensure_dir(&builder.temp_dir()).await?;

        // Pre-create all 256 hex prefix directories to avoid doing it on every write
        if self.precreate_dirs {
            for i in 0..=255u8 {
                let prefix = format!("{:02x}", i);
                self.inner.ensure_dir(&builder.shard_dir(&prefix)).await?;
            }
        }

        Ok(())
    }

    /// Check if an object exists
    pub async fn exists(&self, key: &ObjectKey) -> bool {
        let path = self.inner.path_builder.final_path(key);
        fs::try_exists(&path).await.unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStore for LocalFilesystemStore {
    async fn new_object_writer(&self) -> Result<Box<dyn ObjectWriter>, StorageError> {
        let builder = &self.inner.path_builder;
        self.inner.ensure_dir(&builder.temp_dir()).await?;

        let temp_path = builder.temp_path(Uuid::new_v4());
        let file = File::create(&temp_path)
            .await
            .map_err(StorageError::io("create temp file"))?;
        debug!(path = ?temp_path, "opened temp file for upload");

        Ok(Box::new(FsObjectWriter {
            file: Some(BufWriter::with_capacity(BUFFER_SIZE * 2, file)),
            digests: Some(DigestSet::new(self.inner.key_algorithm)),
            temp_path,
            size: 0,
            inner: Arc::clone(&self.inner),
            finished: false,
        }))
    }

    async fn get(&self, key: &ObjectKey) -> Result<BlobReader, StorageError> {
        let path = self.inner.path_builder.final_path(key);

        fs::metadata(&path)
            .await
            .map_err(StorageError::io_or_not_found("stat object", key))?;

        let file = File::open(&path)
            .await
            .map_err(StorageError::io_or_not_found("open object", key))?;

        Ok(Box::pin(BufReader::with_capacity(BUFFER_SIZE, file)))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        let path = self.inner.path_builder.final_path(key);

        fs::remove_file(&path)
            .await
            .map_err(StorageError::io_or_not_found("remove object", key))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

/// Upload session backed by a temp file under `{root}/temp`.
pub struct FsObjectWriter {
    file: Option<BufWriter<File>>,
    digests: Option<DigestSet>,
    temp_path: PathBuf,
    size: u64,
    inner: Arc<StoreInner>,
    finished: bool,
}

impl FsObjectWriter {
    async fn discard(&mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.file.take();
        self.digests.take();

        match fs::remove_file(&self.temp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io("remove temp file")(e)),
        }
    }
}

#[async_trait]
impl ObjectWriter for FsObjectWriter {
    fn expect_hash(&mut self, algorithm: HashAlgorithm, expected: String) {
        if let Some(digests) = self.digests.as_mut() {
            digests.expect(algorithm, expected);
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, StorageError> {
        let (Some(file), Some(digests)) = (self.file.as_mut(), self.digests.as_mut()) else {
            return Err(StorageError::Internal("writer already finished".to_string()));
        };

        file.write_all(buf)
            .await
            .map_err(StorageError::io("write temp file"))?;
        digests.update(buf);
        self.size += buf.len() as u64;

        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn save(mut self: Box<Self>) -> Result<ObjectKey, StorageError> {
        let (Some(mut file), Some(digests)) = (self.file.take(), self.digests.take()) else {
            return Err(StorageError::Internal("writer already finished".to_string()));
        };

        file.flush()
            .await
            .map_err(StorageError::io("flush temp file"))?;
        if self.inner.durable_writes {
            file.get_mut()
                .sync_all()
                .await
                .map_err(StorageError::io("sync temp file"))?;
        }
        drop(file);

        let key = match digests.finalize() {
            Ok(key) => key,
            Err(e) => {
                if let Err(cleanup) = self.discard().await {
                    warn!(path = ?self.temp_path, error = %cleanup, "failed to discard rejected upload");
                }
                return Err(e);
            }
        };

        self.inner.commit(&self.temp_path, &key).await?;
        self.finished = true;

        Ok(key)
    }

    async fn remove(mut self: Box<Self>) -> Result<(), StorageError> {
        self.discard().await
    }
}

impl Drop for FsObjectWriter {
    fn drop(&mut self) {
        if !self.finished {
            debug!(path = ?self.temp_path, "upload abandoned, removing temp file");
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}
