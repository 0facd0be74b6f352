//! Filesystem blob store for signature images.
//!
//! Blobs land under `{root}/{folder_hint}/{uuid}.png` and are addressed by
//! a `file://` URL. Writes go through a temp file and rename so a crashed
//! upload never leaves a partial blob at the final path. Every operation
//! runs under a timeout so a hung filesystem surfaces as `BlobError::Timeout`
//! rather than stalling the signing workflow.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use countersign_core::external::blob::BlobStore;
use countersign_types::error::BlobError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Local-disk implementation of `BlobStore`.
pub struct LocalBlobStore {
    root: PathBuf,
    op_timeout: Duration,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            op_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    fn path_from_url(url: &str) -> Result<&Path, BlobError> {
        url.strip_prefix("file://")
            .map(Path::new)
            .ok_or_else(|| BlobError::Io(format!("not a file:// url: {url}")))
    }

    async fn write_blob(&self, bytes: &[u8], folder_hint: &str) -> Result<String, BlobError> {
        let dir = self.root.join(folder_hint);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;

        let path = dir.join(format!("{}.png", Uuid::now_v7()));
        let tmp = path.with_extension("png.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;

        Ok(format!("file://{}", path.display()))
    }
}

impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: &[u8], folder_hint: &str) -> Result<String, BlobError> {
        timeout(self.op_timeout, self.write_blob(bytes, folder_hint))
            .await
            .map_err(|_| BlobError::Timeout)?
    }

    async fn delete(&self, url: &str) -> Result<(), BlobError> {
        let path = Self::path_from_url(url)?;
        let result = timeout(self.op_timeout, tokio::fs::remove_file(path))
            .await
            .map_err(|_| BlobError::Timeout)?;
        match result {
            Ok(()) => Ok(()),
            // Deleting an already-gone blob is not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(e.to_string())),
        }
    }
}
