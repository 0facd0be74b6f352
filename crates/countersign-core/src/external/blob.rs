//! Blob store collaborator trait.

use countersign_types::error::BlobError;

/// Durable storage for binary artifacts (signature images, summary PDFs).
///
/// Implementations must bound every call with a timeout. A failure storing
/// a required artifact (a signature image) aborts the whole operation;
/// nothing is persisted in that case.
pub trait BlobStore: Send + Sync {
    /// Store bytes under a folder hint; returns a stable URL.
    fn store(
        &self,
        bytes: &[u8],
        folder_hint: &str,
    ) -> impl std::future::Future<Output = Result<String, BlobError>> + Send;

    /// Delete a previously stored blob by URL. Used to clean up a signature
    /// image whose surrounding operation failed.
    fn delete(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<(), BlobError>> + Send;
}
