//! Blob storage for uploaded PDFs and avatars.
//!
//! Files live under `<data_dir>/uploads` and are served publicly at `/files`;
//! public URLs are derived from the configured base URL.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PdfStorage {
    root: PathBuf,
    public_base_url: String,
}

impl PdfStorage {
    pub fn new(data_dir: &Path, public_base_url: &str) -> Result<Self> {
        let root = data_dir.join("uploads");
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create upload directory: {}", root.display()))?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Directory handed to the static file service
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(file_name)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Best-effort delete; a missing file is logged, not surfaced
    pub async fn delete(&self, file_name: &str) {
        let path = match self.resolve(file_name) {
            Ok(p) => p,
            Err(e) => {
                warn!(file = file_name, error = %e, "Refusing to delete stored file");
                return;
            }
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(file = file_name, error = %e, "Failed to delete stored file");
        }
    }

    /// Public URL of a stored file
    pub fn file_url(&self, file_name: &str) -> String {
        format!("{}/files/{}", self.public_base_url, file_name)
    }

    /// Public tracked link for a quote slug
    pub fn tracked_url(&self, slug: &str) -> String {
        format!("{}/c/{}", self.public_base_url, slug)
    }

    /// File names are generated internally; reject anything that could
    /// escape the upload directory anyway.
    fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            bail!("Invalid stored file name: {file_name}");
        }
        Ok(self.root.join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> (tempfile::TempDir, PdfStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = PdfStorage::new(dir.path(), "https://links.example.com/").unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn save_and_delete_roundtrip() {
        let (_dir, storage) = test_storage();
        storage.save("abcd1234.pdf", b"%PDF-1.4").await.unwrap();

        let on_disk = storage.root().join("abcd1234.pdf");
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), b"%PDF-1.4");

        storage.delete("abcd1234.pdf").await;
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn traversal_names_rejected() {
        let (_dir, storage) = test_storage();
        assert!(storage.save("../escape.pdf", b"x").await.is_err());
        assert!(storage.save("a/b.pdf", b"x").await.is_err());
        assert!(storage.save("", b"x").await.is_err());
    }

    #[test]
    fn urls_use_trimmed_base() {
        let (_dir, storage) = test_storage();
        assert_eq!(
            storage.file_url("abcd1234.pdf"),
            "https://links.example.com/files/abcd1234.pdf"
        );
        assert_eq!(
            storage.tracked_url("abcd1234"),
            "https://links.example.com/c/abcd1234"
        );
    }
}
