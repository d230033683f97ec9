//! Flat, append-only store for generated image payloads.
//!
//! Written by the image generator tool, read by the output classifier. Names
//! combine a millisecond timestamp with a random v4 token, and files are
//! created with create-new semantics, so two writers never share a file.

use anyhow::{Result, anyhow};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Holds only a directory path, so one store can be shared by every tool
/// instance and every run.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn generate_name() -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format!("image_{}_{}.txt", millis, uuid::Uuid::new_v4().simple())
    }

    /// Persist `payload` under a fresh name and return that name.
    pub async fn save(&self, payload: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for _ in 0..3 {
            let name = Self::generate_name();
            let path = self.dir.join(&name);
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match file {
                Ok(mut file) => {
                    file.write_all(payload.as_bytes()).await?;
                    file.flush().await?;
                    info!("Stored image payload as {}", name);
                    return Ok(name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Image name collision on {}, retrying", name);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(anyhow!("Could not allocate a unique image file name"))
    }

    /// Read a stored payload. Names must be plain file names inside the store.
    pub async fn read(&self, name: &str) -> Result<String> {
        if !is_plain_name(name) {
            return Err(anyhow!("Refusing to read image outside the store: {}", name));
        }
        let path = self.dir.join(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow!("Image file '{}' could not be read: {}", name, e))
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_read_returns_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("images"));
        let name = store.save("aGVsbG8=").await.unwrap();
        assert!(name.starts_with("image_") && name.ends_with(".txt"));
        assert_eq!(store.read(&name).await.unwrap(), "aGVsbG8=");
    }

    #[tokio::test]
    async fn rapid_saves_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let mut names = std::collections::HashSet::new();
        for i in 0..50 {
            let name = store.save(&format!("payload-{}", i)).await.unwrap();
            assert!(names.insert(name));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 50);
    }

    #[tokio::test]
    async fn read_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(store.read("../secret.txt").await.is_err());
        assert!(store.read("nested/x.txt").await.is_err());
        assert!(store.read("").await.is_err());
    }

    #[tokio::test]
    async fn read_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let err = store.read("absent.txt").await.unwrap_err();
        assert!(err.to_string().contains("absent.txt"));
    }
}
