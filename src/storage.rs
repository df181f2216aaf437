use crate::util::BoxResult;
use simple_error::bail;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Flat object storage addressed by string keys.
#[async_trait::async_trait]
pub trait Bucket: Send + Sync {
    /// `None` when no object exists under `key`.
    async fn get(&self, key: &str) -> BoxResult<Option<Vec<u8>>>;
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> BoxResult<()>;
    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> BoxResult<()>;
    fn name(&self) -> String;
}

/// A directory standing in for a bucket, object keys become relative paths.
#[derive(Debug, Clone)]
pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalBucket { root: root.into() }
    }

    fn path_of(&self, key: &str) -> BoxResult<PathBuf> {
        let rel = Path::new(key.trim_start_matches('/'));
        if key.is_empty() || rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            bail!("invalid object key {:?}", key);
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait::async_trait]
impl Bucket for LocalBucket {
    async fn get(&self, key: &str) -> BoxResult<Option<Vec<u8>>> {
        let path = self.path_of(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> BoxResult<()> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        log::debug!("writing {} bytes to {}", body.len(), path.display());
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> BoxResult<()> {
        let path = self.path_of(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> String {
        format!("local:{}", self.root.display())
    }
}
