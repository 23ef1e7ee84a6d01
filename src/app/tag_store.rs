use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::formats::TagIndex;

#[derive(Debug, thiserror::Error)]
pub enum TagStoreError {
    #[error("tag cache not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("parse tag cache {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("tag cache io {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encode tag cache: {0}")]
    Encode(#[source] serde_json::Error),
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn exists(&self) -> Result<bool, TagStoreError>;
    async fn read(&self) -> Result<TagIndex, TagStoreError>;
    async fn write(&self, index: &TagIndex) -> Result<(), TagStoreError>;

    async fn read_optional(&self) -> Result<Option<TagIndex>, TagStoreError> {
        match self.read().await {
            Ok(index) => Ok(Some(index)),
            Err(TagStoreError::Missing(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalFsTagStore {
    path: PathBuf,
}

impl LocalFsTagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> TagStoreError {
        TagStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl TagStore for LocalFsTagStore {
    async fn exists(&self) -> Result<bool, TagStoreError> {
        fs::try_exists(&self.path)
            .await
            .map_err(|err| self.io_error(&self.path, err))
    }

    async fn read(&self) -> Result<TagIndex, TagStoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(TagStoreError::Missing(self.path.clone()));
            }
            Err(err) => return Err(self.io_error(&self.path, err)),
        };
        serde_json::from_slice(&bytes).map_err(|source| TagStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&self, index: &TagIndex) -> Result<(), TagStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| self.io_error(parent, err))?;
        }

        let tmp_path = self
            .path
            .with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
        let data = serde_json::to_vec_pretty(index).map_err(TagStoreError::Encode)?;
        fs::write(&tmp_path, &data)
            .await
            .map_err(|err| self.io_error(&tmp_path, err))?;
        if let Err(err) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(self.io_error(&self.path, err));
        }

        tracing::debug!(path = %self.path.display(), tags = index.len(), "wrote tag cache");
        Ok(())
    }
}
