use crate::core::Storage;
use crate::utils::error::{FireRiskError, Result};
use std::path::PathBuf;

/// 本機輸出目錄；同名檔案會被覆寫
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let full_path = self.base_path.join(name);
        let partial_path = self.base_path.join(format!("{}.part", name));

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FireRiskError::filesystem(parent, e))?;
        }

        if full_path.exists() {
            tracing::debug!("Overwriting existing file {}", full_path.display());
        }

        // 先寫入暫存檔再改名，避免留下不完整的檔案
        if let Err(e) = tokio::fs::write(&partial_path, data).await {
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(FireRiskError::filesystem(&partial_path, e));
        }
        if let Err(e) = tokio::fs::rename(&partial_path, &full_path).await {
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(FireRiskError::filesystem(&full_path, e));
        }

        Ok(full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("nested/out"));

        let path = storage.write_file("Fars_NDVI.tif", b"tiff").await.unwrap();

        assert_eq!(path, temp_dir.path().join("nested/out/Fars_NDVI.tif"));
        assert_eq!(std::fs::read(&path).unwrap(), b"tiff");
        assert!(!temp_dir.path().join("nested/out/Fars_NDVI.tif.part").exists());
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage.write_file("Fars_LST.tif", b"old contents").await.unwrap();
        let path = storage.write_file("Fars_LST.tif", b"new").await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_write_into_file_path_fails_with_filesystem_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let storage = LocalStorage::new(&blocker);

        let err = storage.write_file("Fars_Slope.tif", b"data").await.unwrap_err();
        assert!(matches!(err, FireRiskError::FilesystemError { .. }));
    }
}
