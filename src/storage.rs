//! Media Storage
//! Item images live on disk under a per-item prefix and are referenced by
//! their public URL in the image-link rows. Deletion derives the disk path
//! back from the stored URL's trailing segments.

use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::media::ImagePayload;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image URL does not belong to this store: {0}")]
    ForeignUrl(String),
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl MediaStore {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn extension_for(mime: &str) -> &'static str {
        match mime {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpg",
        }
    }

    /// Write one image under `items/<item_id>/` and return its public URL.
    pub async fn store_item_image(
        &self,
        item_id: &str,
        payload: &ImagePayload,
    ) -> Result<String, StorageError> {
        let file_name = format!(
            "{}.{}",
            Uuid::new_v4(),
            Self::extension_for(&payload.mime)
        );
        let dir = self.root.join("items").join(item_id);
        fs::create_dir_all(&dir).await?;

        let path = dir.join(&file_name);
        let mut file = fs::File::create(&path).await?;
        file.write_all(&payload.bytes).await?;

        info!("Image stored: {:?} ({} bytes)", path, payload.bytes.len());
        Ok(format!(
            "{}/media/items/{}/{}",
            self.public_base_url, item_id, file_name
        ))
    }

    /// Map a stored public URL back to the file it names. Only the two
    /// trailing segments (item dir + file name) are trusted; anything with
    /// path navigation in them is rejected.
    fn path_for_url(&self, url: &str) -> Result<PathBuf, StorageError> {
        let tail = url
            .rsplit_once("/media/items/")
            .map(|(_, tail)| tail)
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        let (item_dir, file_name) = tail
            .split_once('/')
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        if item_dir.is_empty()
            || file_name.is_empty()
            || file_name.contains('/')
            || item_dir.contains("..")
            || file_name.contains("..")
        {
            return Err(StorageError::ForeignUrl(url.to_string()));
        }
        Ok(self.root.join("items").join(item_dir).join(file_name))
    }

    /// Delete the file behind a stored URL. Missing files are fine; the
    /// link row is the source of truth and may outlive a manual cleanup.
    pub async fn delete_by_url(&self, url: &str) -> Result<(), StorageError> {
        let path = self.path_for_url(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Image deleted: {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an item's whole image directory (item deletion).
    pub async fn delete_item_images(&self, item_id: &str) -> Result<(), StorageError> {
        let dir = self.root.join("items").join(item_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Directory that a static-file service should expose as `/media`.
    pub fn media_root(&self) -> PathBuf {
        self.root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, MediaStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf(), "http://localhost:3000".to_string());
        (dir, store)
    }

    fn jpeg(bytes: Vec<u8>) -> ImagePayload {
        ImagePayload::new("image/jpeg", bytes).unwrap()
    }

    #[tokio::test]
    async fn store_writes_file_and_returns_resolvable_url() {
        let (_dir, store) = store();
        let url = store.store_item_image("item-1", &jpeg(vec![1, 2, 3])).await.unwrap();
        assert!(url.starts_with("http://localhost:3000/media/items/item-1/"));
        assert!(url.ends_with(".jpg"));

        let path = store.path_for_url(&url).unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn delete_by_url_removes_the_file() {
        let (_dir, store) = store();
        let url = store.store_item_image("item-1", &jpeg(vec![9])).await.unwrap();
        store.delete_by_url(&url).await.unwrap();
        assert!(!store.path_for_url(&url).unwrap().exists());
        // Idempotent
        store.delete_by_url(&url).await.unwrap();
    }

    #[tokio::test]
    async fn delete_item_images_clears_the_prefix() {
        let (_dir, store) = store();
        let url = store.store_item_image("item-1", &jpeg(vec![1])).await.unwrap();
        store.store_item_image("item-1", &jpeg(vec![2])).await.unwrap();
        store.delete_item_images("item-1").await.unwrap();
        assert!(!store.path_for_url(&url).unwrap().exists());
        store.delete_item_images("item-1").await.unwrap();
    }

    #[test]
    fn foreign_or_traversing_urls_are_rejected() {
        let (_dir, store) = store();
        assert!(store.path_for_url("http://elsewhere/cat.jpg").is_err());
        assert!(store
            .path_for_url("http://localhost:3000/media/items/../../etc/passwd")
            .is_err());
        assert!(store
            .path_for_url("http://localhost:3000/media/items/a/../b.jpg")
            .is_err());
    }
}
