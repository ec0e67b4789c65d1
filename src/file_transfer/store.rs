use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use super::sender::OutgoingFile;
use super::types::{FileKind, ReceivedFile};
use crate::error::{PeerChatError, Result};
use crate::protocol::FileMeta;
use crate::utils;

/// Where the bytes of a known file live
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Assembled from chunks, held in memory until saved
    Received(Vec<u8>),
    /// One of our own files, still on disk
    Sent(PathBuf),
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub meta: FileMeta,
    pub source: FileSource,
}

impl StoredFile {
    pub fn kind(&self) -> FileKind {
        FileKind::classify(&self.meta.mime_type, &self.meta.name)
    }

    pub fn is_received(&self) -> bool {
        matches!(self.source, FileSource::Received(_))
    }
}

/// Files exchanged during a chat, keyed by file id
#[derive(Debug)]
pub struct FileStore {
    download_dir: PathBuf,
    files: BTreeMap<String, StoredFile>,
}

impl FileStore {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            files: BTreeMap::new(),
        }
    }

    pub fn insert_received(&mut self, file: ReceivedFile) {
        self.files.insert(
            file.file_id,
            StoredFile {
                meta: file.meta,
                source: FileSource::Received(file.data),
            },
        );
    }

    pub fn insert_sent(&mut self, file: &OutgoingFile) {
        self.files.insert(
            file.file_id.clone(),
            StoredFile {
                meta: file.meta.clone(),
                source: FileSource::Sent(file.path.clone()),
            },
        );
    }

    pub fn get(&self, file_id: &str) -> Option<&StoredFile> {
        self.files.get(file_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoredFile)> {
        self.files.iter().map(|(id, file)| (id.as_str(), file))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write a file into the download directory without overwriting anything
    pub async fn save(&self, file_id: &str) -> Result<PathBuf> {
        let file = self.files.get(file_id).ok_or_else(|| {
            PeerChatError::Transfer("File data not found. Please try receiving the file again.".to_string())
        })?;

        utils::ensure_dir(&self.download_dir).await?;
        let target = utils::unique_path(&self.download_dir, &sanitize_name(&file.meta.name));

        match &file.source {
            FileSource::Received(data) => tokio::fs::write(&target, data).await?,
            FileSource::Sent(path) => {
                tokio::fs::copy(path, &target).await?;
            }
        }

        info!("Saved {} to {}", file.meta.name, target.display());
        Ok(target)
    }
}

/// Keep only the final path component of a peer-supplied name
fn sanitize_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "download".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(id: &str, name: &str, data: &[u8]) -> ReceivedFile {
        ReceivedFile {
            file_id: id.to_string(),
            meta: FileMeta {
                name: name.to_string(),
                size: data.len() as u64,
                mime_type: "text/plain".to_string(),
            },
            chunk_count: 1,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name(".."), "download");
        assert_eq!(sanitize_name(""), "download");
        assert_eq!(sanitize_name("notes.txt"), "notes.txt");
    }

    #[tokio::test]
    async fn test_save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        store.insert_received(received("1", "notes.txt", b"first"));
        store.insert_received(received("2", "notes.txt", b"second"));

        let a = store.save("1").await.unwrap();
        let b = store.save("2").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(std::fs::read(a).unwrap(), b"first");
        assert_eq!(std::fs::read(b).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_save_unknown_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.save("missing").await.is_err());
    }
}
