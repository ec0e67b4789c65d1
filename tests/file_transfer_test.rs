use async_trait::async_trait;
use std::sync::Mutex;

use peerchat::error::{PeerChatError, Result};
use peerchat::file_transfer::{
    send_file, EnvelopeSink, FileStore, IncomingTransfer, OutgoingFile, Percent, SendOptions,
};
use peerchat::protocol::Envelope;

/// Collects everything a transfer sends; fails after `limit` envelopes
struct CollectingSink {
    sent: Mutex<Vec<Envelope>>,
    limit: Option<usize>,
}

impl CollectingSink {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            limit: None,
        }
    }

    fn failing_after(limit: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            limit: Some(limit),
        }
    }

    fn envelopes(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnvelopeSink for CollectingSink {
    async fn send(&self, envelope: Envelope) -> Result<()> {
        let mut sent = self.sent.lock().unwrap();
        if self.limit.is_some_and(|limit| sent.len() >= limit) {
            return Err(PeerChatError::NotConnected);
        }
        sent.push(envelope);
        Ok(())
    }
}

fn write_temp(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, data).unwrap();
    path
}

#[tokio::test]
async fn test_send_and_reassemble() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
    let path = write_temp(&dir, "photo.png", &data);

    let file = OutgoingFile::open(&path).await.unwrap();
    assert_eq!(file.meta.mime_type, "image/png");
    assert_eq!(file.meta.size, 40_000);
    assert_eq!(file.chunk_count(16 * 1024), 3);

    let sink = CollectingSink::new();
    let mut progress = Vec::new();
    let chunks = send_file(&sink, &file, &SendOptions::immediate(16 * 1024), |p| progress.push(p))
        .await
        .unwrap();
    assert_eq!(chunks, 3);

    let values: Vec<u8> = progress.iter().map(|p| p.value()).collect();
    assert_eq!(values, vec![40, 81, 100]);

    let envelopes = sink.envelopes();
    assert_eq!(envelopes.len(), 5);
    assert_eq!(envelopes[0].tag(), "file-info");
    assert_eq!(envelopes[4].tag(), "file-complete");

    let mut slot = IncomingTransfer::new();
    for envelope in &envelopes[1..4] {
        match envelope {
            Envelope::FileData {
                file_id,
                file_info,
                chunk,
            } => {
                slot.on_chunk(file_id, file_info, chunk.clone()).unwrap();
            }
            other => panic!("unexpected envelope {:?}", other),
        }
    }
    let received = slot.complete(&file.file_id).unwrap().unwrap();
    assert_eq!(received.chunk_count, 3);
    assert_eq!(received.data, data);
    assert!(!slot.in_progress());
}

#[tokio::test]
async fn test_empty_file_sends_one_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "empty.txt", b"");
    let file = OutgoingFile::open(&path).await.unwrap();

    let sink = CollectingSink::new();
    let mut last = Percent::ZERO;
    let chunks = send_file(&sink, &file, &SendOptions::immediate(1024), |p| last = p)
        .await
        .unwrap();

    assert_eq!(chunks, 1);
    assert_eq!(last, Percent::COMPLETE);
    let tags: Vec<&str> = sink.envelopes().iter().map(|e| e.tag()).collect();
    assert_eq!(tags, vec!["file-info", "file-data", "file-complete"]);
}

#[tokio::test]
async fn test_connection_lost_mid_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "big.bin", &vec![7u8; 5000]);
    let file = OutgoingFile::open(&path).await.unwrap();

    let sink = CollectingSink::failing_after(2);
    let err = send_file(&sink, &file, &SendOptions::immediate(1000), |_| {})
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "File transfer error: Connection closed while sending file");
    assert_eq!(sink.envelopes().len(), 2);
}

#[tokio::test]
async fn test_directories_are_not_sendable() {
    let dir = tempfile::tempdir().unwrap();
    assert!(OutgoingFile::open(dir.path()).await.is_err());
    assert!(OutgoingFile::open(&dir.path().join("missing")).await.is_err());
}

#[tokio::test]
async fn test_sent_files_can_be_saved() {
    let dir = tempfile::tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    let path = write_temp(&dir, "notes.txt", b"hello");
    let file = OutgoingFile::open(&path).await.unwrap();

    let mut store = FileStore::new(&downloads);
    store.insert_sent(&file);
    assert!(!store.get(&file.file_id).unwrap().is_received());

    let saved = store.save(&file.file_id).await.unwrap();
    assert!(saved.starts_with(&downloads));
    assert_eq!(std::fs::read(saved).unwrap(), b"hello");
}
