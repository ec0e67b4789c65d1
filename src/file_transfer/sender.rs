use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::types::{Percent, CHUNK_SIZE};
use crate::error::{PeerChatError, Result};
use crate::protocol::{Envelope, FileMeta};
use crate::utils;

/// Anything an outgoing transfer can push envelopes into
#[async_trait]
pub trait EnvelopeSink: Send + Sync {
    /// Deliver one envelope; fails with `NotConnected` when the channel is down
    async fn send(&self, envelope: Envelope) -> Result<()>;
}

/// Pacing of an outgoing transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    pub chunk_size: usize,
    /// Pause between `file-info` and the first chunk
    pub start_delay: Duration,
    pub chunk_interval: Duration,
    /// Pause between the last chunk and `file-complete`
    pub completion_delay: Duration,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            start_delay: Duration::from_millis(500),
            chunk_interval: Duration::from_millis(10),
            completion_delay: Duration::from_millis(1000),
        }
    }
}

impl SendOptions {
    /// No pauses at all; used where pacing does not matter
    pub fn immediate(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            start_delay: Duration::ZERO,
            chunk_interval: Duration::ZERO,
            completion_delay: Duration::ZERO,
        }
    }
}

/// A local file queued for sending
#[derive(Debug, Clone)]
pub struct OutgoingFile {
    pub file_id: String,
    pub path: PathBuf,
    pub meta: FileMeta,
}

impl OutgoingFile {
    pub async fn open(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(PeerChatError::Transfer(format!("{} is not a file", path.display())));
        }

        let name = utils::get_filename(path)
            .ok_or_else(|| PeerChatError::Transfer(format!("{} has no file name", path.display())))?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            file_id: utils::now_millis().to_string(),
            path: path.to_path_buf(),
            meta: FileMeta {
                name,
                size: metadata.len(),
                mime_type,
            },
        })
    }

    pub fn info_envelope(&self) -> Envelope {
        Envelope::FileInfo {
            file_id: self.file_id.clone(),
            name: self.meta.name.clone(),
            size: self.meta.size,
            mime_type: self.meta.mime_type.clone(),
            timestamp: utils::now_millis(),
        }
    }

    /// Number of `file-data` envelopes this file produces; an empty file still sends one
    pub fn chunk_count(&self, chunk_size: usize) -> u64 {
        self.meta.size.div_ceil(chunk_size as u64).max(1)
    }
}

/// Stream a file to the peer: `file-info`, every chunk, then `file-complete`.
///
/// Progress is reported after each chunk. Returns the number of chunks sent.
pub async fn send_file<S, F>(
    sink: &S,
    file: &OutgoingFile,
    options: &SendOptions,
    mut on_progress: F,
) -> Result<u64>
where
    S: EnvelopeSink + ?Sized,
    F: FnMut(Percent) + Send,
{
    info!(
        "Starting file send process for: {} size: {} type: {}",
        file.meta.name, file.meta.size, file.meta.mime_type
    );

    sink.send(file.info_envelope()).await.map_err(closed_while_sending)?;

    let mut reader = File::open(&file.path).await?;
    tokio::time::sleep(options.start_delay).await;

    let total = file.meta.size;
    let mut offset = 0u64;
    let mut sent = 0u64;

    loop {
        let len = (options.chunk_size as u64).min(total - offset) as usize;
        let mut chunk = vec![0u8; len];
        reader.read_exact(&mut chunk).await?;

        debug!("Sending chunk {}, size: {} bytes", sent, len);
        sink.send(Envelope::FileData {
            file_id: file.file_id.clone(),
            file_info: file.meta.clone(),
            chunk,
        })
        .await
        .map_err(closed_while_sending)?;

        offset += len as u64;
        sent += 1;
        on_progress(Percent::of(offset, total));

        if offset >= total {
            break;
        }
        tokio::time::sleep(options.chunk_interval).await;
    }

    // Give the receiver time to drain the chunks before signalling completion
    tokio::time::sleep(options.completion_delay).await;
    sink.send(Envelope::FileComplete {
        file_id: file.file_id.clone(),
        timestamp: utils::now_millis(),
    })
    .await
    .map_err(closed_while_sending)?;

    info!("File {} sent in {} chunks", file.meta.name, sent);
    Ok(sent)
}

fn closed_while_sending(err: PeerChatError) -> PeerChatError {
    match err {
        PeerChatError::NotConnected | PeerChatError::NodeClosed => {
            PeerChatError::Transfer("Connection closed while sending file".to_string())
        }
        other => other,
    }
}
