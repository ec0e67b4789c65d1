use tracing::{debug, info, warn};

use super::types::{ChunkProgress, Percent, ReceivedFile};
use crate::error::{PeerChatError, Result};
use crate::protocol::FileMeta;

/// The single inbound transfer slot.
///
/// Only one file is received at a time. Chunks for any other file id are
/// refused while a transfer is open, and the slot is emptied whenever a
/// completion signal arrives or the transfer is aborted.
#[derive(Debug, Default)]
pub struct IncomingTransfer {
    slot: Option<Receiving>,
}

#[derive(Debug)]
struct Receiving {
    file_id: String,
    meta: FileMeta,
    chunks: Vec<Vec<u8>>,
    received: u64,
}

impl IncomingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> bool {
        self.slot.is_some()
    }

    /// File id of the open transfer, if any
    pub fn file_id(&self) -> Option<&str> {
        self.slot.as_ref().map(|r| r.file_id.as_str())
    }

    pub fn received_bytes(&self) -> u64 {
        self.slot.as_ref().map_or(0, |r| r.received)
    }

    /// Append one chunk, opening the slot on the first one
    pub fn on_chunk(&mut self, file_id: &str, meta: &FileMeta, chunk: Vec<u8>) -> Result<ChunkProgress> {
        if let Some(open) = &self.slot {
            if open.file_id != file_id {
                return Err(PeerChatError::Transfer(format!(
                    "chunk for {} while receiving {}",
                    file_id, open.file_id
                )));
            }
        }

        let started = self.slot.is_none();
        if started {
            info!("Starting new file reception: {} ({} bytes)", meta.name, meta.size);
        }
        let open = self.slot.get_or_insert_with(|| Receiving {
            file_id: file_id.to_string(),
            meta: meta.clone(),
            chunks: Vec::new(),
            received: 0,
        });

        open.received += chunk.len() as u64;
        open.chunks.push(chunk);

        let percent = Percent::of(open.received, open.meta.size);
        debug!(
            "File reception progress: {} ({}/{} bytes)",
            percent, open.received, open.meta.size
        );

        Ok(ChunkProgress {
            file_id: open.file_id.clone(),
            received_bytes: open.received,
            total_bytes: open.meta.size,
            percent,
            started,
        })
    }

    /// Assemble the open transfer and empty the slot.
    ///
    /// Returns `Ok(None)` when nothing is being received. The slot is cleared
    /// even when the completion names a different file id.
    pub fn complete(&mut self, file_id: &str) -> Result<Option<ReceivedFile>> {
        let Some(open) = self.slot.take() else {
            warn!("No file reception in progress when complete signal received for {}", file_id);
            return Ok(None);
        };

        if open.file_id != file_id {
            return Err(PeerChatError::Transfer(format!(
                "completion for {} while receiving {}",
                file_id, open.file_id
            )));
        }

        info!(
            "Assembling {} from {} chunks, total size: {} bytes",
            open.meta.name,
            open.chunks.len(),
            open.received
        );

        let chunk_count = open.chunks.len();
        let data = open.chunks.concat();

        Ok(Some(ReceivedFile {
            file_id: open.file_id,
            meta: open.meta,
            chunk_count,
            data,
        }))
    }

    /// Drop a partial transfer, returning its file id
    pub fn abort(&mut self) -> Option<String> {
        let open = self.slot.take()?;
        warn!(
            "Dropping partial transfer {} at {}/{} bytes",
            open.file_id, open.received, open.meta.size
        );
        Some(open.file_id)
    }
}
