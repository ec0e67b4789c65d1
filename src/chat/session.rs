use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::error::{PeerChatError, Result};
use crate::file_transfer::{ChunkProgress, FileKind, FileStore, IncomingTransfer, OutgoingFile};
use crate::notice::Notice;
use crate::protocol::{Envelope, FileMeta, Incoming};
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Read,
}

/// One of our own messages and whether the peer has read it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: String,
    pub content: String,
    pub timestamp: u64,
    pub delivery: Delivery,
}

/// Something the front end should show
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Message {
        message_id: Option<String>,
        content: String,
        timestamp: u64,
    },
    PeerTyping(bool),
    FileOffered {
        file_id: String,
        meta: FileMeta,
        timestamp: u64,
    },
    FileProgress(ChunkProgress),
    FileReceived {
        file_id: String,
        meta: FileMeta,
        kind: FileKind,
    },
    MessageRead {
        message_id: String,
    },
    Pong {
        timestamp: u64,
    },
    Notice(Notice),
}

/// Result of handling one inbound envelope
#[derive(Debug, Default)]
pub struct Outcome {
    pub events: Vec<SessionEvent>,
    /// Envelopes to send back to the peer, in order
    pub replies: Vec<Envelope>,
}

/// State of one chat with one contact.
///
/// Knows nothing about the network: envelopes go in, events and replies
/// come out.
#[derive(Debug)]
pub struct ChatSession {
    online: bool,
    peer_typing: bool,
    offered: HashSet<String>,
    transfer: IncomingTransfer,
    files: FileStore,
    sent: Vec<SentMessage>,
}

impl ChatSession {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            online: false,
            peer_typing: false,
            offered: HashSet::new(),
            transfer: IncomingTransfer::new(),
            files: FileStore::new(download_dir),
            sent: Vec::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Going offline drops any partial inbound file; its id is returned
    pub fn set_online(&mut self, online: bool) -> Option<String> {
        self.online = online;
        if online {
            return None;
        }
        self.peer_typing = false;
        self.transfer.abort()
    }

    pub fn peer_typing(&self) -> bool {
        self.peer_typing
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn transfer(&self) -> &IncomingTransfer {
        &self.transfer
    }

    pub fn sent_messages(&self) -> &[SentMessage] {
        &self.sent
    }

    pub fn register_sent_file(&mut self, file: &OutgoingFile) {
        self.files.insert_sent(file);
    }

    /// Build an outgoing message; blank input yields `None`
    pub fn compose_message(&mut self, content: &str) -> Result<Option<Envelope>> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        if !self.online {
            return Err(PeerChatError::NotConnected);
        }

        let timestamp = utils::now_millis();
        let message_id = format!("msg_{}", timestamp);
        self.sent.push(SentMessage {
            message_id: message_id.clone(),
            content: content.to_string(),
            timestamp,
            delivery: Delivery::Sent,
        });

        Ok(Some(Envelope::Message {
            message_id: Some(message_id),
            content: content.to_string(),
            timestamp,
        }))
    }

    pub fn ping(&self) -> Envelope {
        Envelope::Ping {
            timestamp: utils::now_millis(),
        }
    }

    pub fn handle(&mut self, incoming: Incoming) -> Outcome {
        let mut outcome = Outcome::default();
        let envelope = match incoming {
            Incoming::Known(envelope) => envelope,
            Incoming::Unknown { tag } => {
                debug!("Ignoring envelope with unknown tag {}", tag);
                return outcome;
            }
        };

        match envelope {
            Envelope::Message {
                message_id,
                content,
                timestamp,
            } => {
                self.hide_typing(&mut outcome);
                if self.online {
                    if let Some(id) = &message_id {
                        outcome.replies.push(Envelope::ReadReceipt {
                            message_id: id.clone(),
                        });
                    }
                }
                outcome.events.push(SessionEvent::Message {
                    message_id,
                    content,
                    timestamp,
                });
            }
            Envelope::FileInfo {
                file_id,
                name,
                size,
                mime_type,
                timestamp,
            } => {
                self.hide_typing(&mut outcome);
                if self.offered.insert(file_id.clone()) {
                    info!("Received file info: {} ({} bytes)", name, size);
                    outcome.events.push(SessionEvent::FileOffered {
                        file_id,
                        meta: FileMeta { name, size, mime_type },
                        timestamp,
                    });
                } else {
                    debug!("Duplicate file info for {}", file_id);
                }
            }
            Envelope::FileData {
                file_id,
                file_info,
                chunk,
            } => match self.transfer.on_chunk(&file_id, &file_info, chunk) {
                Ok(progress) => outcome.events.push(SessionEvent::FileProgress(progress)),
                Err(e) => warn!("Dropping chunk: {}", e),
            },
            Envelope::FileComplete { file_id, .. } => match self.transfer.complete(&file_id) {
                Ok(Some(file)) => {
                    let kind = FileKind::classify(&file.meta.mime_type, &file.meta.name);
                    let meta = file.meta.clone();
                    info!("File received: {} ({} bytes, {:?})", meta.name, file.data.len(), kind);
                    self.files.insert_received(file);
                    outcome.events.push(SessionEvent::Notice(Notice::success(format!(
                        "File \"{}\" received successfully",
                        meta.name
                    ))));
                    outcome.events.push(SessionEvent::FileReceived { file_id, meta, kind });
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Error completing file reception: {}", e);
                    outcome.events.push(SessionEvent::Notice(Notice::error(format!(
                        "Error completing file reception: {}",
                        e
                    ))));
                }
            },
            Envelope::Typing { is_typing } => {
                self.peer_typing = is_typing;
                outcome.events.push(SessionEvent::PeerTyping(is_typing));
            }
            Envelope::ReadReceipt { message_id } => {
                match self.sent.iter_mut().find(|m| m.message_id == message_id) {
                    Some(message) => {
                        message.delivery = Delivery::Read;
                        outcome.events.push(SessionEvent::MessageRead { message_id });
                    }
                    None => debug!("Read receipt for unknown message {}", message_id),
                }
            }
            Envelope::Ping { .. } => {
                if self.online {
                    outcome.replies.push(Envelope::Pong {
                        timestamp: utils::now_millis(),
                    });
                }
            }
            Envelope::Pong { timestamp } => {
                debug!("Received pong from peer");
                outcome.events.push(SessionEvent::Pong { timestamp });
            }
        }

        outcome
    }

    fn hide_typing(&mut self, outcome: &mut Outcome) {
        if self.peer_typing {
            self.peer_typing = false;
            outcome.events.push(SessionEvent::PeerTyping(false));
        }
    }
}
