pub mod receiver;
pub mod sender;
pub mod store;
pub mod types;

// Re-exports for easier access from crate::file_transfer::{...}
pub use receiver::IncomingTransfer;
pub use sender::{send_file, EnvelopeSink, OutgoingFile, SendOptions};
pub use store::{FileSource, FileStore, StoredFile};
pub use types::{ChunkProgress, FileKind, Percent, ReceivedFile, CHUNK_SIZE};
