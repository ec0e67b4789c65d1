pub mod codec;
pub mod envelope;

pub use codec::{Ack, ChatCodec, Frame, CHAT_PROTOCOL, MAX_FRAME_LEN};
pub use envelope::{Envelope, FileMeta, Incoming, KNOWN_TAGS};
