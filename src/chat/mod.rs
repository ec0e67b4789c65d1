pub mod connection;
pub mod session;
pub mod supervisor;
pub mod typing;

pub use connection::{
    ConnectDecision, ConnectionStatus, Lifecycle, LivenessAction, PeerErrorKind, CLOSED_MESSAGE, TIMEOUT_MESSAGE,
};
pub use session::{ChatSession, Delivery, Outcome, SentMessage, SessionEvent};
pub use supervisor::{Action, Supervisor, Timer};
pub use typing::TypingNotifier;
