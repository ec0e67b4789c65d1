//! Connection lifecycle of the chat page.
//!
//! [`Lifecycle`] only decides; the controller owns the node and the timers
//! and feeds every outcome back in.

use std::fmt;

pub const TIMEOUT_MESSAGE: &str = "Connection timed out. The contact may be offline.";
pub const CLOSED_MESSAGE: &str = "Connection closed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Online,
    Offline,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Online => "online",
            ConnectionStatus::Offline => "offline",
        };
        f.write_str(text)
    }
}

/// Why a connection attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerErrorKind {
    PeerUnavailable,
    Network,
    ServerError,
    Other(String),
}

impl PeerErrorKind {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "peer-unavailable" => PeerErrorKind::PeerUnavailable,
            "network" => PeerErrorKind::Network,
            "server-error" => PeerErrorKind::ServerError,
            other => PeerErrorKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PeerErrorKind::PeerUnavailable => "peer-unavailable",
            PeerErrorKind::Network => "network",
            PeerErrorKind::ServerError => "server-error",
            PeerErrorKind::Other(kind) => kind,
        }
    }

    /// Text shown to the user
    pub fn message(&self) -> String {
        match self {
            PeerErrorKind::PeerUnavailable => "The contact is offline or unavailable".to_string(),
            PeerErrorKind::Network => "Network connection issue. Please check your internet connection".to_string(),
            PeerErrorKind::ServerError => "Signaling server error. Please try again later".to_string(),
            PeerErrorKind::Other(kind) => format!("Connection error: {}", kind),
        }
    }
}

/// What to do before dialing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectDecision {
    AlreadyOnline,
    /// Dial and arm the timeout for this attempt number
    Dial { attempt: u64 },
}

/// What the periodic liveness check should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    Reconnect,
    Ping,
}

#[derive(Debug)]
pub struct Lifecycle {
    status: ConnectionStatus,
    open: bool,
    attempt: u64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            open: false,
            attempt: 0,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Sending is only allowed while online
    pub fn can_send(&self) -> bool {
        self.open && self.status == ConnectionStatus::Online
    }

    pub fn start_connect(&mut self, already_connected: bool) -> ConnectDecision {
        if already_connected {
            self.open = true;
            self.status = ConnectionStatus::Online;
            return ConnectDecision::AlreadyOnline;
        }
        self.attempt += 1;
        self.status = ConnectionStatus::Connecting;
        ConnectDecision::Dial { attempt: self.attempt }
    }

    pub fn on_open(&mut self) {
        self.open = true;
        self.status = ConnectionStatus::Online;
    }

    /// Returns true when an open connection was lost
    pub fn on_closed(&mut self) -> bool {
        let was_open = self.open;
        self.open = false;
        self.status = ConnectionStatus::Offline;
        was_open
    }

    /// A dial failed; the caller shows the message and arms the retry timer
    pub fn on_dial_error(&mut self, kind: &PeerErrorKind) -> String {
        self.status = ConnectionStatus::Offline;
        kind.message()
    }

    /// A retry timer fired; reconnect only if still not open
    pub fn should_retry(&self) -> bool {
        !self.open
    }

    /// The timeout armed for `attempt` fired
    pub fn on_connect_timeout(&mut self, attempt: u64) -> Option<&'static str> {
        if attempt != self.attempt || self.open {
            return None;
        }
        self.status = ConnectionStatus::Offline;
        Some(TIMEOUT_MESSAGE)
    }

    pub fn on_liveness_tick(&self) -> LivenessAction {
        if self.open {
            LivenessAction::Ping
        } else {
            LivenessAction::Reconnect
        }
    }

    /// The ping could not be sent; the caller closes the link and retries soon
    pub fn on_ping_failed(&mut self) {
        self.open = false;
        self.status = ConnectionStatus::Offline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PeerErrorKind::from_kind("peer-unavailable").message(),
            "The contact is offline or unavailable"
        );
        assert_eq!(
            PeerErrorKind::from_kind("network").message(),
            "Network connection issue. Please check your internet connection"
        );
        assert_eq!(
            PeerErrorKind::from_kind("server-error").message(),
            "Signaling server error. Please try again later"
        );
        assert_eq!(
            PeerErrorKind::from_kind("browser-incompatible").message(),
            "Connection error: browser-incompatible"
        );
    }

    #[test]
    fn test_already_connected_skips_dial() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.start_connect(true), ConnectDecision::AlreadyOnline);
        assert_eq!(lifecycle.status(), ConnectionStatus::Online);
        assert!(lifecycle.can_send());
    }

    #[test]
    fn test_timeout_only_applies_to_current_attempt() {
        let mut lifecycle = Lifecycle::new();
        let ConnectDecision::Dial { attempt: first } = lifecycle.start_connect(false) else {
            panic!("expected a dial");
        };
        let ConnectDecision::Dial { attempt: second } = lifecycle.start_connect(false) else {
            panic!("expected a dial");
        };

        assert_eq!(lifecycle.on_connect_timeout(first), None);
        assert_eq!(lifecycle.on_connect_timeout(second), Some(TIMEOUT_MESSAGE));
        assert_eq!(lifecycle.status(), ConnectionStatus::Offline);
    }

    #[test]
    fn test_timeout_ignored_once_open() {
        let mut lifecycle = Lifecycle::new();
        let ConnectDecision::Dial { attempt } = lifecycle.start_connect(false) else {
            panic!("expected a dial");
        };
        lifecycle.on_open();
        assert_eq!(lifecycle.on_connect_timeout(attempt), None);
        assert_eq!(lifecycle.status(), ConnectionStatus::Online);
    }

    #[test]
    fn test_liveness() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.on_liveness_tick(), LivenessAction::Reconnect);

        lifecycle.on_open();
        assert_eq!(lifecycle.on_liveness_tick(), LivenessAction::Ping);

        lifecycle.on_ping_failed();
        assert!(!lifecycle.can_send());
        assert!(lifecycle.should_retry());
        assert_eq!(lifecycle.on_liveness_tick(), LivenessAction::Reconnect);
    }

    #[test]
    fn test_close_reports_previous_state() {
        let mut lifecycle = Lifecycle::new();
        assert!(!lifecycle.on_closed());
        lifecycle.on_open();
        assert!(lifecycle.on_closed());
        assert_eq!(lifecycle.status(), ConnectionStatus::Offline);
    }
}
