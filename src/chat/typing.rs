use std::time::Duration;
use tokio::time::Instant;

use crate::protocol::Envelope;

/// Sends `typing true` on input and `typing false` once input stops
#[derive(Debug)]
pub struct TypingNotifier {
    idle: Duration,
    deadline: Option<Instant>,
}

impl TypingNotifier {
    pub fn new(idle: Duration) -> Self {
        Self { idle, deadline: None }
    }

    /// Record an input event at `now`
    pub fn on_input(&mut self, now: Instant) -> Envelope {
        self.deadline = Some(now + self.idle);
        Envelope::Typing { is_typing: true }
    }

    /// When the idle timer should fire, if armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `typing false` once the idle period has passed
    pub fn poll(&mut self, now: Instant) -> Option<Envelope> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(Envelope::Typing { is_typing: false })
            }
            _ => None,
        }
    }

    /// The draft was sent; `typing false` if the peer was told we were typing
    pub fn finish(&mut self) -> Option<Envelope> {
        self.deadline
            .take()
            .map(|_| Envelope::Typing { is_typing: false })
    }

    /// Disarm without sending anything
    pub fn reset(&mut self) {
        self.deadline = None;
    }
}
