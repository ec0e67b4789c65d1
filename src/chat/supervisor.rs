//! Timer and retry wiring around [`Lifecycle`].
//!
//! Every input returns the [`Action`]s the chat page has to carry out, so the
//! whole reconnect schedule can be driven without a node or a terminal.

use std::time::Duration;

use super::connection::{ConnectDecision, Lifecycle, LivenessAction, PeerErrorKind, CLOSED_MESSAGE};
use crate::config::TimingConfig;
use crate::notice::Notice;

/// Timers the page arms and feeds back when they fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Retry,
    ConnectTimeout(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Dial,
    Schedule(Duration, Timer),
    Notify(Notice),
    Disconnect,
    Ping,
    GoOnline,
    /// Mark the session offline and drop any partial transfer
    GoOffline,
}

#[derive(Debug)]
pub struct Supervisor {
    lifecycle: Lifecycle,
    connect_timeout: Duration,
    retry_delay: Duration,
    ping_failure_retry: Duration,
}

impl Supervisor {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            connect_timeout: timing.connect_timeout(),
            retry_delay: timing.retry_delay(),
            ping_failure_retry: timing.ping_failure_retry(),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn connect(&mut self, already_connected: bool) -> Vec<Action> {
        match self.lifecycle.start_connect(already_connected) {
            ConnectDecision::AlreadyOnline => vec![Action::GoOnline],
            ConnectDecision::Dial { attempt } => vec![
                Action::Dial,
                Action::Schedule(self.connect_timeout, Timer::ConnectTimeout(attempt)),
            ],
        }
    }

    pub fn on_open(&mut self) -> Vec<Action> {
        self.lifecycle.on_open();
        vec![Action::GoOnline]
    }

    pub fn on_closed(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::GoOffline];
        if self.lifecycle.on_closed() {
            actions.push(Action::Notify(Notice::error(CLOSED_MESSAGE)));
        }
        actions
    }

    pub fn on_dial_error(&mut self, kind: &PeerErrorKind) -> Vec<Action> {
        let message = self.lifecycle.on_dial_error(kind);
        vec![
            Action::GoOffline,
            Action::Notify(Notice::error(message)),
            Action::Schedule(self.retry_delay, Timer::Retry),
        ]
    }

    /// A timer armed by an earlier action fired
    pub fn on_timer(&mut self, timer: Timer, already_connected: bool) -> Vec<Action> {
        match timer {
            Timer::Retry if self.lifecycle.should_retry() => self.connect(already_connected),
            Timer::Retry => Vec::new(),
            Timer::ConnectTimeout(attempt) => match self.lifecycle.on_connect_timeout(attempt) {
                Some(message) => vec![Action::GoOffline, Action::Notify(Notice::error(message))],
                None => Vec::new(),
            },
        }
    }

    pub fn on_liveness_tick(&mut self, already_connected: bool) -> Vec<Action> {
        match self.lifecycle.on_liveness_tick() {
            LivenessAction::Reconnect => self.connect(already_connected),
            LivenessAction::Ping => vec![Action::Ping],
        }
    }

    pub fn on_ping_failed(&mut self) -> Vec<Action> {
        self.lifecycle.on_ping_failed();
        vec![
            Action::GoOffline,
            Action::Disconnect,
            Action::Schedule(self.ping_failure_retry, Timer::Retry),
        ]
    }
}
