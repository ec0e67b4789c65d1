use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use peerchat::chat::{Action, ConnectionStatus, PeerErrorKind, Supervisor, Timer, TIMEOUT_MESSAGE};
use peerchat::config::TimingConfig;

/// Plays the chat page: arms real (paused) timers and records side effects
struct Page {
    supervisor: Supervisor,
    timers_tx: mpsc::UnboundedSender<Timer>,
    timers_rx: mpsc::UnboundedReceiver<Timer>,
    started: Instant,
    dials: usize,
    disconnects: usize,
    notices: Vec<String>,
}

impl Page {
    fn new() -> Self {
        let (timers_tx, timers_rx) = mpsc::unbounded_channel();
        Self {
            supervisor: Supervisor::new(&TimingConfig::default()),
            timers_tx,
            timers_rx,
            started: Instant::now(),
            dials: 0,
            disconnects: 0,
            notices: Vec::new(),
        }
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Dial => self.dials += 1,
                Action::Schedule(delay, timer) => {
                    let tx = self.timers_tx.clone();
                    let deadline = Instant::now() + delay;
                    tokio::spawn(async move {
                        tokio::time::sleep_until(deadline).await;
                        let _ = tx.send(timer);
                    });
                }
                Action::Notify(notice) => self.notices.push(notice.text),
                Action::Disconnect => self.disconnects += 1,
                Action::Ping | Action::GoOnline | Action::GoOffline => {}
            }
        }
    }

    /// Wait for the next timer and feed it back; returns when it fired
    async fn fire_next(&mut self, already_connected: bool) -> (Timer, Duration) {
        let timer = self.timers_rx.recv().await.unwrap();
        let actions = self.supervisor.on_timer(timer, already_connected);
        self.apply(actions);
        (timer, self.started.elapsed())
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_message_only_for_current_attempt() {
    let mut page = Page::new();
    let actions = page.supervisor.connect(false);
    page.apply(actions);
    assert_eq!(page.dials, 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    let actions = page.supervisor.on_dial_error(&PeerErrorKind::PeerUnavailable);
    page.apply(actions);
    assert_eq!(page.notices, vec!["The contact is offline or unavailable"]);

    // Retry 5s after the error starts attempt 2
    let (timer, at) = page.fire_next(false).await;
    assert_eq!(timer, Timer::Retry);
    assert_eq!(at, Duration::from_secs(7));
    assert_eq!(page.dials, 2);

    // Attempt 1's timeout is stale
    let (timer, at) = page.fire_next(false).await;
    assert_eq!(timer, Timer::ConnectTimeout(1));
    assert_eq!(at, Duration::from_secs(15));
    assert_eq!(page.notices.len(), 1);

    let (timer, at) = page.fire_next(false).await;
    assert_eq!(timer, Timer::ConnectTimeout(2));
    assert_eq!(at, Duration::from_secs(22));
    assert_eq!(page.notices.last().map(String::as_str), Some(TIMEOUT_MESSAGE));
    assert_eq!(page.supervisor.lifecycle().status(), ConnectionStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_open_does_not_redial() {
    let mut page = Page::new();
    let actions = page.supervisor.connect(false);
    page.apply(actions);
    let actions = page.supervisor.on_dial_error(&PeerErrorKind::Network);
    page.apply(actions);

    // The peer dials us before the retry fires
    tokio::time::advance(Duration::from_secs(1)).await;
    let actions = page.supervisor.on_open();
    page.apply(actions);

    let (timer, _) = page.fire_next(true).await;
    assert_eq!(timer, Timer::Retry);
    let (timer, _) = page.fire_next(true).await;
    assert_eq!(timer, Timer::ConnectTimeout(1));

    assert_eq!(page.dials, 1);
    assert_eq!(page.notices.len(), 1);
    assert!(page.supervisor.lifecycle().can_send());
}

#[tokio::test(start_paused = true)]
async fn test_ping_failure_redials_after_one_second() {
    let mut page = Page::new();
    let actions = page.supervisor.connect(true);
    assert_eq!(actions, vec![Action::GoOnline]);
    page.apply(actions);
    assert_eq!(page.dials, 0);

    tokio::time::advance(Duration::from_secs(15)).await;
    assert_eq!(page.supervisor.on_liveness_tick(true), vec![Action::Ping]);

    let actions = page.supervisor.on_ping_failed();
    assert!(actions.contains(&Action::Disconnect));
    page.apply(actions);
    assert_eq!(page.disconnects, 1);
    assert!(!page.supervisor.lifecycle().can_send());

    let (timer, at) = page.fire_next(false).await;
    assert_eq!(timer, Timer::Retry);
    assert_eq!(at, Duration::from_millis(16_000));
    assert_eq!(page.dials, 1);
    assert_eq!(page.supervisor.lifecycle().status(), ConnectionStatus::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_close_notice_only_when_link_was_open() {
    let mut page = Page::new();
    let actions = page.supervisor.on_closed();
    page.apply(actions);
    assert!(page.notices.is_empty());

    let actions = page.supervisor.on_open();
    page.apply(actions);
    let actions = page.supervisor.on_closed();
    page.apply(actions);
    assert_eq!(page.notices, vec!["Connection closed"]);
}
