use indicatif::ProgressBar;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::view;
use crate::chat::{Action, ChatSession, ConnectionStatus, SessionEvent, Supervisor, Timer, TypingNotifier};
use crate::config::AppConfig;
use crate::error::{PeerChatError, Result};
use crate::file_transfer::{send_file, OutgoingFile, Percent};
use crate::network::{ChatNode, NodeEvent, NodeHandle, PeerLink};
use crate::notice::Notice;
use crate::protocol::Envelope;
use crate::utils;

const HELP: &str = "Commands: /file <path>, /files, /save <fileId>, /status, /quit (end a line with \\ to continue it)";

/// Who to chat with, as passed from the contacts page
#[derive(Debug, Clone)]
pub struct ChatTarget {
    pub peer_id: String,
    pub username: Option<String>,
}

impl ChatTarget {
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown Contact")
    }
}

/// Things that happen outside the node: timers and the outgoing transfer
#[derive(Debug)]
enum PageEvent {
    Timer(Timer),
    PingFailed(PeerChatError),
    MessageFailed(PeerChatError),
    SendProgress(Percent),
    SendFinished {
        file: Box<OutgoingFile>,
        result: Result<u64>,
    },
}

/// The chat page: one contact, one data channel
pub struct ChatPage {
    config: AppConfig,
    node: NodeHandle,
    link: PeerLink,
    target: ChatTarget,
    session: ChatSession,
    supervisor: Supervisor,
    typing: TypingNotifier,
    /// Lines of a message still being written
    draft: String,
    shown_status: Option<ConnectionStatus>,
    page_tx: mpsc::UnboundedSender<PageEvent>,
    page_rx: mpsc::UnboundedReceiver<PageEvent>,
    sending: Option<ProgressBar>,
    receiving: Option<ProgressBar>,
}

impl ChatPage {
    pub fn new(config: AppConfig, node: NodeHandle, target: ChatTarget) -> Self {
        let (page_tx, page_rx) = mpsc::unbounded_channel();
        Self {
            link: node.link(&target.peer_id),
            session: ChatSession::new(config.download_dir_path()),
            typing: TypingNotifier::new(config.timing.typing_idle()),
            supervisor: Supervisor::new(&config.timing),
            draft: String::new(),
            shown_status: None,
            config,
            node,
            target,
            page_tx,
            page_rx,
            sending: None,
            receiving: None,
        }
    }

    /// Run until `/quit`, end of input or ctrl-c
    pub async fn run(mut self, node: ChatNode) -> Result<()> {
        let ChatNode { mut events, task, .. } = node;

        println!(
            "Chatting with {} (Peer ID: {}) as {}",
            self.target.display_name(),
            self.target.peer_id,
            self.node.username()
        );
        println!("{}", HELP);

        let mut liveness = tokio::time::interval(self.config.timing.liveness_interval());
        // The first tick completes immediately
        liveness.tick().await;

        self.connect().await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let typing_deadline = self.typing.deadline();
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !self.on_input(line).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading input: {}", e);
                        break;
                    }
                },
                event = events.recv() => match event {
                    Some(event) => self.on_node_event(event).await,
                    None => {
                        error!("Node stopped unexpectedly");
                        break;
                    }
                },
                Some(event) = self.page_rx.recv() => self.on_page_event(event).await,
                _ = liveness.tick() => self.on_liveness().await,
                _ = sleep_until(typing_deadline.unwrap_or_else(Instant::now)), if typing_deadline.is_some() => {
                    if let Some(envelope) = self.typing.poll(Instant::now()) {
                        self.send_detached(envelope);
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        info!("Leaving chat with {}", self.target.peer_id);
        self.node.shutdown();
        let _ = task.await;
        Ok(())
    }

    async fn connect(&mut self) {
        let already_connected = self.target_connected().await;
        let actions = self.supervisor.connect(already_connected);
        self.apply(actions);
    }

    async fn target_connected(&self) -> bool {
        self.node.is_connected(&self.target.peer_id).await.unwrap_or(false)
    }

    /// Carry out what the supervisor decided
    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Dial => {
                    info!("Connecting to {}", self.target.peer_id);
                    if let Err(e) = self.node.dial(&self.target.peer_id) {
                        error!("Error connecting to peer: {}", e);
                        view::print_notice(&Notice::error(format!("Connection error: {}", e)));
                    }
                }
                Action::Schedule(delay, timer) => self.schedule(delay, PageEvent::Timer(timer)),
                Action::Notify(notice) => view::print_notice(&notice),
                Action::Disconnect => {
                    let _ = self.node.disconnect(&self.target.peer_id);
                }
                Action::Ping => self.send_ping(),
                Action::GoOnline => {
                    self.session.set_online(true);
                }
                Action::GoOffline => {
                    self.typing.reset();
                    self.drop_partial_transfer();
                }
            }
        }
        self.refresh_status();
    }

    async fn on_node_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Listening(addr) => debug!("Listening on {}", addr),
            NodeEvent::Connected { username, .. } if username == self.target.peer_id => {
                info!("Connection opened with {}", username);
                let actions = self.supervisor.on_open();
                self.apply(actions);
            }
            NodeEvent::Connected { username, .. } => {
                debug!("Closing connection from {}, not the active chat", username);
                let _ = self.node.disconnect(&username);
            }
            NodeEvent::Disconnected { username } if username == self.target.peer_id => {
                let actions = self.supervisor.on_closed();
                self.apply(actions);
            }
            NodeEvent::Disconnected { .. } => {}
            NodeEvent::Envelope { username, incoming } => {
                if username != self.target.peer_id {
                    debug!("Dropping data from {}", username);
                    return;
                }
                let outcome = self.session.handle(incoming);
                for reply in outcome.replies {
                    self.send_detached(reply);
                }
                for event in outcome.events {
                    self.render(event);
                }
            }
            NodeEvent::DialFailed { username, kind } if username == self.target.peer_id => {
                error!("Peer error: {}", kind.as_str());
                let actions = self.supervisor.on_dial_error(&kind);
                self.apply(actions);
            }
            NodeEvent::DialFailed { .. } => {}
        }
    }

    async fn on_page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::Timer(timer) => {
                let already_connected = self.target_connected().await;
                let actions = self.supervisor.on_timer(timer, already_connected);
                self.apply(actions);
            }
            PageEvent::PingFailed(e) => {
                error!("Error sending ping: {}", e);
                let actions = self.supervisor.on_ping_failed();
                self.apply(actions);
            }
            PageEvent::MessageFailed(e) => {
                error!("Error sending message: {}", e);
                view::print_notice(&Notice::error(format!("Error sending message: {}", e)));
            }
            PageEvent::SendProgress(percent) => {
                if let Some(bar) = &self.sending {
                    bar.set_position(percent.value() as u64);
                }
            }
            PageEvent::SendFinished { file, result } => {
                let bar = self.sending.take();
                match result {
                    Ok(chunks) => {
                        info!("File {} sent in {} chunks", file.meta.name, chunks);
                        if let Some(bar) = bar {
                            bar.finish_with_message(format!("Sent {}", file.meta.name));
                        }
                        self.session.register_sent_file(&file);
                        view::print_notice(&Notice::success(format!("File \"{}\" sent", file.meta.name)));
                    }
                    Err(e) => {
                        error!("Error sending file: {}", e);
                        if let Some(bar) = bar {
                            bar.abandon();
                        }
                        let text = match e {
                            PeerChatError::Transfer(reason) => reason,
                            other => format!("Error sending file: {}", other),
                        };
                        view::print_notice(&Notice::error(text));
                    }
                }
            }
        }
    }

    async fn on_liveness(&mut self) {
        if !self.supervisor.lifecycle().is_open() {
            debug!("No open connection, reconnecting");
        }
        let already_connected = self.target_connected().await;
        let actions = self.supervisor.on_liveness_tick(already_connected);
        self.apply(actions);
    }

    fn send_ping(&mut self) {
        let ping = self.session.ping();
        match self.node.enqueue(&self.target.peer_id, &ping) {
            Ok(ticket) => {
                let page_tx = self.page_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = ticket.acked().await {
                        let _ = page_tx.send(PageEvent::PingFailed(e));
                    }
                });
            }
            Err(e) => {
                let _ = self.page_tx.send(PageEvent::PingFailed(e));
            }
        }
    }

    fn drop_partial_transfer(&mut self) {
        if let Some(file_id) = self.session.set_online(false) {
            warn!("Incoming file {} was interrupted", file_id);
            if let Some(bar) = self.receiving.take() {
                bar.abandon_with_message("Transfer interrupted");
            }
        }
    }

    /// Returns false when the page should close
    async fn on_input(&mut self, line: String) -> bool {
        let line = line.trim();
        if let Some(command) = line.strip_prefix('/') {
            let (command, arg) = match command.split_once(' ') {
                Some((command, arg)) => (command, arg.trim()),
                None => (command, ""),
            };
            match command {
                "quit" => return false,
                "file" if !arg.is_empty() => self.start_file_send(Path::new(arg)).await,
                "files" => self.list_files(),
                "save" if !arg.is_empty() => self.save_file(arg).await,
                "status" => self.print_status(),
                _ => println!("{}", HELP),
            }
            return true;
        }

        if let Some(partial) = line.strip_suffix('\\') {
            self.draft.push_str(partial);
            self.draft.push('\n');
            if self.supervisor.lifecycle().can_send() {
                let typing = self.typing.on_input(Instant::now());
                self.send_detached(typing);
            }
            return true;
        }

        let mut content = std::mem::take(&mut self.draft);
        content.push_str(line);
        if let Some(stop) = self.typing.finish() {
            self.send_detached(stop);
        }
        self.send_message(content.trim());
        true
    }

    fn send_message(&mut self, content: &str) {
        if !self.supervisor.lifecycle().can_send() && !content.is_empty() {
            view::print_notice(&Notice::error("No active connection to send message"));
            return;
        }
        let envelope = match self.session.compose_message(content) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return,
            Err(e) => {
                error!("Cannot send message: {}", e);
                view::print_notice(&Notice::error("No active connection to send message"));
                return;
            }
        };

        if let Envelope::Message { timestamp, .. } = &envelope {
            println!("[{}] You: {}", view::format_time(*timestamp), content);
        }
        let ticket = match self.node.enqueue(&self.target.peer_id, &envelope) {
            Ok(ticket) => ticket,
            Err(e) => {
                let _ = self.page_tx.send(PageEvent::MessageFailed(e));
                return;
            }
        };
        let page_tx = self.page_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = ticket.acked().await {
                let _ = page_tx.send(PageEvent::MessageFailed(e));
            }
        });
    }

    async fn start_file_send(&mut self, path: &Path) {
        if !self.supervisor.lifecycle().can_send() {
            view::print_notice(&Notice::error("No active connection to send file"));
            return;
        }
        if self.sending.is_some() {
            view::print_notice(&Notice::error("A file is already being sent"));
            return;
        }

        let file = match OutgoingFile::open(path).await {
            Ok(file) => file,
            Err(e) => {
                error!("Error reading file: {}", e);
                view::print_notice(&Notice::error(format!("Error reading file: {}", e)));
                return;
            }
        };

        println!(
            "Sending {} ({})",
            file.meta.name,
            utils::format_file_size(file.meta.size)
        );
        self.sending = Some(view::transfer_bar(&format!("Sending: {}", file.meta.name)));

        let link = self.link.clone();
        let options = self.config.send_options();
        let page_tx = self.page_tx.clone();
        tokio::spawn(async move {
            let progress_tx = page_tx.clone();
            let result = send_file(&link, &file, &options, move |percent| {
                let _ = progress_tx.send(PageEvent::SendProgress(percent));
            })
            .await;
            let _ = page_tx.send(PageEvent::SendFinished {
                file: Box::new(file),
                result,
            });
        });
    }

    fn list_files(&self) {
        let files = self.session.files();
        if files.is_empty() {
            println!("No files exchanged yet.");
            return;
        }
        for (file_id, file) in files.iter() {
            println!("{}", view::file_line(file_id, file));
        }
    }

    async fn save_file(&self, file_id: &str) {
        match self.session.files().save(file_id).await {
            Ok(path) => view::print_notice(&Notice::success(format!("Saved to {}", path.display()))),
            Err(e) => {
                error!("Error saving file {}: {}", file_id, e);
                let text = match e {
                    PeerChatError::Transfer(reason) => reason,
                    other => other.to_string(),
                };
                view::print_notice(&Notice::error(text));
            }
        }
    }

    fn render(&mut self, event: SessionEvent) {
        let name = self.target.display_name().to_string();
        match event {
            SessionEvent::Message { content, timestamp, .. } => {
                println!("[{}] {}: {}", view::format_time(timestamp), name, content);
            }
            SessionEvent::PeerTyping(true) => println!("{} is typing...", name),
            SessionEvent::PeerTyping(false) => {}
            SessionEvent::FileOffered { file_id, meta, .. } => {
                println!(
                    "{} is sending {} ({}) [{}]",
                    name,
                    meta.name,
                    utils::format_file_size(meta.size),
                    file_id
                );
            }
            SessionEvent::FileProgress(progress) => {
                if progress.started || self.receiving.is_none() {
                    if let Some(old) = self.receiving.take() {
                        old.abandon();
                    }
                    self.receiving = Some(view::transfer_bar("Receiving file"));
                }
                if let Some(bar) = &self.receiving {
                    bar.set_position(progress.percent.value() as u64);
                }
            }
            SessionEvent::FileReceived { file_id, meta, kind } => {
                if let Some(bar) = self.receiving.take() {
                    bar.finish_with_message(format!("Received {}", meta.name));
                }
                println!(
                    "{} {} ({}) received as [{}], use /save {} to download",
                    kind.icon(),
                    meta.name,
                    utils::format_file_size(meta.size),
                    file_id,
                    file_id
                );
            }
            SessionEvent::MessageRead { message_id } => {
                if let Some(message) = self.session.sent_messages().iter().find(|m| m.message_id == message_id) {
                    println!("  ✓✓ read: {}", message.content);
                }
            }
            SessionEvent::Pong { .. } => debug!("Received pong from {}", name),
            SessionEvent::Notice(notice) => view::print_notice(&notice),
        }
    }

    fn print_status(&mut self) {
        let status = self.supervisor.lifecycle().status();
        self.shown_status = Some(status);
        println!("[{}] {}", status, self.target.display_name());
    }

    fn refresh_status(&mut self) {
        if self.shown_status != Some(self.supervisor.lifecycle().status()) {
            self.print_status();
        }
    }

    /// Queue a control envelope behind everything already sent to the peer
    fn send_detached(&self, envelope: Envelope) {
        if !self.supervisor.lifecycle().is_open() {
            return;
        }
        let tag = envelope.tag();
        let peer_id = self.target.peer_id.clone();
        let ticket = match self.node.enqueue(&peer_id, &envelope) {
            Ok(ticket) => ticket,
            Err(e) => {
                debug!("Could not send {} to {}: {}", tag, peer_id, e);
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = ticket.acked().await {
                debug!("Could not send {} to {}: {}", tag, peer_id, e);
            }
        });
    }

    fn schedule(&self, delay: Duration, event: PageEvent) {
        let page_tx = self.page_tx.clone();
        let deadline = Instant::now() + delay;
        tokio::spawn(async move {
            sleep_until(deadline).await;
            let _ = page_tx.send(event);
        });
    }
}
