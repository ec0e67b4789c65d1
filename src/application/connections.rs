use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use super::view;
use crate::chat::TIMEOUT_MESSAGE;
use crate::contacts::ConnectionsService;
use crate::error::{PeerChatError, Result};
use crate::network::{ChatNode, NodeEvent, NodeHandle};
use crate::notice::{Notice, NoticeLevel};

const HANG_UP_DELAY: Duration = Duration::from_millis(1000);
const HELP: &str = "Commands: /contacts, /requests, /request <peer>, /accept <peer>, /reject <peer>, /quit";

/// The contacts and requests page
pub struct ConnectionsPage {
    service: ConnectionsService,
}

impl ConnectionsPage {
    pub fn new(service: ConnectionsService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &ConnectionsService {
        &self.service
    }

    pub async fn contacts_view(&self) -> Result<String> {
        Ok(view::contacts_list(&self.service.contacts().await?))
    }

    pub async fn requests_view(&self) -> Result<String> {
        Ok(view::requests_list(&self.service.requests().await?))
    }

    pub async fn send_request(&self, peer_id: &str) -> Result<Notice> {
        self.service.send_request(peer_id).await?;
        Ok(Notice::success(format!("Connection request sent to {}", peer_id.trim())))
    }

    pub async fn accept(&self, peer_id: &str) -> Notice {
        match self.service.accept(peer_id).await {
            Ok(contact) => Notice::success(format!(
                "Connection request from {} accepted",
                contact.display_name()
            )),
            Err(e) => {
                error!("Error accepting request: {}", e);
                Notice::error(e.to_string())
            }
        }
    }

    pub async fn reject(&self, peer_id: &str) -> Notice {
        match self.service.reject(peer_id).await {
            Ok(request) => Notice::info(format!(
                "Connection request from {} rejected",
                request.display_name()
            )),
            Err(e) => {
                error!("Error rejecting request: {}", e);
                Notice::error(e.to_string())
            }
        }
    }

    /// A peer connected to our listening node
    pub async fn on_incoming_connection(&self, username: &str) -> Option<Notice> {
        match self.service.record_incoming(username).await {
            Ok(Some(request)) => Some(Notice::info(format!(
                "New connection request from {}",
                request.display_name()
            ))),
            Ok(None) => None,
            Err(e) => {
                error!("Error recording connection request from {}: {}", username, e);
                None
            }
        }
    }

    /// Keep a node up, record incoming requests and take page commands from stdin
    pub async fn listen(&self, node: ChatNode) -> Result<()> {
        let ChatNode {
            handle,
            mut events,
            task,
        } = node;
        println!("Your Peer ID: {}", handle.username());
        println!("{}", self.requests_view().await?);
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if !self.on_command(&handle, line.trim()).await {
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
                    Some(event) => self.on_node_event(&handle, event).await,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        handle.shutdown();
        let _ = task.await;
        Ok(())
    }

    async fn on_node_event(&self, node: &NodeHandle, event: NodeEvent) {
        match event {
            NodeEvent::Listening(addr) => info!("Accepting connections on {}", addr),
            NodeEvent::Connected { username, inbound } => {
                if inbound {
                    if let Some(notice) = self.on_incoming_connection(&username).await {
                        view::print_notice(&notice);
                    }
                }
                // This page never keeps a data channel open; give identify a moment first
                let node = node.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(HANG_UP_DELAY).await;
                    if let Err(e) = node.disconnect(&username) {
                        warn!("Could not close connection to {}: {}", username, e);
                    }
                });
            }
            NodeEvent::Envelope { username, .. } => {
                debug!("Ignoring data from {} on the connections page", username);
            }
            NodeEvent::Disconnected { .. } | NodeEvent::DialFailed { .. } => {}
        }
    }

    /// Returns false when the page should close
    async fn on_command(&self, node: &NodeHandle, line: &str) -> bool {
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        let output = match (command, arg.is_empty()) {
            ("", _) => return true,
            ("/quit", _) => return false,
            ("/contacts", _) => self.contacts_view().await.unwrap_or_else(|e| e.to_string()),
            ("/requests", _) => self.requests_view().await.unwrap_or_else(|e| e.to_string()),
            ("/request", false) => match self.send_request(arg).await {
                Ok(notice) => notice.to_string(),
                Err(PeerChatError::UserNotFound) => match node.dial(arg) {
                    Ok(()) => Notice::info(format!("Knocking on {}", arg)).to_string(),
                    Err(e) => Notice::error(e.to_string()).to_string(),
                },
                Err(e) => Notice::error(e.to_string()).to_string(),
            },
            ("/accept", false) => {
                let notice = self.accept(arg).await;
                if notice.level == NoticeLevel::Success {
                    self.knock_back(node, arg).await;
                }
                notice.to_string()
            }
            ("/reject", false) => self.reject(arg).await.to_string(),
            _ => HELP.to_string(),
        };
        println!("{}", output);
        true
    }

    /// The accepted user lives in another database; let their page record us
    async fn knock_back(&self, node: &NodeHandle, peer_id: &str) {
        match self.service.find_user_id(peer_id).await {
            Ok(None) => {
                if let Err(e) = node.dial(peer_id) {
                    warn!("Could not notify {}: {}", peer_id, e);
                }
            }
            Ok(Some(_)) => {}
            Err(e) => warn!("Could not look up {}: {}", peer_id, e),
        }
    }
}

/// Connect to `peer_id` only so that its listening page records a request
pub async fn knock(node: ChatNode, peer_id: &str, timeout: Duration) -> Notice {
    let ChatNode {
        handle,
        mut events,
        task,
    } = node;

    let notice = match handle.dial(peer_id) {
        Err(e) => Notice::error(e.to_string()),
        Ok(()) => {
            let wait = async {
                while let Some(event) = events.recv().await {
                    match event {
                        NodeEvent::Connected { username, .. } if username == peer_id => {
                            return Notice::success(format!("Connection request sent to {}", peer_id));
                        }
                        NodeEvent::DialFailed { username, kind } if username == peer_id => {
                            return Notice::error(kind.message());
                        }
                        _ => {}
                    }
                }
                Notice::error(PeerChatError::NodeClosed.to_string())
            };
            tokio::time::timeout(timeout, wait)
                .await
                .unwrap_or_else(|_| Notice::error(TIMEOUT_MESSAGE))
        }
    };

    // Let identify finish on the far side before hanging up
    tokio::time::sleep(HANG_UP_DELAY).await;
    handle.shutdown();
    let _ = task.await;
    notice
}
