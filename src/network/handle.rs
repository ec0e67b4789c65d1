use async_trait::async_trait;
use libp2p::PeerId;
use tokio::sync::{mpsc, oneshot};

use super::identity::peer_id_for;
use super::node::NodeCommand;
use crate::error::{PeerChatError, Result};
use crate::file_transfer::EnvelopeSink;
use crate::protocol::{Envelope, Frame};

/// Cloneable handle to a running node
#[derive(Clone, Debug)]
pub struct NodeHandle {
    commands: mpsc::UnboundedSender<NodeCommand>,
    local_peer_id: PeerId,
    username: String,
}

impl NodeHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<NodeCommand>, local_peer_id: PeerId, username: String) -> Self {
        Self {
            commands,
            local_peer_id,
            username,
        }
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Start connecting to `username`; the outcome arrives as a node event
    pub fn dial(&self, username: &str) -> Result<()> {
        let peer_id = peer_id_for(username)?;
        self.command(NodeCommand::Dial {
            peer_id,
            username: username.to_string(),
        })
    }

    /// Queue one envelope for `username` without waiting.
    ///
    /// Envelopes queued to the same peer reach it in queue order.
    pub fn enqueue(&self, username: &str, envelope: &Envelope) -> Result<SendTicket> {
        let peer_id = peer_id_for(username)?;
        let frame = Frame::from_envelope(envelope)?;
        let (reply, response) = oneshot::channel();
        self.command(NodeCommand::Send { peer_id, frame, reply })?;
        Ok(SendTicket { response })
    }

    /// Deliver one envelope and wait for the peer's acknowledgement
    pub async fn send(&self, username: &str, envelope: &Envelope) -> Result<()> {
        self.enqueue(username, envelope)?.acked().await
    }

    pub fn disconnect(&self, username: &str) -> Result<()> {
        let peer_id = peer_id_for(username)?;
        self.command(NodeCommand::Disconnect { peer_id })
    }

    /// True when `username` is connected and identified
    pub async fn is_connected(&self, username: &str) -> Result<bool> {
        let peer_id = peer_id_for(username)?;
        let (reply, response) = oneshot::channel();
        self.command(NodeCommand::IsConnected { peer_id, reply })?;
        response.await.map_err(|_| PeerChatError::NodeClosed)
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(NodeCommand::Shutdown);
    }

    /// Data channel to one peer
    pub fn link(&self, username: &str) -> PeerLink {
        PeerLink {
            node: self.clone(),
            username: username.to_string(),
        }
    }

    fn command(&self, command: NodeCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| PeerChatError::NodeClosed)
    }
}

/// Outcome of a queued envelope
#[derive(Debug)]
pub struct SendTicket {
    response: oneshot::Receiver<Result<()>>,
}

impl SendTicket {
    /// Wait until the peer acknowledges the envelope
    pub async fn acked(self) -> Result<()> {
        self.response.await.map_err(|_| PeerChatError::NodeClosed)?
    }
}

/// The data channel to one peer, usable as a transfer sink
#[derive(Clone, Debug)]
pub struct PeerLink {
    node: NodeHandle,
    username: String,
}

impl PeerLink {
    pub fn username(&self) -> &str {
        &self.username
    }
}

#[async_trait]
impl EnvelopeSink for PeerLink {
    async fn send(&self, envelope: Envelope) -> Result<()> {
        self.node.send(&self.username, &envelope).await
    }
}
