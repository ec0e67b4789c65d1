use futures::StreamExt;
use libp2p::{
    identify, mdns, noise, request_response,
    swarm::{
        dial_opts::{DialOpts, PeerCondition},
        DialError, SwarmEvent,
    },
    tcp, yamux, Multiaddr, PeerId, Swarm, SwarmBuilder,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::behaviour::{ChatBehaviour, ChatBehaviourEvent};
use super::config::NetworkConfig;
use super::handle::NodeHandle;
use super::identity::{keypair_for, peer_id_for, verify_agent};
use crate::chat::PeerErrorKind;
use crate::error::{PeerChatError, Result};
use crate::protocol::{Ack, Frame, Incoming};

/// Commands accepted by the node task
#[derive(Debug)]
pub enum NodeCommand {
    Dial {
        peer_id: PeerId,
        username: String,
    },
    Send {
        peer_id: PeerId,
        frame: Frame,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        peer_id: PeerId,
    },
    IsConnected {
        peer_id: PeerId,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// What the node reports back
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Listening(Multiaddr),
    /// A peer's username is known and its data channel can be used
    Connected { username: String, inbound: bool },
    Disconnected { username: String },
    Envelope { username: String, incoming: Incoming },
    DialFailed { username: String, kind: PeerErrorKind },
}

/// A running node: a handle for commands and the stream of its events
pub struct ChatNode {
    pub handle: NodeHandle,
    pub events: mpsc::UnboundedReceiver<NodeEvent>,
    pub task: JoinHandle<()>,
}

impl ChatNode {
    /// Build the swarm for `username` and spawn its event loop
    pub async fn start(username: &str, config: &NetworkConfig) -> Result<Self> {
        let keypair = keypair_for(username)?;
        let local_peer_id = keypair.public().to_peer_id();
        info!("Local peer id for {}: {}", username, local_peer_id);

        let behaviour = ChatBehaviour::new(&keypair, username, config.enable_mdns)?;
        let idle_timeout = Duration::from_secs(config.idle_timeout_secs);

        let mut swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                tcp::Config::default().nodelay(true),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| PeerChatError::Network(format!("Failed to build transport: {}", e)))?
            .with_dns()
            .map_err(|e| PeerChatError::Network(format!("Failed to enable DNS: {}", e)))?
            .with_behaviour(|_| behaviour)
            .map_err(|e| PeerChatError::Network(format!("Failed to build behaviour: {}", e)))?
            .with_swarm_config(|c| c.with_idle_connection_timeout(idle_timeout))
            .build();

        let listen_addr = config.listen_multiaddr();
        swarm
            .listen_on(listen_addr.clone())
            .map_err(|e| PeerChatError::Network(format!("Failed to listen on {}: {}", listen_addr, e)))?;

        let mut names = HashMap::new();
        for (name, addrs) in &config.known_peers {
            let Ok(peer_id) = peer_id_for(name) else {
                warn!("Ignoring known peer with invalid username {}", name);
                continue;
            };
            names.insert(peer_id, name.clone());
            for addr in addrs {
                match addr.parse::<Multiaddr>() {
                    Ok(addr) => {
                        swarm.add_peer_address(peer_id, addr);
                    }
                    Err(e) => warn!("Ignoring address {} for {}: {}", addr, name, e),
                }
            }
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let state = NodeState {
            names,
            ..NodeState::default()
        };
        let task = tokio::spawn(run_swarm_task(swarm, command_rx, event_tx, state));

        Ok(Self {
            handle: NodeHandle::new(command_tx, local_peer_id, username.to_string()),
            events: event_rx,
            task,
        })
    }
}

#[derive(Default)]
struct NodeState {
    /// Usernames for peer ids, from dials, config and verified identify
    names: HashMap<PeerId, String>,
    /// Peers reported as connected
    announced: HashSet<PeerId>,
    /// Direction of the first connection to each peer
    inbound: HashMap<PeerId, bool>,
    /// Frames that arrived before the sender was identified
    early_frames: HashMap<PeerId, Vec<Frame>>,
    /// Dials waiting for an outcome
    dialing: HashSet<PeerId>,
    /// Frames waiting for the previous frame to the same peer to be acknowledged
    outbound: HashMap<PeerId, VecDeque<QueuedFrame>>,
    /// The one unacknowledged frame per peer
    in_flight: HashMap<request_response::OutboundRequestId, (PeerId, oneshot::Sender<Result<()>>)>,
    busy: HashSet<PeerId>,
}

type QueuedFrame = (Frame, oneshot::Sender<Result<()>>);

/// Main swarm task that handles all swarm operations
async fn run_swarm_task(
    mut swarm: Swarm<ChatBehaviour>,
    mut command_rx: mpsc::UnboundedReceiver<NodeCommand>,
    event_tx: mpsc::UnboundedSender<NodeEvent>,
    mut state: NodeState,
) {
    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(NodeCommand::Shutdown) | None => {
                    info!("Node shutting down");
                    break;
                }
                Some(command) => handle_command(&mut swarm, &mut state, &event_tx, command),
            },
            event = swarm.select_next_some() => {
                handle_swarm_event(&mut swarm, &mut state, &event_tx, event);
            }
        }
    }
}

fn handle_command(
    swarm: &mut Swarm<ChatBehaviour>,
    state: &mut NodeState,
    event_tx: &mpsc::UnboundedSender<NodeEvent>,
    command: NodeCommand,
) {
    match command {
        NodeCommand::Dial { peer_id, username } => {
            state.names.insert(peer_id, username.clone());
            if swarm.is_connected(&peer_id) {
                debug!("Already connected to {}", username);
                announce(state, event_tx, peer_id);
                return;
            }

            let opts = DialOpts::peer_id(peer_id)
                .condition(PeerCondition::DisconnectedAndNotDialing)
                .build();
            match swarm.dial(opts) {
                Ok(()) => {
                    info!("Dialing {} ({})", username, peer_id);
                    state.dialing.insert(peer_id);
                }
                Err(DialError::DialPeerConditionFalse(_)) => debug!("Dial to {} already in progress", username),
                Err(e) => {
                    warn!("Failed to dial {}: {}", username, e);
                    let _ = event_tx.send(NodeEvent::DialFailed {
                        username,
                        kind: classify_dial_error(&e),
                    });
                }
            }
        }
        NodeCommand::Send { peer_id, frame, reply } => {
            if !swarm.is_connected(&peer_id) {
                let _ = reply.send(Err(PeerChatError::NotConnected));
                return;
            }
            state.outbound.entry(peer_id).or_default().push_back((frame, reply));
            pump(swarm, state, peer_id);
        }
        NodeCommand::Disconnect { peer_id } => {
            if swarm.disconnect_peer_id(peer_id).is_err() {
                debug!("Disconnect requested for {} which is not connected", peer_id);
            }
        }
        NodeCommand::IsConnected { peer_id, reply } => {
            let _ = reply.send(swarm.is_connected(&peer_id) && state.announced.contains(&peer_id));
        }
        NodeCommand::Shutdown => {}
    }
}

fn handle_swarm_event(
    swarm: &mut Swarm<ChatBehaviour>,
    state: &mut NodeState,
    event_tx: &mpsc::UnboundedSender<NodeEvent>,
    event: SwarmEvent<ChatBehaviourEvent>,
) {
    match event {
        SwarmEvent::NewListenAddr { address, .. } => {
            info!("Listening on {}", address);
            let _ = event_tx.send(NodeEvent::Listening(address));
        }
        SwarmEvent::ConnectionEstablished {
            peer_id,
            endpoint,
            num_established,
            ..
        } => {
            info!("Connected to peer {} via {}", peer_id, endpoint.get_remote_address());
            state.dialing.remove(&peer_id);
            if num_established.get() == 1 {
                state.inbound.insert(peer_id, endpoint.is_listener());
            }
            // Peers we dialed are known by name; others wait for identify
            if endpoint.is_dialer() && state.names.contains_key(&peer_id) {
                announce(state, event_tx, peer_id);
            }
        }
        SwarmEvent::ConnectionClosed {
            peer_id,
            num_established,
            cause,
            ..
        } => {
            debug!("Connection to {} closed: {:?}", peer_id, cause);
            if num_established == 0 {
                state.inbound.remove(&peer_id);
                state.early_frames.remove(&peer_id);
                fail_queued(state, peer_id);
                if state.announced.remove(&peer_id) {
                    if let Some(username) = state.names.get(&peer_id) {
                        info!("Disconnected from {}", username);
                        let _ = event_tx.send(NodeEvent::Disconnected {
                            username: username.clone(),
                        });
                    }
                }
            }
        }
        SwarmEvent::OutgoingConnectionError {
            peer_id: Some(peer_id),
            error,
            ..
        } => {
            if !state.dialing.remove(&peer_id) || swarm.is_connected(&peer_id) {
                return;
            }
            let username = state.names.get(&peer_id).cloned().unwrap_or_else(|| peer_id.to_string());
            warn!("Failed to connect to {}: {}", username, error);
            let _ = event_tx.send(NodeEvent::DialFailed {
                username,
                kind: classify_dial_error(&error),
            });
        }
        SwarmEvent::Behaviour(ChatBehaviourEvent::Chat(event)) => handle_chat_event(swarm, state, event_tx, event),
        SwarmEvent::Behaviour(ChatBehaviourEvent::Identify(event)) => handle_identify_event(swarm, state, event_tx, event),
        SwarmEvent::Behaviour(ChatBehaviourEvent::Mdns(event)) => handle_mdns_event(swarm, event),
        _ => {}
    }
}

fn handle_chat_event(
    swarm: &mut Swarm<ChatBehaviour>,
    state: &mut NodeState,
    event_tx: &mpsc::UnboundedSender<NodeEvent>,
    event: request_response::Event<Frame, Ack>,
) {
    match event {
        request_response::Event::Message { peer, message, .. } => match message {
            request_response::Message::Request { request, channel, .. } => {
                if swarm.behaviour_mut().chat.send_response(channel, Ack).is_err() {
                    debug!("Could not acknowledge frame from {}", peer);
                }
                if state.announced.contains(&peer) {
                    deliver(state, event_tx, peer, request);
                } else {
                    debug!("Buffering frame from unidentified peer {}", peer);
                    state.early_frames.entry(peer).or_default().push(request);
                }
            }
            request_response::Message::Response { request_id, .. } => {
                if let Some((peer, reply)) = state.in_flight.remove(&request_id) {
                    let _ = reply.send(Ok(()));
                    state.busy.remove(&peer);
                    pump(swarm, state, peer);
                }
            }
        },
        request_response::Event::OutboundFailure {
            peer,
            request_id,
            error,
            ..
        } => {
            warn!("Outbound failure to {}: {}", peer, error);
            if let Some((peer, reply)) = state.in_flight.remove(&request_id) {
                let err = match error {
                    request_response::OutboundFailure::DialFailure
                    | request_response::OutboundFailure::ConnectionClosed => PeerChatError::NotConnected,
                    other => PeerChatError::Network(other.to_string()),
                };
                let _ = reply.send(Err(err));
                state.busy.remove(&peer);
                pump(swarm, state, peer);
            }
        }
        request_response::Event::InboundFailure { peer, error, .. } => {
            warn!("Inbound failure from {}: {}", peer, error);
        }
        request_response::Event::ResponseSent { .. } => {}
    }
}

fn handle_identify_event(
    swarm: &mut Swarm<ChatBehaviour>,
    state: &mut NodeState,
    event_tx: &mpsc::UnboundedSender<NodeEvent>,
    event: identify::Event,
) {
    if let identify::Event::Received { peer_id, info, .. } = event {
        match verify_agent(&peer_id, &info.agent_version) {
            Some(username) => {
                debug!("Identified {} as {}", peer_id, username);
                state.names.insert(peer_id, username);
                announce(state, event_tx, peer_id);
            }
            None => {
                warn!(
                    "Peer {} announced {:?} which does not match its identity; disconnecting",
                    peer_id, info.agent_version
                );
                let _ = swarm.disconnect_peer_id(peer_id);
            }
        }
    }
}

fn handle_mdns_event(swarm: &mut Swarm<ChatBehaviour>, event: mdns::Event) {
    match event {
        mdns::Event::Discovered(list) => {
            for (peer_id, addr) in list {
                debug!("mDNS discovered peer {} at {}", peer_id, addr);
                swarm.add_peer_address(peer_id, addr);
            }
        }
        mdns::Event::Expired(list) => {
            for (peer_id, addr) in list {
                debug!("mDNS peer expired: {} at {}", peer_id, addr);
            }
        }
    }
}

/// Put the next queued frame for `peer` on the wire.
///
/// Only one frame per peer is outstanding, so frames arrive in the order
/// they were queued.
fn pump(swarm: &mut Swarm<ChatBehaviour>, state: &mut NodeState, peer: PeerId) {
    if state.busy.contains(&peer) {
        return;
    }
    if !swarm.is_connected(&peer) {
        fail_queued(state, peer);
        return;
    }
    let Some((frame, reply)) = state.outbound.get_mut(&peer).and_then(VecDeque::pop_front) else {
        state.outbound.remove(&peer);
        return;
    };
    let request_id = swarm.behaviour_mut().chat.send_request(&peer, frame);
    state.in_flight.insert(request_id, (peer, reply));
    state.busy.insert(peer);
}

fn fail_queued(state: &mut NodeState, peer: PeerId) {
    for (_, reply) in state.outbound.remove(&peer).unwrap_or_default() {
        let _ = reply.send(Err(PeerChatError::NotConnected));
    }
}

/// Report `peer` as connected once, then flush frames it sent early
fn announce(state: &mut NodeState, event_tx: &mpsc::UnboundedSender<NodeEvent>, peer: PeerId) {
    let Some(username) = state.names.get(&peer).cloned() else {
        return;
    };
    if state.announced.insert(peer) {
        let inbound = state.inbound.get(&peer).copied().unwrap_or(false);
        info!("Peer {} is ready ({})", username, if inbound { "inbound" } else { "outbound" });
        let _ = event_tx.send(NodeEvent::Connected { username, inbound });
    }
    for frame in state.early_frames.remove(&peer).unwrap_or_default() {
        deliver(state, event_tx, peer, frame);
    }
}

fn deliver(state: &NodeState, event_tx: &mpsc::UnboundedSender<NodeEvent>, peer: PeerId, frame: Frame) {
    let Some(username) = state.names.get(&peer) else {
        return;
    };
    match frame.decode() {
        Ok(incoming) => {
            let _ = event_tx.send(NodeEvent::Envelope {
                username: username.clone(),
                incoming,
            });
        }
        Err(e) => error!("Error processing data from {}: {}", username, e),
    }
}

/// Map a dial failure onto the error kinds shown to the user
pub fn classify_dial_error(error: &DialError) -> PeerErrorKind {
    match error {
        DialError::NoAddresses | DialError::Transport(_) => PeerErrorKind::PeerUnavailable,
        DialError::Aborted => PeerErrorKind::Network,
        DialError::WrongPeerId { .. } => PeerErrorKind::Other("wrong-peer-id".to_string()),
        DialError::LocalPeerId { .. } => PeerErrorKind::Other("local-peer-id".to_string()),
        DialError::Denied { .. } => PeerErrorKind::Other("denied".to_string()),
        DialError::DialPeerConditionFalse(_) => PeerErrorKind::Other("already-dialing".to_string()),
    }
}
