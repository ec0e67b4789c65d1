use libp2p::{
    identify, identity, mdns, request_response,
    swarm::{behaviour::toggle::Toggle, NetworkBehaviour},
};
use std::time::Duration;

use super::identity::agent_version;
use crate::error::PeerChatError;
use crate::protocol::{ChatCodec, CHAT_PROTOCOL};

const IDENTIFY_PROTOCOL: &str = "/peerchat/id/1.0.0";

/// Network behaviour of a chat node
#[derive(NetworkBehaviour)]
pub struct ChatBehaviour {
    pub chat: request_response::Behaviour<ChatCodec>,
    pub identify: identify::Behaviour,
    pub mdns: Toggle<mdns::tokio::Behaviour>,
}

impl ChatBehaviour {
    pub fn new(keypair: &identity::Keypair, username: &str, enable_mdns: bool) -> std::result::Result<Self, PeerChatError> {
        let local_peer_id = keypair.public().to_peer_id();

        let chat = request_response::Behaviour::with_codec(
            ChatCodec,
            [(CHAT_PROTOCOL, request_response::ProtocolSupport::Full)],
            request_response::Config::default().with_request_timeout(Duration::from_secs(30)),
        );

        let identify = identify::Behaviour::new(
            identify::Config::new(IDENTIFY_PROTOCOL.to_string(), keypair.public())
                .with_agent_version(agent_version(username)),
        );

        let mdns = if enable_mdns {
            Some(mdns::tokio::Behaviour::new(mdns::Config::default(), local_peer_id)?)
        } else {
            None
        };

        Ok(Self {
            chat,
            identify,
            mdns: Toggle::from(mdns),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::identity::keypair_for;

    #[test]
    fn test_mdns_can_be_disabled() {
        let keypair = keypair_for("alice").unwrap();
        let behaviour = ChatBehaviour::new(&keypair, "alice", false).unwrap();
        assert!(!behaviour.mdns.is_enabled());
    }
}
