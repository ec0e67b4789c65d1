use std::time::Duration;

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;
use tokio::time::timeout;

use peerchat::chat::PeerErrorKind;
use peerchat::network::{ChatNode, NetworkConfig, NodeEvent};
use peerchat::protocol::{Envelope, Incoming};

const WAIT: Duration = Duration::from_secs(20);

fn local_config() -> NetworkConfig {
    NetworkConfig {
        enable_mdns: false,
        ..NetworkConfig::default()
    }
}

fn is_loopback(addr: &Multiaddr) -> bool {
    addr.iter()
        .any(|p| matches!(p, Protocol::Ip4(ip) if ip.is_loopback()))
}

async fn next_matching<F>(node: &mut ChatNode, mut predicate: F) -> NodeEvent
where
    F: FnMut(&NodeEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = node.events.recv().await.expect("node stopped");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for node event")
}

async fn loopback_addr(node: &mut ChatNode) -> Multiaddr {
    match next_matching(node, |e| matches!(e, NodeEvent::Listening(a) if is_loopback(a))).await {
        NodeEvent::Listening(addr) => addr,
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_two_nodes_exchange_envelopes() {
    let mut alice = ChatNode::start("alice", &local_config()).await.unwrap();
    let addr = loopback_addr(&mut alice).await;

    let mut config = local_config();
    config
        .known_peers
        .insert("alice".to_string(), vec![addr.to_string()]);
    let mut bob = ChatNode::start("bob", &config).await.unwrap();

    bob.handle.dial("alice").unwrap();
    let connected = next_matching(&mut bob, |e| matches!(e, NodeEvent::Connected { .. })).await;
    assert_eq!(
        connected,
        NodeEvent::Connected {
            username: "alice".to_string(),
            inbound: false
        }
    );

    // Alice learns bob's name from identify
    let connected = next_matching(&mut alice, |e| matches!(e, NodeEvent::Connected { .. })).await;
    assert_eq!(
        connected,
        NodeEvent::Connected {
            username: "bob".to_string(),
            inbound: true
        }
    );
    assert!(bob.handle.is_connected("alice").await.unwrap());

    let message = Envelope::Message {
        message_id: Some("msg_1".to_string()),
        content: "hello alice".to_string(),
        timestamp: 1,
    };
    timeout(WAIT, bob.handle.send("alice", &message))
        .await
        .unwrap()
        .unwrap();

    let received = next_matching(&mut alice, |e| matches!(e, NodeEvent::Envelope { .. })).await;
    assert_eq!(
        received,
        NodeEvent::Envelope {
            username: "bob".to_string(),
            incoming: Incoming::Known(message),
        }
    );

    bob.handle.disconnect("alice").unwrap();
    let closed = next_matching(&mut alice, |e| matches!(e, NodeEvent::Disconnected { .. })).await;
    assert_eq!(
        closed,
        NodeEvent::Disconnected {
            username: "bob".to_string()
        }
    );

    alice.handle.shutdown();
    bob.handle.shutdown();
}

/// Alice listening, bob dialed in, both sides identified
async fn connected_pair() -> (ChatNode, ChatNode) {
    let mut alice = ChatNode::start("alice", &local_config()).await.unwrap();
    let addr = loopback_addr(&mut alice).await;
    let mut config = local_config();
    config
        .known_peers
        .insert("alice".to_string(), vec![addr.to_string()]);
    let mut bob = ChatNode::start("bob", &config).await.unwrap();

    bob.handle.dial("alice").unwrap();
    next_matching(&mut bob, |e| matches!(e, NodeEvent::Connected { .. })).await;
    next_matching(&mut alice, |e| matches!(e, NodeEvent::Connected { .. })).await;
    (alice, bob)
}

#[tokio::test]
async fn test_queued_envelopes_arrive_in_send_order() {
    let (mut alice, bob) = connected_pair().await;

    let mut sent = Vec::new();
    for i in 0..20u64 {
        let message_id = format!("msg_{}", i);
        sent.push(Envelope::Typing { is_typing: true });
        sent.push(Envelope::Typing { is_typing: false });
        sent.push(Envelope::Message {
            message_id: Some(message_id.clone()),
            content: format!("line {}", i),
            timestamp: i,
        });
        sent.push(Envelope::ReadReceipt { message_id });
        sent.push(Envelope::Pong { timestamp: i });
    }

    // Queue everything before waiting on any acknowledgement
    let tickets: Vec<_> = sent
        .iter()
        .map(|envelope| bob.handle.enqueue("alice", envelope).unwrap())
        .collect();

    let mut received = Vec::new();
    while received.len() < sent.len() {
        match next_matching(&mut alice, |e| matches!(e, NodeEvent::Envelope { .. })).await {
            NodeEvent::Envelope {
                username,
                incoming: Incoming::Known(envelope),
            } => {
                assert_eq!(username, "bob");
                received.push(envelope);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(received, sent);

    for ticket in tickets {
        timeout(WAIT, ticket.acked()).await.unwrap().unwrap();
    }

    alice.handle.shutdown();
    bob.handle.shutdown();
}

#[tokio::test]
async fn test_queued_sends_fail_after_disconnect() {
    let (alice, mut bob) = connected_pair().await;
    let message = Envelope::Message {
        message_id: Some("msg_1".to_string()),
        content: "hello".to_string(),
        timestamp: 1,
    };
    timeout(WAIT, bob.handle.send("alice", &message))
        .await
        .unwrap()
        .unwrap();

    bob.handle.disconnect("alice").unwrap();
    next_matching(&mut bob, |e| matches!(e, NodeEvent::Disconnected { .. })).await;
    let result = timeout(WAIT, bob.handle.send("alice", &message)).await.unwrap();
    assert!(matches!(result, Err(peerchat::PeerChatError::NotConnected)));

    alice.handle.shutdown();
    bob.handle.shutdown();
}

#[tokio::test]
async fn test_send_without_connection_fails() {
    let bob = ChatNode::start("bob", &local_config()).await.unwrap();
    let result = bob.handle.send("alice", &Envelope::Ping { timestamp: 0 }).await;
    assert!(matches!(result, Err(peerchat::PeerChatError::NotConnected)));
    bob.handle.shutdown();
}

#[tokio::test]
async fn test_dial_without_addresses_reports_unavailable() {
    let mut bob = ChatNode::start("bob", &local_config()).await.unwrap();
    bob.handle.dial("nobody").unwrap();
    let failed = next_matching(&mut bob, |e| matches!(e, NodeEvent::DialFailed { .. })).await;
    assert_eq!(
        failed,
        NodeEvent::DialFailed {
            username: "nobody".to_string(),
            kind: PeerErrorKind::PeerUnavailable,
        }
    );
    bob.handle.shutdown();
}
