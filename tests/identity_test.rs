use peerchat::network::identity::{agent_version, keypair_for, username_from_agent, verify_agent};
use peerchat::network::{peer_id_for, validate_username};

#[test]
fn test_peer_id_is_a_function_of_the_username() {
    let a = peer_id_for("alice").unwrap();
    let b = peer_id_for("alice").unwrap();
    assert_eq!(a, b);
    assert_ne!(a, peer_id_for("bob").unwrap());
    assert_eq!(keypair_for("alice").unwrap().public().to_peer_id(), a);
}

#[test]
fn test_username_rules() {
    for ok in ["alice", "bob.smith", "x_y-z+1", "A9"] {
        assert!(validate_username(ok).is_ok(), "{} should be valid", ok);
    }
    let long = "a".repeat(65);
    for bad in ["", "with space", "slash/name", "ünïcode", long.as_str()] {
        assert!(validate_username(bad).is_err(), "{} should be invalid", bad);
    }
    assert!(peer_id_for("bad name").is_err());
}

#[test]
fn test_agent_round_trip() {
    assert_eq!(agent_version("alice"), "peerchat/alice");
    assert_eq!(username_from_agent("peerchat/alice"), Some("alice"));
    assert_eq!(username_from_agent("peerchat/"), None);
    assert_eq!(username_from_agent("rust-libp2p/0.45"), None);
}

#[test]
fn test_agent_must_match_peer_id() {
    let alice = peer_id_for("alice").unwrap();
    assert_eq!(verify_agent(&alice, "peerchat/alice"), Some("alice".to_string()));
    assert_eq!(verify_agent(&alice, "peerchat/bob"), None);
    assert_eq!(verify_agent(&alice, "something-else"), None);
}
