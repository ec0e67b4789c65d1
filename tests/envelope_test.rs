use peerchat::protocol::{Envelope, FileMeta, Incoming};
use serde_json::json;

fn decode(value: serde_json::Value) -> peerchat::Result<Incoming> {
    Envelope::decode(&serde_json::to_vec(&value).unwrap())
}

#[test]
fn test_wire_field_names() {
    let info = Envelope::FileInfo {
        file_id: "1700000000000".to_string(),
        name: "photo.png".to_string(),
        size: 2048,
        mime_type: "image/png".to_string(),
        timestamp: 5,
    };
    let value: serde_json::Value = serde_json::from_slice(&info.to_bytes().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "file-info",
            "fileId": "1700000000000",
            "name": "photo.png",
            "size": 2048,
            "mimeType": "image/png",
            "timestamp": 5
        })
    );

    let receipt = Envelope::ReadReceipt {
        message_id: "msg_5".to_string(),
    };
    let value: serde_json::Value = serde_json::from_slice(&receipt.to_bytes().unwrap()).unwrap();
    assert_eq!(value, json!({"type": "read-receipt", "messageId": "msg_5"}));
}

#[test]
fn test_file_data_carries_metadata_and_base64_chunk() {
    let data = Envelope::FileData {
        file_id: "42".to_string(),
        file_info: FileMeta {
            name: "a.bin".to_string(),
            size: 3,
            mime_type: "application/octet-stream".to_string(),
        },
        chunk: vec![0xde, 0xad, 0xbe],
    };
    let value: serde_json::Value = serde_json::from_slice(&data.to_bytes().unwrap()).unwrap();
    assert_eq!(value["type"], "file-data");
    assert_eq!(value["fileInfo"]["type"], "application/octet-stream");
    assert_eq!(value["chunk"], "3q2+");
    assert_eq!(decode(value).unwrap(), Incoming::Known(data));
}

#[test]
fn test_message_without_id_is_accepted() {
    let incoming = decode(json!({"type": "message", "content": "hi", "timestamp": 9})).unwrap();
    assert_eq!(
        incoming,
        Incoming::Known(Envelope::Message {
            message_id: None,
            content: "hi".to_string(),
            timestamp: 9,
        })
    );
}

#[test]
fn test_unknown_tag_is_not_an_error() {
    let incoming = decode(json!({"type": "video-call", "sdp": "..."})).unwrap();
    assert_eq!(
        incoming,
        Incoming::Unknown {
            tag: "video-call".to_string()
        }
    );
}

#[test]
fn test_malformed_payloads_fail() {
    assert!(decode(json!({"content": "no tag"})).is_err());
    assert!(decode(json!({"type": "typing"})).is_err());
    assert!(Envelope::decode(b"not json").is_err());
}

#[test]
fn test_tags() {
    assert_eq!(Envelope::Typing { is_typing: true }.tag(), "typing");
    assert_eq!(Envelope::Ping { timestamp: 0 }.tag(), "ping");
    assert_eq!(
        Envelope::FileComplete {
            file_id: "1".to_string(),
            timestamp: 0
        }
        .tag(),
        "file-complete"
    );
}
