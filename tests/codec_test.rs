use futures::io::Cursor;
use libp2p::request_response::Codec;
use peerchat::protocol::{Ack, ChatCodec, Envelope, Frame, Incoming, CHAT_PROTOCOL, MAX_FRAME_LEN};

#[test]
fn test_protocol_name() {
    assert_eq!(CHAT_PROTOCOL.as_ref(), "/peerchat/chat/1.0.0");
}

#[test]
fn test_request_is_length_prefixed() {
    let mut codec = ChatCodec;
    let envelope = Envelope::Message {
        message_id: Some("msg_1".to_string()),
        content: "hello".to_string(),
        timestamp: 1,
    };
    let frame = Frame::from_envelope(&envelope).unwrap();

    let mut buffer = Vec::new();
    futures::executor::block_on(async {
        let mut cursor = Cursor::new(&mut buffer);
        codec
            .write_request(&CHAT_PROTOCOL, &mut cursor, frame.clone())
            .await
            .unwrap();
    });

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, frame.len());
    assert_eq!(buffer.len(), 4 + frame.len());

    let decoded = futures::executor::block_on(async {
        let mut cursor = Cursor::new(&buffer[..]);
        codec.read_request(&CHAT_PROTOCOL, &mut cursor).await.unwrap()
    });
    assert_eq!(decoded.decode().unwrap(), Incoming::Known(envelope));
}

#[test]
fn test_ack_is_an_empty_frame() {
    let mut codec = ChatCodec;
    let mut buffer = Vec::new();
    futures::executor::block_on(async {
        let mut cursor = Cursor::new(&mut buffer);
        codec.write_response(&CHAT_PROTOCOL, &mut cursor, Ack).await.unwrap();
    });
    assert_eq!(buffer, vec![0, 0, 0, 0]);

    let ack = futures::executor::block_on(async {
        let mut cursor = Cursor::new(&buffer[..]);
        codec.read_response(&CHAT_PROTOCOL, &mut cursor).await.unwrap()
    });
    assert_eq!(ack, Ack);
}

#[test]
fn test_oversized_frames_are_refused() {
    let mut codec = ChatCodec;

    let mut buffer = Vec::new();
    let write = futures::executor::block_on(async {
        let mut cursor = Cursor::new(&mut buffer);
        codec
            .write_request(&CHAT_PROTOCOL, &mut cursor, Frame(vec![0; MAX_FRAME_LEN + 1]))
            .await
    });
    assert!(write.is_err());

    let mut announced = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
    announced.extend_from_slice(b"{}");
    let read = futures::executor::block_on(async {
        let mut cursor = Cursor::new(&announced[..]);
        codec.read_request(&CHAT_PROTOCOL, &mut cursor).await
    });
    assert_eq!(read.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn test_truncated_frame_fails() {
    let mut codec = ChatCodec;
    let mut bytes = 10u32.to_be_bytes().to_vec();
    bytes.extend_from_slice(b"abc");
    let read = futures::executor::block_on(async {
        let mut cursor = Cursor::new(&bytes[..]);
        codec.read_request(&CHAT_PROTOCOL, &mut cursor).await
    });
    assert!(read.is_err());
}
