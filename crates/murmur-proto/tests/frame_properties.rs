//! Property-based tests for stream framing.
//!
//! The broadcast server and its clients read frames off byte streams that may
//! deliver data in arbitrary chunks. These tests check that framing survives
//! any chunking and that every cut inside a frame is reported as truncation.

use murmur_proto::{ChatMessage, Frame, FrameHeader, Payload, ProtocolError, read_frame, write_frame};
use proptest::prelude::*;

fn arbitrary_message() -> impl Strategy<Value = ChatMessage> {
    ("[a-z]{1,12}", ".{0,64}", prop::option::of("[a-z]{1,12}"), any::<u64>()).prop_map(
        |(sender, body, recipient, timestamp)| {
            let msg = ChatMessage::new(sender, body).at(timestamp);
            match recipient {
                Some(recipient) => msg.to(recipient),
                None => msg,
            }
        },
    )
}

fn encode_all(messages: &[ChatMessage]) -> Vec<u8> {
    let mut wire = Vec::new();
    for msg in messages {
        let frame = Payload::from(msg.clone()).into_frame().expect("encode should succeed");
        frame.encode(&mut wire).expect("encode should succeed");
    }
    wire
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().expect("runtime")
}

#[test]
fn prop_messages_survive_arbitrary_chunking() {
    proptest!(|(
        messages in prop::collection::vec(arbitrary_message(), 1..8),
        chunk in 1usize..32,
    )| {
        let wire = encode_all(&messages);

        let received = runtime().block_on(async {
            let (mut tx, mut rx) = tokio::io::duplex(chunk);

            let writer = tokio::spawn(async move {
                use tokio::io::AsyncWriteExt;
                for piece in wire.chunks(chunk) {
                    tx.write_all(piece).await.expect("write");
                }
            });

            let mut received = Vec::new();
            while let Some(frame) = read_frame(&mut rx).await.expect("read should succeed") {
                match Payload::from_frame(&frame).expect("decode should succeed") {
                    Payload::Message(msg) => received.push(msg),
                    Payload::Error(err) => panic!("unexpected error frame: {err:?}"),
                }
            }
            writer.await.expect("join");
            received
        });

        // PROPERTY: every message arrives intact and in order
        prop_assert_eq!(received, messages);
    });
}

#[test]
fn prop_cut_inside_frame_is_truncation() {
    proptest!(|(msg in arbitrary_message(), cut_seed in any::<usize>())| {
        let wire = encode_all(std::slice::from_ref(&msg));
        let cut = 1 + cut_seed % (wire.len() - 1);

        let result = runtime().block_on(async {
            let mut reader = &wire[..cut];
            read_frame(&mut reader).await
        });

        // PROPERTY: EOF anywhere but a frame boundary is an error
        prop_assert!(
            matches!(result, Err(ProtocolError::FrameTruncated { .. })),
            "cut at {} of {} gave {:?}", cut, wire.len(), result
        );
    });
}

#[test]
fn prop_encoded_size_is_header_plus_payload() {
    proptest!(|(msg in arbitrary_message())| {
        let frame = Payload::from(msg).into_frame().expect("encode should succeed");

        let mut buf = Vec::new();
        frame.encode(&mut buf).expect("encode should succeed");

        prop_assert_eq!(buf.len(), FrameHeader::SIZE + frame.payload.len());
        prop_assert_eq!(Frame::decode(&buf).expect("decode"), frame);
    });
}

#[tokio::test]
async fn error_frame_decodes_as_error_payload() {
    let frame = Payload::Error(murmur_proto::ErrorPayload::invalid_argument(
        "username cannot be empty",
    ))
    .into_frame()
    .expect("encode");

    let mut wire = Vec::new();
    write_frame(&mut wire, &frame).await.expect("write");

    let mut reader = &wire[..];
    let read = read_frame(&mut reader).await.expect("read").expect("frame");
    let Payload::Error(err) = Payload::from_frame(&read).expect("decode") else {
        panic!("expected error payload");
    };
    assert_eq!(err.code, murmur_proto::ErrorPayload::INVALID_ARGUMENT);
    assert_eq!(err.message, "username cannot be empty");
}
