//! Property-based tests for the JSON frame codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never makes the decoders panic.
//! 2. Any server-produced frame decodes back to the same frame.
//! 3. Draft construction never yields a draft that fails validation.

#![allow(clippy::unwrap_used)]

use massg_proto::codec::{self, ServerFrame};
use massg_proto::message::{ClientId, Draft, Message, Timestamp};
use proptest::prelude::*;

/// Strategy for generating arbitrary server-side `Message` values.
fn arb_message() -> impl Strategy<Value = Message> {
    (
        proptest::option::of("[a-f0-9]{32}"),
        "[a-zA-Z0-9_]{1,16}",
        ".{0,64}",
        proptest::option::of("/uploads/[a-f0-9]{8}\\.png"),
        0u64..4_000_000_000,
        proptest::option::of("[a-f0-9-]{36}"),
    )
        .prop_map(|(id, username, text, image_url, secs, client_id)| Message {
            id,
            username,
            text,
            image_url,
            created_at: Timestamp::from_secs(secs),
            client_id: client_id.map(ClientId::new),
        })
}

/// Strategy for generating arbitrary `ServerFrame` values.
fn arb_server_frame() -> impl Strategy<Value = ServerFrame> {
    prop_oneof![
        prop::collection::vec(arb_message(), 0..8)
            .prop_map(|messages| ServerFrame::History { messages }),
        arb_message().prop_map(|message| ServerFrame::Message { message }),
    ]
}

proptest! {
    #[test]
    fn decode_server_never_panics(text in ".{0,256}") {
        let _ = codec::decode_server(&text);
    }

    #[test]
    fn decode_draft_never_panics(text in ".{0,256}") {
        let _ = codec::decode_draft(&text);
    }

    #[test]
    fn server_frames_survive_the_wire(frame in arb_server_frame()) {
        let text = codec::encode_server(&frame).unwrap();
        let decoded = codec::decode_server(&text).unwrap();
        prop_assert_eq!(decoded, frame);
    }

    #[test]
    fn constructed_drafts_always_validate(text in ".{0,128}", image in proptest::option::of(".{0,32}")) {
        if let Ok(draft) = Draft::new(&text, image.as_deref()) {
            prop_assert!(draft.validate().is_ok());
            prop_assert!(draft.client_id.is_some());
        }
    }
}
