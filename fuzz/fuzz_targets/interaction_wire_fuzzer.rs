//! Fuzz target for admin request decoding
//!
//! Feeds raw bytes to the `LoadInteractionsRequest` decoder the admin plane
//! uses.
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary bytes
//! - A decoded request loads into a session iff every interaction validates
//! - Re-encoding a decoded request decodes to the same value

#![no_main]

use std::net::SocketAddr;

use libfuzzer_sys::fuzz_target;
use palaver_proto::LoadInteractionsRequest;
use palaver_server::{Session, SessionId};

fuzz_target!(|data: &[u8]| {
    let Ok(request) = serde_json::from_slice::<LoadInteractionsRequest>(data) else {
        return;
    };

    if let Ok(encoded) = serde_json::to_vec(&request) {
        let decoded: LoadInteractionsRequest =
            serde_json::from_slice(&encoded).unwrap_or_else(|e| panic!("re-decode failed: {e}"));
        assert_eq!(decoded, request);
    }

    let all_valid = request.interactions.iter().all(|i| i.validate().is_ok());
    let mut session = Session::new(SessionId::generate(), SocketAddr::from(([127, 0, 0, 1], 0)));

    assert_eq!(session.load_interactions(request.interactions).is_ok(), all_valid);
});
