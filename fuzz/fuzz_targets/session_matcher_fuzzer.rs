//! Fuzz target for session matching
//!
//! # Strategy
//!
//! - Table loads: arbitrary (message, response) tables, including invalid
//!   messages that must be rejected without touching the session
//! - Sends: keys from the loaded table, wrapped in arbitrary whitespace, and
//!   arbitrary raw text
//!
//! # Invariants
//!
//! - Matched keys are always expected keys
//! - A send matches iff its trimmed text is an expected key
//! - A matched send returns exactly the expected response
//! - Mismatches are exactly expected \ matched, one per key
//! - A rejected load leaves the table and match history unchanged
//! - NEVER panic on arbitrary input

#![no_main]

use std::{collections::BTreeSet, net::SocketAddr};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use palaver_proto::Interaction;
use palaver_server::{Session, SessionId, matcher, mismatch};

#[derive(Debug, Clone, Arbitrary)]
enum SessionEvent {
    Load(Vec<(String, String)>),
    SendKnown { index: u8, prefix: Framing, suffix: Framing },
    SendRaw(String),
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Framing {
    None,
    Space,
    Newline,
    CrLf,
    Tab,
}

impl Framing {
    fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Space => " ",
            Self::Newline => "\n",
            Self::CrLf => "\r\n",
            Self::Tab => "\t",
        }
    }
}

fuzz_target!(|events: Vec<SessionEvent>| {
    let mut session = Session::new(SessionId::generate(), SocketAddr::from(([127, 0, 0, 1], 0)));

    for event in events {
        match event {
            SessionEvent::Load(table) => {
                let before_keys: BTreeSet<String> =
                    session.expected_messages().map(str::to_string).collect();
                let before_matched = session.matched().to_vec();

                let interactions: Vec<Interaction> =
                    table.into_iter().map(|(m, r)| Interaction::new(m, r)).collect();
                let all_valid = interactions.iter().all(|i| i.validate().is_ok());

                match session.load_interactions(interactions) {
                    Ok(_) => assert!(all_valid, "invalid table was accepted"),
                    Err(_) => {
                        assert!(!all_valid, "valid table was rejected");
                        let after_keys: BTreeSet<String> =
                            session.expected_messages().map(str::to_string).collect();
                        assert_eq!(before_keys, after_keys);
                        assert_eq!(before_matched, session.matched());
                    },
                }
            },

            SessionEvent::SendKnown { index, prefix, suffix } => {
                let keys: Vec<String> = session.expected_messages().map(str::to_string).collect();
                if keys.is_empty() {
                    continue;
                }
                let key = &keys[usize::from(index) % keys.len()];
                let expected = session.expected(key).map(|i| i.response.clone());

                let raw = format!("{}{}{}", prefix.as_str(), key, suffix.as_str());
                let outcome = matcher::match_message(&mut session, &raw);

                assert!(outcome.is_match(), "framed key {key:?} did not match");
                assert_eq!(Some(outcome.into_response()), expected);
                assert_eq!(session.matched().last(), Some(key));
            },

            SessionEvent::SendRaw(raw) => {
                let known = session.expected(raw.trim()).is_some();
                let history = session.matched().len();

                let outcome = matcher::match_message(&mut session, &raw);

                assert_eq!(outcome.is_match(), known);
                if known {
                    assert_eq!(session.matched().len(), history + 1);
                } else {
                    assert_eq!(outcome.into_response(), "");
                    assert_eq!(session.matched().len(), history);
                }
            },
        }

        for key in session.matched() {
            assert!(session.expected(key).is_some(), "matched key {key:?} is not expected");
        }
    }

    let matched: BTreeSet<&str> = session.matched().iter().map(String::as_str).collect();
    let missing: BTreeSet<String> = session
        .expected_messages()
        .filter(|key| !matched.contains(key))
        .map(str::to_string)
        .collect();

    let details = mismatch::unmatched_interactions(&session);
    let reported: BTreeSet<String> = details.iter().map(|d| d.expected.clone()).collect();

    assert_eq!(details.len(), reported.len(), "a key was reported twice");
    assert_eq!(reported, missing);
    assert!(details.iter().all(|d| d.actual.is_empty()));
});
