//! Model-based property tests for session matching.
//!
//! Random operation sequences are applied to both a reference model built
//! from plain collections and the real `Session`; observable state must agree
//! after every step.
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelSession     Session        Compare
//!      (reference)      (real)         Results
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    net::SocketAddr,
};

use palaver_proto::{Interaction, MismatchDetail};
use palaver_server::{Session, SessionId, matcher, mismatch};
use proptest::prelude::*;

/// Small key space so loads and sends collide often.
const KEYS: &[&str] = &["PING", "STATUS", "A", "B", "HELLO WORLD"];

#[derive(Debug, Clone)]
enum Operation {
    /// Replace the table with (key, response) pairs
    Load(Vec<(usize, u8)>),
    /// Send a key, optionally wrapped in framing whitespace
    Send { key: usize, framed: bool },
    /// Send something that is never a key
    SendUnknown(u8),
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        1 => prop::collection::vec((0..KEYS.len(), any::<u8>()), 0..6).prop_map(Operation::Load),
        4 => (0..KEYS.len(), any::<bool>()).prop_map(|(key, framed)| Operation::Send { key, framed }),
        1 => any::<u8>().prop_map(Operation::SendUnknown),
    ]
}

/// Reference model: obviously-correct set arithmetic.
#[derive(Debug, Default)]
struct ModelSession {
    expected: BTreeMap<String, String>,
    history: Vec<String>,
}

impl ModelSession {
    fn load(&mut self, table: &[(usize, u8)]) {
        self.expected =
            table.iter().map(|(k, r)| (KEYS[*k].to_string(), format!("resp-{r}"))).collect();
        let expected = &self.expected;
        self.history.retain(|key| expected.contains_key(key));
    }

    fn send(&mut self, message: &str) -> String {
        let trimmed = message.trim();
        match self.expected.get(trimmed) {
            Some(response) => {
                self.history.push(trimmed.to_string());
                response.clone()
            },
            None => String::new(),
        }
    }

    fn mismatched(&self) -> BTreeSet<String> {
        let matched: BTreeSet<&String> = self.history.iter().collect();
        self.expected.keys().filter(|k| !matched.contains(k)).cloned().collect()
    }
}

fn to_interactions(table: &[(usize, u8)]) -> Vec<Interaction> {
    table.iter().map(|(k, r)| Interaction::new(KEYS[*k], format!("resp-{r}"))).collect()
}

fn mismatched_keys(details: &[MismatchDetail]) -> BTreeSet<String> {
    details.iter().map(|d| d.expected.clone()).collect()
}

proptest! {
    #[test]
    fn session_matches_model(ops in prop::collection::vec(operation(), 0..40)) {
        let mut model = ModelSession::default();
        let mut real = Session::new(SessionId::generate(), SocketAddr::from(([127, 0, 0, 1], 9000)));

        for op in &ops {
            match op {
                Operation::Load(table) => {
                    model.load(table);
                    prop_assert!(real.load_interactions(to_interactions(table)).is_ok());
                },
                Operation::Send { key, framed } => {
                    let message =
                        if *framed { format!(" {}\r\n", KEYS[*key]) } else { KEYS[*key].to_string() };
                    let expected = model.send(&message);
                    let actual = matcher::match_message(&mut real, &message).into_response();
                    prop_assert_eq!(actual, expected);
                },
                Operation::SendUnknown(n) => {
                    let message = format!("unknown-{n}");
                    prop_assert_eq!(model.send(&message), "");
                    prop_assert_eq!(matcher::match_message(&mut real, &message).into_response(), "");
                },
            }

            // PROPERTY: matched keys are always expected keys
            for key in real.matched() {
                prop_assert!(real.expected(key).is_some(), "matched key {} not expected", key);
            }
        }

        // PROPERTY: match history agrees with the model, in order
        prop_assert_eq!(real.matched(), model.history.as_slice());

        // PROPERTY: mismatches are exactly expected \ matched, each key once
        let details = mismatch::unmatched_interactions(&real);
        prop_assert_eq!(details.len(), mismatched_keys(&details).len());
        prop_assert_eq!(mismatched_keys(&details), model.mismatched());

        // PROPERTY: unknown messages never show up in mismatch output
        prop_assert!(details.iter().all(|d| !d.expected.starts_with("unknown-")));
    }
}
