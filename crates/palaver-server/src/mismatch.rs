//! Mismatch calculator.
//!
//! Mismatches are `expected \ matched` over message keys. A key matched any
//! number of times counts as matched once. Output order is unspecified.

use std::collections::HashSet;

use palaver_proto::MismatchDetail;

use crate::session::Session;

/// Expected interactions of `session` that were never matched.
pub fn unmatched_interactions(session: &Session) -> Vec<MismatchDetail> {
    let matched: HashSet<&str> = session.matched().iter().map(String::as_str).collect();

    session
        .expected_messages()
        .filter(|message| !matched.contains(message))
        .map(MismatchDetail::missing)
        .collect()
}
