//! Palaver wire types.
//!
//! Shared by the plugin mock server (`palaver-server`) and the consumer-side
//! orchestrator (`palaver-consumer`). Everything here is plain data with a
//! stable JSON shape; no I/O happens in this crate.
//!
//! ## Admin control plane
//!
//! ```text
//! POST   /sessions                   -> CreateSessionResponse
//! POST   /sessions/{id}/interactions <- LoadInteractionsRequest
//! GET    /sessions/{id}/mismatches   -> Mismatches
//! DELETE /sessions/{id}
//! ```
//!
//! Failures carry an [`ErrorBody`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admin;
mod interaction;
mod mismatch;

pub use admin::{CreateSessionResponse, ErrorBody, LoadInteractionsRequest, LoadInteractionsResponse};
pub use interaction::{Interaction, InteractionError};
pub use mismatch::{MismatchDetail, Mismatches};

/// Upper bound on a single inbound transport message, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 1024;
