//! Progressive search client for the Konnect answer endpoint.
//!
//! The endpoint answers a query with a stream of JSON chunks, each tagged
//! with the part of the answer it updates. This crate turns that byte stream
//! into a growing [`SearchResult`] and reports every step to a
//! [`SearchObserver`].

pub mod assembler;
pub mod backend;
pub mod chunk;
pub mod decode;
pub mod error;
pub mod extract;
pub mod result;
pub mod session;

pub use assembler::{start_search, Outcome, SearchObserver, StreamAssembler};
pub use backend::{BodyStream, SearchBackend};
pub use chunk::{Source, StreamChunk, UiElement};
pub use error::SearchError;
pub use result::{Completion, SearchResult};
pub use session::{SearchSession, SearchTicket};
