//! todosync_core - functional core for the todosync client.
//!
//! Everything in this crate is synchronous and free of I/O: domain types,
//! the response envelope interpreter, the query cache with its invalidation
//! tags and patch records, and the session state reducer.

pub mod cache;
pub mod envelope;
pub mod session;
pub mod serde;
pub mod todolist;

pub use cache::{CacheError, CacheKey, Endpoint, EndpointConfig, PatchRecord, QueryCache, Tag};
pub use envelope::{EnvelopeOutcome, ResponseEnvelope, ResultCode};
pub use session::{RequestStatus, SessionAction, SessionState};
