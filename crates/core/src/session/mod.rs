//! Global session state and its reducer.

mod state;

pub use state::{RequestStatus, SessionAction, SessionState};
