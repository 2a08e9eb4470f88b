//! Janus WebRTC gateway client.
//!
//! Speaks the Janus HTTP API on behalf of the voice coordinator:
//! - Gateway session lifecycle (create, keepalive, destroy) and the
//!   long-poll event loop that completes asynchronous plugin requests
//! - The AudioBridge plugin (room create/exists/destroy, per-viewer
//!   join/configure/leave, candidate trickle)
//! - A supervised connection with reconnect and backoff
//!
//! The HTTP mechanics sit behind [`JanusTransport`] so everything above
//! it can run against the in-memory gateway in [`mock`].

pub mod audiobridge;
pub mod error;
pub mod message;
pub mod session;
pub mod supervisor;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use audiobridge::{AudioBridge, JoinOutcome, RoomSpec};
pub use error::{JanusError, Result};
pub use message::{Jsep, TrickleCandidate, AUDIOBRIDGE_PLUGIN};
pub use session::JanusSession;
pub use supervisor::{ConnectionState, Gateway};
pub use transport::{HttpTransport, JanusTransport};
