//! Voice signaling coordinator.
//!
//! Maps viewer sessions onto Janus AudioBridge rooms: resolves the
//! viewer's session token, selects or creates the room for the requested
//! spatial scope, drives the offer/answer exchange, and forwards trickled
//! ICE candidates on the viewer's gateway handle.

pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod sdp;
pub mod viewer;

pub use coordinator::SignalingCoordinator;
pub use error::VoiceError;
pub use protocol::{
    CandidateInit, CompletionMarker, ProvisionRequest, ProvisionResponse, SignalRequest,
    SignalResponse, Trickle,
};
pub use registry::RoomRegistry;
pub use room::{Membership, Room, RoomKey};
pub use viewer::{NegotiationState, SessionRegistry, SharedViewer, ViewerSession};

pub use rtcvoice_janus::Jsep;
