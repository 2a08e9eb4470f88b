use rtcvoice_janus::JanusError;

/// Client-visible failure of a provisioning or signaling request.
///
/// The `Display` strings are part of the wire protocol and must not change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("no JanusAudioBridge")]
    GatewayNotReady,
    #[error("no jsep")]
    NoJsep,
    #[error("jsep type not offer")]
    JsepNotOffer,
    #[error("room selection failed")]
    RoomSelectionFailed,
    #[error("JoinRoom failed")]
    JoinRoomFailed,
    #[error("malformed signaling request")]
    MalformedSignal,
    #[error("trickle failed")]
    TrickleFailed,
    /// The room was destroyed between selection and join.
    #[error("room closed")]
    RoomClosed,
    #[error(transparent)]
    Gateway(#[from] JanusError),
}
