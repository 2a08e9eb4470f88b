/// Failure outcomes of a gateway round-trip.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JanusError {
    #[error("gateway not ready")]
    NotReady,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("gateway error {code}: {reason}")]
    Gateway { code: i64, reason: String },
    #[error("gateway request timed out")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("gateway session closed")]
    SessionClosed,
}

impl JanusError {
    /// AudioBridge `JANUS_AUDIOBRIDGE_ERROR_NO_SUCH_ROOM`.
    pub const NO_SUCH_ROOM: i64 = 485;

    pub fn is_no_such_room(&self) -> bool {
        matches!(self, JanusError::Gateway { code, .. } if *code == Self::NO_SUCH_ROOM)
    }
}

pub type Result<T> = std::result::Result<T, JanusError>;
