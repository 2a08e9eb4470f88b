use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short random id used to correlate a gateway request with its reply.
pub fn new_transaction_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
    )
}

/// Keep only a short prefix of a secret or token for log output.
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    if prefix.len() < value.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

/// Opaque token identifying a viewer's negotiation across requests.
///
/// Tokens are either supplied by the client (kept verbatim) or generated
/// here as a v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerToken(String);

impl ViewerToken {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Redacted form for log fields.
    pub fn short(&self) -> String {
        redact(&self.0)
    }
}

impl Default for ViewerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ViewerToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ViewerToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ViewerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
