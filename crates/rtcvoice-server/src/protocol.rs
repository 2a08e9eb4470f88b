//! WebSocket envelope around coordinator requests.
//!
//! Each text frame carries one request tagged by `type`; the reply echoes
//! the same `type` and the optional `id` so clients can pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rtcvoice_core::{ProvisionRequest, SignalRequest};

/// A request frame from the host.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "provision")]
    Provision {
        #[serde(default)]
        id: Option<Value>,
        #[serde(flatten)]
        request: ProvisionRequest,
    },

    #[serde(rename = "signal")]
    Signal {
        #[serde(default)]
        id: Option<Value>,
        #[serde(flatten)]
        request: SignalRequest,
    },
}

/// A reply frame: `type` and `id` followed by the response body fields.
#[derive(Debug, Serialize)]
pub struct ServerFrame<T: Serialize> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub body: T,
}

/// Sent when a frame cannot be parsed at all.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ErrorFrame {
    #[serde(rename = "error")]
    Error { message: String },
}
