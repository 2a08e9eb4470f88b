//! Janus API message building and reply classification.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{JanusError, Result};

pub const AUDIOBRIDGE_PLUGIN: &str = "janus.plugin.audiobridge";

/// Session description carried alongside a plugin message.
///
/// Missing fields deserialize as empty so callers can reject a bad
/// negotiation type with their own error instead of a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Jsep {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

impl Jsep {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: "offer".into(),
            sdp: sdp.into(),
        }
    }

    pub fn is_offer(&self) -> bool {
        self.kind == "offer"
    }
}

/// One ICE candidate as Janus expects it in a `trickle` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrickleCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u32>,
}

/// Bare `{"janus": kind}` request; transaction and secret are added on send.
pub fn request(kind: &str) -> Value {
    json!({ "janus": kind })
}

/// A `message` request addressed to a plugin handle.
pub fn plugin_message(body: Value, jsep: Option<&Jsep>) -> Value {
    let mut msg = json!({ "janus": "message", "body": body });
    if let Some(jsep) = jsep {
        msg["jsep"] = json!(jsep);
    }
    msg
}

/// Top-level shape of a gateway reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Synchronous result (`success`, or an `event` delivered inline).
    Done(Value),
    /// Accepted; the result arrives later as an event with the same transaction.
    Ack,
}

pub fn classify(reply: Value) -> Result<Reply> {
    match reply["janus"].as_str() {
        Some("success") | Some("event") | Some("server_info") => Ok(Reply::Done(reply)),
        Some("ack") => Ok(Reply::Ack),
        Some("error") => Err(JanusError::Gateway {
            code: reply["error"]["code"].as_i64().unwrap_or(0),
            reason: reply["error"]["reason"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        }),
        Some(other) => Err(JanusError::Protocol(format!("unexpected reply '{other}'"))),
        None => Err(JanusError::Protocol("reply has no 'janus' field".into())),
    }
}

/// `data.id` of a `success` reply to `create` or `attach`.
pub fn success_id(reply: &Value) -> Result<u64> {
    reply["data"]["id"]
        .as_u64()
        .ok_or_else(|| JanusError::Protocol("success reply without data.id".into()))
}

/// The plugin payload of a reply, with AudioBridge errors surfaced.
pub fn plugin_data(reply: &Value) -> Result<&Value> {
    let data = &reply["plugindata"]["data"];
    if data.is_null() {
        return Err(JanusError::Protocol("reply without plugindata".into()));
    }
    if let Some(code) = data["error_code"].as_i64() {
        return Err(JanusError::Gateway {
            code,
            reason: data["error"].as_str().unwrap_or("plugin error").to_string(),
        });
    }
    Ok(data)
}

/// The `jsep` attached to a reply, if any.
pub fn reply_jsep(reply: &Value) -> Option<Jsep> {
    serde_json::from_value(reply.get("jsep")?.clone()).ok()
}
