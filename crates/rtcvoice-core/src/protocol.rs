//! Host-facing request and response shapes.
//!
//! Only the fields the coordinator reads or writes are modelled; the host
//! envelope around them belongs to the caller.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use rtcvoice_common::ViewerToken;
use rtcvoice_janus::{Jsep, TrickleCandidate};

use crate::error::VoiceError;

/// A viewer asking for a voice connection (or to drop one).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionRequest {
    pub viewer_session: Option<String>,
    pub logout: Option<bool>,
    /// Parcel scope; absent means region-wide.
    pub parcel_id: Option<i64>,
    pub channel_id: Option<String>,
    /// `"local"` selects spatial audio.
    pub channel_type: String,
    pub voice_server_type: String,
    pub jsep: Option<Jsep>,
    /// Viewer's avatar id, used as the gateway display name.
    pub agent_id: Option<String>,
}

impl ProvisionRequest {
    pub fn is_logout(&self) -> bool {
        self.logout.unwrap_or(false)
    }

    pub fn is_spatial(&self) -> bool {
        self.channel_type == "local"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionResponse {
    Closed,
    Answer {
        jsep: Jsep,
        viewer_session: ViewerToken,
    },
    Failed(VoiceError),
}

impl ProvisionResponse {
    pub fn is_failed(&self) -> bool {
        matches!(self, ProvisionResponse::Failed(_))
    }

    pub fn error(&self) -> Option<&VoiceError> {
        match self {
            ProvisionResponse::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl Serialize for ProvisionResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            ProvisionResponse::Closed => {
                map.serialize_entry("response", "closed")?;
            }
            ProvisionResponse::Answer {
                jsep,
                viewer_session,
            } => {
                map.serialize_entry("jsep", jsep)?;
                map.serialize_entry("viewer_session", viewer_session)?;
            }
            ProvisionResponse::Failed(error) => {
                map.serialize_entry("response", "failed")?;
                map.serialize_entry("error", &error.to_string())?;
            }
        }
        map.end()
    }
}

/// `{"completed": true}` ends the candidate stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionMarker {
    #[serde(default)]
    pub completed: bool,
}

/// An ICE candidate as browsers produce it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateInit {
    #[serde(default)]
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u32>,
}

impl CandidateInit {
    /// Strip an SDP attribute prefix and surrounding whitespace.
    pub fn normalize(&self) -> TrickleCandidate {
        let candidate = self.candidate.trim();
        let candidate = candidate.strip_prefix("a=").unwrap_or(candidate);
        TrickleCandidate {
            candidate: candidate.to_string(),
            sdp_mid: self.sdp_mid.clone(),
            sdp_mline_index: self.sdp_mline_index,
        }
    }
}

/// Candidate trickle for an in-progress negotiation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalRequest {
    pub viewer_session: Option<String>,
    pub candidate: Option<CompletionMarker>,
    pub candidates: Option<Vec<CandidateInit>>,
}

/// What a signaling request asks the gateway to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trickle {
    Completed,
    Batch(Vec<TrickleCandidate>),
}

impl SignalRequest {
    pub fn trickle(&self) -> Result<Trickle, VoiceError> {
        if self.candidate.as_ref().is_some_and(|c| c.completed) {
            return Ok(Trickle::Completed);
        }
        match self.candidates {
            Some(ref batch) if !batch.is_empty() => {
                if batch.iter().any(|c| c.candidate.trim().is_empty()) {
                    return Err(VoiceError::MalformedSignal);
                }
                Ok(Trickle::Batch(batch.iter().map(CandidateInit::normalize).collect()))
            }
            _ => Err(VoiceError::MalformedSignal),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalResponse {
    Ok { viewer_session: ViewerToken },
    Failed(VoiceError),
}

impl Serialize for SignalResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            SignalResponse::Ok { viewer_session } => {
                map.serialize_entry("response", "ok")?;
                map.serialize_entry("viewer_session", viewer_session)?;
            }
            SignalResponse::Failed(error) => {
                map.serialize_entry("response", "failed")?;
                map.serialize_entry("error", &error.to_string())?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provision_request_defaults() {
        let req: ProvisionRequest = serde_json::from_value(json!({
            "channel_type": "local",
            "voice_server_type": "webrtc",
            "jsep": {"type": "offer", "sdp": "v=0"}
        }))
        .unwrap();
        assert!(req.is_spatial());
        assert!(!req.is_logout());
        assert_eq!(req.parcel_id, None);
        assert!(req.jsep.unwrap().is_offer());
    }

    #[test]
    fn non_local_channel_is_not_spatial() {
        let req = ProvisionRequest {
            channel_type: "multiagent".into(),
            ..ProvisionRequest::default()
        };
        assert!(!req.is_spatial());
    }

    #[test]
    fn provision_response_shapes() {
        assert_eq!(
            serde_json::to_value(ProvisionResponse::Closed).unwrap(),
            json!({"response": "closed"})
        );
        assert_eq!(
            serde_json::to_value(ProvisionResponse::Failed(VoiceError::NoJsep)).unwrap(),
            json!({"response": "failed", "error": "no jsep"})
        );
        let answer = ProvisionResponse::Answer {
            jsep: Jsep {
                kind: "answer".into(),
                sdp: "v=0".into(),
            },
            viewer_session: ViewerToken::from("tok"),
        };
        assert_eq!(
            serde_json::to_value(answer).unwrap(),
            json!({"jsep": {"type": "answer", "sdp": "v=0"}, "viewer_session": "tok"})
        );
    }

    #[test]
    fn completed_marker_wins() {
        let req: SignalRequest =
            serde_json::from_value(json!({"candidate": {"completed": true}})).unwrap();
        assert_eq!(req.trickle().unwrap(), Trickle::Completed);
    }

    #[test]
    fn candidate_batch_is_normalized() {
        let req: SignalRequest = serde_json::from_value(json!({
            "candidates": [
                {"candidate": " a=candidate:1 1 udp 1 10.0.0.1 5000 typ host ", "sdpMid": "0", "sdpMLineIndex": 0},
                {"candidate": "candidate:2 1 udp 1 10.0.0.1 5001 typ host", "sdpMid": "0", "sdpMLineIndex": 0}
            ]
        }))
        .unwrap();
        let Trickle::Batch(batch) = req.trickle().unwrap() else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].candidate, "candidate:1 1 udp 1 10.0.0.1 5000 typ host");
        assert_eq!(batch[0].sdp_mid.as_deref(), Some("0"));
        assert_eq!(batch[1].sdp_mline_index, Some(0));
    }

    #[test]
    fn neither_shape_is_malformed() {
        let empty = SignalRequest::default();
        assert_eq!(empty.trickle().unwrap_err(), VoiceError::MalformedSignal);

        let not_completed: SignalRequest =
            serde_json::from_value(json!({"candidate": {"completed": false}})).unwrap();
        assert_eq!(not_completed.trickle().unwrap_err(), VoiceError::MalformedSignal);

        let empty_batch: SignalRequest =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert_eq!(empty_batch.trickle().unwrap_err(), VoiceError::MalformedSignal);

        let blank: SignalRequest =
            serde_json::from_value(json!({"candidates": [{"candidate": "  "}]})).unwrap();
        assert_eq!(blank.trickle().unwrap_err(), VoiceError::MalformedSignal);
    }

    #[test]
    fn signal_response_shapes() {
        let ok = SignalResponse::Ok {
            viewer_session: ViewerToken::from("tok"),
        };
        assert_eq!(
            serde_json::to_value(ok).unwrap(),
            json!({"response": "ok", "viewer_session": "tok"})
        );
        assert_eq!(
            serde_json::to_value(SignalResponse::Failed(VoiceError::MalformedSignal)).unwrap(),
            json!({"response": "failed", "error": "malformed signaling request"})
        );
    }
}
