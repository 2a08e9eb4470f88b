//! AudioBridge plugin operations.
//!
//! Room management (create, exists, destroy) goes through the bridge's
//! own handle. Viewer operations (join, configure, leave, trickle) go
//! through a per-viewer handle attached with [`AudioBridge::attach_viewer`],
//! since Janus binds one PeerConnection to each handle.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::error::{JanusError, Result};
use crate::message::{self, Jsep, TrickleCandidate, AUDIOBRIDGE_PLUGIN};
use crate::session::JanusSession;

/// Parameters for a new AudioBridge room.
#[derive(Debug, Clone)]
pub struct RoomSpec {
    pub description: String,
    pub spatial: bool,
    pub sampling_rate: u32,
    /// 0 leaves the participant count unlimited.
    pub max_participants: u32,
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Gateway participant id, when reported.
    pub participant_id: Option<u64>,
    pub answer: Jsep,
}

/// The bridge's attachment to `janus.plugin.audiobridge`.
pub struct AudioBridge {
    session: Arc<JanusSession>,
    handle_id: u64,
}

impl AudioBridge {
    /// Attach the management handle. Must succeed before any room operation.
    pub async fn activate(session: Arc<JanusSession>) -> Result<Self> {
        let handle_id = session.attach(AUDIOBRIDGE_PLUGIN).await?;
        info!(session = session.id(), handle = handle_id, "AudioBridge activated");
        Ok(Self { session, handle_id })
    }

    pub fn session(&self) -> &Arc<JanusSession> {
        &self.session
    }

    pub fn handle_id(&self) -> u64 {
        self.handle_id
    }

    /// Create a room; the gateway picks the room number.
    pub async fn create_room(&self, spec: &RoomSpec) -> Result<u64> {
        let mut body = json!({
            "request": "create",
            "permanent": false,
            "description": spec.description,
            "is_private": true,
            "sampling_rate": spec.sampling_rate,
            "spatial_audio": spec.spatial,
            "audiolevel_event": false,
        });
        if spec.max_participants > 0 {
            body["max_participants"] = json!(spec.max_participants);
        }

        let reply = self
            .session
            .post(Some(self.handle_id), message::plugin_message(body, None))
            .await?;
        let data = message::plugin_data(&reply)?;
        let room = data["room"]
            .as_u64()
            .ok_or_else(|| JanusError::Protocol("create reply without room".into()))?;
        info!(room, spatial = spec.spatial, description = %spec.description, "AudioBridge room created");
        Ok(room)
    }

    pub async fn room_exists(&self, room: u64) -> Result<bool> {
        let body = json!({ "request": "exists", "room": room });
        let reply = self
            .session
            .post(Some(self.handle_id), message::plugin_message(body, None))
            .await?;
        Ok(message::plugin_data(&reply)?["exists"]
            .as_bool()
            .unwrap_or(false))
    }

    pub async fn destroy_room(&self, room: u64) -> Result<()> {
        let body = json!({ "request": "destroy", "room": room, "permanent": false });
        let reply = self
            .session
            .post(Some(self.handle_id), message::plugin_message(body, None))
            .await?;
        message::plugin_data(&reply)?;
        info!(room, "AudioBridge room destroyed");
        Ok(())
    }

    /// Attach a fresh handle for one viewer.
    pub async fn attach_viewer(&self) -> Result<u64> {
        self.session.attach(AUDIOBRIDGE_PLUGIN).await
    }

    pub async fn detach_viewer(&self, handle: u64) -> Result<()> {
        self.session.detach(handle).await
    }

    /// Join `room` on the viewer's handle, publishing `offer`.
    pub async fn join(
        &self,
        handle: u64,
        room: u64,
        display: Option<&str>,
        offer: &Jsep,
    ) -> Result<JoinOutcome> {
        let mut body = json!({ "request": "join", "room": room, "muted": false });
        if let Some(display) = display {
            body["display"] = json!(display);
        }
        let reply = self
            .session
            .post_plugin(handle, message::plugin_message(body, Some(offer)))
            .await?;
        let data = message::plugin_data(&reply)?;
        let answer = message::reply_jsep(&reply)
            .ok_or_else(|| JanusError::Protocol("join reply without jsep".into()))?;
        let participant_id = data["id"].as_u64();
        debug!(room, handle, ?participant_id, "joined AudioBridge room");
        Ok(JoinOutcome {
            participant_id,
            answer,
        })
    }

    /// Renegotiate an existing participant with a new offer.
    pub async fn configure(&self, handle: u64, offer: &Jsep) -> Result<Jsep> {
        let body = json!({ "request": "configure" });
        let reply = self
            .session
            .post_plugin(handle, message::plugin_message(body, Some(offer)))
            .await?;
        message::plugin_data(&reply)?;
        message::reply_jsep(&reply)
            .ok_or_else(|| JanusError::Protocol("configure reply without jsep".into()))
    }

    pub async fn leave(&self, handle: u64) -> Result<()> {
        let body = json!({ "request": "leave" });
        let reply = self
            .session
            .post_plugin(handle, message::plugin_message(body, None))
            .await?;
        message::plugin_data(&reply)?;
        Ok(())
    }

    /// Forward a batch of candidates in one `trickle` request.
    pub async fn trickle(&self, handle: u64, candidates: &[TrickleCandidate]) -> Result<()> {
        let mut body = message::request("trickle");
        body["candidates"] = json!(candidates);
        self.session.post(Some(handle), body).await?;
        Ok(())
    }

    /// Tell the gateway no more candidates will follow.
    pub async fn trickle_complete(&self, handle: u64) -> Result<()> {
        let mut body = message::request("trickle");
        body["candidate"] = json!({ "completed": true });
        self.session.post(Some(handle), body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use rtcvoice_config::GatewayConfig;

    async fn bridge(mock: &Arc<MockTransport>) -> AudioBridge {
        let session = JanusSession::connect(mock.clone(), &GatewayConfig::default())
            .await
            .unwrap();
        AudioBridge::activate(session).await.unwrap()
    }

    fn spec(spatial: bool) -> RoomSpec {
        RoomSpec {
            description: "parcel 42".into(),
            spatial,
            sampling_rate: 48_000,
            max_participants: 0,
        }
    }

    #[tokio::test]
    async fn create_room_sends_spatial_flag() {
        let mock = Arc::new(MockTransport::new());
        let bridge = bridge(&mock).await;
        let room = bridge.create_room(&spec(true)).await.unwrap();
        assert!(room > 0);

        let create = mock.plugin_calls("create").pop().unwrap();
        assert_eq!(create.body["body"]["spatial_audio"], true);
        assert!(create.body["body"].get("max_participants").is_none());
    }

    #[tokio::test]
    async fn create_room_rejection_is_gateway_error() {
        let mock = Arc::new(MockTransport::new());
        mock.reject_plugin("create", 486, "Room limit reached");
        let bridge = bridge(&mock).await;
        let err = bridge.create_room(&spec(false)).await.unwrap_err();
        assert!(matches!(err, JanusError::Gateway { code: 486, .. }));
    }

    #[tokio::test]
    async fn join_returns_answer_and_participant() {
        let mock = Arc::new(MockTransport::new());
        let bridge = bridge(&mock).await;
        let room = bridge.create_room(&spec(true)).await.unwrap();
        let handle = bridge.attach_viewer().await.unwrap();
        assert_ne!(handle, bridge.handle_id());

        let outcome = bridge
            .join(handle, room, Some("agent-1"), &Jsep::offer("v=0\r\n"))
            .await
            .unwrap();
        assert_eq!(outcome.answer.kind, "answer");
        assert!(outcome.participant_id.is_some());

        let join = mock.plugin_calls("join").pop().unwrap();
        assert_eq!(join.body["body"]["display"], "agent-1");
        assert_eq!(join.body["jsep"]["type"], "offer");
        assert!(join.path.ends_with(&format!("/{handle}")));
    }

    #[tokio::test]
    async fn destroy_unknown_room_reports_no_such_room() {
        let mock = Arc::new(MockTransport::new());
        let bridge = bridge(&mock).await;
        let err = bridge.destroy_room(987_654).await.unwrap_err();
        assert!(err.is_no_such_room());
    }

    #[tokio::test]
    async fn room_exists_tracks_lifecycle() {
        let mock = Arc::new(MockTransport::new());
        let bridge = bridge(&mock).await;
        let room = bridge.create_room(&spec(false)).await.unwrap();
        assert!(bridge.room_exists(room).await.unwrap());
        bridge.destroy_room(room).await.unwrap();
        assert!(!bridge.room_exists(room).await.unwrap());
    }

    #[tokio::test]
    async fn trickle_batch_and_completion() {
        let mock = Arc::new(MockTransport::new());
        let bridge = bridge(&mock).await;
        let handle = bridge.attach_viewer().await.unwrap();
        let candidates = vec![
            TrickleCandidate {
                candidate: "candidate:1".into(),
                sdp_mid: Some("0".into()),
                sdp_mline_index: Some(0),
            },
            TrickleCandidate {
                candidate: "candidate:2".into(),
                sdp_mid: Some("0".into()),
                sdp_mline_index: Some(0),
            },
        ];
        bridge.trickle(handle, &candidates).await.unwrap();
        bridge.trickle_complete(handle).await.unwrap();

        let trickles = mock.janus_calls("trickle");
        assert_eq!(trickles.len(), 2);
        assert_eq!(trickles[0].body["candidates"].as_array().unwrap().len(), 2);
        assert_eq!(trickles[1].body["candidate"]["completed"], true);
    }
}
