//! Entry point for provisioning and signaling requests.
//!
//! Every public operation returns a response value; failures are reported
//! in the response, never as a panic or an error escaping to the host.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use rtcvoice_common::{Event, EventBus, ViewerToken};
use rtcvoice_config::RoomsConfig;
use rtcvoice_janus::{AudioBridge, Gateway, JanusError, Jsep};

use crate::error::VoiceError;
use crate::protocol::{ProvisionRequest, ProvisionResponse, SignalRequest, SignalResponse, Trickle};
use crate::registry::RoomRegistry;
use crate::room::{Room, RoomKey};
use crate::sdp;
use crate::viewer::{NegotiationState, SessionRegistry, ViewerSession};


pub struct SignalingCoordinator {
    gateway: Arc<Gateway>,
    sessions: SessionRegistry,
    rooms: RoomRegistry,
    events: Arc<EventBus>,
    region_scope_id: i64,
    /// Gateway generation the registries belong to. Held across a reset
    /// so no request sees the new generation with stale registries.
    generation: Mutex<u64>,
}

impl SignalingCoordinator {
    pub fn new(gateway: Arc<Gateway>, config: RoomsConfig, events: Arc<EventBus>) -> Self {
        let region_scope_id = config.region_scope_id;
        Self {
            gateway,
            sessions: SessionRegistry::new(),
            rooms: RoomRegistry::new(config, events.clone()),
            events,
            region_scope_id,
            generation: Mutex::new(0),
        }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Handle a provisioning request: an SDP offer to join voice, or a logout.
    pub async fn provision(&self, request: ProvisionRequest) -> ProvisionResponse {
        match self.try_provision(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "provisioning request failed");
                ProvisionResponse::Failed(e)
            }
        }
    }

    async fn try_provision(&self, request: ProvisionRequest) -> Result<ProvisionResponse, VoiceError> {
        let bridge = self.ready_bridge().await?;

        if request.is_logout() {
            self.logout(&bridge, request.viewer_session.as_deref()).await;
            return Ok(ProvisionResponse::Closed);
        }

        let offer = request.jsep.clone().ok_or(VoiceError::NoJsep)?;
        if !offer.is_offer() {
            return Err(VoiceError::JsepNotOffer);
        }

        let (mut viewer, token) = self.open_session(request.viewer_session.as_deref()).await;
        viewer.touch();
        if let Some(agent) = request.agent_id.clone().filter(|a| !a.is_empty()) {
            viewer.user = Some(agent);
        }

        let key = RoomKey::new(
            request.parcel_id.unwrap_or(self.region_scope_id),
            request.is_spatial(),
            request.channel_id.clone(),
        );
        let room = self.select_room(&bridge, &key, &token).await?;

        let forwarded = Jsep::offer(sdp::normalize_offer(&offer.sdp));
        viewer.offer_received = Some(offer);
        viewer.state = NegotiationState::OfferReceived;
        viewer.offer_forwarded = Some(forwarded);
        viewer.state = NegotiationState::RoomSelected;

        self.join(&bridge, room, &key, &mut viewer).await?;
        viewer.state = NegotiationState::Joined;

        let jsep = viewer.answer.clone().ok_or(VoiceError::JoinRoomFailed)?;
        Ok(ProvisionResponse::Answer {
            jsep,
            viewer_session: token,
        })
    }

    async fn select_room(
        &self,
        bridge: &AudioBridge,
        key: &RoomKey,
        token: &ViewerToken,
    ) -> Result<Arc<Room>, VoiceError> {
        self.rooms.select_room(bridge, key).await.map_err(|e| {
            warn!(viewer_session = %token.short(), scope_id = key.scope_id, error = %e, "room selection failed");
            VoiceError::RoomSelectionFailed
        })
    }

    /// Join, re-selecting once if the room closed under us.
    async fn join(
        &self,
        bridge: &AudioBridge,
        mut room: Arc<Room>,
        key: &RoomKey,
        viewer: &mut ViewerSession,
    ) -> Result<(), VoiceError> {
        let mut reselected = false;
        loop {
            match room.join_room(&self.rooms, bridge, viewer).await {
                Ok(()) => return Ok(()),
                Err(VoiceError::RoomClosed) if !reselected => {
                    reselected = true;
                    room = self.select_room(bridge, key, &viewer.token).await?;
                }
                Err(e) => {
                    warn!(viewer_session = %viewer.token.short(), room = room.id(), error = %e, "join failed");
                    return Err(VoiceError::JoinRoomFailed);
                }
            }
        }
    }

    async fn logout(&self, bridge: &AudioBridge, token: Option<&str>) {
        let Some(token) = token.filter(|t| !t.is_empty()).map(ViewerToken::from) else {
            return;
        };
        let Some(viewer) = self.sessions.get(&token).await else {
            debug!(viewer_session = %token.short(), "logout for unknown session");
            return;
        };
        let mut viewer = viewer.lock().await;
        self.close_viewer(bridge, &mut viewer).await;
        info!(viewer_session = %token.short(), "viewer logged out");
    }

    /// Leave the viewer's room, drop its handle, and unregister it.
    async fn close_viewer(&self, bridge: &AudioBridge, viewer: &mut ViewerSession) {
        self.release(bridge, viewer).await;
        viewer.state = NegotiationState::Closed;
        self.sessions.remove(&viewer.token).await;
        self.events.publish(Event::ViewerClosed {
            viewer: viewer.token.to_string(),
        });
    }

    async fn release(&self, bridge: &AudioBridge, viewer: &mut ViewerSession) {
        if let Some(room) = viewer.room.clone() {
            if let Err(e) = room.leave_room(&self.rooms, bridge, viewer).await {
                warn!(viewer_session = %viewer.token.short(), room = room.id(), error = %e, "leave failed");
            }
        }
        // Handle attached for early candidates or a failed join.
        if let Some(handle) = viewer.handle_id.take() {
            if let Err(e) = bridge.detach_viewer(handle).await {
                warn!(handle, error = %e, "viewer handle detach failed");
            }
        }
        viewer.room = None;
    }

    /// Forward trickled ICE candidates on the viewer's gateway handle.
    pub async fn signal(&self, request: SignalRequest) -> SignalResponse {
        match self.try_signal(request).await {
            Ok(viewer_session) => SignalResponse::Ok { viewer_session },
            Err(e) => {
                debug!(error = %e, "signaling request failed");
                SignalResponse::Failed(e)
            }
        }
    }

    async fn try_signal(&self, request: SignalRequest) -> Result<ViewerToken, VoiceError> {
        let bridge = self.ready_bridge().await?;
        let trickle = request.trickle()?;

        let (mut viewer, token) = self.open_session(request.viewer_session.as_deref()).await;
        viewer.touch();

        if let Err(e) = forward_trickle(&bridge, &mut viewer, trickle).await {
            warn!(viewer_session = %token.short(), error = %e, "trickle failed");
            return Err(VoiceError::TrickleFailed);
        }

        if viewer.state == NegotiationState::Joined {
            viewer.state = NegotiationState::Active;
        }
        Ok(token)
    }

    /// Resolve and lock the session for `token`, skipping one that a
    /// concurrent logout closed while we waited for it.
    async fn open_session(&self, token: Option<&str>) -> (OwnedMutexGuard<ViewerSession>, ViewerToken) {
        loop {
            let (viewer, token, created) = self.sessions.resolve(token).await;
            let guard = viewer.lock_owned().await;
            if guard.state == NegotiationState::Closed {
                continue;
            }
            if created {
                debug!(viewer_session = %token.short(), "viewer session created");
            }
            return (guard, token);
        }
    }

    /// The active bridge, resetting the registries if the gateway session
    /// changed since they were populated.
    async fn ready_bridge(&self) -> Result<Arc<AudioBridge>, VoiceError> {
        let bridge = self
            .gateway
            .bridge()
            .await
            .map_err(|_| VoiceError::GatewayNotReady)?;
        let current = self.gateway.generation();
        let mut seen = self.generation.lock().await;
        if *seen != current {
            if *seen != 0 {
                warn!(from = *seen, to = current, "gateway session replaced; dropping rooms and viewers");
                self.reset().await;
            }
            *seen = current;
        }
        Ok(bridge)
    }

    /// Forget every room and viewer without talking to the gateway.
    pub async fn reset(&self) {
        for viewer in self.sessions.drain().await {
            if let Ok(mut viewer) = viewer.try_lock() {
                viewer.clear_room();
                viewer.state = NegotiationState::Closed;
            }
        }
        self.rooms.clear().await;
    }

    /// Close sessions idle for at least `ttl`. Returns how many were closed.
    pub async fn reap_idle(&self, ttl: Duration) -> usize {
        let idle = self.sessions.idle(ttl).await;
        if idle.is_empty() {
            return 0;
        }
        let bridge = self.gateway.bridge().await.ok();

        let mut reaped = 0;
        for (token, viewer) in idle {
            let mut viewer = viewer.lock().await;
            if viewer.state == NegotiationState::Closed || viewer.last_activity.elapsed() < ttl {
                continue;
            }
            match bridge {
                Some(ref bridge) => self.close_viewer(bridge, &mut viewer).await,
                None => {
                    viewer.clear_room();
                    viewer.state = NegotiationState::Closed;
                    self.sessions.remove(&token).await;
                }
            }
            info!(viewer_session = %token.short(), "idle viewer session reaped");
            reaped += 1;
        }
        reaped
    }

    /// Leave every room, destroy leftover rooms, and clear the registries.
    pub async fn shutdown(&self) {
        let bridge = self.gateway.bridge().await.ok();
        let viewers = self.sessions.drain().await;
        let count = viewers.len();

        for viewer in viewers {
            let mut viewer = viewer.lock().await;
            match bridge {
                Some(ref bridge) => self.release(bridge, &mut viewer).await,
                None => viewer.clear_room(),
            }
            viewer.state = NegotiationState::Closed;
        }
        if let Some(ref bridge) = bridge {
            for room in self.rooms.rooms().await {
                self.rooms.destroy_room(bridge, &room).await;
            }
        }
        self.rooms.clear().await;
        self.events.publish(Event::Shutdown);
        info!(viewers = count, "signaling coordinator shut down");
    }
}

async fn forward_trickle(
    bridge: &AudioBridge,
    viewer: &mut ViewerSession,
    trickle: Trickle,
) -> Result<(), JanusError> {
    let handle = viewer.ensure_handle(bridge).await?;
    match trickle {
        Trickle::Completed => bridge.trickle_complete(handle).await,
        Trickle::Batch(candidates) => {
            bridge.trickle(handle, &candidates).await?;
            viewer.pending_candidates.extend(candidates);
            Ok(())
        }
    }
}
