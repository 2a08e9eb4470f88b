//! One AudioBridge conference and its membership.
//!
//! Membership changes are serialized on the room's mutex, but the mutex is
//! never held across a gateway round-trip. A join first reserves a slot
//! (`pending_joins`), talks to the gateway unlocked, then commits.
//!
//! Whoever observes the room empty with no joins pending marks it closed
//! and destroys it: the leave that removes the last member, or the failed
//! join that was the last one in flight. Marking happens under the lock,
//! so a room is never destroyed under an in-flight join and never
//! destroyed twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rtcvoice_common::{Event, ViewerToken};
use rtcvoice_janus::{AudioBridge, JanusError, Jsep};

use crate::error::VoiceError;
use crate::registry::RoomRegistry;
use crate::viewer::ViewerSession;

/// What a room is for: a spatial scope or an explicit channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub scope_id: i64,
    pub spatial: bool,
    pub channel_id: Option<String>,
}

impl RoomKey {
    pub fn new(scope_id: i64, spatial: bool, channel_id: Option<String>) -> Self {
        Self {
            scope_id,
            spatial,
            channel_id: channel_id.filter(|c| !c.is_empty()),
        }
    }

    /// Human-readable room description sent to the gateway.
    pub fn description(&self) -> String {
        let base = match &self.channel_id {
            Some(channel) => format!("channel {channel}"),
            None => format!("scope {}", self.scope_id),
        };
        if self.spatial {
            format!("{base} (spatial)")
        } else {
            base
        }
    }
}

#[derive(Debug, Clone)]
pub struct Membership {
    pub handle_id: u64,
    pub participant_id: Option<u64>,
    pub user: Option<String>,
    pub joined_at: Instant,
}

#[derive(Debug, Default)]
struct RoomState {
    members: HashMap<ViewerToken, Membership>,
    pending_joins: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct Room {
    id: u64,
    key: RoomKey,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(id: u64, key: RoomKey) -> Self {
        Self {
            id,
            key,
            state: Mutex::new(RoomState::default()),
        }
    }

    /// Gateway room number.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    pub async fn member_count(&self) -> usize {
        self.state.lock().await.members.len()
    }

    pub async fn is_member(&self, token: &ViewerToken) -> bool {
        self.state.lock().await.members.contains_key(token)
    }

    /// True once the last member left and the room is being torn down.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Publish the viewer's forwarded offer into this room.
    ///
    /// Leaves the viewer's previous room first. A viewer already in this
    /// room renegotiates instead of joining twice. On failure membership
    /// is untouched; a room left empty by the failure is destroyed.
    pub async fn join_room(
        self: &Arc<Self>,
        rooms: &RoomRegistry,
        bridge: &AudioBridge,
        viewer: &mut ViewerSession,
    ) -> Result<(), VoiceError> {
        let offer = viewer.offer_forwarded.clone().ok_or(VoiceError::NoJsep)?;

        if let Some(current) = viewer.room.clone() {
            if !Arc::ptr_eq(&current, self) {
                current.leave_room(rooms, bridge, viewer).await?;
            }
        }

        let existing = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(VoiceError::RoomClosed);
            }
            state.pending_joins += 1;
            state.members.get(&viewer.token).cloned()
        };

        let outcome = self.negotiate(bridge, viewer, existing.as_ref(), &offer).await;

        let mut state = self.state.lock().await;
        state.pending_joins -= 1;
        let (handle_id, participant_id, answer) = match outcome {
            Ok(negotiated) => negotiated,
            Err(e) => {
                let abandoned =
                    state.members.is_empty() && state.pending_joins == 0 && !state.closed;
                if abandoned {
                    state.closed = true;
                }
                drop(state);
                if abandoned {
                    debug!(room = self.id, "no members left after failed join");
                    rooms.destroy_room(bridge, self).await;
                }
                return Err(e.into());
            }
        };
        if existing.is_none() {
            state.members.insert(
                viewer.token.clone(),
                Membership {
                    handle_id,
                    participant_id,
                    user: viewer.user.clone(),
                    joined_at: Instant::now(),
                },
            );
        }
        let members = state.members.len();
        drop(state);

        viewer.answer = Some(answer);
        viewer.room = Some(self.clone());
        if existing.is_none() {
            info!(room = self.id, viewer_session = %viewer.token.short(), members, "viewer joined room");
            rooms.publish(Event::ViewerJoined {
                room: self.id,
                viewer: viewer.token.to_string(),
            });
        } else {
            debug!(room = self.id, viewer_session = %viewer.token.short(), "viewer renegotiated");
        }
        Ok(())
    }

    async fn negotiate(
        &self,
        bridge: &AudioBridge,
        viewer: &mut ViewerSession,
        existing: Option<&Membership>,
        offer: &Jsep,
    ) -> Result<(u64, Option<u64>, Jsep), JanusError> {
        if let Some(member) = existing {
            let answer = bridge.configure(member.handle_id, offer).await?;
            return Ok((member.handle_id, member.participant_id, answer));
        }
        let handle = viewer.ensure_handle(bridge).await?;
        let joined = bridge
            .join(handle, self.id, viewer.user.as_deref(), offer)
            .await?;
        Ok((handle, joined.participant_id, joined.answer))
    }

    /// Drop the viewer from this room, destroying the room if it empties.
    ///
    /// Leaving a room the viewer is not in does nothing.
    pub async fn leave_room(
        self: &Arc<Self>,
        rooms: &RoomRegistry,
        bridge: &AudioBridge,
        viewer: &mut ViewerSession,
    ) -> Result<(), VoiceError> {
        let (member, now_empty) = {
            let mut state = self.state.lock().await;
            let Some(member) = state.members.remove(&viewer.token) else {
                return Ok(());
            };
            let now_empty = state.members.is_empty() && state.pending_joins == 0;
            if now_empty {
                state.closed = true;
            }
            (member, now_empty)
        };

        if let Err(e) = bridge.leave(member.handle_id).await {
            warn!(room = self.id, viewer_session = %viewer.token.short(), error = %e, "gateway leave failed");
        }
        if let Err(e) = bridge.detach_viewer(member.handle_id).await {
            warn!(handle = member.handle_id, error = %e, "viewer handle detach failed");
        }
        if viewer.room.as_ref().is_some_and(|r| Arc::ptr_eq(r, self)) {
            viewer.clear_room();
        }

        info!(room = self.id, viewer_session = %viewer.token.short(), "viewer left room");
        rooms.publish(Event::ViewerLeft {
            room: self.id,
            viewer: viewer.token.to_string(),
        });

        if now_empty {
            rooms.destroy_room(bridge, self).await;
        }
        Ok(())
    }
}
