//! Process-wide room registry.
//!
//! Each key maps to a `OnceCell`, so concurrent requests for the same
//! scope wait on a single gateway `create` and resolve to the same room.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};
use tracing::{error, info, warn};

use rtcvoice_common::{Event, EventBus};
use rtcvoice_config::RoomsConfig;
use rtcvoice_janus::{AudioBridge, JanusError, RoomSpec};

use crate::room::{Room, RoomKey};

type RoomCell = Arc<OnceCell<Arc<Room>>>;

pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomKey, RoomCell>>,
    config: RoomsConfig,
    events: Arc<EventBus>,
}

impl RoomRegistry {
    pub fn new(config: RoomsConfig, events: Arc<EventBus>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            events,
        }
    }

    pub(crate) fn publish(&self, event: Event) {
        self.events.publish(event);
    }

    /// The room for `key`, created on the gateway if none is registered.
    ///
    /// A gateway rejection registers nothing. A room found closing is
    /// replaced by a fresh one.
    pub async fn select_room(
        &self,
        bridge: &AudioBridge,
        key: &RoomKey,
    ) -> Result<Arc<Room>, JanusError> {
        loop {
            let existing = self.rooms.read().await.get(key).cloned();
            let cell = match existing {
                Some(cell) => cell,
                None => self
                    .rooms
                    .write()
                    .await
                    .entry(key.clone())
                    .or_default()
                    .clone(),
            };

            match cell.get_or_try_init(|| self.create(bridge, key)).await {
                Ok(room) => {
                    if room.is_closed().await {
                        self.forget(key, room).await;
                        continue;
                    }
                    return Ok(room.clone());
                }
                Err(e) => {
                    let mut rooms = self.rooms.write().await;
                    if rooms
                        .get(key)
                        .is_some_and(|c| Arc::ptr_eq(c, &cell) && !c.initialized())
                    {
                        rooms.remove(key);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn create(&self, bridge: &AudioBridge, key: &RoomKey) -> Result<Arc<Room>, JanusError> {
        let spec = RoomSpec {
            description: key.description(),
            spatial: key.spatial,
            sampling_rate: self.config.sampling_rate,
            max_participants: self.config.max_participants,
        };
        let id = bridge.create_room(&spec).await?;
        info!(room = id, scope_id = key.scope_id, spatial = key.spatial, "room registered");
        self.events.publish(Event::RoomCreated {
            room: id,
            scope_id: key.scope_id,
            spatial: key.spatial,
        });
        Ok(Arc::new(Room::new(id, key.clone())))
    }

    /// Destroy an emptied room on the gateway and unregister it.
    ///
    /// The gateway call is retried with doubling backoff. A room the
    /// gateway no longer knows counts as destroyed. After the last attempt
    /// the room is unregistered regardless, after asking the gateway
    /// whether it is really still there.
    pub async fn destroy_room(&self, bridge: &AudioBridge, room: &Arc<Room>) {
        let attempts = self.config.destroy_attempts.max(1);
        let mut delay = self.config.destroy_backoff();
        let mut destroyed = false;

        for attempt in 1..=attempts {
            match bridge.destroy_room(room.id()).await {
                Ok(()) => {
                    destroyed = true;
                    break;
                }
                Err(e) if e.is_no_such_room() => {
                    destroyed = true;
                    break;
                }
                Err(e) => {
                    warn!(room = room.id(), attempt, error = %e, "room destroy failed");
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        if !destroyed {
            // The destroy may have landed even though its reply was lost.
            match bridge.room_exists(room.id()).await {
                Ok(exists) => destroyed = !exists,
                Err(e) => warn!(room = room.id(), error = %e, "room existence check failed"),
            }
        }
        if !destroyed {
            error!(
                room = room.id(),
                attempts, "room still exists on the gateway; dropping it locally"
            );
        }

        self.forget(room.key(), room).await;
        self.events.publish(Event::RoomDestroyed { room: room.id() });
    }

    /// Remove `key` only if it still maps to `room`.
    async fn forget(&self, key: &RoomKey, room: &Arc<Room>) {
        let mut rooms = self.rooms.write().await;
        let same = rooms
            .get(key)
            .and_then(|cell| cell.get())
            .is_some_and(|current| Arc::ptr_eq(current, room));
        if same {
            rooms.remove(key);
        }
    }

    pub async fn get(&self, key: &RoomKey) -> Option<Arc<Room>> {
        self.rooms
            .read()
            .await
            .get(key)
            .and_then(|cell| cell.get().cloned())
    }

    /// Every registered room.
    pub async fn rooms(&self) -> Vec<Arc<Room>> {
        self.rooms
            .read()
            .await
            .values()
            .filter_map(|cell| cell.get().cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.rooms
            .read()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Forget every room without touching the gateway.
    pub async fn clear(&self) {
        self.rooms.write().await.clear();
    }
}
