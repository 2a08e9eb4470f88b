//! Per-viewer negotiation state and the token registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use rtcvoice_common::ViewerToken;
use rtcvoice_janus::{AudioBridge, JanusError, Jsep, TrickleCandidate};

use crate::room::Room;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    OfferReceived,
    RoomSelected,
    Joined,
    Active,
    Closed,
}

/// One viewer's offer/answer exchange, room, and gateway handle.
#[derive(Debug)]
pub struct ViewerSession {
    pub token: ViewerToken,
    /// Avatar id, sent to the gateway as the participant display name.
    pub user: Option<String>,
    pub state: NegotiationState,
    pub room: Option<Arc<Room>>,
    pub offer_received: Option<Jsep>,
    pub offer_forwarded: Option<Jsep>,
    pub answer: Option<Jsep>,
    pub pending_candidates: Vec<TrickleCandidate>,
    pub handle_id: Option<u64>,
    pub last_activity: Instant,
}

impl ViewerSession {
    pub fn new(token: ViewerToken) -> Self {
        Self {
            token,
            user: None,
            state: NegotiationState::New,
            room: None,
            offer_received: None,
            offer_forwarded: None,
            answer: None,
            pending_candidates: Vec::new(),
            handle_id: None,
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn room_id(&self) -> Option<u64> {
        self.room.as_ref().map(|r| r.id())
    }

    /// The viewer's gateway handle, attaching one on first use.
    pub async fn ensure_handle(&mut self, bridge: &AudioBridge) -> Result<u64, JanusError> {
        if let Some(handle) = self.handle_id {
            return Ok(handle);
        }
        let handle = bridge.attach_viewer().await?;
        debug!(viewer_session = %self.token.short(), handle, "viewer handle attached");
        self.handle_id = Some(handle);
        Ok(handle)
    }

    /// Forget everything tied to the current room and handle.
    pub(crate) fn clear_room(&mut self) {
        self.room = None;
        self.handle_id = None;
        self.answer = None;
        self.pending_candidates.clear();
    }
}

pub type SharedViewer = Arc<Mutex<ViewerSession>>;

/// Token → session map shared by every request task.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ViewerToken, SharedViewer>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the session for `token`, creating it if absent.
    ///
    /// An absent or empty token gets a freshly generated one. The returned
    /// flag is true when the session was created by this call.
    pub async fn resolve(&self, token: Option<&str>) -> (SharedViewer, ViewerToken, bool) {
        let token = match token {
            Some(t) if !t.is_empty() => ViewerToken::from(t),
            _ => ViewerToken::new(),
        };

        if let Some(existing) = self.sessions.read().await.get(&token) {
            return (existing.clone(), token, false);
        }

        let mut sessions = self.sessions.write().await;
        let mut created = false;
        let session = sessions
            .entry(token.clone())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(ViewerSession::new(token.clone())))
            })
            .clone();
        (session, token, created)
    }

    pub async fn get(&self, token: &ViewerToken) -> Option<SharedViewer> {
        self.sessions.read().await.get(token).cloned()
    }

    pub async fn remove(&self, token: &ViewerToken) -> Option<SharedViewer> {
        self.sessions.write().await.remove(token)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove and return every session.
    pub async fn drain(&self) -> Vec<SharedViewer> {
        self.sessions.write().await.drain().map(|(_, v)| v).collect()
    }

    /// Sessions untouched for at least `ttl`. Sessions busy with a request
    /// are never considered idle.
    pub async fn idle(&self, ttl: Duration) -> Vec<(ViewerToken, SharedViewer)> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(_, viewer)| {
                viewer
                    .try_lock()
                    .map(|v| v.last_activity.elapsed() >= ttl)
                    .unwrap_or(false)
            })
            .map(|(token, viewer)| (token.clone(), viewer.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_without_token_generates_one() {
        let registry = SessionRegistry::new();
        let (viewer, token, created) = registry.resolve(None).await;
        assert!(created);
        assert!(!token.as_str().is_empty());
        assert_eq!(viewer.lock().await.token, token);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn empty_token_counts_as_missing() {
        let registry = SessionRegistry::new();
        let (_, token, created) = registry.resolve(Some("")).await;
        assert!(created);
        assert!(!token.as_str().is_empty());
    }

    #[tokio::test]
    async fn known_token_returns_same_session() {
        let registry = SessionRegistry::new();
        let (first, token, _) = registry.resolve(Some("abc")).await;
        assert_eq!(token.as_str(), "abc");
        let (second, again, created) = registry.resolve(Some("abc")).await;
        assert!(!created);
        assert_eq!(again, token);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn concurrent_resolve_shares_one_session() {
        let registry = Arc::new(SessionRegistry::new());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.resolve(Some("shared")).await
            }));
        }
        let mut sessions = Vec::new();
        let mut creations = 0;
        for task in tasks {
            let (viewer, _, created) = task.await.unwrap();
            if created {
                creations += 1;
            }
            sessions.push(viewer);
        }
        assert_eq!(creations, 1);
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn idle_skips_recent_and_busy_sessions() {
        let registry = SessionRegistry::new();
        let (old, _, _) = registry.resolve(Some("old")).await;
        let (busy, _, _) = registry.resolve(Some("busy")).await;
        registry.resolve(Some("fresh")).await;

        let past = Instant::now() - Duration::from_secs(120);
        old.lock().await.last_activity = past;
        busy.lock().await.last_activity = past;
        let _held = busy.lock().await;

        let idle = registry.idle(Duration::from_secs(60)).await;
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].0.as_str(), "old");
    }

    #[tokio::test]
    async fn drain_empties_registry() {
        let registry = SessionRegistry::new();
        registry.resolve(Some("a")).await;
        registry.resolve(Some("b")).await;
        assert_eq!(registry.drain().await.len(), 2);
        assert!(registry.is_empty().await);
    }
}
