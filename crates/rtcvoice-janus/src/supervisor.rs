//! Supervised gateway connection.
//!
//! Owns the single process-wide Janus session and AudioBridge handle.
//! State moves `Disconnected → Connecting → Ready`, and to `Failed` when
//! the long-poll or a keepalive fails; [`Gateway::run`] then reconnects
//! with exponential backoff. Consumers call [`Gateway::bridge`], which
//! fails fast with [`JanusError::NotReady`] unless the state is `Ready`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use rtcvoice_common::{Event, EventBus};
use rtcvoice_config::{GatewayConfig, ReconnectConfig};

use crate::audiobridge::AudioBridge;
use crate::error::{JanusError, Result};
use crate::session::JanusSession;
use crate::transport::JanusTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
}

pub struct Gateway {
    transport: Arc<dyn JanusTransport>,
    config: GatewayConfig,
    reconnect: ReconnectConfig,
    events: Arc<EventBus>,
    state_tx: watch::Sender<ConnectionState>,
    current: RwLock<Option<Arc<AudioBridge>>>,
    /// Bumped every time a new gateway session becomes ready.
    generation: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn JanusTransport>,
        config: GatewayConfig,
        reconnect: ReconnectConfig,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            transport,
            config,
            reconnect,
            events,
            state_tx,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            shutdown_tx,
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The active AudioBridge, or `NotReady` without touching the gateway.
    pub async fn bridge(&self) -> Result<Arc<AudioBridge>> {
        if self.state() != ConnectionState::Ready {
            return Err(JanusError::NotReady);
        }
        self.current.read().await.clone().ok_or(JanusError::NotReady)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Create a gateway session and activate the AudioBridge once.
    pub async fn connect_once(&self) -> Result<Arc<AudioBridge>> {
        self.set_state(ConnectionState::Connecting);
        let attempt = async {
            let session = JanusSession::connect(self.transport.clone(), &self.config).await?;
            match AudioBridge::activate(session.clone()).await {
                Ok(bridge) => Ok(bridge),
                Err(e) => {
                    let _ = session.destroy().await;
                    Err(e)
                }
            }
        };

        match attempt.await {
            Ok(bridge) => {
                let bridge = Arc::new(bridge);
                *self.current.write().await = Some(bridge.clone());
                self.generation.fetch_add(1, Ordering::AcqRel);
                self.set_state(ConnectionState::Ready);
                self.events.publish(Event::GatewayReady {
                    session_id: bridge.session().id(),
                });
                Ok(bridge)
            }
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                Err(e)
            }
        }
    }

    /// Drop the current session after a fatal error.
    pub async fn mark_failed(&self, reason: &JanusError) {
        if let Some(bridge) = self.current.write().await.take() {
            bridge.session().close().await;
        }
        self.set_state(ConnectionState::Failed);
        self.events.publish(Event::GatewayLost {
            reason: reason.to_string(),
        });
    }

    /// Connect, keep the session alive, and reconnect after failures until
    /// [`shutdown`](Self::shutdown) is called.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut backoff = self.reconnect.initial_backoff();

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.connect_once().await {
                Ok(bridge) => {
                    backoff = self.reconnect.initial_backoff();
                    info!(
                        session = bridge.session().id(),
                        generation = self.generation(),
                        "gateway ready"
                    );
                    match self.supervise(&bridge, &mut shutdown).await {
                        Some(_) if *shutdown.borrow() => break,
                        Some(err) => {
                            warn!(error = %err, "gateway session lost");
                            self.mark_failed(&err).await;
                        }
                        None => break,
                    }
                }
                Err(e) => warn!(error = %e, "gateway connect failed"),
            }

            let delay = jittered(backoff);
            info!(delay_ms = delay.as_millis() as u64, "reconnecting to gateway");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
            backoff = (backoff * 2).min(self.reconnect.max_backoff());
        }

        // A connect that raced shutdown may have installed a fresh session.
        if let Some(bridge) = self.current.write().await.take() {
            let _ = bridge.session().destroy().await;
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Drive the event loop and keepalives; `None` means shutdown.
    async fn supervise(
        &self,
        bridge: &Arc<AudioBridge>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<JanusError> {
        let session = bridge.session().clone();
        let mut poller = tokio::spawn(session.clone().run_event_loop());
        let mut keepalive = tokio::time::interval(self.config.keepalive_interval());
        keepalive.tick().await;

        let outcome = loop {
            tokio::select! {
                _ = shutdown.changed() => break None,
                joined = &mut poller => {
                    break Some(joined.unwrap_or_else(|e| JanusError::Protocol(format!("event loop panicked: {e}"))));
                }
                _ = keepalive.tick() => {
                    if let Err(e) = session.keepalive().await {
                        break Some(e);
                    }
                }
            }
        };
        poller.abort();
        outcome
    }

    /// Stop the supervisor and destroy the gateway session.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        if let Some(bridge) = self.current.write().await.take() {
            if let Err(e) = bridge.session().destroy().await {
                warn!(error = %e, "gateway session destroy failed during shutdown");
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

fn jittered(base: Duration) -> Duration {
    let spread = base.as_millis() as u64 / 10;
    if spread == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    fn gateway(mock: &Arc<MockTransport>) -> Arc<Gateway> {
        let reconnect = ReconnectConfig {
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
        };
        Gateway::new(
            mock.clone(),
            GatewayConfig::default(),
            reconnect,
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn bridge_not_ready_before_connect() {
        let mock = Arc::new(MockTransport::new());
        let gw = gateway(&mock);
        assert_eq!(gw.state(), ConnectionState::Disconnected);
        assert_eq!(gw.bridge().await.err().unwrap(), JanusError::NotReady);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn connect_once_activates_bridge() {
        let mock = Arc::new(MockTransport::new());
        let gw = gateway(&mock);
        let bridge = gw.connect_once().await.unwrap();
        assert_eq!(gw.state(), ConnectionState::Ready);
        assert_eq!(gw.generation(), 1);
        assert_eq!(bridge.session().id(), MockTransport::SESSION_ID);
        assert!(gw.bridge().await.is_ok());
        assert_eq!(mock.janus_calls("attach").len(), 1);
    }

    #[tokio::test]
    async fn failed_attach_leaves_gateway_failed() {
        let mock = Arc::new(MockTransport::new());
        mock.reject_janus("attach", 460, "No such plugin");
        let gw = gateway(&mock);
        assert!(gw.connect_once().await.is_err());
        assert_eq!(gw.state(), ConnectionState::Failed);
        assert!(gw.bridge().await.is_err());
        assert_eq!(mock.janus_calls("destroy").len(), 1);
    }

    #[tokio::test]
    async fn mark_failed_publishes_and_blocks_bridge() {
        let mock = Arc::new(MockTransport::new());
        let events = Arc::new(EventBus::default());
        let gw = Gateway::new(
            mock.clone(),
            GatewayConfig::default(),
            ReconnectConfig::default(),
            events.clone(),
        );
        let mut rx = events.subscribe();
        gw.connect_once().await.unwrap();
        gw.mark_failed(&JanusError::Timeout).await;

        assert_eq!(gw.state(), ConnectionState::Failed);
        assert!(gw.bridge().await.is_err());
        assert!(matches!(rx.recv().await.unwrap(), Event::GatewayReady { .. }));
        assert!(matches!(rx.recv().await.unwrap(), Event::GatewayLost { .. }));
    }

    #[tokio::test]
    async fn run_reconnects_after_gateway_loss() {
        let mock = Arc::new(MockTransport::new());
        let gw = gateway(&mock);
        let mut states = gw.subscribe();
        let task = tokio::spawn(gw.clone().run());

        states
            .wait_for(|s| *s == ConnectionState::Ready)
            .await
            .unwrap();
        assert_eq!(gw.generation(), 1);

        mock.set_offline(true);
        states
            .wait_for(|s| *s == ConnectionState::Failed)
            .await
            .unwrap();
        mock.set_offline(false);
        states
            .wait_for(|s| *s == ConnectionState::Ready)
            .await
            .unwrap();
        assert!(gw.generation() >= 2);

        gw.shutdown().await;
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gw.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let base = Duration::from_millis(1_000);
        for _ in 0..50 {
            let d = jittered(base);
            assert!(d >= base && d <= Duration::from_millis(1_100));
        }
    }
}
