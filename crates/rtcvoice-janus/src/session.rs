//! One Janus gateway session: request/reply, async event routing, keepalive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, trace, warn};

use rtcvoice_common::{new_transaction_id, redact};
use rtcvoice_config::GatewayConfig;

use crate::error::{JanusError, Result};
use crate::message::{self, Reply};
use crate::transport::JanusTransport;

/// An authenticated session with the gateway.
///
/// Created by [`JanusSession::connect`]; every plugin handle and room
/// operation borrows it. Plugin messages that Janus acknowledges with
/// `ack` are completed by [`JanusSession::poll_events`], which must be
/// driven by a separate task (see [`crate::Gateway`]).
pub struct JanusSession {
    transport: Arc<dyn JanusTransport>,
    id: u64,
    api_token: Option<String>,
    admin_token: Option<String>,
    request_timeout: Duration,
    max_events: u32,
    /// Transactions waiting for an asynchronous event.
    pending: Mutex<HashMap<String, oneshot::Sender<Value>>>,
    closed: AtomicBool,
}

impl JanusSession {
    /// Create the gateway-level session (`"janus": "create"`).
    pub async fn connect(
        transport: Arc<dyn JanusTransport>,
        config: &GatewayConfig,
    ) -> Result<Arc<Self>> {
        let api_token = non_empty(&config.api_token);
        let mut body = message::request("create");
        body["transaction"] = json!(new_transaction_id());
        if let Some(ref token) = api_token {
            body["apisecret"] = json!(token);
        }

        let reply = tokio::time::timeout(config.request_timeout(), transport.post("", body))
            .await
            .map_err(|_| JanusError::Timeout)??;
        let id = match message::classify(reply)? {
            Reply::Done(reply) => message::success_id(&reply)?,
            Reply::Ack => return Err(JanusError::Protocol("session create was only acked".into())),
        };

        info!(
            session = id,
            base_uri = %config.base_uri,
            api_token = %api_token.as_deref().map(redact).unwrap_or_default(),
            "Janus session created"
        );

        Ok(Arc::new(Self {
            transport,
            id,
            api_token,
            admin_token: non_empty(&config.admin_token),
            request_timeout: config.request_timeout(),
            max_events: config.long_poll_max_events,
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn path(&self, handle: Option<u64>) -> String {
        match handle {
            Some(handle) => format!("/{}/{handle}", self.id),
            None => format!("/{}", self.id),
        }
    }

    /// Send a request that completes synchronously (`success` or `ack`).
    pub async fn post(&self, handle: Option<u64>, body: Value) -> Result<Value> {
        self.round_trip(handle, body, false).await
    }

    /// Send a plugin message and wait for its result, following an `ack`
    /// to the event carrying the same transaction.
    pub async fn post_plugin(&self, handle: u64, body: Value) -> Result<Value> {
        self.round_trip(Some(handle), body, true).await
    }

    async fn round_trip(
        &self,
        handle: Option<u64>,
        mut body: Value,
        await_event: bool,
    ) -> Result<Value> {
        if self.is_closed() {
            return Err(JanusError::SessionClosed);
        }

        let transaction = new_transaction_id();
        body["transaction"] = json!(transaction);
        if let Some(ref token) = self.api_token {
            body["apisecret"] = json!(token);
        }

        // Register before sending: the event can beat the HTTP reply.
        let waiter = if await_event {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().await.insert(transaction.clone(), tx);
            Some(rx)
        } else {
            None
        };

        let started = tokio::time::Instant::now();
        let sent = tokio::time::timeout(
            self.request_timeout,
            self.transport.post(&self.path(handle), body),
        )
        .await
        .map_err(|_| JanusError::Timeout)
        .and_then(|r| r)
        .and_then(message::classify);

        let reply = match sent {
            Ok(reply) => reply,
            Err(e) => {
                self.forget(&transaction).await;
                return Err(e);
            }
        };

        match (reply, waiter) {
            (Reply::Done(value), _) => {
                self.forget(&transaction).await;
                Ok(value)
            }
            (Reply::Ack, None) => Ok(json!({ "janus": "ack", "transaction": transaction })),
            (Reply::Ack, Some(rx)) => {
                let remaining = self.request_timeout.saturating_sub(started.elapsed());
                trace!(session = self.id, %transaction, "acked, waiting for event");
                match tokio::time::timeout(remaining, rx).await {
                    Ok(Ok(event)) => Ok(event),
                    Ok(Err(_)) => Err(JanusError::SessionClosed),
                    Err(_) => {
                        self.forget(&transaction).await;
                        Err(JanusError::Timeout)
                    }
                }
            }
        }
    }

    async fn forget(&self, transaction: &str) {
        self.pending.lock().await.remove(transaction);
    }

    /// Attach a plugin handle to this session.
    pub async fn attach(&self, plugin: &str) -> Result<u64> {
        let mut body = message::request("attach");
        body["plugin"] = json!(plugin);
        let reply = self.post(None, body).await?;
        let handle = message::success_id(&reply)?;
        debug!(session = self.id, handle, plugin, "plugin handle attached");
        Ok(handle)
    }

    pub async fn detach(&self, handle: u64) -> Result<()> {
        self.post(Some(handle), message::request("detach")).await?;
        debug!(session = self.id, handle, "plugin handle detached");
        Ok(())
    }

    pub async fn keepalive(&self) -> Result<()> {
        self.post(None, message::request("keepalive")).await?;
        trace!(session = self.id, "keepalive");
        Ok(())
    }

    /// Destroy the gateway session. Waiting transactions fail with
    /// [`JanusError::SessionClosed`].
    pub async fn destroy(&self) -> Result<()> {
        let result = self.post(None, message::request("destroy")).await;
        self.close().await;
        result.map(|_| info!(session = self.id, "Janus session destroyed"))
    }

    /// Mark the session unusable and drop all waiting transactions.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.pending.lock().await.clear();
    }

    /// Run one long-poll round and route the events it returns.
    ///
    /// Returns the number of events received (keepalives excluded).
    pub async fn poll_events(&self) -> Result<usize> {
        if self.is_closed() {
            return Err(JanusError::SessionClosed);
        }
        let mut path = format!("{}?maxev={}", self.path(None), self.max_events);
        if let Some(ref token) = self.api_token {
            path.push_str("&apisecret=");
            path.push_str(token);
        }

        let reply = self.transport.get(&path).await?;
        let events = match reply {
            Value::Array(events) => events,
            single => vec![single],
        };

        let mut count = 0;
        for event in events {
            match event["janus"].as_str() {
                Some("keepalive") => {}
                Some("error") => {
                    let err = message::classify(event).err().unwrap_or(JanusError::SessionClosed);
                    return Err(err);
                }
                _ => {
                    count += 1;
                    self.dispatch_event(event).await;
                }
            }
        }
        Ok(count)
    }

    /// Deliver an event to the transaction waiting for it, if any.
    pub async fn dispatch_event(&self, event: Value) {
        let waiter = match event["transaction"].as_str() {
            Some(transaction) => self.pending.lock().await.remove(transaction),
            None => None,
        };
        match waiter {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => match event["janus"].as_str() {
                Some("hangup") | Some("detached") => warn!(
                    session = self.id,
                    handle = %event["sender"],
                    reason = %event["reason"],
                    "gateway dropped a handle"
                ),
                kind => debug!(session = self.id, ?kind, "unsolicited gateway event"),
            },
        }
    }

    /// Run [`poll_events`](Self::poll_events) until it fails.
    pub async fn run_event_loop(self: Arc<Self>) -> JanusError {
        loop {
            if let Err(e) = self.poll_events().await {
                return e;
            }
        }
    }

    /// `GET /info` on the API root.
    pub async fn server_info(&self) -> Result<Value> {
        let reply = tokio::time::timeout(self.request_timeout, self.transport.get("/info"))
            .await
            .map_err(|_| JanusError::Timeout)??;
        match message::classify(reply)? {
            Reply::Done(info) => Ok(info),
            Reply::Ack => Err(JanusError::Protocol("info was only acked".into())),
        }
    }

    /// Send a request to the admin API, authenticated with the admin token.
    pub async fn admin_request(&self, kind: &str) -> Result<Value> {
        let mut body = message::request(kind);
        body["transaction"] = json!(new_transaction_id());
        if let Some(ref token) = self.admin_token {
            body["admin_secret"] = json!(token);
        }
        let reply = tokio::time::timeout(self.request_timeout, self.transport.post_admin(body))
            .await
            .map_err(|_| JanusError::Timeout)??;
        match message::classify(reply)? {
            Reply::Done(reply) => Ok(reply),
            Reply::Ack => Err(JanusError::Protocol("admin request was only acked".into())),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
