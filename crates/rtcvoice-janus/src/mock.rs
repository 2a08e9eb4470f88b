//! In-memory Janus gateway for tests.
//!
//! Answers like a real gateway running the AudioBridge plugin: it hands
//! out session, handle, and room numbers, keeps a room table, and returns
//! an SDP answer for joins. Every call is recorded so tests can assert on
//! exactly what reached the gateway. Failures and latency are injected
//! per request kind.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{JanusError, Result};
use crate::message::AUDIOBRIDGE_PLUGIN;
use crate::transport::JanusTransport;

/// One request as it reached the gateway.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub body: Value,
}

impl RecordedCall {
    /// Top-level `janus` kind.
    pub fn kind(&self) -> &str {
        self.body["janus"].as_str().unwrap_or("")
    }

    /// `body.request` of a plugin message.
    pub fn plugin_request(&self) -> Option<&str> {
        self.body["body"]["request"].as_str()
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    admin_calls: Vec<Value>,
    next_handle: u64,
    next_room: u64,
    next_participant: u64,
    rooms: HashSet<u64>,
    janus_rejections: HashMap<String, (i64, String)>,
    plugin_rejections: HashMap<String, (i64, String)>,
    delays: HashMap<String, Duration>,
    events: VecDeque<Value>,
    async_plugin_replies: bool,
    offline: bool,
}

pub struct MockTransport {
    state: Mutex<MockState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub const SESSION_ID: u64 = 4_242;
    pub const ANSWER_SDP: &'static str = "v=0\r\no=janus 1 1 IN IP4 127.0.0.1\r\ns=AudioBridge\r\n";

    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 2_000,
                next_room: 1_000,
                next_participant: 1,
                ..MockState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail every top-level request of `kind` with a Janus error.
    pub fn reject_janus(&self, kind: &str, code: i64, reason: &str) {
        self.lock()
            .janus_rejections
            .insert(kind.to_string(), (code, reason.to_string()));
    }

    /// Fail every plugin request of `request` with an AudioBridge error.
    pub fn reject_plugin(&self, request: &str, code: i64, reason: &str) {
        self.lock()
            .plugin_rejections
            .insert(request.to_string(), (code, reason.to_string()));
    }

    pub fn clear_rejections(&self) {
        let mut state = self.lock();
        state.janus_rejections.clear();
        state.plugin_rejections.clear();
    }

    /// Delay replies to a top-level kind or plugin request.
    pub fn set_delay(&self, key: &str, delay: Duration) {
        self.lock().delays.insert(key.to_string(), delay);
    }

    /// Answer join/configure/leave with `ack` and deliver the result through
    /// the long-poll, as a real gateway does.
    pub fn set_async_plugin_replies(&self, enabled: bool) {
        self.lock().async_plugin_replies = enabled;
    }

    /// Make every request fail at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn admin_calls(&self) -> Vec<Value> {
        self.lock().admin_calls.clone()
    }

    pub fn janus_calls(&self, kind: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.kind() == kind).collect()
    }

    pub fn plugin_calls(&self, request: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.plugin_request() == Some(request))
            .collect()
    }

    /// Rooms the gateway currently holds.
    pub fn rooms(&self) -> HashSet<u64> {
        self.lock().rooms.clone()
    }

    fn delay_for(&self, body: &Value) -> Option<Duration> {
        let state = self.lock();
        let kind = body["janus"].as_str().unwrap_or("");
        let request = body["body"]["request"].as_str().unwrap_or("");
        state
            .delays
            .get(request)
            .or_else(|| state.delays.get(kind))
            .copied()
    }

    fn respond(&self, path: &str, body: &Value) -> Result<Value> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            path: path.to_string(),
            body: body.clone(),
        });
        if state.offline {
            return Err(JanusError::Transport("connection refused".into()));
        }

        let transaction = body["transaction"].clone();
        let kind = body["janus"].as_str().unwrap_or("").to_string();
        if let Some((code, reason)) = state.janus_rejections.get(&kind) {
            return Ok(json!({
                "janus": "error",
                "transaction": transaction,
                "error": { "code": code, "reason": reason }
            }));
        }

        let reply = match kind.as_str() {
            "create" => json!({
                "janus": "success", "transaction": transaction,
                "data": { "id": Self::SESSION_ID }
            }),
            "attach" => {
                state.next_handle += 1;
                json!({
                    "janus": "success", "transaction": transaction,
                    "data": { "id": state.next_handle }
                })
            }
            "detach" | "destroy" => json!({ "janus": "success", "transaction": transaction }),
            "keepalive" | "trickle" => json!({ "janus": "ack", "transaction": transaction }),
            "message" => return Ok(Self::plugin_reply(&mut state, path, body)),
            other => json!({
                "janus": "error", "transaction": transaction,
                "error": { "code": 453, "reason": format!("Unknown request '{other}'") }
            }),
        };
        Ok(reply)
    }

    fn plugin_reply(state: &mut MockState, path: &str, body: &Value) -> Value {
        let transaction = body["transaction"].clone();
        let request = body["body"]["request"].as_str().unwrap_or("").to_string();
        let sender: u64 = path
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let (data, jsep, is_async) = if let Some((code, reason)) =
            state.plugin_rejections.get(&request)
        {
            (
                json!({ "audiobridge": "event", "error_code": code, "error": reason }),
                None,
                false,
            )
        } else {
            match request.as_str() {
                "create" => {
                    state.next_room += 1;
                    let room = state.next_room;
                    state.rooms.insert(room);
                    (json!({ "audiobridge": "created", "room": room }), None, false)
                }
                "exists" => {
                    let room = body["body"]["room"].as_u64().unwrap_or(0);
                    let exists = state.rooms.contains(&room);
                    (
                        json!({ "audiobridge": "success", "room": room, "exists": exists }),
                        None,
                        false,
                    )
                }
                "destroy" => {
                    let room = body["body"]["room"].as_u64().unwrap_or(0);
                    if state.rooms.remove(&room) {
                        (json!({ "audiobridge": "destroyed", "room": room }), None, false)
                    } else {
                        (no_such_room(room), None, false)
                    }
                }
                "join" => {
                    let room = body["body"]["room"].as_u64().unwrap_or(0);
                    if state.rooms.contains(&room) {
                        state.next_participant += 1;
                        (
                            json!({ "audiobridge": "joined", "room": room, "id": state.next_participant }),
                            Some(answer()),
                            true,
                        )
                    } else {
                        (no_such_room(room), None, false)
                    }
                }
                "configure" => (json!({ "audiobridge": "event", "result": "ok" }), Some(answer()), true),
                "leave" => (json!({ "audiobridge": "left" }), None, true),
                other => (
                    json!({ "audiobridge": "event", "error_code": 481, "error": format!("Unknown request '{other}'") }),
                    None,
                    false,
                ),
            }
        };

        let reply_kind = if is_async { "event" } else { "success" };
        let mut result = json!({
            "janus": reply_kind,
            "session_id": MockTransport::SESSION_ID,
            "sender": sender,
            "transaction": transaction,
            "plugindata": { "plugin": AUDIOBRIDGE_PLUGIN, "data": data },
        });
        if let Some(jsep) = jsep {
            result["jsep"] = jsep;
        }

        if is_async && state.async_plugin_replies {
            state.events.push_back(result);
            return json!({ "janus": "ack", "session_id": MockTransport::SESSION_ID, "transaction": transaction });
        }
        result
    }
}

fn answer() -> Value {
    json!({ "type": "answer", "sdp": MockTransport::ANSWER_SDP })
}

fn no_such_room(room: u64) -> Value {
    json!({ "audiobridge": "event", "error_code": 485, "error": format!("No such room ({room})") })
}

#[async_trait]
impl JanusTransport for MockTransport {
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        if let Some(delay) = self.delay_for(&body) {
            tokio::time::sleep(delay).await;
        }
        self.respond(path, &body)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        if self.lock().offline {
            return Err(JanusError::Transport("connection refused".into()));
        }
        if path == "/info" {
            return Ok(json!({ "janus": "server_info", "name": "Janus WebRTC Server (mock)" }));
        }

        let events: Vec<Value> = self.lock().events.drain(..).collect();
        if events.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            return Ok(json!({ "janus": "keepalive" }));
        }
        Ok(Value::Array(events))
    }

    async fn post_admin(&self, body: Value) -> Result<Value> {
        let mut state = self.lock();
        state.admin_calls.push(body.clone());
        if state.offline {
            return Err(JanusError::Transport("connection refused".into()));
        }
        Ok(json!({
            "janus": "success",
            "transaction": body["transaction"],
            "sessions": [MockTransport::SESSION_ID],
        }))
    }
}
