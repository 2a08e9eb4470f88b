//! rtcvoice-server: voice signaling endpoint in front of a Janus gateway.
//!
//! Accepts WebSocket connections from the host application, hands each
//! provisioning or signaling frame to the coordinator, and keeps the
//! gateway session alive with a supervised reconnect loop.

mod connection;
mod protocol;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing_subscriber::fmt::format::FmtSpan;

use rtcvoice_common::{Event, EventBus, RtcVoiceError};
use rtcvoice_config::{LoggingConfig, RtcVoiceConfig};
use rtcvoice_core::SignalingCoordinator;
use rtcvoice_janus::{Gateway, HttpTransport};

use crate::connection::handle_connection;

#[derive(Parser)]
#[command(name = "rtcvoice-server", about = "WebRTC voice signaling for a Janus AudioBridge")]
struct Args {
    /// Config file (defaults to $RTCVOICE_CONFIG, then the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.listen_addr`.
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rtcvoice-server: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config.logging);

    if let Err(e) = run(config, args.listen).await {
        tracing::error!(error = %e, "rtcvoice-server stopped");
        std::process::exit(1);
    }
}

fn load(args: &Args) -> Result<RtcVoiceConfig, RtcVoiceError> {
    let config = match args.config {
        Some(ref path) => rtcvoice_config::load_config_from(path)?,
        None => rtcvoice_config::load_config()?,
    };
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) {
    let default_filter = format!(
        "rtcvoice_server={level},rtcvoice_core={level},rtcvoice_janus={level}",
        level = logging.level.as_filter()
    );
    let spans = if logging.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_span_events(spans)
        .init();
}

async fn run(config: RtcVoiceConfig, listen: Option<String>) -> Result<(), RtcVoiceError> {
    let events = Arc::new(EventBus::default());
    let transport =
        HttpTransport::new(&config.gateway).map_err(|e| RtcVoiceError::Gateway(e.to_string()))?;
    let gateway = Gateway::new(
        Arc::new(transport),
        config.gateway.clone(),
        config.reconnect.clone(),
        events.clone(),
    );
    let coordinator = Arc::new(SignalingCoordinator::new(
        gateway.clone(),
        config.rooms.clone(),
        events.clone(),
    ));

    let supervisor = tokio::spawn(gateway.clone().run());
    tokio::spawn(watch_events(events.clone(), gateway.clone()));

    // Idle viewer reaper.
    let reaper = coordinator.clone();
    let ttl = config.server.session_ttl();
    let every = config.server.reap_interval();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.tick().await;
        loop {
            tick.tick().await;
            let reaped = reaper.reap_idle(ttl).await;
            let sessions = reaper.sessions().len().await;
            tracing::debug!(reaped, sessions, "Reaper tick");
        }
    });

    let addr = listen.unwrap_or_else(|| config.server.listen_addr.clone());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("rtcvoice-server listening on {}", addr);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let coordinator = coordinator.clone();
                    tokio::spawn(async move {
                        match accept_async(stream).await {
                            Ok(ws) => handle_connection(ws, peer, coordinator).await,
                            Err(e) => {
                                tracing::warn!(peer = %peer, error = %e, "WS handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            },
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "Ctrl-C handler failed; shutting down");
                }
                break;
            }
        }
    }

    tracing::info!("Shutting down");
    coordinator.shutdown().await;
    gateway.shutdown().await;
    if let Err(e) = supervisor.await {
        tracing::warn!(error = %e, "Gateway supervisor ended abnormally");
    }
    Ok(())
}

/// Log lifecycle events and run startup diagnostics whenever the gateway
/// (re)connects.
async fn watch_events(events: Arc<EventBus>, gateway: Arc<Gateway>) {
    let mut rx = events.subscribe();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event watcher lagged");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };
        match event {
            Event::GatewayReady { session_id } => {
                tracing::info!(session = session_id, "Gateway ready");
                if let Ok(bridge) = gateway.bridge().await {
                    let session = bridge.session().clone();
                    tokio::spawn(async move {
                        match session.server_info().await {
                            Ok(info) => tracing::info!(
                                name = info["name"].as_str().unwrap_or("unknown"),
                                version = info["version_string"].as_str().unwrap_or("unknown"),
                                "Gateway server info"
                            ),
                            Err(e) => tracing::warn!(error = %e, "Gateway info request failed"),
                        }
                        match session.admin_request("list_sessions").await {
                            Ok(reply) => tracing::debug!(
                                sessions = reply["sessions"].as_array().map_or(0, |s| s.len()),
                                "Gateway admin API reachable"
                            ),
                            Err(e) => tracing::debug!(error = %e, "Gateway admin API unavailable"),
                        }
                    });
                }
            }
            Event::GatewayLost { reason } => tracing::warn!(%reason, "Gateway lost"),
            Event::RoomCreated {
                room,
                scope_id,
                spatial,
            } => tracing::debug!(room, scope_id, spatial, "Room created"),
            Event::RoomDestroyed { room } => tracing::debug!(room, "Room destroyed"),
            Event::ViewerJoined { room, .. } => tracing::debug!(room, "Viewer joined"),
            Event::ViewerLeft { room, .. } => tracing::debug!(room, "Viewer left"),
            Event::ViewerClosed { .. } => tracing::debug!("Viewer closed"),
            Event::Shutdown => break,
        }
    }
}
