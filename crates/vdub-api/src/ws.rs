//! WebSocket status stream and control channel with backpressure support.
//!
//! Every socket first receives the current snapshot, then every status and
//! result event the orchestrator publishes. Clients drive the workflow with
//! `{"action": ...}` frames.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use vdub_models::{ClientAction, ServerMessage};

use crate::handlers::workflow::cancel_active;
use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// Configuration for WebSocket backpressure.
const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Send a WebSocket message with backpressure handling.
async fn send_ws_message(tx: &mpsc::Sender<Message>, msg: ServerMessage) -> bool {
    let json = match serde_json::to_string(&msg) {
        Ok(j) => j,
        Err(_) => return false,
    };
    metrics::record_ws_message_sent(msg.type_name());

    match tx.try_send(Message::Text(json)) {
        Ok(_) => true,
        Err(mpsc::error::TrySendError::Full(message)) => {
            debug!("WebSocket send buffer full, applying backpressure");
            tx.send(message).await.is_ok()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection();

    ws.on_upgrade(|socket| async move {
        handle_socket(socket, state).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sender, mut receiver) = socket.split();

    // Bounded channel so a slow client applies backpressure to this socket only
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let broadcaster = state.broadcaster().clone();
    let mut subscription = broadcaster.subscribe();
    vdub_worker::metrics::set_observer_count(broadcaster.observer_count());
    debug!("Observer connected ({} total)", broadcaster.observer_count());

    if send_ws_message(&tx, ServerMessage::Status(subscription.initial.clone())).await {
        let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
        let mut last_activity = Instant::now();

        loop {
            tokio::select! {
                frame = receiver.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            metrics::record_ws_message_received();
                            last_activity = Instant::now();
                            if let Some(reply) = handle_action(&state, &text) {
                                if !send_ws_message(&tx, reply).await {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {
                            last_activity = Instant::now();
                        }
                        Some(Err(e)) => {
                            debug!("WebSocket receive error: {}", e);
                            break;
                        }
                    }
                }

                event = subscription.events.recv() => {
                    let message = match event {
                        Ok(event) => ServerMessage::from(event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Observer lagged by {} event(s), resyncing", skipped);
                            metrics::record_ws_resync();
                            ServerMessage::Status(broadcaster.snapshot())
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if !send_ws_message(&tx, message).await {
                        break;
                    }
                }

                _ = heartbeat.tick() => {
                    if last_activity.elapsed() > WS_HEARTBEAT_INTERVAL / 2
                        && tx.send(Message::Ping(Vec::new())).await.is_err()
                    {
                        break;
                    }
                }
            }
        }
    }

    drop(subscription);
    drop(tx);
    let _ = send_task.await;

    vdub_worker::metrics::set_observer_count(broadcaster.observer_count());
    debug!("Observer disconnected ({} remaining)", broadcaster.observer_count());
}

/// Turn a client frame into the direct reply, if the action has one.
///
/// `reset` has none: the idle snapshot reaches every socket, this one
/// included, through the broadcast.
pub(crate) fn handle_action(state: &AppState, text: &str) -> Option<ServerMessage> {
    let action = match ClientAction::parse(text) {
        Ok(action) => action,
        Err(e) => return Some(ServerMessage::error(e.to_string())),
    };

    match action {
        ClientAction::StartWorkflow { video_path } => {
            let Some(video_path) = video_path.filter(|p| !p.trim().is_empty()) else {
                return Some(ServerMessage::error("No video_path provided"));
            };
            match state.orchestrator.start(PathBuf::from(&video_path)) {
                Ok(running) => {
                    info!(job_id = %running.handle.id, video_path = %video_path, "Workflow started over WebSocket");
                    Some(ServerMessage::ack_started(video_path))
                }
                Err(e) => Some(ServerMessage::error(e.to_string())),
            }
        }
        ClientAction::GetStatus => Some(ServerMessage::Status(state.orchestrator.status())),
        ClientAction::Cancel => match cancel_active(state) {
            Ok(()) => Some(ServerMessage::ack("Workflow cancellation requested")),
            Err(e) => Some(ServerMessage::error(e.to_string())),
        },
        ClientAction::Reset => {
            state.orchestrator.reset();
            None
        }
        ClientAction::Ping { timestamp } => Some(ServerMessage::pong(timestamp)),
    }
}
