//! Webhook HTTP listener.
//!
//! One axum server on an ephemeral local port, driven by a current-thread
//! Tokio runtime on its own OS thread. Notifications are dispatched one at a
//! time, in arrival order, on the blocking pool.

use crate::hooks::HookRegistry;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

#[derive(Clone)]
struct ListenerState {
    registry: Arc<HookRegistry>,
    /// Serializes dispatch so a completion never overtakes its start.
    turn: Arc<Mutex<()>>,
}

pub(crate) struct ListenerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Webhook listener thread panicked");
            }
        }
    }
}

/// Bind `bind_host` on an ephemeral port and start serving notifications.
pub(crate) fn spawn_listener(
    bind_host: &str,
    registry: Arc<HookRegistry>,
) -> io::Result<(SocketAddr, ListenerHandle)> {
    let std_listener = std::net::TcpListener::bind((bind_host, 0))?;
    std_listener.set_nonblocking(true)?;
    let local_addr = std_listener.local_addr()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let listener = {
        let _guard = runtime.enter();
        tokio::net::TcpListener::from_std(std_listener)?
    };

    let app = router(registry);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let thread = thread::Builder::new()
        .name("cadence-hooks".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                });
                if let Err(e) = server.await {
                    error!("Webhook listener stopped: {}", e);
                }
            });
        })?;

    info!("Webhook listener bound to {}", local_addr);

    Ok((
        local_addr,
        ListenerHandle {
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        },
    ))
}

fn router(registry: Arc<HookRegistry>) -> Router {
    Router::new()
        .route("/:id", post(receive_hook))
        .with_state(ListenerState {
            registry,
            turn: Arc::new(Mutex::new(())),
        })
}

async fn receive_hook(
    State(state): State<ListenerState>,
    Path(id): Path<String>,
    body: Bytes,
) -> StatusCode {
    // The scheduler sends a single line of JSON.
    let line = body.split(|b| *b == b'\n').next().unwrap_or_default();
    let payload: Value = match serde_json::from_slice(line) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejecting unparsable notification for hook {}: {}", id, e);
            return StatusCode::BAD_REQUEST;
        }
    };

    let _turn = state.turn.lock().await;
    let registry = Arc::clone(&state.registry);
    let hook_id = id.clone();
    match tokio::task::spawn_blocking(move || registry.dispatch(&hook_id, &payload)).await {
        Ok(Ok(disposition)) => debug!("Hook {} dispatched: {:?}", id, disposition),
        Ok(Err(violation)) => warn!("{}", violation),
        Err(e) => error!("Dispatch for hook {} panicked: {}", id, e),
    }

    StatusCode::OK
}
