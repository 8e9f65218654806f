//! HTTP front and server lifecycle
//!
//! One route: `GET /?text=…`. Requests are handled end-to-end by a worker
//! slot from a pool of `max_threads` permits; arrivals beyond the pool
//! size queue on the semaphore. `stop()` flips the abort token shared with
//! every in-flight attempt, then drains the listener gracefully.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::strings;
use crate::translator::Translator;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

#[derive(Clone)]
struct FrontState {
    translator: Arc<Translator>,
    workers: Arc<Semaphore>,
    cancel: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct TranslateQuery {
    text: Option<String>,
}

struct RunningServer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Lifecycle wrapper around the listener task.
pub struct Server {
    translator: Arc<Translator>,
    running: Mutex<Option<RunningServer>>,
}

impl Server {
    pub fn new(translator: Arc<Translator>) -> Self {
        Self {
            translator,
            running: Mutex::new(None),
        }
    }

    /// Bind the listener and start serving. Idempotent while running;
    /// returns the bound address (useful when the configured port is 0).
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        if let Some(running) = self.running.lock().unwrap().as_ref() {
            return Ok(running.local_addr);
        }

        let config = self.translator.config().current();
        let cancel = CancellationToken::new();

        let state = FrontState {
            translator: self.translator.clone(),
            workers: Arc::new(Semaphore::new(config.worker_count())),
            cancel: cancel.clone(),
        };

        let app = Router::new()
            .route("/", get(translate_handler))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;
        let local_addr = listener.local_addr()?;

        let shutdown = cancel.clone();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { shutdown.cancelled().await });

            if let Err(e) = serve.await {
                tracing::error!(error = %e, "server task failed");
            }
        });

        self.translator.sink().log_message(&strings::server_started(
            config.lang(),
            local_addr.port(),
            config.worker_count(),
        ));

        *self.running.lock().unwrap() = Some(RunningServer {
            cancel,
            handle,
            local_addr,
        });

        Ok(local_addr)
    }

    /// Abort in-flight work, stop accepting connections and wait for the
    /// listener task to finish. No-op when not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().unwrap().take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            tracing::warn!(error = %e, "server task join failed");
        }

        let lang = self.translator.config().current().lang();
        self.translator
            .sink()
            .log_message(strings::server_stopped(lang));
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap().is_some()
    }
}

async fn translate_handler(
    State(state): State<FrontState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<TranslateQuery>,
) -> Response {
    let Some(text) = query.text else {
        return ([(header::CONTENT_TYPE, "text/plain")], "").into_response();
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "").into_response();
    }

    // Worker-pool bound: at most `max_threads` requests translate at once,
    // the rest wait here in arrival order.
    let _permit = match state.workers.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                "Translation Failed",
            )
                .into_response()
        }
    };

    let sink = state.translator.sink();
    let lang = state.translator.config().current().lang();

    let log_text = text
        .replace("\r\n", "[LF]")
        .replace('\n', "[LF]")
        .replace('\r', "[LF]");
    sink.log_message(&format!("{}{log_text}", strings::request_received(lang)));

    sink.work_started();

    let client_ip = addr.ip().to_string();
    let result = state.translator.translate(&text, &client_ip, &state.cancel).await;

    if state.cancel.is_cancelled() {
        sink.work_finished(false);
    } else {
        sink.work_finished(!result.is_empty());
    }

    if result.is_empty() {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            "Translation Failed",
        )
            .into_response()
    } else {
        (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            result,
        )
            .into_response()
    }
}
