//! VietLearn · bilingual Vietnamese/Chinese lesson backend
//!
//! - Axum HTTP + WebSocket API
//! - Lessons resolved from seeds, the on-disk cache, or Gemini (write-through)
//! - Speech (remote Gemini TTS or the client's local engine), tutor chat, explanations
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   GEMINI_API_KEY      : enables Gemini if present
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_TEXT_MODEL   : default "gemini-2.5-flash"
//!   GEMINI_TTS_MODEL    : default "gemini-2.5-flash-preview-tts"
//!   GEMINI_VOICE        : default "Kore"
//!   GEMINI_TIMEOUT_SECS : default 90
//!   CACHE_DIR           : default "./cache"
//!   CACHE_QUOTA_BYTES   : per-namespace quota, default 5 MiB
//!   AGENT_CONFIG_PATH   : path to TOML config (prompts + limits)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod error;
mod util;
mod domain;
mod config;
mod seeds;
mod pinyin;
mod cache;
mod schema;
mod gemini;
mod speech;
mod builder;
mod resolver;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: cache store, resolver chain, Gemini (or offline) providers.
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "vietlearn", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "vietlearn", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "vietlearn", "Shutdown signal received");
}
