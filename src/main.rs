//! Servlet host.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                    SERVER                     │
//!  Client ───────▶│ net::listener → http::server → routing       │
//!                 │                    │            │             │
//!                 │                    ▼            ▼             │
//!                 │             http::stream   middleware chain   │
//!                 │                    ▲            │             │
//!  Client ◀───────│ ResponseState ◀────┴──────── handler          │
//!                 │                                               │
//!                 │  lifecycle::coordinator: S1..Sn start,        │
//!                 │  Sn..S1 stop, then drain                      │
//!                 └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderValue};
use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use servlet_host::config::{load_config, ServerConfig};
use servlet_host::http::middleware::{metrics, request_id, request_logger};
use servlet_host::lifecycle::shutdown_signal;
use servlet_host::observability;
use servlet_host::{BoxError, Component, Context, Router, Server, Servlet};

#[derive(Parser, Debug)]
#[command(name = "servlet-host", version, about = "HTTP server with ordered servlet lifecycle")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Counts ticks of a background task while it runs.
struct Heartbeat {
    router: Router,
    interval: Duration,
    beats: Arc<AtomicU64>,
    ticker: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Heartbeat {
    fn new(interval: Duration) -> Result<Self, servlet_host::Error> {
        let beats = Arc::new(AtomicU64::new(0));
        let mut router = Router::new();
        let counter = Arc::clone(&beats);
        router.handle_fn("GET /", move |w, _req| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                let body = serde_json::json!({ "beats": counter.load(Ordering::Relaxed) });
                w.headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                if let Err(e) = w.write_all(body.to_string().as_bytes()).await {
                    tracing::debug!(error = %e, "Failed to write heartbeat");
                }
            })
        })?;

        Ok(Self {
            router,
            interval,
            beats,
            ticker: Mutex::new(None),
        })
    }
}

impl Component for Heartbeat {
    fn prefix(&self) -> &str {
        "/heartbeat"
    }

    fn router(&self) -> &Router {
        &self.router
    }

    fn servlet(self: Arc<Self>) -> Option<Arc<dyn Servlet>> {
        Some(self)
    }
}

#[async_trait]
impl Servlet for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn start(&self, _ctx: &Context) -> Result<(), BoxError> {
        let token = CancellationToken::new();
        let beats = Arc::clone(&self.beats);
        let mut ticker = tokio::time::interval(self.interval);
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let n = beats.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::trace!(beats = n, "Heartbeat");
                    }
                }
            }
        });

        *self.ticker.lock().expect("ticker mutex poisoned") = Some((token, handle));
        Ok(())
    }

    async fn stop(&self) -> Result<(), BoxError> {
        let running = self.ticker.lock().expect("ticker mutex poisoned").take();
        if let Some((token, handle)) = running {
            token.cancel();
            handle.await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    observability::logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "servlet-host starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        startup_timeout_secs = config.lifecycle.startup_timeout_secs,
        shutdown_timeout_secs = config.lifecycle.shutdown_timeout_secs,
        "Configuration loaded"
    );

    let startup = Duration::from_secs(config.lifecycle.startup_timeout_secs);
    let shutdown = Duration::from_secs(config.lifecycle.shutdown_timeout_secs);

    let mut server = Server::new(config);
    server.use_middleware(request_id())?;
    server.use_middleware(request_logger())?;
    server.use_middleware(metrics())?;
    server.handle_fn("GET /healthz", |w, _req| {
        Box::pin(async move {
            let body = serde_json::json!({ "status": "ok" });
            w.headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            if let Err(e) = w.write_all(body.to_string().as_bytes()).await {
                tracing::debug!(error = %e, "Failed to write health response");
            }
        })
    })?;
    server.register(Heartbeat::new(Duration::from_secs(1))?)?;

    server.start(&Context::with_timeout(startup)).await?;

    shutdown_signal().await;

    server.stop(&Context::with_timeout(shutdown)).await?;
    tracing::info!("servlet-host stopped");
    Ok(())
}
