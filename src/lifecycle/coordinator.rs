//! Servlet lifecycle orchestration.
//!
//! # Responsibilities
//! - Start servlets in registration order, rolling back on the first failure
//! - Own the shutdown rendezvous between `stop` and the background task
//! - Stop servlets in exact reverse order, then drain the transport
//!
//! # Design Decisions
//! - Rollback and shutdown stop errors are logged, never returned
//! - The shutdown handoff is a one-shot channel carrying the stop context and
//!   a reply channel; it can be consumed exactly once
//! - The drain result is also published on a `watch` channel, so every later
//!   `stop` returns the same result instead of blocking
//!
//! # Phases
//! ```text
//! Idle ──start──▶ Starting ──arm──▶ Running ──stop──▶ Stopping
//!   ▲                │
//!   └── failure / rollback
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, watch};

use crate::error::{Error, Result};
use crate::lifecycle::context::Context;
use crate::lifecycle::servlet::Servlet;
use crate::net::transport::Transport;
use crate::observability::metrics::set_servlets_running;

/// Shutdown request handed to the background task.
struct ShutdownRequest {
    ctx: Context,
    reply: oneshot::Sender<Result<()>>,
}

enum Phase {
    Idle,
    Starting,
    Running(oneshot::Sender<ShutdownRequest>),
    Stopping,
}

pub struct Coordinator {
    servlets: Vec<Arc<dyn Servlet>>,
    phase: Mutex<Phase>,
    outcome: Arc<watch::Sender<Option<Result<()>>>>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            servlets: Vec::new(),
            phase: Mutex::new(Phase::Idle),
            outcome: Arc::new(outcome),
        }
    }

    /// Fails with `AlreadyStarted` unless no start attempt has succeeded.
    /// A stopped coordinator stays closed.
    pub fn ensure_idle(&mut self) -> Result<()> {
        match self.phase.get_mut().expect("phase mutex poisoned") {
            Phase::Idle => Ok(()),
            _ => Err(Error::AlreadyStarted),
        }
    }

    /// Append a servlet. Rejected once a start attempt has succeeded.
    pub fn register(&mut self, servlet: Arc<dyn Servlet>) -> Result<()> {
        self.ensure_idle()?;
        tracing::debug!(servlet = servlet.name(), "Servlet registered");
        self.servlets.push(servlet);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.servlets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servlets.is_empty()
    }

    /// Start every servlet in registration order.
    ///
    /// On the first failure the servlets started by this call are stopped in
    /// reverse and the failure is returned; the coordinator goes back to idle.
    /// Cancellation or expiry of `ctx` counts as the current servlet's failure.
    pub async fn start(&self, ctx: &Context) -> Result<()> {
        {
            let mut phase = self.phase.lock().expect("phase mutex poisoned");
            if !matches!(*phase, Phase::Idle) {
                return Err(Error::AlreadyStarted);
            }
            *phase = Phase::Starting;
        }

        for (index, servlet) in self.servlets.iter().enumerate() {
            tracing::debug!(servlet = servlet.name(), index, "Starting servlet");

            let result = match ctx.run(servlet.start(ctx)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Error::servlet(e)),
                Err(e) => Err(e),
            };

            if let Err(err) = result {
                tracing::error!(
                    servlet = servlet.name(),
                    index,
                    error = %err,
                    "Servlet failed to start, rolling back"
                );
                stop_in_reverse(&self.servlets[..index]).await;
                self.set_phase(Phase::Idle);
                return Err(err);
            }
            set_servlets_running(index + 1);
        }

        tracing::info!(count = self.servlets.len(), "Servlets started");
        Ok(())
    }

    /// Undo a successful `start` whose transport never came up.
    pub async fn rollback(&self) {
        tracing::warn!(count = self.servlets.len(), "Rolling back started servlets");
        stop_in_reverse(&self.servlets).await;
        self.set_phase(Phase::Idle);
    }

    /// Spawn the background task that waits for the shutdown handoff.
    ///
    /// Called once after `start` succeeded and `transport` is serving.
    pub fn arm(&self, transport: Arc<dyn Transport>) {
        let (handoff, requests) = oneshot::channel::<ShutdownRequest>();
        let servlets = self.servlets.clone();
        let outcome = Arc::clone(&self.outcome);

        tokio::spawn(async move {
            let Ok(request) = requests.await else {
                tracing::debug!("Coordinator dropped without a shutdown request");
                return;
            };

            tracing::info!(count = servlets.len(), "Shutdown requested, stopping servlets");
            stop_in_reverse(&servlets).await;

            let result = transport.shutdown(&request.ctx).await;
            match &result {
                Ok(()) => tracing::info!("Transport drained"),
                Err(e) => tracing::error!(error = %e, "Transport shutdown failed"),
            }

            outcome.send_replace(Some(result.clone()));
            let _ = request.reply.send(result);
        });

        self.set_phase(Phase::Running(handoff));
    }

    /// Hand a shutdown request to the background task and wait for its result.
    ///
    /// Servlets are stopped in reverse registration order before the
    /// transport drains within `ctx`. Only the drain result is returned.
    /// Calling `stop` again returns the first call's result.
    pub async fn stop(&self, ctx: &Context) -> Result<()> {
        let mut finished = self.outcome.subscribe();

        let handoff = {
            let mut phase = self.phase.lock().expect("phase mutex poisoned");
            match std::mem::replace(&mut *phase, Phase::Stopping) {
                Phase::Running(handoff) => Some(handoff),
                Phase::Stopping => None,
                other => {
                    *phase = other;
                    return Err(Error::NotStarted);
                }
            }
        };

        let Some(handoff) = handoff else {
            let outcome = finished
                .wait_for(Option::is_some)
                .await
                .map_err(|_| Error::CoordinatorGone)?;
            return outcome.clone().unwrap_or(Err(Error::CoordinatorGone));
        };

        let (reply, result) = oneshot::channel();
        let request = ShutdownRequest {
            ctx: ctx.clone(),
            reply,
        };
        if handoff.send(request).is_err() {
            self.outcome.send_replace(Some(Err(Error::CoordinatorGone)));
            return Err(Error::CoordinatorGone);
        }

        match result.await {
            Ok(result) => result,
            Err(_) => {
                self.outcome.send_replace(Some(Err(Error::CoordinatorGone)));
                Err(Error::CoordinatorGone)
            }
        }
    }

    fn set_phase(&self, next: Phase) {
        *self.phase.lock().expect("phase mutex poisoned") = next;
    }
}

/// Stop `servlets` last to first, logging failures.
async fn stop_in_reverse(servlets: &[Arc<dyn Servlet>]) {
    for (index, servlet) in servlets.iter().enumerate().rev() {
        match servlet.stop().await {
            Ok(()) => tracing::debug!(servlet = servlet.name(), index, "Servlet stopped"),
            Err(e) => tracing::error!(
                servlet = servlet.name(),
                index,
                error = %e,
                "Servlet failed to stop"
            ),
        }
        set_servlets_running(index);
    }
}
