//! Server facade.
//!
//! # Responsibilities
//! - Collect routes, middleware, components and servlets
//! - Start servlets, then the HTTP engine; stop in the opposite order
//!
//! # Design Decisions
//! - Registration needs `&mut Server` and fails with `AlreadyStarted` once
//!   a start has succeeded, including after `stop`
//! - The bind address is checked before any servlet starts
//! - A bind failure after servlets started rolls them back

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;

use crate::component::{Component, Mounted};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::http::response::ResponseState;
use crate::http::server::HttpEngine;
use crate::lifecycle::context::Context;
use crate::lifecycle::coordinator::Coordinator;
use crate::lifecycle::servlet::Servlet;
use crate::net::listener::split_host_port;
use crate::net::transport::Transport;
use crate::routing::handler::{BoxHandler, Handler};
use crate::routing::router::Router;

pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
    coordinator: Coordinator,
    local_addr: OnceLock<SocketAddr>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_router(config, Router::new())
    }

    /// Start from an already populated router.
    pub fn with_router(config: ServerConfig, router: Router) -> Self {
        Self {
            config,
            router: Arc::new(router),
            coordinator: Coordinator::new(),
            local_addr: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Address the engine is listening on, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    fn router_mut(&mut self) -> Result<&mut Router> {
        self.coordinator.ensure_idle()?;
        Arc::get_mut(&mut self.router).ok_or(Error::AlreadyStarted)
    }

    pub fn use_middleware<M>(&mut self, middleware: M) -> Result<()>
    where
        M: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
    {
        self.router_mut()?.use_middleware(middleware);
        Ok(())
    }

    pub fn handle<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<()> {
        self.router_mut()?.handle(pattern, handler)
    }

    pub fn handle_fn<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: for<'a> Fn(&'a mut ResponseState, Request<Body>) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        self.router_mut()?.handle_fn(pattern, f)
    }

    pub fn mount<H: Handler>(&mut self, prefix: &str, handler: H) -> Result<()> {
        self.router_mut()?.mount(prefix, handler)
    }

    /// Mount `component` under its prefix and, if it is a servlet, add it to
    /// the lifecycle.
    pub fn register<C: Component>(&mut self, component: C) -> Result<()> {
        let component = Arc::new(component);
        let prefix = component.prefix().to_string();
        self.mount(&prefix, Mounted(Arc::clone(&component)))?;

        if let Some(servlet) = component.servlet() {
            self.coordinator.register(servlet)?;
        }
        tracing::debug!(prefix = %prefix, "Component registered");
        Ok(())
    }

    pub fn add_servlet<S: Servlet + 'static>(&mut self, servlet: S) -> Result<()> {
        self.coordinator.register(Arc::new(servlet))
    }

    /// Start servlets in registration order, then accept traffic.
    ///
    /// Returns once the listener is bound; serving continues in the
    /// background until [`stop`](Server::stop).
    pub async fn start(&self, ctx: &Context) -> Result<()> {
        let address = self.config.listener.bind_address.as_str();
        split_host_port(address)?;

        self.coordinator.start(ctx).await?;

        let engine = match HttpEngine::bind(address, Arc::clone(&self.router), &self.config).await {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                tracing::error!(address = %address, error = %e, "Failed to bind listener");
                self.coordinator.rollback().await;
                return Err(e);
            }
        };
        let _ = self.local_addr.set(engine.local_addr());

        tokio::spawn({
            let engine = Arc::clone(&engine);
            async move {
                if let Err(e) = engine.listen_and_serve().await {
                    tracing::error!(error = %e, "HTTP server exited with error");
                }
            }
        });
        self.coordinator.arm(engine);

        tracing::info!(
            address = %address,
            local_addr = ?self.local_addr(),
            servlets = self.coordinator.len(),
            "Server started"
        );
        Ok(())
    }

    /// Stop servlets in reverse order, then drain in-flight requests within
    /// `ctx`. Returns the drain result; repeated calls return the same result.
    pub async fn stop(&self, ctx: &Context) -> Result<()> {
        tracing::info!("Server stopping");
        self.coordinator.stop(ctx).await
    }
}

impl Handler for Server {
    fn serve<'a>(&'a self, w: &'a mut ResponseState, req: Request<Body>) -> BoxFuture<'a, ()> {
        self.router.serve(w, req)
    }
}
