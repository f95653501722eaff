//! Shared utilities for integration testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use servlet_host::{BoxError, Context, Server, ServerConfig, Servlet};

/// Ordered record of lifecycle events, e.g. `"start:A"`, `"stop:A"`.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::default()
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Servlet that records its start and stop calls.
pub struct RecordingServlet {
    name: &'static str,
    log: EventLog,
    start_error: Option<&'static str>,
}

#[allow(dead_code)]
impl RecordingServlet {
    pub fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            log: log.clone(),
            start_error: None,
        }
    }

    pub fn failing(name: &'static str, log: &EventLog, message: &'static str) -> Self {
        Self {
            start_error: Some(message),
            ..Self::new(name, log)
        }
    }
}

#[async_trait]
impl Servlet for RecordingServlet {
    fn name(&self) -> &str {
        self.name
    }

    async fn start(&self, _ctx: &Context) -> Result<(), BoxError> {
        self.log.lock().unwrap().push(format!("start:{}", self.name));
        match self.start_error {
            Some(message) => Err(message.into()),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<(), BoxError> {
        self.log.lock().unwrap().push(format!("stop:{}", self.name));
        Ok(())
    }
}

/// Configuration bound to an ephemeral loopback port.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Base URL of a started server.
#[allow(dead_code)]
pub fn base_url(server: &Server) -> String {
    format!("http://{}", server.local_addr().expect("server not started"))
}
