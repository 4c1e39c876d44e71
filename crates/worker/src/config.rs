// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

/// Business worker for a WebSocket gateway.
#[derive(Debug, Clone, Parser)]
#[command(name = "gateway-worker", version, about)]
pub struct WorkerConfig {
    /// Host address to bind to.
    #[arg(long, env = "GATEWAY_WORKER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// HTTP/WebSocket port to listen on.
    #[arg(long, env = "GATEWAY_WORKER_PORT", default_value_t = 7272)]
    pub port: u16,

    /// Worker name reported in start/stop events.
    #[arg(long, env = "GATEWAY_WORKER_NAME", default_value = "BusinessWorker")]
    pub name: String,

    /// Path clients upgrade to WebSocket on.
    #[arg(long, env = "GATEWAY_WORKER_WEBSOCKET_PATH", default_value = "/websocket")]
    pub websocket_path: String,

    /// Seconds a new client has to bind a uid or send a keepalive.
    #[arg(long, env = "GATEWAY_WORKER_AUTH_WINDOW_SECS", default_value_t = 30)]
    pub auth_window_secs: u64,

    /// Bearer token for the HTTP API. If unset, HTTP auth is disabled.
    #[arg(long, env = "GATEWAY_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "GATEWAY_WORKER_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "GATEWAY_WORKER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl WorkerConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth_window_secs == 0 {
            anyhow::bail!("--auth-window-secs must be greater than zero");
        }
        if !self.websocket_path.starts_with('/') || self.websocket_path.starts_with("/api/") {
            anyhow::bail!("--websocket-path must start with '/' and not overlap /api/");
        }
        if self.websocket_path.contains([':', '*', '{', '}']) {
            anyhow::bail!("--websocket-path must be a literal path without ':', '*', '{{' or '}}'");
        }
        if self.name.trim().is_empty() {
            anyhow::bail!("--name must not be empty");
        }
        if self.secret_key.as_deref().is_some_and(str::is_empty) {
            anyhow::bail!("--secret-key must not be empty when set");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    pub fn auth_window(&self) -> Duration {
        Duration::from_secs(self.auth_window_secs)
    }

    /// `host:port` to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build a minimal config for tests (port 0, short auth window).
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            name: "TestWorker".into(),
            websocket_path: "/websocket".into(),
            auth_window_secs: 1,
            secret_key: None,
            log_format: "text".into(),
            log_level: "debug".into(),
        }
    }
}

/// Install the global tracing subscriber. Later calls are ignored.
pub fn init_tracing(config: &WorkerConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
