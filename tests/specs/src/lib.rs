// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `gateway-worker` binary as a subprocess and exercises it
//! over HTTP and WebSocket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `gateway-worker` binary.
pub fn worker_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("gateway-worker")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `gateway-worker` process that is killed on drop.
pub struct WorkerProcess {
    child: Child,
    port: u16,
    secret_key: Option<String>,
}

/// Builder for the flags a [`WorkerProcess`] is started with.
pub struct WorkerBuilder {
    auth_window_secs: u64,
    secret_key: Option<String>,
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self { auth_window_secs: 30, secret_key: None }
    }
}

impl WorkerBuilder {
    /// Override `--auth-window-secs`.
    pub fn auth_window_secs(mut self, secs: u64) -> Self {
        self.auth_window_secs = secs;
        self
    }

    /// Require a bearer token on the HTTP API.
    pub fn secret_key(mut self, key: &str) -> Self {
        self.secret_key = Some(key.to_owned());
        self
    }

    pub fn spawn(self) -> anyhow::Result<WorkerProcess> {
        ensure_crypto();
        let binary = worker_binary();
        anyhow::ensure!(binary.exists(), "gateway-worker binary not found at {}", binary.display());

        let port = free_port()?;
        let mut command = Command::new(&binary);
        command
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .args(["--auth-window-secs", &self.auth_window_secs.to_string()])
            .args(["--log-format", "text", "--log-level", "warn"])
            .env_remove("GATEWAY_SECRET_KEY")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(ref key) = self.secret_key {
            command.env("GATEWAY_SECRET_KEY", key);
        }

        let child = command.spawn()?;
        Ok(WorkerProcess { child, port, secret_key: self.secret_key })
    }
}

impl WorkerProcess {
    /// Create a builder for custom flags.
    pub fn build() -> WorkerBuilder {
        WorkerBuilder::default()
    }

    /// Spawn with default flags.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// WebSocket URL.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/websocket", self.port)
    }

    /// HTTP client request with the bearer token attached when one is set.
    pub fn post(&self, client: &reqwest::Client, path: &str) -> reqwest::RequestBuilder {
        let req = client.post(format!("{}{path}", self.base_url()));
        match self.secret_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Poll health until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("gateway-worker did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
