// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tracing::error;

use gateway_worker::config::{init_tracing, WorkerConfig};
use gateway_worker::worker::NoopHandler;

#[tokio::main]
async fn main() {
    let config = WorkerConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if let Err(e) = gateway_worker::run(config, Arc::new(NoopHandler)).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
