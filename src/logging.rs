// Copyright 2025 Bardo Contributors
// SPDX-License-Identifier: Apache-2.0

//! Logging bootstrap.
//!
//! `RUST_LOG` takes precedence when present; otherwise the provided default
//! filter string is used. Initialization is idempotent: repeated calls
//! return an error from the subscriber library which we swallow, so tests
//! can call it freely.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Resolve the tracing filter with explicit `RUST_LOG` precedence.
fn resolve_env_filter(default_filter: &str) -> Result<EnvFilter> {
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(rust_log.clone())
            .map_err(|e| anyhow!("Invalid RUST_LOG '{}': {}", rust_log, e));
    }
    Ok(EnvFilter::new(default_filter))
}

/// Initialize console logging for the whole engine.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = resolve_env_filter(default_filter)?;
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
    Ok(())
}

/// Initialize with the library's default filter (`info` everywhere,
/// mesh tracing off).
pub fn init_default() -> Result<()> {
    init("info,bardo_mesh=warn")
}
