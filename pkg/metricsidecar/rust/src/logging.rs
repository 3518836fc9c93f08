// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Log setup for the sidecar binary. Everything goes to stderr; stdout belongs
//! to the metrics process.

use std::env;
use std::io::IsTerminal;

use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::constants::runtime::DEFAULT_LOG_LEVEL;

pub const LOG_LEVEL_ENV: &str = "DD_LOG_LEVEL";

/// Log filter directive. Priority: DD_LOG_LEVEL > RUST_LOG > default
pub fn log_level() -> String {
    env::var(LOG_LEVEL_ENV)
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init() -> Result<(), String> {
    let level = log_level();
    let (filter, rejected) = match EnvFilter::try_new(&level) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_LOG_LEVEL), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .map_err(|e| format!("failed to initialize logging: {e}"))?;

    if let Some(e) = rejected {
        warn!(
            level = %level,
            error = %e,
            fallback = DEFAULT_LOG_LEVEL,
            "Invalid log level, using default"
        );
    }
    Ok(())
}
