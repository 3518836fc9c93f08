// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info};

use metrics_sidecar::cli::Args;
use metrics_sidecar::constants::runtime::STARTUP_FAILURE_EXIT_CODE;
use metrics_sidecar::{
    AddressResolver, ConfigAddressResolver, Dependency, Invocation, ProcessSupervisor,
    ServiceConfig, StaticAddressResolver, locate_metrics_binary, logging,
};

fn load_service_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let from_file = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading service config");
            ServiceConfig::load(path)?
        }
        None => ServiceConfig::default(),
    };

    // The environment overlay wins over the file, key by key.
    Ok(match ServiceConfig::from_env()? {
        Some(overlay) => from_file.merge(overlay),
        None => from_file,
    })
}

fn default_install_root() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate the sidecar executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("executable {} has no parent directory", exe.display()))
}

fn build_invocation(args: &Args) -> Result<Invocation> {
    let config = load_service_config(args.config.as_deref())?;
    let settings = config
        .settings(&args.section)
        .context("failed to resolve metrics settings")?;

    let dependency = Dependency::new(&args.dependency);
    let resolver: Box<dyn AddressResolver + '_> = match args.static_address() {
        Some((namespace, component)) => Box::new(StaticAddressResolver::new(namespace, component)),
        None => Box::new(ConfigAddressResolver::new(&config)),
    };
    let address = resolver
        .resolve_address(&dependency)
        .context("failed to resolve dependency address")?;

    let install_root = match &args.install_root {
        Some(root) => root.clone(),
        None => default_install_root()?,
    };
    let program = locate_metrics_binary(&install_root);

    info!(
        dependency = %dependency,
        address = %address,
        host = settings.host(),
        port = settings.port(),
        poll_interval_secs = settings.poll_interval_secs(),
        "Resolved metrics configuration"
    );

    Ok(Invocation::build(&settings, &address, program)?)
}

/// Resolves on the first SIGINT or SIGTERM. Handlers are installed eagerly so
/// a signal arriving right after the child is spawned is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C, interrupts are ignored");
            std::future::pending::<()>().await;
        }
    })
}

async fn run(args: Args) -> Result<i32> {
    let invocation = build_invocation(&args)?;

    if args.print_invocation {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{invocation}").context("failed to write invocation")?;
        return Ok(0);
    }

    let shutdown = shutdown_signal()?;
    let status = ProcessSupervisor::new().run(invocation, shutdown).await?;
    info!(status = %status, exit_code = status.code(), "Metrics sidecar finished");
    Ok(status.code())
}

fn to_exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init() {
        // No subscriber to report through; the failure itself is not fatal.
        let _ = writeln!(std::io::stderr(), "{e}");
    }

    match run(args).await {
        Ok(code) => to_exit_code(code),
        Err(e) => {
            error!("Metrics sidecar failed: {e:#}");
            to_exit_code(STARTUP_FAILURE_EXIT_CODE)
        }
    }
}
