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

//! Metrics sidecar launcher
//!
//! Resolves the metrics settings and the discovery address of the monitored
//! dependency, then runs the external `metrics` binary as a supervised child
//! until it exits or the sidecar is interrupted.

pub mod cli;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod errors;
pub mod invocation;
pub mod logging;
pub mod supervisor;

pub use config::{ServiceConfig, Settings};
pub use discovery::{
    AddressResolver, ConfigAddressResolver, Dependency, DependencyAddress, StaticAddressResolver,
};
pub use errors::{ConfigError, InvocationError, Result, SidecarError};
pub use invocation::{Invocation, locate_metrics_binary};
pub use supervisor::{ExitStatus, ProcessState, ProcessSupervisor, SupervisedProcess};
