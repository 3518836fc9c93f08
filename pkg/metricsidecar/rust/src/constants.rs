// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Default values and fixed literals shared by the sidecar components

use std::time::Duration;

/// Metrics settings defaults
pub mod settings {
    use super::Duration;

    /// Config section holding the metrics settings
    pub const DEFAULT_SECTION: &str = "Metrics";

    pub const DEFAULT_HOST: &str = "0.0.0.0";

    pub const DEFAULT_PORT: u16 = 9091;

    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
}

/// Metrics binary location and command line
pub mod invocation {
    /// Bundled binary, relative to the install root
    pub const BUNDLED_BINARY_PATH: &str = "cli/bin/metrics";

    /// Bare command name resolved through PATH when no bundled binary exists
    pub const FALLBACK_BINARY_NAME: &str = "metrics";

    /// Endpoint polled on the monitored dependency
    pub const LOAD_METRICS_ENDPOINT: &str = "load_metrics";
}

/// Dependency discovery defaults
pub mod discovery {
    /// Dependency monitored when none is given on the command line
    pub const DEFAULT_DEPENDENCY: &str = "VllmWorker";
}

/// Process-level wiring
pub mod runtime {
    /// Environment variable carrying the serialized service config
    pub const SERVICE_CONFIG_ENV: &str = "DYNAMO_SERVICE_CONFIG";

    /// Exit code reported when the metrics process was stopped on our request
    pub const TERMINATED_EXIT_CODE: i32 = 130;

    /// Exit code for startup failures
    pub const STARTUP_FAILURE_EXIT_CODE: i32 = 1;

    pub const DEFAULT_LOG_LEVEL: &str = "info";
}
