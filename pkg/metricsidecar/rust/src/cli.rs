// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::path::PathBuf;

use clap::Parser;

use crate::constants::discovery::DEFAULT_DEPENDENCY;
use crate::constants::settings::DEFAULT_SECTION;

/// Launch the metrics binary for a monitored dependency and supervise it
#[derive(Debug, Parser)]
#[command(name = "metrics-sidecar", version)]
pub struct Args {
    /// Service config file (YAML or JSON). DYNAMO_SERVICE_CONFIG is overlaid on top.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Config section holding the metrics settings
    #[arg(long, value_name = "NAME", default_value = DEFAULT_SECTION)]
    pub section: String,

    /// Dependency whose load metrics are polled
    #[arg(long, value_name = "NAME", default_value = DEFAULT_DEPENDENCY)]
    pub dependency: String,

    /// Discovery namespace of the dependency, bypassing the service config
    #[arg(long, value_name = "NS", requires = "component")]
    pub namespace: Option<String>,

    /// Discovery component of the dependency, bypassing the service config
    #[arg(long, value_name = "NAME", requires = "namespace")]
    pub component: Option<String>,

    /// Root of the bundled binaries (defaults to the directory of this executable)
    #[arg(long, value_name = "DIR")]
    pub install_root: Option<PathBuf>,

    /// Print the resolved command line and exit without launching it
    #[arg(long)]
    pub print_invocation: bool,
}

impl Args {
    /// Operator-supplied address, when both parts were given
    pub fn static_address(&self) -> Option<(&str, &str)> {
        match (&self.namespace, &self.component) {
            (Some(namespace), Some(component)) => Some((namespace, component)),
            _ => None,
        }
    }
}
