// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Metrics binary invocation
//!
//! Translates resolved settings and the dependency address into the command
//! line of the metrics binary. Flag names and their order are part of the
//! binary's compatibility surface and must stay stable.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Settings;
use crate::constants::invocation::{
    BUNDLED_BINARY_PATH, FALLBACK_BINARY_NAME, LOAD_METRICS_ENDPOINT,
};
use crate::discovery::DependencyAddress;
use crate::errors::InvocationError;

/// Locate the metrics binary.
///
/// Checks the bundled binary under `install_root` first; if it does not exist,
/// falls back to the bare command name so the launch resolves it through `PATH`.
pub fn locate_metrics_binary(install_root: &Path) -> PathBuf {
    let bundled = install_root.join(BUNDLED_BINARY_PATH);
    if bundled.exists() {
        debug!(path = %bundled.display(), "Using bundled metrics binary");
        bundled
    } else {
        debug!(
            bundled = %bundled.display(),
            fallback = FALLBACK_BINARY_NAME,
            "Bundled metrics binary not found, relying on PATH"
        );
        PathBuf::from(FALLBACK_BINARY_NAME)
    }
}

/// Program and ordered arguments of the metrics process.
///
/// Built once and consumed by [`crate::ProcessSupervisor::spawn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
}

impl Invocation {
    pub fn build(
        settings: &Settings,
        address: &DependencyAddress,
        program: PathBuf,
    ) -> Result<Self, InvocationError> {
        if program.as_os_str().is_empty() {
            return Err(InvocationError::EmptyField("program"));
        }
        for (field, value) in [
            ("namespace", address.namespace()),
            ("component", address.component()),
        ] {
            if value.is_empty() {
                return Err(InvocationError::EmptyField(field));
            }
        }

        let args = vec![
            "--host".to_string(),
            settings.host().to_string(),
            "--port".to_string(),
            settings.port().to_string(),
            "--poll-interval".to_string(),
            settings.poll_interval_secs().to_string(),
            "--namespace".to_string(),
            address.namespace().to_string(),
            "--component".to_string(),
            address.component().to_string(),
            "--endpoint".to_string(),
            LOAD_METRICS_ENDPOINT.to_string(),
        ];

        Ok(Self { program, args })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn into_parts(self) -> (PathBuf, Vec<String>) {
        (self.program, self.args)
    }

    #[cfg(test)]
    pub(crate) fn from_parts(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::discovery::{AddressResolver, Dependency, StaticAddressResolver};
    use serde_yaml::Mapping;
    use std::fs;

    fn address(namespace: &str, component: &str) -> DependencyAddress {
        StaticAddressResolver::new(namespace, component)
            .resolve_address(&Dependency::new("VllmWorker"))
            .unwrap()
    }

    #[test]
    fn test_default_settings_produce_expected_arguments() {
        let settings = Settings::resolve(&Mapping::new()).unwrap();
        let invocation = Invocation::build(
            &settings,
            &address("workers", "vllm"),
            PathBuf::from("metrics"),
        )
        .unwrap();

        assert_eq!(
            invocation.args(),
            [
                "--host",
                "0.0.0.0",
                "--port",
                "9091",
                "--poll-interval",
                "1",
                "--namespace",
                "workers",
                "--component",
                "vllm",
                "--endpoint",
                "load_metrics",
            ]
        );
        assert_eq!(invocation.program(), Path::new("metrics"));
    }

    #[test]
    fn test_poll_interval_is_truncated_to_whole_seconds() {
        let raw: Mapping = serde_yaml::from_str("poll_interval: 2500ms").unwrap();
        let settings = Settings::resolve(&raw).unwrap();
        let invocation =
            Invocation::build(&settings, &address("ns", "c"), PathBuf::from("metrics")).unwrap();

        let position = invocation
            .args()
            .iter()
            .position(|a| a == "--poll-interval")
            .unwrap();
        assert_eq!(invocation.args().get(position + 1).unwrap(), "2");
    }

    #[test]
    fn test_build_is_deterministic() {
        let raw: Mapping = serde_yaml::from_str("host: 10.1.2.3\nport: 9999").unwrap();
        let settings = Settings::resolve(&raw).unwrap();
        let address = address("prod", "worker");

        let first = Invocation::build(&settings, &address, PathBuf::from("/opt/metrics")).unwrap();
        let second = Invocation::build(&settings, &address, PathBuf::from("/opt/metrics")).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.to_string(),
            "/opt/metrics --host 10.1.2.3 --port 9999 --poll-interval 1 --namespace prod --component worker --endpoint load_metrics"
        );
    }

    #[test]
    fn test_empty_host_is_passed_through() {
        let settings = Settings::resolve(&serde_yaml::from_str("host: ''").unwrap()).unwrap();
        let invocation =
            Invocation::build(&settings, &address("ns", "c"), PathBuf::from("metrics")).unwrap();

        assert_eq!(invocation.args().get(..2).unwrap(), ["--host", ""]);
    }

    #[test]
    fn test_empty_program_is_rejected() {
        let err = Invocation::build(&Settings::default(), &address("ns", "c"), PathBuf::new())
            .unwrap_err();
        assert_eq!(err, InvocationError::EmptyField("program"));
    }

    #[test]
    fn test_locate_prefers_bundled_binary() {
        let root = tempfile::tempdir().unwrap();
        let bundled = root.path().join("cli/bin/metrics");
        fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        fs::write(&bundled, "#!/bin/sh\n").unwrap();

        assert_eq!(locate_metrics_binary(root.path()), bundled);
    }

    #[test]
    fn test_locate_falls_back_to_bare_name() {
        let root = tempfile::tempdir().unwrap();

        assert_eq!(locate_metrics_binary(root.path()), PathBuf::from("metrics"));
    }
}
