// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SidecarError>;

/// Errors that abort the sidecar before or while supervising the metrics process.
///
/// A non-zero exit of the metrics process is not an error; it is reported
/// through [`crate::ExitStatus::Exited`].
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("dependency '{dependency}' is unavailable: {reason}")]
    DependencyUnavailable { dependency: String, reason: String },

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error("failed to launch metrics binary '{}': {source}", .program.display())]
    ChildLaunch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for metrics process: {0}")]
    Wait(#[source] std::io::Error),
}

/// A single offending configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Invalid settings. Carries every field that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration in section '{section}': {}", join_fields(.fields))]
    InvalidFields {
        section: String,
        fields: Vec<FieldError>,
    },

    #[error("could not read config file '{}': {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("could not parse {origin}: {reason}")]
    Malformed { origin: String, reason: String },
}

impl ConfigError {
    /// Names of the fields that failed validation, in the order they were checked.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ConfigError::InvalidFields { fields, .. } => {
                fields.iter().map(|f| f.field.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn names_field(&self, field: &str) -> bool {
        self.fields().contains(&field)
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("invocation field '{0}' must not be empty")]
    EmptyField(&'static str),
}
