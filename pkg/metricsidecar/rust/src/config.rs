// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Service configuration store and metrics settings resolution
//!
//! The service config is a document of named sections, loaded once at startup
//! from a YAML/JSON file and/or the `DYNAMO_SERVICE_CONFIG` environment variable.
//! The metrics settings are resolved from one of those sections into an
//! immutable [`Settings`] value.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::env::{self, VarError};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::constants::runtime::SERVICE_CONFIG_ENV;
use crate::constants::settings::{
    DEFAULT_HOST, DEFAULT_POLL_INTERVAL, DEFAULT_PORT, DEFAULT_SECTION,
};
use crate::errors::{ConfigError, FieldError};

const HOST_KEY: &str = "host";
const PORT_KEY: &str = "port";
const POLL_INTERVAL_KEY: &str = "poll_interval";

/// Named configuration sections, e.g. `Metrics` or `VllmWorker`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ServiceConfig {
    sections: BTreeMap<String, Value>,
}

impl ServiceConfig {
    /// Parse a YAML (or JSON) document whose top level maps section names to sections.
    pub fn from_yaml_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let malformed = |reason: String| ConfigError::Malformed {
            origin: origin.to_string(),
            reason,
        };

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let doc: Value = serde_yaml::from_str(contents).map_err(|e| malformed(e.to_string()))?;
        match doc {
            Value::Null => Ok(Self::default()),
            Value::Mapping(_) => serde_yaml::from_value(doc).map_err(|e| malformed(e.to_string())),
            other => Err(malformed(format!(
                "expected a mapping of sections, found {}",
                value_kind(&other)
            ))),
        }
    }

    /// Load the service config from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_yaml_str(&contents, &path.display().to_string())?;
        debug!(
            path = %path.display(),
            sections = config.sections.len(),
            "Loaded service config file"
        );
        Ok(config)
    }

    /// Load the service config carried by `DYNAMO_SERVICE_CONFIG`, if set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match env::var(SERVICE_CONFIG_ENV) {
            Ok(contents) => Self::from_yaml_str(&contents, SERVICE_CONFIG_ENV).map(Some),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(ConfigError::Malformed {
                origin: SERVICE_CONFIG_ENV.to_string(),
                reason: "value is not valid unicode".to_string(),
            }),
        }
    }

    /// Overlay `other` on top of `self`.
    ///
    /// Sections present in both are merged key by key, with `other` winning.
    pub fn merge(mut self, other: ServiceConfig) -> Self {
        for (name, overlay) in other.sections {
            match self.sections.entry(name) {
                Entry::Occupied(mut entry) => match (entry.get_mut(), overlay) {
                    (Value::Mapping(base), Value::Mapping(overlay)) => {
                        for (key, value) in overlay {
                            base.insert(key, value);
                        }
                    }
                    (slot, overlay) => *slot = overlay,
                },
                Entry::Vacant(entry) => {
                    entry.insert(overlay);
                }
            }
        }
        self
    }

    /// Raw mapping of a section. A missing or null section is an empty mapping.
    pub fn section(&self, name: &str) -> Result<Mapping, ConfigError> {
        match self.sections.get(name) {
            None | Some(Value::Null) => Ok(Mapping::new()),
            Some(Value::Mapping(mapping)) => Ok(mapping.clone()),
            Some(other) => Err(ConfigError::Malformed {
                origin: format!("section '{name}'"),
                reason: format!("expected a mapping, found {}", value_kind(other)),
            }),
        }
    }

    /// Resolve the metrics settings held in `section`
    pub fn settings(&self, section: &str) -> Result<Settings, ConfigError> {
        Settings::resolve_section(section, &self.section(section)?)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Validated metrics settings. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    host: String,
    port: u16,
    poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Settings {
    /// Resolve settings from the raw `Metrics` section
    pub fn resolve(raw: &Mapping) -> Result<Self, ConfigError> {
        Self::resolve_section(DEFAULT_SECTION, raw)
    }

    /// Resolve settings from a raw section, applying defaults for unset keys.
    ///
    /// Every field is checked before failing; the error lists all offending fields.
    pub fn resolve_section(section: &str, raw: &Mapping) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        let mut errors = Vec::new();

        for (key, value) in raw {
            let Some(key) = key.as_str() else {
                errors.push(FieldError {
                    field: format!("{key:?}"),
                    reason: "setting names must be strings".to_string(),
                });
                continue;
            };

            let parsed = match key {
                HOST_KEY => parse_host(value).map(|host| settings.host = host),
                PORT_KEY => parse_port(value).map(|port| settings.port = port),
                POLL_INTERVAL_KEY => {
                    parse_poll_interval(value).map(|interval| settings.poll_interval = interval)
                }
                unknown => {
                    warn!(section = %section, key = %unknown, "Ignoring unknown metrics setting");
                    Ok(())
                }
            };

            if let Err(reason) = parsed {
                errors.push(FieldError {
                    field: key.to_string(),
                    reason,
                });
            }
        }

        if !errors.is_empty() {
            return Err(ConfigError::InvalidFields {
                section: section.to_string(),
                fields: errors,
            });
        }

        debug!(
            host = %settings.host,
            port = settings.port,
            poll_interval = ?settings.poll_interval,
            "Resolved metrics settings"
        );
        Ok(settings)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll interval in whole seconds, truncated
    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval.as_secs()
    }
}

fn parse_host(value: &Value) -> Result<String, String> {
    match value {
        Value::String(host) => Ok(host.clone()),
        other => Err(format!("expected a string, found {}", value_kind(other))),
    }
}

fn parse_port(value: &Value) -> Result<u16, String> {
    let port = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(port), _) => port,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
            _ => return Err(format!("expected an integer, found {n}")),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected an integer, found '{s}'"))?,
        other => return Err(format!("expected an integer, found {}", value_kind(other))),
    };

    u16::try_from(port)
        .ok()
        .filter(|port| *port >= 1)
        .ok_or_else(|| format!("{port} is outside 1-65535"))
}

fn parse_poll_interval(value: &Value) -> Result<Duration, String> {
    match value {
        Value::Number(n) => {
            let secs = n
                .as_f64()
                .ok_or_else(|| format!("expected a number of seconds, found {n}"))?;
            seconds_to_duration(secs)
        }
        Value::String(s) => parse_duration(s),
        other => Err(format!(
            "expected seconds or a duration literal, found {}",
            value_kind(other)
        )),
    }
}

/// Parse a duration literal.
///
/// Accepted forms: plain seconds (`"2"`, `"1.5"`), a number with a unit suffix
/// (`"500ms"`, `"2s"`, `"1m"`, `"1h"`), clock form (`"MM:SS"`, `"HH:MM:SS"`) and
/// ISO-8601 durations (`"PT1M30S"`, `"P1D"`).
pub fn parse_duration(literal: &str) -> Result<Duration, String> {
    let literal = literal.trim();
    if literal.is_empty() {
        return Err("empty duration".to_string());
    }
    if literal.starts_with('-') {
        return Err(format!("'{literal}' must not be negative"));
    }

    let secs = if literal.starts_with(['P', 'p']) {
        parse_iso8601(literal)
    } else if literal.contains(':') {
        parse_clock(literal)
    } else {
        parse_with_unit(literal)
    }
    .ok_or_else(|| format!("'{literal}' is not a valid duration"))?;

    seconds_to_duration(secs)
}

fn parse_with_unit(literal: &str) -> Option<f64> {
    let split = literal
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(literal.len());
    let (number, unit) = literal.split_at(split);
    let number: f64 = number.parse().ok()?;

    let scale = match unit.trim() {
        "" | "s" | "sec" | "secs" => 1.0,
        "ms" => 0.001,
        "m" | "min" | "mins" => 60.0,
        "h" | "hr" | "hrs" => 3600.0,
        _ => return None,
    };
    Some(number * scale)
}

fn parse_clock(literal: &str) -> Option<f64> {
    let parts: Vec<&str> = literal.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => ("0", *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return None,
    };

    // Signs are only meaningful on the whole literal.
    let unsigned =
        |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit() || b == b'.');
    if ![hours, minutes, seconds].into_iter().all(unsigned) {
        return None;
    }

    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    if minutes >= 60 || seconds >= 60.0 {
        return None;
    }
    let whole = hours.checked_mul(3600)?.checked_add(minutes * 60)?;
    Some(whole as f64 + seconds)
}

fn parse_iso8601(literal: &str) -> Option<f64> {
    let body = literal.get(1..)?.to_ascii_uppercase();
    let (date, time) = match body.split_once('T') {
        Some((date, time)) => (date.to_string(), Some(time.to_string())),
        None => (body.clone(), None),
    };

    let mut total = 0.0;
    let mut components = 0;
    let mut accumulate = |part: &str, designators: &[(char, f64)]| -> Option<()> {
        let mut number = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() || c == '.' {
                number.push(c);
                continue;
            }
            let (_, scale) = designators.iter().find(|(d, _)| *d == c)?;
            let value: f64 = number.parse().ok()?;
            total += value * scale;
            components += 1;
            number.clear();
        }
        number.is_empty().then_some(())
    };

    accumulate(&date, &[('W', 604_800.0), ('D', 86_400.0)])?;
    if let Some(time) = time {
        if time.is_empty() {
            return None;
        }
        accumulate(&time, &[('H', 3600.0), ('M', 60.0), ('S', 1.0)])?;
    }

    (components > 0).then_some(total)
}

fn seconds_to_duration(secs: f64) -> Result<Duration, String> {
    if secs.is_sign_negative() && secs != 0.0 {
        return Err(format!("{secs} must not be negative"));
    }
    Duration::try_from_secs_f64(secs.abs()).map_err(|e| format!("{secs} is not a valid duration: {e}"))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
