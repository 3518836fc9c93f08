// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Dependency address resolution
//!
//! A monitored dependency is reachable under a discovery address made of a
//! namespace and a component name. Resolution happens once at startup; there is
//! no caching or retry, any failure is fatal.

use std::fmt;

use serde_yaml::Value;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::errors::{Result, SidecarError};

const NAMESPACE_KEY: &str = "namespace";
const COMPONENT_KEY: &str = "component";

/// Logical handle of the service whose load metrics are polled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    name: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Discovery address of a dependency. Both parts are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyAddress {
    namespace: String,
    component: String,
}

impl DependencyAddress {
    /// Build an address for `dependency`, rejecting empty parts.
    pub fn new(
        dependency: &Dependency,
        namespace: impl Into<String>,
        component: impl Into<String>,
    ) -> Result<Self> {
        let namespace = namespace.into();
        let component = component.into();

        for (part, value) in [(NAMESPACE_KEY, &namespace), (COMPONENT_KEY, &component)] {
            if value.trim().is_empty() {
                return Err(unavailable(dependency, format!("{part} is empty")));
            }
        }

        Ok(Self {
            namespace,
            component,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn component(&self) -> &str {
        &self.component
    }
}

impl fmt::Display for DependencyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.component)
    }
}

/// Port for looking up the discovery address of a dependency
pub trait AddressResolver {
    fn resolve_address(&self, dependency: &Dependency) -> Result<DependencyAddress>;
}

/// Resolves addresses from the dependency's own section of the service config.
///
/// `namespace` is required; `component` defaults to the dependency name.
pub struct ConfigAddressResolver<'a> {
    config: &'a ServiceConfig,
}

impl<'a> ConfigAddressResolver<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }
}

impl AddressResolver for ConfigAddressResolver<'_> {
    fn resolve_address(&self, dependency: &Dependency) -> Result<DependencyAddress> {
        let section = self
            .config
            .section(dependency.name())
            .map_err(|e| unavailable(dependency, e.to_string()))?;

        let read = |key: &str| -> Result<Option<String>> {
            match section.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(unavailable(dependency, format!("{key} must be a string"))),
            }
        };

        let namespace = read(NAMESPACE_KEY)?.ok_or_else(|| {
            unavailable(
                dependency,
                format!(
                    "no namespace configured in section '{}'",
                    dependency.name()
                ),
            )
        })?;
        let component = read(COMPONENT_KEY)?.unwrap_or_else(|| dependency.name().to_string());

        let address = DependencyAddress::new(dependency, namespace, component)?;
        debug!(
            dependency = %dependency,
            address = %address,
            "Resolved dependency address from service config"
        );
        Ok(address)
    }
}

/// Resolves every dependency to a fixed, operator-supplied address
pub struct StaticAddressResolver {
    namespace: String,
    component: String,
}

impl StaticAddressResolver {
    pub fn new(namespace: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            component: component.into(),
        }
    }
}

impl AddressResolver for StaticAddressResolver {
    fn resolve_address(&self, dependency: &Dependency) -> Result<DependencyAddress> {
        DependencyAddress::new(dependency, self.namespace.clone(), self.component.clone())
    }
}

fn unavailable(dependency: &Dependency, reason: String) -> SidecarError {
    SidecarError::DependencyUnavailable {
        dependency: dependency.name().to_string(),
        reason,
    }
}
