//! Stack file configuration types

use crate::error::{BerthError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stack file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Project name (for top-level name)
    #[serde(default)]
    pub name: Option<String>,
    /// Services
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
    /// Networks
    #[serde(default)]
    pub networks: HashMap<String, NetworkDef>,
    /// Volumes
    #[serde(default)]
    pub volumes: HashMap<String, VolumeDef>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: None,
            services: HashMap::new(),
            networks: HashMap::new(),
            volumes: HashMap::new(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Image name
    #[serde(default)]
    pub image: Option<String>,
    /// Environment variables
    #[serde(default)]
    pub environment: Option<EnvironmentConfig>,
    /// Port mappings ("host:container" or "container" for internal-only)
    #[serde(default)]
    pub ports: Option<Vec<String>>,
    /// Volume mounts ("volume:/path/in/service")
    #[serde(default)]
    pub volumes: Option<Vec<String>>,
    /// Networks to join
    #[serde(default)]
    pub networks: Option<Vec<String>>,
    /// Startup dependencies
    #[serde(default)]
    pub depends_on: Option<DependsOnConfig>,
    /// Container port the readiness probe checks.
    /// Defaults to the first declared port.
    #[serde(default)]
    pub ready_port: Option<u16>,
    /// Credential role granted to this service
    #[serde(default)]
    pub role: Option<String>,
}

impl ServiceConfig {
    /// Names of services this service depends on
    pub fn dependencies(&self) -> Vec<String> {
        match &self.depends_on {
            Some(DependsOnConfig::Array(arr)) => arr.clone(),
            Some(DependsOnConfig::Map(map)) => map.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Dependency condition for a given dependency name.
    ///
    /// Short (array) syntax maps to [`DependsCondition::ServiceReady`]:
    /// gating on container start alone races against the dependency's
    /// internal initialization, so readiness is the default contract.
    /// `condition: service_started` opts back into the raw contract.
    pub fn depends_condition(&self, dep: &str) -> DependsCondition {
        match &self.depends_on {
            Some(DependsOnConfig::Map(map)) => map
                .get(dep)
                .map(|c| c.condition)
                .unwrap_or(DependsCondition::ServiceReady),
            _ => DependsCondition::ServiceReady,
        }
    }

    /// Parsed port mappings
    pub fn port_mappings(&self) -> Result<Vec<PortMapping>> {
        self.ports
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|p| PortMapping::parse(p))
            .collect()
    }

    /// Parsed volume mounts
    pub fn volume_mounts(&self) -> Result<Vec<MountSpec>> {
        self.volumes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|v| MountSpec::parse(v))
            .collect()
    }

    /// Container port used by the readiness probe
    pub fn readiness_port(&self) -> Result<Option<u16>> {
        if let Some(port) = self.ready_port {
            return Ok(Some(port));
        }
        Ok(self.port_mappings()?.first().map(|m| m.container_port))
    }

    /// Environment as a flat map
    pub fn env_map(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        match &self.environment {
            Some(EnvironmentConfig::Array(arr)) => {
                for item in arr {
                    if let Some((key, value)) = item.split_once('=') {
                        env.insert(key.to_string(), value.to_string());
                    }
                }
            }
            Some(EnvironmentConfig::Map(map)) => {
                for (key, value) in map {
                    if let Some(v) = value {
                        env.insert(key.clone(), v.clone());
                    }
                }
            }
            None => {}
        }
        env
    }
}

/// Environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentConfig {
    /// Array of KEY=value strings
    Array(Vec<String>),
    /// Map of key to value
    Map(HashMap<String, Option<String>>),
}

/// Depends on configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOnConfig {
    /// Array of service names
    Array(Vec<String>),
    /// Map of service to condition
    Map(HashMap<String, DependsOnEntry>),
}

/// Depends on entry with explicit condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependsOnEntry {
    /// Condition to wait for
    pub condition: DependsCondition,
}

/// Dependency condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependsCondition {
    /// Wait only for the dependency's container to start
    ServiceStarted,
    /// Wait for the dependency to answer its readiness probe
    ServiceReady,
}

/// A "host:container" port mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Published port on the host, if any
    pub host_port: Option<u16>,
    /// Port inside the service
    pub container_port: u16,
}

impl PortMapping {
    /// Parse short port syntax: "8080:80" publishes, "27017" stays internal
    pub fn parse(s: &str) -> Result<Self> {
        let parse_port = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| BerthError::InvalidConfig(format!("Invalid port: {}", p)))
        };

        match s.split_once(':') {
            Some((host, container)) => Ok(Self {
                host_port: Some(parse_port(host)?),
                container_port: parse_port(container)?,
            }),
            None => Ok(Self {
                host_port: None,
                container_port: parse_port(s)?,
            }),
        }
    }
}

/// A "volume:/path" mount specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    /// Named volume
    pub volume: String,
    /// Target path inside the service
    pub target: String,
}

impl MountSpec {
    /// Parse short mount syntax: "db-data:/data/db"
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((volume, target)) if !volume.is_empty() && target.starts_with('/') => Ok(Self {
                volume: volume.to_string(),
                target: target.to_string(),
            }),
            _ => Err(BerthError::InvalidConfig(format!(
                "Invalid volume mount: {} (expected name:/path)",
                s
            ))),
        }
    }
}

/// Network definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDef {
    /// Driver
    pub driver: Option<String>,
    /// Name override
    pub name: Option<String>,
}

/// Volume definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeDef {
    /// Driver
    pub driver: Option<String>,
    /// Name override
    pub name: Option<String>,
}
