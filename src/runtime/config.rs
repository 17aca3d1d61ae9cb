//! Service instance configuration

use crate::stack::config::{MountSpec, PortMapping};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Instance is being created
    Creating,
    /// Instance is created but not running
    Created,
    /// Instance is running
    Running,
    /// Instance has stopped
    Stopped,
    /// Instance has exited
    Exited,
    /// Instance is in an error state
    Dead,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Creating => write!(f, "creating"),
            InstanceStatus::Created => write!(f, "created"),
            InstanceStatus::Running => write!(f, "running"),
            InstanceStatus::Stopped => write!(f, "stopped"),
            InstanceStatus::Exited => write!(f, "exited"),
            InstanceStatus::Dead => write!(f, "dead"),
        }
    }
}

/// Service instance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Unique instance ID
    pub id: String,
    /// Instance name
    pub name: String,
    /// Image name/tag
    pub image: String,
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Port mappings
    pub ports: Vec<PortMapping>,
    /// Volume mounts
    pub mounts: Vec<MountSpec>,
    /// Networks this instance is attached to
    pub networks: Vec<String>,
    /// Instance labels
    pub labels: HashMap<String, String>,
    /// Current status
    pub status: InstanceStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Start time
    pub started_at: Option<DateTime<Utc>>,
    /// Stop time
    pub finished_at: Option<DateTime<Utc>>,
    /// Exit code
    pub exit_code: Option<i32>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string().replace("-", "")[..12].to_string(),
            name: String::new(),
            image: String::new(),
            env: HashMap::new(),
            ports: Vec::new(),
            mounts: Vec::new(),
            networks: Vec::new(),
            labels: HashMap::new(),
            status: InstanceStatus::Creating,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            exit_code: None,
        }
    }
}

impl InstanceConfig {
    /// Create a new instance configuration
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            ..Self::default()
        }
    }

    /// Add environment variable
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Add port mapping
    pub fn port(mut self, host_port: Option<u16>, container_port: u16) -> Self {
        self.ports.push(PortMapping {
            host_port,
            container_port,
        });
        self
    }

    /// Add volume mount
    pub fn mount(mut self, volume: &str, target: &str) -> Self {
        self.mounts.push(MountSpec {
            volume: volume.to_string(),
            target: target.to_string(),
        });
        self
    }

    /// Add label
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}
