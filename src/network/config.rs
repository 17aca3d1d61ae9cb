//! Network configuration

use crate::error::{BerthError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use uuid::Uuid;

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network ID
    pub id: String,
    /// Network name
    pub name: String,
    /// Subnet in CIDR format
    pub subnet: String,
    /// Gateway address
    pub gateway: Option<String>,
    /// Internal network (no external access)
    pub internal: bool,
    /// Created timestamp
    pub created: DateTime<Utc>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string().replace("-", "")[..12].to_string(),
            name: String::new(),
            subnet: "172.17.0.0/16".to_string(),
            gateway: Some("172.17.0.1".to_string()),
            internal: false,
            created: Utc::now(),
        }
    }
}

impl NetworkConfig {
    /// Create a new network configuration
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set subnet
    pub fn subnet(mut self, subnet: &str) -> Self {
        self.subnet = subnet.to_string();
        self
    }

    /// Set internal
    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }
}

/// IP address allocator
pub struct IpAllocator {
    /// Allocated addresses
    allocated: Vec<Ipv4Addr>,
    /// Next available address
    next: Ipv4Addr,
}

impl IpAllocator {
    /// Create a new IP allocator for a subnet
    pub fn new(subnet: &str) -> Result<Self> {
        // Parse subnet (e.g., "172.17.0.0/16")
        let parts: Vec<&str> = subnet.split('/').collect();
        if parts.len() != 2 {
            return Err(BerthError::Network(format!("Invalid subnet: {}", subnet)));
        }

        let base: Ipv4Addr = parts[0]
            .parse()
            .map_err(|_| BerthError::Network(format!("Invalid IP: {}", parts[0])))?;

        // Start from .2 (gateway is typically .1)
        let octets = base.octets();
        let next = Ipv4Addr::new(octets[0], octets[1], octets[2], 2);

        Ok(Self {
            allocated: vec![Ipv4Addr::new(octets[0], octets[1], octets[2], 1)], // Reserve gateway
            next,
        })
    }

    /// Allocate an IP address
    pub fn allocate(&mut self) -> Result<Ipv4Addr> {
        let ip = self.next;

        if self.allocated.contains(&ip) {
            // Find next available
            let mut octets = ip.octets();
            loop {
                octets[3] = octets[3].wrapping_add(1);
                if octets[3] == 0 {
                    octets[2] = octets[2].wrapping_add(1);
                }
                let candidate = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
                if !self.allocated.contains(&candidate) {
                    self.allocated.push(candidate);
                    self.next =
                        Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3].wrapping_add(1));
                    return Ok(candidate);
                }
            }
        }

        self.allocated.push(ip);
        let octets = ip.octets();
        self.next = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3].wrapping_add(1));

        Ok(ip)
    }

    /// Release an IP address
    pub fn release(&mut self, ip: Ipv4Addr) {
        self.allocated.retain(|&a| a != ip);
    }
}
