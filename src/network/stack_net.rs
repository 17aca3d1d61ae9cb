//! The per-stack network
//!
//! Attached services get an address from the network's allocator and are
//! resolvable by service name, which is how dependents reach the
//! database without any runtime discovery.

use super::config::{IpAllocator, NetworkConfig};
use crate::error::{BerthError, Result};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use uuid::Uuid;

/// An endpoint attached to the stack network
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Service name, also the resolvable hostname
    pub service: String,
    /// Endpoint ID
    pub endpoint_id: String,
    /// MAC address
    pub mac_address: String,
    /// Allocated IPv4 address
    pub address: Ipv4Addr,
}

/// The named network joining all services of a stack
pub struct StackNetwork {
    /// Network configuration
    pub config: NetworkConfig,
    /// IP allocator
    allocator: IpAllocator,
    /// Endpoints by service name
    endpoints: HashMap<String, Endpoint>,
}

impl StackNetwork {
    /// Create a new stack network
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let allocator = IpAllocator::new(&config.subnet)?;

        Ok(Self {
            config,
            allocator,
            endpoints: HashMap::new(),
        })
    }

    /// Attach a service to this network
    pub fn attach(&mut self, service: &str) -> Result<Endpoint> {
        if self.endpoints.contains_key(service) {
            return Err(BerthError::Network(format!(
                "Service {} already attached to network {}",
                service, self.config.name
            )));
        }

        let address = self.allocator.allocate()?;
        let endpoint = Endpoint {
            service: service.to_string(),
            endpoint_id: Uuid::new_v4().to_string().replace("-", "")[..12].to_string(),
            mac_address: generate_mac_address(),
            address,
        };

        self.endpoints.insert(service.to_string(), endpoint.clone());
        Ok(endpoint)
    }

    /// Detach a service from this network
    pub fn detach(&mut self, service: &str) -> Result<()> {
        let endpoint = self.endpoints.remove(service).ok_or_else(|| {
            BerthError::Network(format!(
                "Service {} not attached to network {}",
                service, self.config.name
            ))
        })?;

        self.allocator.release(endpoint.address);
        Ok(())
    }

    /// Resolve a service name to its address
    pub fn resolve(&self, service: &str) -> Result<Ipv4Addr> {
        self.endpoints
            .get(service)
            .map(|e| e.address)
            .ok_or_else(|| BerthError::ServiceNotFound(service.to_string()))
    }

    /// Attached endpoints
    pub fn endpoints(&self) -> &HashMap<String, Endpoint> {
        &self.endpoints
    }
}

/// Generate a random MAC address in the locally administered range
fn generate_mac_address() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    format!(
        "02:42:{:02x}:{:02x}:{:02x}:{:02x}",
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        rng.gen::<u8>()
    )
}
