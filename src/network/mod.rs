//! Stack networking
//!
//! One named network joins all services of a stack; services find each
//! other by name-based address resolution.

pub mod config;
pub mod stack_net;

pub use config::{IpAllocator, NetworkConfig};
pub use stack_net::StackNetwork;
