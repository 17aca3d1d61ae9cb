//! Service instance management
//!
//! This module tracks the runnable units of a stack: one instance per
//! service, with its image, environment, ports and lifecycle status.
//! Process isolation belongs to the external container runtime; berth
//! records and transitions instance state.

pub mod config;
pub mod supervisor;

pub use config::{InstanceConfig, InstanceStatus};
pub use supervisor::Supervisor;
