//! Berth - a multi-service stack runner with readiness-gated startup
//!
//! Berth runs a small multi-service application stack from a declarative
//! YAML definition. It provides:
//!
//! - Stack file parsing, validation and environment interpolation
//! - Dependency-ordered service startup with an explicit readiness gate
//! - One named per-stack network with name-based address resolution
//! - Named volumes that survive stack recreation
//! - Per-service scoped credential issuance
//! - The two demo services it orchestrates (web and worker binaries)

pub mod error;
pub mod network;
pub mod runtime;
pub mod services;
pub mod stack;
pub mod storage;

pub use error::{BerthError, Result};
