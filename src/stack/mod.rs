//! Declarative stack orchestration
//!
//! This module handles the multi-service stack definition: parsing the
//! stack file, issuing per-service credentials, and starting services in
//! dependency order behind a readiness gate.

pub mod config;
pub mod credentials;
pub mod orchestrator;
pub mod parser;
pub mod readiness;

pub use config::{ServiceConfig, StackConfig};
pub use credentials::{CredentialIssuer, Role, ScopedCredential};
pub use orchestrator::StackOrchestrator;
pub use parser::StackParser;
pub use readiness::{wait_ready, ReadyPolicy};
