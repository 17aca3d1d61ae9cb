//! The services berth ships alongside the stack runner
//!
//! The web service answers a single HTTP route and exposes a health
//! endpoint tied to database reachability; the worker is a connectivity
//! probe. Both consume their configuration from the environment the
//! composition declares.

pub mod conn;
pub mod web;
pub mod worker;

pub use conn::ConnString;
pub use web::{WebConfig, WebServer};
pub use worker::{Outcome, WorkerConfig};
