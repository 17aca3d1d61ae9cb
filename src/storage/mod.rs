//! Persistent storage for stack services

pub mod volume;

pub use volume::{Volume, VolumeManager};
