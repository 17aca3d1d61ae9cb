//! Named volume management
//!
//! Volumes outlive the services that mount them: a stack can be torn
//! down and recreated without losing database state. The manager
//! rediscovers existing volume directories at startup, and a volume is
//! only ever deleted by an explicit remove.

use crate::error::{BerthError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// A named persistent volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name
    pub name: String,
    /// Mount point on the host
    pub mountpoint: PathBuf,
    /// Volume labels
    pub labels: HashMap<String, String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Number of instances currently mounting this volume
    pub ref_count: i64,
}

impl Volume {
    /// Create a new volume record
    pub fn new(name: &str, base_path: &Path) -> Self {
        Self {
            name: name.to_string(),
            mountpoint: base_path.join(name),
            labels: HashMap::new(),
            created_at: Utc::now(),
            ref_count: 0,
        }
    }

    /// Total size of the volume's contents in bytes
    pub fn size(&self) -> Result<u64> {
        if !self.mountpoint.exists() {
            return Ok(0);
        }

        let mut total = 0u64;
        for entry in walkdir::WalkDir::new(&self.mountpoint)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_file() {
                    total += metadata.len();
                }
            }
        }

        Ok(total)
    }
}

/// Volume manager
pub struct VolumeManager {
    /// Volumes indexed by name
    volumes: Arc<RwLock<HashMap<String, Volume>>>,
    /// Base path for volume storage
    base_path: PathBuf,
}

impl VolumeManager {
    /// Create a new volume manager, rediscovering volumes already on disk
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;

        let mut volumes = HashMap::new();
        for entry in std::fs::read_dir(&base_path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    volumes.insert(name.to_string(), Volume::new(name, &base_path));
                }
            }
        }

        Ok(Self {
            volumes: Arc::new(RwLock::new(volumes)),
            base_path,
        })
    }

    /// Create a new volume, or return the existing one with that name
    pub fn create(&self, name: &str, labels: HashMap<String, String>) -> Result<Volume> {
        if name.is_empty() {
            return Err(BerthError::Volume("Volume name must not be empty".to_string()));
        }

        let mut volumes = self
            .volumes
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        if let Some(existing) = volumes.get(name) {
            return Ok(existing.clone());
        }

        let mut volume = Volume::new(name, &self.base_path);
        volume.labels = labels;

        std::fs::create_dir_all(&volume.mountpoint)?;
        volumes.insert(name.to_string(), volume.clone());

        Ok(volume)
    }

    /// Get a volume by name
    pub fn get(&self, name: &str) -> Result<Volume> {
        let volumes = self
            .volumes
            .read()
            .map_err(|_| BerthError::Lock("Failed to acquire read lock".to_string()))?;

        volumes
            .get(name)
            .cloned()
            .ok_or_else(|| BerthError::VolumeNotFound(name.to_string()))
    }

    /// List all volumes
    pub fn list(&self) -> Result<Vec<Volume>> {
        let volumes = self
            .volumes
            .read()
            .map_err(|_| BerthError::Lock("Failed to acquire read lock".to_string()))?;

        Ok(volumes.values().cloned().collect())
    }

    /// Remove a volume and its data
    pub fn remove(&self, name: &str, force: bool) -> Result<()> {
        let mut volumes = self
            .volumes
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        let volume = volumes
            .get(name)
            .ok_or_else(|| BerthError::VolumeNotFound(name.to_string()))?;

        if volume.ref_count > 0 && !force {
            return Err(BerthError::Volume(format!(
                "Volume {} is in use by {} instance(s)",
                name, volume.ref_count
            )));
        }

        if volume.mountpoint.exists() {
            std::fs::remove_dir_all(&volume.mountpoint)?;
        }

        volumes.remove(name);
        Ok(())
    }

    /// Remove all volumes with no references
    pub fn prune(&self) -> Result<Vec<String>> {
        let volumes = self
            .volumes
            .read()
            .map_err(|_| BerthError::Lock("Failed to acquire read lock".to_string()))?;

        let to_remove: Vec<String> = volumes
            .iter()
            .filter(|(_, v)| v.ref_count == 0)
            .map(|(name, _)| name.clone())
            .collect();

        drop(volumes);

        for name in &to_remove {
            self.remove(name, true)?;
        }

        Ok(to_remove)
    }

    /// Increment reference count for a volume
    pub fn add_reference(&self, name: &str) -> Result<()> {
        let mut volumes = self
            .volumes
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        let volume = volumes
            .get_mut(name)
            .ok_or_else(|| BerthError::VolumeNotFound(name.to_string()))?;

        volume.ref_count += 1;
        Ok(())
    }

    /// Decrement reference count for a volume
    pub fn remove_reference(&self, name: &str) -> Result<()> {
        let mut volumes = self
            .volumes
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        let volume = volumes
            .get_mut(name)
            .ok_or_else(|| BerthError::VolumeNotFound(name.to_string()))?;

        volume.ref_count = (volume.ref_count - 1).max(0);
        Ok(())
    }
}
