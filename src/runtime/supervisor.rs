//! Instance lifecycle supervision

use super::config::{InstanceConfig, InstanceStatus};
use crate::error::{BerthError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Supervisor tracking all service instances of a stack
pub struct Supervisor {
    /// All instances indexed by ID
    instances: Arc<RwLock<HashMap<String, InstanceConfig>>>,
}

impl Supervisor {
    /// Create a new supervisor
    pub fn new() -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new instance
    pub fn create(&self, mut config: InstanceConfig) -> Result<String> {
        let mut instances = self
            .instances
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        if instances.values().any(|c| c.name == config.name) {
            return Err(BerthError::InstanceExists(config.name));
        }

        let id = config.id.clone();
        config.status = InstanceStatus::Created;
        instances.insert(id.clone(), config);
        Ok(id)
    }

    /// Mark an instance started
    pub fn start(&self, id: &str) -> Result<()> {
        let mut instances = self
            .instances
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        let instance = instances
            .get_mut(id)
            .ok_or_else(|| BerthError::InstanceNotFound(id.to_string()))?;

        if instance.status == InstanceStatus::Running {
            return Err(BerthError::InstanceAlreadyRunning(id.to_string()));
        }

        instance.status = InstanceStatus::Running;
        instance.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark an instance stopped
    pub fn stop(&self, id: &str) -> Result<()> {
        let mut instances = self
            .instances
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        let instance = instances
            .get_mut(id)
            .ok_or_else(|| BerthError::InstanceNotFound(id.to_string()))?;

        if instance.status != InstanceStatus::Running {
            return Err(BerthError::InstanceNotRunning(id.to_string()));
        }

        instance.status = InstanceStatus::Stopped;
        instance.finished_at = Some(Utc::now());
        instance.exit_code = Some(0);
        Ok(())
    }

    /// Record an instance exit with a code
    pub fn exited(&self, id: &str, code: i32) -> Result<()> {
        let mut instances = self
            .instances
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        let instance = instances
            .get_mut(id)
            .ok_or_else(|| BerthError::InstanceNotFound(id.to_string()))?;

        instance.status = if code == 0 {
            InstanceStatus::Exited
        } else {
            InstanceStatus::Dead
        };
        instance.finished_at = Some(Utc::now());
        instance.exit_code = Some(code);
        Ok(())
    }

    /// Remove an instance
    pub fn remove(&self, id: &str, force: bool) -> Result<()> {
        let mut instances = self
            .instances
            .write()
            .map_err(|_| BerthError::Lock("Failed to acquire write lock".to_string()))?;

        let instance = instances
            .get(id)
            .ok_or_else(|| BerthError::InstanceNotFound(id.to_string()))?;

        if instance.status == InstanceStatus::Running && !force {
            return Err(BerthError::Instance(
                "Cannot remove a running instance".to_string(),
            ));
        }

        instances.remove(id);
        Ok(())
    }

    /// Get an instance by ID
    pub fn get(&self, id: &str) -> Result<InstanceConfig> {
        let instances = self
            .instances
            .read()
            .map_err(|_| BerthError::Lock("Failed to acquire read lock".to_string()))?;

        instances
            .get(id)
            .cloned()
            .ok_or_else(|| BerthError::InstanceNotFound(id.to_string()))
    }

    /// List instances
    pub fn list(&self, all: bool) -> Result<Vec<InstanceConfig>> {
        let instances = self
            .instances
            .read()
            .map_err(|_| BerthError::Lock("Failed to acquire read lock".to_string()))?;

        Ok(instances
            .values()
            .filter(|c| all || c.status == InstanceStatus::Running)
            .cloned()
            .collect())
    }

    /// Find an instance by name
    pub fn find_by_name(&self, name: &str) -> Result<Option<InstanceConfig>> {
        let instances = self
            .instances
            .read()
            .map_err(|_| BerthError::Lock("Failed to acquire read lock".to_string()))?;

        Ok(instances.values().find(|c| c.name == name).cloned())
    }

    /// Count running instances
    pub fn running_count(&self) -> Result<usize> {
        let instances = self
            .instances
            .read()
            .map_err(|_| BerthError::Lock("Failed to acquire read lock".to_string()))?;

        Ok(instances
            .values()
            .filter(|c| c.status == InstanceStatus::Running)
            .count())
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_start() {
        let supervisor = Supervisor::new();
        let id = supervisor
            .create(InstanceConfig::new("demo-web-1", "demo-web:latest"))
            .unwrap();

        assert_eq!(supervisor.get(&id).unwrap().status, InstanceStatus::Created);

        supervisor.start(&id).unwrap();
        let instance = supervisor.get(&id).unwrap();
        assert_eq!(instance.status, InstanceStatus::Running);
        assert!(instance.started_at.is_some());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let supervisor = Supervisor::new();
        supervisor
            .create(InstanceConfig::new("demo-web-1", "demo-web:latest"))
            .unwrap();

        let result = supervisor.create(InstanceConfig::new("demo-web-1", "demo-web:latest"));
        assert!(matches!(result, Err(BerthError::InstanceExists(_))));
    }

    #[test]
    fn test_double_start_rejected() {
        let supervisor = Supervisor::new();
        let id = supervisor
            .create(InstanceConfig::new("demo-db-1", "mongo:7"))
            .unwrap();

        supervisor.start(&id).unwrap();
        assert!(matches!(
            supervisor.start(&id),
            Err(BerthError::InstanceAlreadyRunning(_))
        ));
    }

    #[test]
    fn test_stop_records_exit() {
        let supervisor = Supervisor::new();
        let id = supervisor
            .create(InstanceConfig::new("demo-db-1", "mongo:7"))
            .unwrap();

        supervisor.start(&id).unwrap();
        supervisor.stop(&id).unwrap();

        let instance = supervisor.get(&id).unwrap();
        assert_eq!(instance.status, InstanceStatus::Stopped);
        assert_eq!(instance.exit_code, Some(0));
    }

    #[test]
    fn test_exited_nonzero_marks_dead() {
        let supervisor = Supervisor::new();
        let id = supervisor
            .create(InstanceConfig::new("demo-worker-1", "demo-worker:latest"))
            .unwrap();

        supervisor.start(&id).unwrap();
        supervisor.exited(&id, 1).unwrap();
        assert_eq!(supervisor.get(&id).unwrap().status, InstanceStatus::Dead);
    }

    #[test]
    fn test_remove_running_requires_force() {
        let supervisor = Supervisor::new();
        let id = supervisor
            .create(InstanceConfig::new("demo-web-1", "demo-web:latest"))
            .unwrap();
        supervisor.start(&id).unwrap();

        assert!(supervisor.remove(&id, false).is_err());
        supervisor.remove(&id, true).unwrap();
        assert!(supervisor.get(&id).is_err());
    }

    #[test]
    fn test_list_filters_running() {
        let supervisor = Supervisor::new();
        let a = supervisor
            .create(InstanceConfig::new("demo-web-1", "demo-web:latest"))
            .unwrap();
        supervisor
            .create(InstanceConfig::new("demo-db-1", "mongo:7"))
            .unwrap();

        supervisor.start(&a).unwrap();

        assert_eq!(supervisor.list(false).unwrap().len(), 1);
        assert_eq!(supervisor.list(true).unwrap().len(), 2);
        assert_eq!(supervisor.running_count().unwrap(), 1);
    }
}
