//! Stack orchestrator
//!
//! Starts services in dependency order. The ordering contract is
//! readiness, not container start: before a dependent starts, its
//! dependencies must answer a bounded readiness probe (unless the stack
//! file opts a dependency back into the raw `service_started` contract,
//! which reproduces the classic start-vs-ready race).

use super::config::{DependsCondition, ServiceConfig, StackConfig};
use super::credentials::{CredentialIssuer, Role};
use super::readiness::{wait_ready, ReadyPolicy};
use crate::error::{BerthError, Result};
use crate::network::{NetworkConfig, StackNetwork};
use crate::runtime::{InstanceConfig, InstanceStatus, Supervisor};
use crate::storage::VolumeManager;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// State of one service within the stack
#[derive(Debug, Clone)]
pub struct ServiceState {
    /// Service name
    pub name: String,
    /// Instance ID backing this service
    pub instance_id: String,
    /// Current state
    pub status: InstanceStatus,
}

/// Stack orchestrator
pub struct StackOrchestrator {
    /// Project name
    project_name: String,
    /// Stack configuration
    config: StackConfig,
    /// Instance supervisor
    supervisor: Arc<Supervisor>,
    /// Volume manager
    volumes: Arc<VolumeManager>,
    /// The stack's network, created at up
    network: Option<StackNetwork>,
    /// Credential issuer for this stack
    issuer: CredentialIssuer,
    /// Readiness probe policy
    ready_policy: ReadyPolicy,
    /// Service states by name
    service_states: HashMap<String, ServiceState>,
}

impl StackOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        project_name: &str,
        config: StackConfig,
        supervisor: Arc<Supervisor>,
        volumes: Arc<VolumeManager>,
    ) -> Self {
        Self {
            project_name: project_name.to_string(),
            issuer: CredentialIssuer::new(project_name),
            config,
            supervisor,
            volumes,
            network: None,
            ready_policy: ReadyPolicy::default(),
            service_states: HashMap::new(),
        }
    }

    /// Override the readiness probe policy
    pub fn with_ready_policy(mut self, policy: ReadyPolicy) -> Self {
        self.ready_policy = policy;
        self
    }

    /// Start the stack
    pub async fn up(&mut self, detach: bool) -> Result<()> {
        info!("Starting stack project: {}", self.project_name);

        self.create_network()?;
        self.create_volumes()?;

        let order = self.start_order()?;
        for service_name in order {
            self.await_dependencies(&service_name).await?;
            self.start_service(&service_name)?;
        }

        if !detach {
            info!("Project {} is running", self.project_name);
        }

        Ok(())
    }

    /// Stop the stack.
    ///
    /// Volumes survive unless `remove_volumes` is set; this is the
    /// durability contract for the database's data directory.
    pub async fn down(&mut self, remove_volumes: bool) -> Result<()> {
        info!("Stopping stack project: {}", self.project_name);

        let order = self.start_order()?;
        for service_name in order.into_iter().rev() {
            self.stop_service(&service_name)?;
        }

        self.network = None;

        if remove_volumes {
            for name in self.declared_volumes()? {
                match self.volumes.remove(&name, false) {
                    Ok(()) => info!("Removed volume {}", name),
                    Err(BerthError::VolumeNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(())
    }

    /// Start a specific service
    pub fn start_service(&mut self, service_name: &str) -> Result<()> {
        let service = self
            .config
            .services
            .get(service_name)
            .ok_or_else(|| BerthError::ServiceNotFound(service_name.to_string()))?
            .clone();

        info!("Starting service {}", service_name);

        // Reattach after a stop/restart cycle
        if let Some(net) = self.network.as_mut() {
            if net.resolve(service_name).is_err() {
                net.attach(service_name)?;
            }
        }

        let instance_config = self.service_to_instance_config(service_name, &service)?;

        for mount in &instance_config.mounts {
            self.volumes.add_reference(&mount.volume)?;
        }

        let id = self.supervisor.create(instance_config)?;
        self.supervisor.start(&id)?;

        self.service_states.insert(
            service_name.to_string(),
            ServiceState {
                name: service_name.to_string(),
                instance_id: id,
                status: InstanceStatus::Running,
            },
        );

        Ok(())
    }

    /// Stop a specific service
    pub fn stop_service(&mut self, service_name: &str) -> Result<()> {
        if let Some(state) = self.service_states.get(service_name) {
            if let Err(e) = self.supervisor.stop(&state.instance_id) {
                warn!("Failed to stop instance {}: {}", state.instance_id, e);
            }

            if let Ok(instance) = self.supervisor.get(&state.instance_id) {
                for mount in &instance.mounts {
                    let _ = self.volumes.remove_reference(&mount.volume);
                }
            }

            if let Some(net) = self.network.as_mut() {
                let _ = net.detach(service_name);
            }
        }

        if let Some(state) = self.service_states.get_mut(service_name) {
            state.status = InstanceStatus::Stopped;
        }

        Ok(())
    }

    /// Restart a service
    pub async fn restart_service(&mut self, service_name: &str) -> Result<()> {
        self.stop_service(service_name)?;
        if let Some(state) = self.service_states.remove(service_name) {
            self.supervisor.remove(&state.instance_id, true)?;
        }
        self.await_dependencies(service_name).await?;
        self.start_service(service_name)
    }

    /// Get stack status
    pub fn status(&self) -> HashMap<String, ServiceState> {
        self.service_states.clone()
    }

    /// Get service logs
    pub fn logs(&self, service_name: Option<&str>) -> Result<Vec<String>> {
        let services: Vec<&str> = if let Some(name) = service_name {
            vec![name]
        } else {
            self.config.services.keys().map(|s| s.as_str()).collect()
        };

        let mut logs = Vec::new();
        for service in services {
            if let Some(state) = self.service_states.get(service) {
                let instance = self.supervisor.get(&state.instance_id)?;
                logs.push(format!(
                    "[{}] instance {} ({}) {}",
                    service, instance.name, instance.image, instance.status
                ));
            }
        }

        Ok(logs)
    }

    /// Service start order based on dependencies
    pub fn start_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        let mut names: Vec<&String> = self.config.services.keys().collect();
        names.sort();

        for service_name in names {
            self.topological_sort(service_name, &mut visited, &mut visiting, &mut order)?;
        }

        Ok(order)
    }

    /// Topological sort for dependency resolution
    fn topological_sort(
        &self,
        service: &str,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(service) {
            return Ok(());
        }

        if visiting.contains(service) {
            return Err(BerthError::Stack(format!(
                "Circular dependency detected for service: {}",
                service
            )));
        }

        visiting.insert(service.to_string());

        if let Some(service_config) = self.config.services.get(service) {
            for dep in service_config.dependencies() {
                self.topological_sort(&dep, visited, visiting, order)?;
            }
        }

        visiting.remove(service);
        visited.insert(service.to_string());
        order.push(service.to_string());

        Ok(())
    }

    /// Gate a service's start on its dependencies.
    ///
    /// `service_ready` dependencies must answer the readiness probe
    /// within the policy's bounded schedule; `service_started` falls back
    /// to the start-ordering guarantee alone.
    async fn await_dependencies(&self, service_name: &str) -> Result<()> {
        let service = self
            .config
            .services
            .get(service_name)
            .ok_or_else(|| BerthError::ServiceNotFound(service_name.to_string()))?;

        for dep in service.dependencies() {
            match service.depends_condition(&dep) {
                DependsCondition::ServiceStarted => {
                    // Start ordering alone: the dependency's container has
                    // started, its internal readiness is not checked.
                }
                DependsCondition::ServiceReady => {
                    let dep_config = self
                        .config
                        .services
                        .get(&dep)
                        .ok_or_else(|| BerthError::ServiceNotFound(dep.clone()))?;

                    match Self::readiness_addr(dep_config)? {
                        Some(addr) => {
                            info!(
                                "Waiting for {} (dependency of {}) at {}",
                                dep, service_name, addr
                            );
                            let report = wait_ready(&addr, &self.ready_policy).await?;
                            info!("{} ready after {} attempt(s)", dep, report.attempts);
                        }
                        None => {
                            warn!(
                                "Service {} publishes no host port to probe; falling back to start ordering for {}",
                                dep, service_name
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Address the readiness probe targets for a service.
    ///
    /// The probe runs on the host side, so only a host-published port is
    /// probe-able. Stack-network addresses are name-resolution bookkeeping;
    /// no interface holds them, and connecting to one can never succeed.
    fn readiness_addr(config: &ServiceConfig) -> Result<Option<String>> {
        let probe_port = match config.readiness_port()? {
            Some(port) => port,
            None => return Ok(None),
        };

        Ok(config
            .port_mappings()?
            .iter()
            .find(|m| m.container_port == probe_port)
            .and_then(|m| m.host_port)
            .map(|port| format!("127.0.0.1:{}", port)))
    }

    /// Create the stack's network and attach all services
    fn create_network(&mut self) -> Result<()> {
        let name = format!("{}_default", self.project_name);
        let mut network = StackNetwork::new(NetworkConfig::new(&name))?;

        let mut names: Vec<String> = self.config.services.keys().cloned().collect();
        names.sort();
        for service in &names {
            network.attach(service)?;
        }

        info!(
            "Created network {} with {} endpoint(s)",
            name,
            network.endpoints().len()
        );
        self.network = Some(network);
        Ok(())
    }

    /// Create declared and implicitly referenced volumes
    fn create_volumes(&self) -> Result<()> {
        for name in self.declared_volumes()? {
            let mut labels = HashMap::new();
            labels.insert("berth.project".to_string(), self.project_name.clone());
            self.volumes.create(&name, labels)?;
        }
        Ok(())
    }

    /// Volume names this stack uses (declared plus mounted)
    fn declared_volumes(&self) -> Result<Vec<String>> {
        let mut names: HashSet<String> = self.config.volumes.keys().cloned().collect();
        for service in self.config.services.values() {
            for mount in service.volume_mounts()? {
                names.insert(mount.volume);
            }
        }
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        Ok(names)
    }

    /// Convert a service config to an instance config
    fn service_to_instance_config(
        &mut self,
        service_name: &str,
        service: &ServiceConfig,
    ) -> Result<InstanceConfig> {
        let image = service
            .image
            .clone()
            .ok_or_else(|| BerthError::InvalidConfig(format!(
                "Service '{}' has no image",
                service_name
            )))?;

        let instance_name = format!("{}-{}-1", self.project_name, service_name);
        let mut config = InstanceConfig::new(&instance_name, &image)
            .label("berth.project", &self.project_name)
            .label("berth.service", service_name);

        config.env = service.env_map();

        // Issue this service its scoped credential; the database's own
        // bootstrap variables stay whatever the stack file declares.
        let role = match &service.role {
            Some(role) => role.parse::<Role>()?,
            None => Role::default(),
        };
        let credential = self.issuer.issue(service_name, role);
        for (key, value) in credential.to_env() {
            config.env.entry(key).or_insert(value);
        }

        config.ports = service.port_mappings()?;
        config.mounts = service.volume_mounts()?;
        config.networks = vec![format!("{}_default", self.project_name)];

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::parser::StackParser;
    use std::time::Duration;
    use tempfile::tempdir;

    fn orchestrator(yaml: &str, base: &std::path::Path) -> StackOrchestrator {
        let config = StackParser::parse_str(yaml).unwrap();
        StackOrchestrator::new(
            "test",
            config,
            Arc::new(Supervisor::new()),
            Arc::new(VolumeManager::new(base.to_path_buf()).unwrap()),
        )
        .with_ready_policy(ReadyPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            connect_timeout: Duration::from_millis(200),
        })
    }

    #[test]
    fn test_start_order() {
        let yaml = r#"
services:
  web:
    image: demo-web:latest
    depends_on:
      - db
  admin:
    image: mongo-express:latest
    depends_on:
      - db
  worker:
    image: demo-worker:latest
    depends_on:
      - db
  db:
    image: mongo:7
"#;

        let temp = tempdir().unwrap();
        let orchestrator = orchestrator(yaml, temp.path());
        let order = orchestrator.start_order().unwrap();

        let pos = |name: &str| order.iter().position(|s| s == name).unwrap();
        assert!(pos("db") < pos("web"));
        assert!(pos("db") < pos("worker"));
        assert!(pos("db") < pos("admin"));
    }

    #[test]
    fn test_circular_dependency_detection() {
        let yaml = r#"
services:
  a:
    image: one:latest
    depends_on:
      - b
  b:
    image: two:latest
    depends_on:
      - a
"#;

        let temp = tempdir().unwrap();
        let orchestrator = orchestrator(yaml, temp.path());
        assert!(orchestrator.start_order().is_err());
    }

    #[tokio::test]
    async fn test_up_with_started_condition() {
        let yaml = r#"
services:
  db:
    image: mongo:7
    volumes:
      - "db-data:/data/db"
  worker:
    image: demo-worker:latest
    depends_on:
      db:
        condition: service_started
"#;

        let temp = tempdir().unwrap();
        let mut orchestrator = orchestrator(yaml, temp.path());
        orchestrator.up(true).await.unwrap();

        let status = orchestrator.status();
        assert_eq!(status.len(), 2);
        assert_eq!(status["db"].status, InstanceStatus::Running);
        assert_eq!(status["worker"].status, InstanceStatus::Running);
    }

    #[tokio::test]
    async fn test_readiness_gate_blocks_on_dead_dependency() {
        // db publishes a port nothing listens on; the gate must fail
        // after its bounded schedule instead of starting the dependent.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let yaml = format!(
            r#"
services:
  db:
    image: mongo:7
    ports:
      - "{}:27017"
  worker:
    image: demo-worker:latest
    depends_on:
      - db
"#,
            port
        );

        let temp = tempdir().unwrap();
        let mut orchestrator = orchestrator(&yaml, temp.path());
        let result = orchestrator.up(true).await;

        assert!(matches!(result, Err(BerthError::NotReady { .. })));
        // db started, the dependent never did
        let status = orchestrator.status();
        assert!(status.contains_key("db"));
        assert!(!status.contains_key("worker"));
    }

    #[tokio::test]
    async fn test_readiness_gate_passes_with_live_dependency() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let yaml = format!(
            r#"
services:
  db:
    image: mongo:7
    ports:
      - "{}:27017"
  worker:
    image: demo-worker:latest
    depends_on:
      - db
"#,
            port
        );

        let temp = tempdir().unwrap();
        let mut orchestrator = orchestrator(&yaml, temp.path());
        orchestrator.up(true).await.unwrap();

        assert_eq!(orchestrator.status()["worker"].status, InstanceStatus::Running);
    }

    #[tokio::test]
    async fn test_internal_only_dependency_falls_back_to_start_ordering() {
        // The dependency publishes no host port, so there is nothing the
        // host-side probe could reach; startup must not spin against an
        // unbacked stack-network address.
        let yaml = r#"
services:
  db:
    image: mongo:7
    ports:
      - "27017"
  worker:
    image: demo-worker:latest
    depends_on:
      - db
"#;

        let temp = tempdir().unwrap();
        let mut orchestrator = orchestrator(yaml, temp.path());
        orchestrator.up(true).await.unwrap();

        let status = orchestrator.status();
        assert_eq!(status["db"].status, InstanceStatus::Running);
        assert_eq!(status["worker"].status, InstanceStatus::Running);
    }

    #[tokio::test]
    async fn test_restart_service() {
        let yaml = r#"
services:
  db:
    image: mongo:7
"#;

        let temp = tempdir().unwrap();
        let mut orchestrator = orchestrator(yaml, temp.path());
        orchestrator.up(true).await.unwrap();

        orchestrator.restart_service("db").await.unwrap();
        assert_eq!(orchestrator.status()["db"].status, InstanceStatus::Running);
    }

    #[tokio::test]
    async fn test_down_preserves_volumes_by_default() {
        let yaml = r#"
services:
  db:
    image: mongo:7
    volumes:
      - "db-data:/data/db"
"#;

        let temp = tempdir().unwrap();
        let volumes = Arc::new(VolumeManager::new(temp.path().to_path_buf()).unwrap());
        let config = StackParser::parse_str(yaml).unwrap();
        let mut orchestrator = StackOrchestrator::new(
            "test",
            config,
            Arc::new(Supervisor::new()),
            volumes.clone(),
        );

        orchestrator.up(true).await.unwrap();
        orchestrator.down(false).await.unwrap();
        assert!(volumes.get("db-data").is_ok());
    }

    #[tokio::test]
    async fn test_down_removes_volumes_when_asked() {
        let yaml = r#"
services:
  db:
    image: mongo:7
    volumes:
      - "db-data:/data/db"
"#;

        let temp = tempdir().unwrap();
        let volumes = Arc::new(VolumeManager::new(temp.path().to_path_buf()).unwrap());
        let config = StackParser::parse_str(yaml).unwrap();
        let mut orchestrator = StackOrchestrator::new(
            "test",
            config,
            Arc::new(Supervisor::new()),
            volumes.clone(),
        );

        orchestrator.up(true).await.unwrap();
        orchestrator.down(true).await.unwrap();
        assert!(volumes.get("db-data").is_err());
    }

    #[tokio::test]
    async fn test_scoped_credentials_injected() {
        let yaml = r#"
services:
  db:
    image: mongo:7
    environment:
      MONGO_INITDB_ROOT_USERNAME: root
      MONGO_INITDB_ROOT_PASSWORD: example
  web:
    image: demo-web:latest
    role: readwrite
    depends_on:
      db:
        condition: service_started
"#;

        let temp = tempdir().unwrap();
        let supervisor = Arc::new(Supervisor::new());
        let config = StackParser::parse_str(yaml).unwrap();
        let mut orchestrator = StackOrchestrator::new(
            "test",
            config,
            supervisor.clone(),
            Arc::new(VolumeManager::new(temp.path().to_path_buf()).unwrap()),
        );

        orchestrator.up(true).await.unwrap();

        let web = supervisor.find_by_name("test-web-1").unwrap().unwrap();
        assert_eq!(web.env.get("DB_USERNAME").map(String::as_str), Some("test-web"));
        assert_eq!(web.env.get("DB_ROLE").map(String::as_str), Some("readwrite"));

        let db = supervisor.find_by_name("test-db-1").unwrap().unwrap();
        // The database keeps its declared bootstrap credential
        assert_eq!(
            db.env.get("MONGO_INITDB_ROOT_USERNAME").map(String::as_str),
            Some("root")
        );
        // Scoped credentials differ per service
        assert_ne!(db.env.get("DB_PASSWORD"), web.env.get("DB_PASSWORD"));
    }
}
