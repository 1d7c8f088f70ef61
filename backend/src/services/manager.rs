//! Services manager for long-running and background services.
//!
//! Services register with the manager and are started/stopped together.
//! Start order respects [dependencies](Service::dependencies); a service is only
//! started after all of its dependencies.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Health status of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of a service health check.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

/// A service that can be started, stopped and health-checked by the manager.
///
/// Use [tracing] for lifecycle logging (`info` for start/stop, `debug` for
/// periodic work, `warn`/`error` for failures) and include the service name
/// as a field.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Unique name for logging and lookup (e.g. "http", "schema-updater:shop").
    fn name(&self) -> &str;

    /// Names of services that must be started before this one. Cycles are an error.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Start background tasks. Idempotent allowed.
    async fn start(&self) -> Result<()>;

    /// Stop background tasks and release resources. Idempotent allowed.
    async fn stop(&self) -> Result<()>;

    async fn health(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::healthy())
    }
}

/// Builder for [ServicesManager]: add services, then [build](ServicesManagerBuilder::build)
/// or [start](ServicesManagerBuilder::start).
#[derive(Default)]
pub struct ServicesManagerBuilder {
    services: Vec<Arc<dyn Service>>,
}

impl ServicesManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    /// Build the manager and register all services. Does not start them.
    pub async fn build(self) -> Arc<ServicesManager> {
        let manager = Arc::new(ServicesManager::new());
        for service in self.services {
            manager.register(service).await;
        }
        manager
    }

    /// Build the manager and start every service in dependency order.
    pub async fn start(self) -> Result<Arc<ServicesManager>> {
        let manager = self.build().await;
        manager.start_all().await?;
        Ok(manager)
    }
}

/// Registry and lifecycle controller for services.
#[derive(Default)]
pub struct ServicesManager {
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
    started: RwLock<HashSet<String>>,
}

impl ServicesManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ServicesManagerBuilder {
        ServicesManagerBuilder::new()
    }

    /// Compute start order from dependencies (topological order). Returns an
    /// error on unknown dependencies or cycles.
    async fn start_order(&self) -> Result<Vec<String>> {
        let guard = self.services.read().await;
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        let mut deps: HashMap<String, Vec<String>> = HashMap::new();
        for (name, svc) in guard.iter() {
            let d = svc.dependencies();
            for dep in &d {
                if !guard.contains_key(dep) {
                    anyhow::bail!("Service {} depends on {} which is not registered", name, dep);
                }
            }
            deps.insert(name.clone(), d);
        }
        drop(guard);

        // Kahn's algorithm: dependencies first.
        let mut in_degree: HashMap<&str, usize> = deps
            .iter()
            .map(|(name, d)| (name.as_str(), d.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, d) in &deps {
            for dep in d {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
        let mut queue: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree.get(n) == Some(&0))
            .rev()
            .collect();
        let mut order = Vec::with_capacity(names.len());
        while let Some(n) = queue.pop() {
            order.push(n.to_string());
            for s in dependents.get(n).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(s) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(*s);
                    }
                }
            }
        }
        if order.len() != names.len() {
            anyhow::bail!("Service dependency cycle detected");
        }
        Ok(order)
    }

    /// Register a service. Does not start it. A service with the same name is
    /// replaced (the previous instance is not stopped).
    pub async fn register(&self, service: Arc<dyn Service>) {
        let name = service.name().to_string();
        let replaced = self.services.write().await.insert(name.clone(), service);
        match replaced {
            Some(_) => warn!(service = %name, "Service replaced"),
            None => debug!(service = %name, "Service registered"),
        }
    }

    /// Register and start a service while the others are already running.
    /// Returns false, without starting anything, when a service with the same
    /// name is already registered.
    pub async fn launch(&self, service: Arc<dyn Service>) -> Result<bool> {
        let name = service.name().to_string();
        {
            let mut services = self.services.write().await;
            if services.contains_key(&name) {
                return Ok(false);
            }
            services.insert(name.clone(), service.clone());
        }
        if let Err(e) = service.start().await {
            self.services.write().await.remove(&name);
            return Err(e).with_context(|| format!("failed to start service {}", name));
        }
        self.started.write().await.insert(name.clone());
        info!(service = %name, "Service launched");
        Ok(true)
    }

    /// Start all registered services in dependency order. If one fails, the
    /// services already started by this call are stopped again in reverse.
    pub async fn start_all(&self) -> Result<()> {
        let order = self.start_order().await?;
        let mut launched: Vec<(String, Arc<dyn Service>)> = Vec::new();
        for name in order {
            let Some(service) = self.get(&name).await else {
                continue;
            };
            if let Err(e) = service.start().await {
                error!(service = %name, error = %e, "Service failed to start");
                for (prior, svc) in launched.into_iter().rev() {
                    if let Err(stop_err) = svc.stop().await {
                        warn!(service = %prior, error = %stop_err, "Rollback stop failed");
                    }
                    self.started.write().await.remove(&prior);
                }
                return Err(e).with_context(|| format!("failed to start service {}", name));
            }
            self.started.write().await.insert(name.clone());
            info!(service = %name, "Service started");
            launched.push((name, service));
        }
        Ok(())
    }

    /// Stop all registered services in reverse dependency order. Stop
    /// failures are logged and do not prevent the remaining stops.
    pub async fn stop_all(&self) -> Result<()> {
        let order = self.start_order().await?;
        for name in order.into_iter().rev() {
            let Some(service) = self.get(&name).await else {
                continue;
            };
            match service.stop().await {
                Ok(()) => info!(service = %name, "Service stopped"),
                Err(e) => warn!(service = %name, error = %e, "Service failed to stop"),
            }
            self.started.write().await.remove(&name);
        }
        Ok(())
    }

    /// Health of every registered service, by name. A failing health check
    /// reports the service as unhealthy with the error message.
    pub async fn health_all(&self) -> BTreeMap<String, ServiceHealth> {
        let snapshot: Vec<(String, Arc<dyn Service>)> = self
            .services
            .read()
            .await
            .iter()
            .map(|(n, s)| (n.clone(), s.clone()))
            .collect();
        let mut report = BTreeMap::new();
        for (name, service) in snapshot {
            let health = service
                .health()
                .await
                .unwrap_or_else(|e| ServiceHealth::unhealthy(e.to_string()));
            report.insert(name, health);
        }
        report
    }

    pub async fn is_started(&self, name: &str) -> bool {
        self.started.read().await.contains(name)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.read().await.get(name).cloned()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct Recorder {
        name: String,
        deps: Vec<String>,
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    }

    #[async_trait]
    impl Service for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }

        async fn start(&self) -> Result<()> {
            if self.fail_start {
                anyhow::bail!("{} cannot start", self.name);
            }
            self.log.lock().push(format!("start {}", self.name));
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.log.lock().push(format!("stop {}", self.name));
            Ok(())
        }
    }

    fn recorder(name: &str, deps: &[&str], log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Service> {
        Arc::new(Recorder {
            name: name.to_string(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            log: log.clone(),
            fail_start: false,
        })
    }

    #[tokio::test]
    async fn test_start_and_stop_follow_dependencies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = ServicesManager::builder()
            .add_service(recorder("http", &["updater"], &log))
            .add_service(recorder("updater", &[], &log))
            .start()
            .await
            .unwrap();
        assert!(manager.is_started("http").await);
        manager.stop_all().await.unwrap();
        assert_eq!(
            *log.lock(),
            vec!["start updater", "start http", "stop http", "stop updater"]
        );
    }

    #[tokio::test]
    async fn test_unknown_dependency_and_cycles_fail() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = ServicesManager::builder()
            .add_service(recorder("a", &["missing"], &log))
            .build()
            .await;
        assert!(manager.start_all().await.is_err());

        let manager = ServicesManager::builder()
            .add_service(recorder("a", &["b"], &log))
            .add_service(recorder("b", &["a"], &log))
            .build()
            .await;
        assert!(manager.start_all().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let broken: Arc<dyn Service> = Arc::new(Recorder {
            name: "http".to_string(),
            deps: vec!["updater".to_string()],
            log: log.clone(),
            fail_start: true,
        });
        let manager = ServicesManager::builder()
            .add_service(recorder("updater", &[], &log))
            .add_service(broken)
            .build()
            .await;
        let err = manager.start_all().await.unwrap_err();
        assert_eq!(err.to_string(), "failed to start service http");
        assert!(!manager.is_started("updater").await);
        assert_eq!(*log.lock(), vec!["start updater", "stop updater"]);

        let health = manager.health_all().await;
        assert_eq!(health.keys().collect::<Vec<_>>(), vec!["http", "updater"]);
    }

    #[tokio::test]
    async fn test_launch_starts_once_per_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = ServicesManager::new();
        assert!(manager.launch(recorder("schema-updater:a", &[], &log)).await.unwrap());
        assert!(!manager.launch(recorder("schema-updater:a", &[], &log)).await.unwrap());
        assert!(manager.is_started("schema-updater:a").await);

        let broken: Arc<dyn Service> = Arc::new(Recorder {
            name: "schema-updater:b".to_string(),
            deps: vec![],
            log: log.clone(),
            fail_start: true,
        });
        assert!(manager.launch(broken).await.is_err());
        assert!(manager.get("schema-updater:b").await.is_none());

        manager.stop_all().await.unwrap();
        assert_eq!(*log.lock(), vec!["start schema-updater:a", "stop schema-updater:a"]);
    }
}
