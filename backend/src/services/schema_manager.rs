//! Owner of the published per-keyspace schemas.
//!
//! Every keyspace has at most one published [KeyspaceSchema]. Readers clone
//! the `Arc` under a short read lock and keep using their snapshot for the
//! whole request; a rebuild works on an unpublished draft and swaps it in
//! under the write lock only once it is complete.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::SchemaError;
use crate::graphql::{ExecutionEnv, KeyspaceSchema, NamingConfig, build_keyspace_schema};
use crate::services::manager::ServicesManager;
use crate::services::schema_updater::SchemaUpdater;
use crate::store::{MetadataProvider, SchemaVersion, is_system_keyspace};

/// Where updaters for keyspaces published after startup get launched.
struct UpdaterLaunch {
    manager: Weak<SchemaManager>,
    services: Weak<ServicesManager>,
    interval: Duration,
}

pub struct SchemaManager {
    provider: Arc<dyn MetadataProvider>,
    env: ExecutionEnv,
    naming: NamingConfig,
    /// Explicit keyspace list; `None` manages every non-system keyspace
    keyspaces: Option<Vec<String>>,
    published: RwLock<HashMap<String, Arc<KeyspaceSchema>>>,
    launch: RwLock<Option<UpdaterLaunch>>,
}

impl SchemaManager {
    pub fn new(provider: Arc<dyn MetadataProvider>, env: ExecutionEnv, naming: NamingConfig) -> Self {
        Self {
            provider,
            env,
            naming,
            keyspaces: None,
            published: RwLock::new(HashMap::new()),
            launch: RwLock::new(None),
        }
    }

    /// Restrict management to the given keyspaces.
    pub fn with_keyspaces(mut self, keyspaces: Option<Vec<String>>) -> Self {
        self.keyspaces = keyspaces;
        self
    }

    /// From now on, every keyspace published without an updater gets one
    /// launched on `services`, polling every `interval`.
    pub fn launch_updaters(self: &Arc<Self>, services: &Arc<ServicesManager>, interval: Duration) {
        *self.launch.write() = Some(UpdaterLaunch {
            manager: Arc::downgrade(self),
            services: Arc::downgrade(services),
            interval,
        });
    }

    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.provider
    }

    pub fn env(&self) -> &ExecutionEnv {
        &self.env
    }

    pub fn naming(&self) -> NamingConfig {
        self.naming
    }

    pub fn is_managed(&self, keyspace: &str) -> bool {
        if is_system_keyspace(keyspace) {
            return false;
        }
        match &self.keyspaces {
            Some(list) => list.iter().any(|k| k == keyspace),
            None => true,
        }
    }

    /// Keyspaces this manager is responsible for, as the store currently
    /// reports them.
    pub async fn managed_keyspaces(&self) -> Result<Vec<String>, SchemaError> {
        let names = self.provider.keyspace_names().await?;
        Ok(names.into_iter().filter(|k| self.is_managed(k)).collect())
    }

    /// The published snapshot, without building.
    pub fn published(&self, keyspace: &str) -> Option<Arc<KeyspaceSchema>> {
        self.published.read().get(keyspace).cloned()
    }

    /// Published version of a keyspace, if any.
    pub fn published_version(&self, keyspace: &str) -> Option<SchemaVersion> {
        self.published.read().get(keyspace).map(|s| s.version.clone())
    }

    /// Build a fresh snapshot without publishing it. The version is read
    /// before the metadata, so a concurrent change can only make the snapshot
    /// look older than it is and be rebuilt again.
    pub async fn build(&self, keyspace: &str) -> Result<KeyspaceSchema, SchemaError> {
        if !self.is_managed(keyspace) {
            return Err(SchemaError::KeyspaceNotFound(keyspace.to_string()));
        }
        let version = self.provider.schema_version().await?;
        let metadata = self.provider.keyspace(keyspace).await?;
        debug!(keyspace = %keyspace, version = %version, tables = metadata.tables.len(), "Building keyspace schema");
        build_keyspace_schema(metadata, version, self.naming, self.env.clone())
    }

    /// Build and publish. On failure the previously published snapshot stays.
    pub async fn refresh(&self, keyspace: &str) -> Result<Arc<KeyspaceSchema>, SchemaError> {
        let schema = Arc::new(self.build(keyspace).await?);
        let first = self
            .published
            .write()
            .insert(keyspace.to_string(), schema.clone())
            .is_none();
        info!(
            keyspace = %keyspace,
            version = %schema.version,
            tables = schema.graph.tables.len(),
            "Published keyspace schema"
        );
        if first {
            self.launch_updater(keyspace).await;
        }
        Ok(schema)
    }

    async fn launch_updater(&self, keyspace: &str) {
        let target = self.launch.read().as_ref().and_then(|launch| {
            Some((launch.manager.upgrade()?, launch.services.upgrade()?, launch.interval))
        });
        let Some((manager, services, interval)) = target else {
            return;
        };
        let updater = Arc::new(SchemaUpdater::new(manager, keyspace, interval));
        match services.launch(updater).await {
            Ok(true) => info!(keyspace = %keyspace, "Schema updater launched for keyspace"),
            Ok(false) => {}
            Err(e) => warn!(keyspace = %keyspace, error = %e, "Could not launch schema updater"),
        }
    }

    /// The published snapshot, building it on first reference.
    pub async fn get(&self, keyspace: &str) -> Result<Arc<KeyspaceSchema>, SchemaError> {
        if let Some(schema) = self.published(keyspace) {
            return Ok(schema);
        }
        self.refresh(keyspace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::ExecutionDefaults;
    use crate::store::{ColumnKind, ColumnMetadata, MemoryStore, NativeType, TableMetadata};
    use assert_matches::assert_matches;

    fn manager(store: Arc<MemoryStore>) -> SchemaManager {
        let env = ExecutionEnv::new(store.clone(), ExecutionDefaults::default());
        SchemaManager::new(store, env, NamingConfig::default())
    }

    fn table(name: &str) -> TableMetadata {
        TableMetadata::new(
            name,
            vec![ColumnMetadata::new("id", ColumnKind::PartitionKey, NativeType::Int)],
        )
    }

    #[tokio::test]
    async fn test_get_builds_lazily_and_reuses_snapshot() {
        let store = Arc::new(MemoryStore::new());
        store.create_keyspace("shop", Default::default());
        store.put_table("shop", table("orders")).unwrap();
        let manager = manager(store);

        assert!(manager.published("shop").is_none());
        let first = manager.get("shop").await.unwrap();
        let second = manager.get("shop").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.graph.table("orders").is_some());
    }

    #[tokio::test]
    async fn test_unknown_and_system_keyspaces() {
        let store = Arc::new(MemoryStore::new());
        store.create_keyspace("system", Default::default());
        let manager = manager(store);
        assert_matches!(manager.get("nope").await, Err(SchemaError::KeyspaceNotFound(_)));
        assert_matches!(manager.get("system").await, Err(SchemaError::KeyspaceNotFound(_)));
    }

    #[tokio::test]
    async fn test_keyspace_list_restricts_management() {
        let store = Arc::new(MemoryStore::new());
        store.create_keyspace("a", Default::default());
        store.create_keyspace("b", Default::default());
        let manager = manager(store).with_keyspaces(Some(vec!["b".to_string()]));
        assert_eq!(manager.managed_keyspaces().await.unwrap(), vec!["b".to_string()]);
        assert_matches!(manager.get("a").await, Err(SchemaError::KeyspaceNotFound(_)));
    }

    #[tokio::test]
    async fn test_first_publish_launches_an_updater() {
        let store = Arc::new(MemoryStore::new());
        store.create_keyspace("shop", Default::default());
        store.create_keyspace("hall", Default::default());
        let manager = Arc::new(manager(store));
        let services = Arc::new(ServicesManager::new());

        // Published before updaters were wired up: left to whoever started it.
        manager.refresh("hall").await.unwrap();
        manager.launch_updaters(&services, Duration::from_secs(3600));

        manager.get("shop").await.unwrap();
        manager.refresh("shop").await.unwrap();
        manager.refresh("hall").await.unwrap();

        let health = services.health_all().await;
        assert_eq!(health.keys().collect::<Vec<_>>(), vec!["schema-updater:shop"]);
        assert!(services.is_started("schema-updater:shop").await);
        services.stop_all().await.unwrap();
    }
}
