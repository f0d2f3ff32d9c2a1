//! Server state management.

use std::collections::HashMap;
use std::sync::Arc;

use missa_core::{EngineConfig, HolderId, IntentionEngine, MissaError, MissaResult};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: EngineConfig,
    /// Engines opened so far, one per holder.
    pub engines: RwLock<HashMap<HolderId, Arc<IntentionEngine>>>,
    /// Holders get in-memory stores instead of files under `data_dir`.
    pub in_memory: bool,
}

impl AppState {
    /// Create a new application state backed by per-holder database files.
    pub fn new(config: EngineConfig) -> Self {
        Self::build(config, false)
    }

    /// Create a state whose holders live in memory only.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::build(config, true)
    }

    fn build(config: EngineConfig, in_memory: bool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                engines: RwLock::new(HashMap::new()),
                in_memory,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Number of holders with an open engine.
    pub async fn holders_loaded(&self) -> usize {
        self.inner.engines.read().await.len()
    }

    /// Engine for a holder, opening it on first use.
    pub async fn engine_for(&self, holder: &HolderId) -> ApiResult<Arc<IntentionEngine>> {
        if let Some(engine) = self.inner.engines.read().await.get(holder) {
            return Ok(engine.clone());
        }

        // Open outside the registry lock
        let config = self.inner.config.clone();
        let in_memory = self.inner.in_memory;
        let id = holder.clone();
        let opened = tokio::task::spawn_blocking(move || -> MissaResult<IntentionEngine> {
            if in_memory {
                IntentionEngine::in_memory(config, id)
            } else {
                IntentionEngine::open(config, id)
            }
        })
        .await
        .map_err(|e| ApiError::internal(format!("engine task failed: {}", e)))??;

        let mut engines = self.inner.engines.write().await;
        let engine = engines
            .entry(holder.clone())
            .or_insert_with(|| {
                info!(holder = %holder, "Opened intention engine");
                Arc::new(opened)
            })
            .clone();
        Ok(engine)
    }

    /// Run a blocking engine operation for a holder off the async runtime.
    pub async fn with_engine<F, T>(&self, holder: &HolderId, f: F) -> ApiResult<T>
    where
        F: FnOnce(&IntentionEngine) -> Result<T, MissaError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = self.engine_for(holder).await?;
        let result = tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| ApiError::internal(format!("engine task failed: {}", e)))?;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missa_core::NewIntention;

    #[tokio::test]
    async fn test_engines_are_per_holder() {
        let state = AppState::in_memory(EngineConfig::default());
        let anselm = HolderId::new("fr-anselm").unwrap();
        let bede = HolderId::new("fr-bede").unwrap();

        state
            .with_engine(&anselm, |engine| {
                engine.create_intention(NewIntention::personal("Own intention"))
            })
            .await
            .unwrap();

        let for_anselm = state
            .with_engine(&anselm, |engine| engine.active_intentions())
            .await
            .unwrap();
        let for_bede = state
            .with_engine(&bede, |engine| engine.active_intentions())
            .await
            .unwrap();

        assert_eq!(for_anselm.len(), 1);
        assert!(for_bede.is_empty());
        assert_eq!(state.holders_loaded().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_access_shares_one_engine() {
        let state = AppState::in_memory(EngineConfig::default());
        let holder = HolderId::new("fr-anselm").unwrap();

        let (a, b) = tokio::join!(state.engine_for(&holder), state.engine_for(&holder));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(state.holders_loaded().await, 1);
    }

    #[tokio::test]
    async fn test_file_backed_engine_opens_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::builder().data_dir(dir.path()).build();
        let state = AppState::new(config.clone());
        let holder = HolderId::new("fr-anselm").unwrap();

        state.engine_for(&holder).await.unwrap();
        assert!(IntentionEngine::database_path(&config, &holder).exists());
    }
}
