// Task pool persistence: JSON files on disk, or memory for tests

use crate::errors::StorageError;
use crate::pool::TaskPool;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Repository for task pools keyed by pool id
pub trait PoolRepository: Send + Sync {
    /// Load a pool; `NotFound` when it was never saved
    fn load(&self, pool_id: i64) -> Result<TaskPool, StorageError>;

    /// Store a pool, replacing any previous version
    fn save(&self, pool_id: i64, pool: &TaskPool) -> Result<(), StorageError>;

    /// Load a pool, creating and persisting an empty one when missing
    fn load_or_create(&self, pool_id: i64) -> Result<TaskPool, StorageError> {
        match self.load(pool_id) {
            Err(StorageError::NotFound(_)) => {
                info!(pool_id, "Task pool not found, creating an empty one");
                let pool = TaskPool::new(pool_id);
                self.save(pool_id, &pool)?;
                Ok(pool)
            }
            other => other,
        }
    }
}

/// Stores each pool as `{dir}/{pool_id}.json`
#[derive(Debug, Clone)]
pub struct JsonFilePoolStore {
    dir: PathBuf,
}

impl JsonFilePoolStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Format: {dir}/{pool_id}.json
    pub fn pool_path(&self, pool_id: i64) -> PathBuf {
        self.dir.join(format!("{}.json", pool_id))
    }
}

impl PoolRepository for JsonFilePoolStore {
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn load(&self, pool_id: i64) -> Result<TaskPool, StorageError> {
        let path = self.pool_path(pool_id);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(pool_id)),
            Err(e) => {
                error!(error = %e, path = %path.display(), "Failed to read task pool");
                return Err(e.into());
            }
        };

        let pool: TaskPool = serde_json::from_str(&json).map_err(|e| {
            error!(error = %e, path = %path.display(), "Failed to deserialize task pool");
            StorageError::from(e)
        })?;

        debug!(pool_id, tasks = pool.tasks.len(), "Task pool loaded");
        Ok(pool)
    }

    #[instrument(skip(self, pool), fields(dir = %self.dir.display(), tasks = pool.tasks.len()))]
    fn save(&self, pool_id: i64, pool: &TaskPool) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(pool)?;
        let path = self.pool_path(pool_id);
        std::fs::write(&path, json).map_err(|e| {
            error!(error = %e, path = %path.display(), "Failed to write task pool");
            StorageError::from(e)
        })?;

        info!(pool_id, path = %path.display(), "Task pool saved");
        Ok(())
    }
}

/// Keeps serialised pools in memory, so that saves still go through serde
#[derive(Debug, Default)]
pub struct InMemoryPoolStore {
    pools: Mutex<HashMap<i64, String>>,
}

impl InMemoryPoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pools.lock().map(|pools| pools.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PoolRepository for InMemoryPoolStore {
    fn load(&self, pool_id: i64) -> Result<TaskPool, StorageError> {
        let pools = self
            .pools
            .lock()
            .map_err(|e| StorageError::Io(format!("pool store lock poisoned: {}", e)))?;
        let json = pools.get(&pool_id).ok_or(StorageError::NotFound(pool_id))?;
        Ok(serde_json::from_str(json)?)
    }

    fn save(&self, pool_id: i64, pool: &TaskPool) -> Result<(), StorageError> {
        let json = serde_json::to_string(pool)?;
        self.pools
            .lock()
            .map_err(|e| StorageError::Io(format!("pool store lock poisoned: {}", e)))?
            .insert(pool_id, json);
        Ok(())
    }
}
