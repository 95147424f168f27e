use std::collections::HashMap;
use std::sync::RwLock;

use kvlog_types::{Context, ValueId, ValueRecord};

use crate::error::{StoreError, StoreResult};
use crate::traits::{verify_record, ValueStore};

/// In-memory, HashMap-based value store.
///
/// Intended for tests and embedding. Payloads are held behind a `RwLock` for
/// safe concurrent access and cloned on read.
pub struct InMemoryValueStore {
    values: RwLock<HashMap<ValueId, String>>,
}

impl InMemoryValueStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently stored.
    ///
    /// A diagnostic counter: it reads through a poisoned lock, while the
    /// [`ValueStore`] operations report poisoning as a backend error.
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryValueStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("value store lock poisoned".into())
}

impl ValueStore for InMemoryValueStore {
    fn lookup(&self, ctx: &Context, id: &ValueId) -> StoreResult<Option<ValueRecord>> {
        ctx.check()?;
        let map = self.values.read().map_err(|_| poisoned())?;
        Ok(map.get(id).map(|payload| ValueRecord {
            id: *id,
            payload: payload.clone(),
        }))
    }

    fn insert(&self, ctx: &Context, record: &ValueRecord) -> StoreResult<bool> {
        ctx.check()?;
        verify_record(record)?;
        let mut map = self.values.write().map_err(|_| poisoned())?;
        if map.contains_key(&record.id) {
            return Ok(false);
        }
        map.insert(record.id, record.payload.clone());
        Ok(true)
    }

    fn contains(&self, ctx: &Context, id: &ValueId) -> StoreResult<bool> {
        ctx.check()?;
        let map = self.values.read().map_err(|_| poisoned())?;
        Ok(map.contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryValueStore")
            .field("value_count", &self.len())
            .finish()
    }
}
