use kvlog_types::{Context, ValueId, ValueRecord};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::hasher::{normalize, ContentHasher};

/// Content-addressed value store.
///
/// Backends provide two primitives: a point lookup by id and an
/// insert-if-absent. `put` and `get` are built on top of them.
///
/// All implementations must satisfy these invariants:
/// - Records are immutable once written; a record is stored under the hash of
///   its payload and nowhere else.
/// - `insert` of an id that already exists is a no-op, not an error: the same
///   id always names the same content.
/// - Every call checks the [`Context`] before touching storage.
/// - All backend errors are propagated, never silently ignored.
pub trait ValueStore: Send + Sync {
    /// Read a record by id.
    ///
    /// Returns `Ok(None)` if no record has this id.
    fn lookup(&self, ctx: &Context, id: &ValueId) -> StoreResult<Option<ValueRecord>>;

    /// Insert a record if its id is not already present.
    ///
    /// Returns `true` if the record was newly written. Fails with
    /// [`StoreError::HashMismatch`] if `record.id` is not the hash of
    /// `record.payload`.
    fn insert(&self, ctx: &Context, record: &ValueRecord) -> StoreResult<bool>;

    /// Check whether a record exists.
    ///
    /// Default implementation calls `lookup()`. Backends may override to
    /// avoid reading the payload.
    fn contains(&self, ctx: &Context, id: &ValueId) -> StoreResult<bool> {
        Ok(self.lookup(ctx, id)?.is_some())
    }

    /// Store `payload` (trimmed) and return its id.
    ///
    /// Idempotent: a second call with the same payload writes nothing and
    /// returns the same id.
    fn put(&self, ctx: &Context, payload: &str) -> StoreResult<ValueId> {
        ctx.check()?;
        let payload = normalize(payload);
        let id = ContentHasher::VALUE.hash(payload);

        if self.contains(ctx, &id)? {
            debug!(id = %id, "value already stored");
            return Ok(id);
        }

        ctx.check()?;
        let record = ValueRecord {
            id,
            payload: payload.to_string(),
        };
        let inserted = self.insert(ctx, &record)?;
        debug!(id = %id, size = record.size(), inserted, "value stored");
        Ok(id)
    }

    /// Read the payload stored under `id`.
    fn get(&self, ctx: &Context, id: &ValueId) -> StoreResult<String> {
        ctx.check()?;
        self.lookup(ctx, id)?
            .map(|record| record.payload)
            .ok_or(StoreError::NotFound(*id))
    }
}

/// Fail with [`StoreError::HashMismatch`] unless `record.id` matches its payload.
pub(crate) fn verify_record(record: &ValueRecord) -> StoreResult<()> {
    if ContentHasher::VALUE.verify(&record.payload, &record.id) {
        return Ok(());
    }
    Err(StoreError::HashMismatch {
        id: record.id,
        computed: ContentHasher::VALUE.hash(&record.payload),
    })
}
