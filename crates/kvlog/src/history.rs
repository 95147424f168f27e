//! Lazy, newest-first iteration over a key's versions.

use std::sync::Arc;

use kvlog_history::HistoryCursor;
use kvlog_store::ValueStore;
use kvlog_types::{Context, HistoryEntry, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::resolve;
use crate::error::KvResult;

/// A resolved version of a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Instant at which this value became current.
    pub timestamp: Timestamp,
    /// The value, trimmed.
    pub value: String,
}

/// Iterator over a key's versions, newest first.
///
/// Each step fetches one entry from the history cursor and resolves its value
/// against the value store. The cursor is released when the iterator is
/// exhausted, [`close`](History::close)d, or dropped. After the first error
/// the iterator yields that error and then ends.
pub struct History {
    ctx: Context,
    cursor: HistoryCursor,
    values: Arc<dyn ValueStore>,
    done: bool,
}

impl History {
    pub(crate) fn new(ctx: Context, cursor: HistoryCursor, values: Arc<dyn ValueStore>) -> Self {
        Self {
            ctx,
            cursor,
            values,
            done: false,
        }
    }

    /// The key being iterated.
    pub fn key(&self) -> &str {
        self.cursor.key()
    }

    /// Release the underlying cursor. Further calls to `next` return `None`.
    pub fn close(&mut self) -> KvResult<()> {
        self.done = true;
        Ok(self.cursor.close()?)
    }

    fn step(&mut self) -> KvResult<Option<Version>> {
        self.ctx.check()?;
        let Some(HistoryEntry {
            key,
            timestamp,
            value,
        }) = self.cursor.next_entry(&self.ctx)?
        else {
            return Ok(None);
        };
        let value = resolve(&self.ctx, self.values.as_ref(), &key, &value)?;
        Ok(Some(Version { timestamp, value }))
    }
}

impl Iterator for History {
    type Item = KvResult<Version>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(version)) => Some(Ok(version)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                // The step error is the one yielded; a close failure is only logged.
                if let Err(close_err) = self.cursor.close() {
                    warn!(key = %self.cursor.key(), error = %close_err, "failed to close history cursor");
                }
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for History {}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("key", &self.key())
            .field("done", &self.done)
            .finish()
    }
}
