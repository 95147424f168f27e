//! Owned cursors over a key's history.

use kvlog_types::{Context, HistoryEntry};
use tracing::warn;

use crate::error::IndexResult;

/// A backend's forward-only result cursor.
///
/// Backends fetch incrementally; `close` releases whatever the cursor holds
/// (server-side cursor, buffers, file handles). `close` is called at most once
/// by [`HistoryCursor`].
pub trait EntryCursor: Send {
    /// Fetch the next entry, or `None` once the history is exhausted.
    fn next_entry(&mut self, ctx: &Context) -> IndexResult<Option<HistoryEntry>>;

    /// Release the cursor's resources.
    fn close(&mut self) -> IndexResult<()> {
        Ok(())
    }
}

/// Owned handle over a backend [`EntryCursor`].
///
/// The backend cursor is released exactly once: on exhaustion, on an explicit
/// [`close`](HistoryCursor::close), or when the handle is dropped. After
/// release, `next_entry` returns `Ok(None)`.
pub struct HistoryCursor {
    key: String,
    inner: Option<Box<dyn EntryCursor>>,
}

impl HistoryCursor {
    pub fn new(key: impl Into<String>, inner: Box<dyn EntryCursor>) -> Self {
        Self {
            key: key.into(),
            inner: Some(inner),
        }
    }

    /// The key this cursor walks.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` once the backend cursor has been released.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Fetch the next entry, newest first.
    pub fn next_entry(&mut self, ctx: &Context) -> IndexResult<Option<HistoryEntry>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };
        match inner.next_entry(ctx)? {
            Some(entry) => Ok(Some(entry)),
            None => {
                self.close()?;
                Ok(None)
            }
        }
    }

    /// Release the backend cursor. Idempotent.
    pub fn close(&mut self) -> IndexResult<()> {
        match self.inner.take() {
            Some(mut inner) => inner.close(),
            None => Ok(()),
        }
    }
}

impl Drop for HistoryCursor {
    fn drop(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            if let Err(e) = inner.close() {
                warn!(key = %self.key, error = %e, "failed to close history cursor");
            }
        }
    }
}

impl std::fmt::Debug for HistoryCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryCursor")
            .field("key", &self.key)
            .field("closed", &self.is_closed())
            .finish()
    }
}
