//! [`SqliteStore`], the SQLite implementation of the remote store traits.
//!
//! The per-group trait impls live in sibling modules; this one owns the
//! connection, the schema bootstrap and the change feed.

use std::path::Path;

use futures::{StreamExt as _, stream};
use rapport_core::{
  change::{ChangeEvent, ChangeKind, ChangeStream, EventMask, Table},
  store::{Backend, ChangeFeed},
};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::{Error, Result, schema::SCHEMA};

/// How many undelivered change events a slow subscriber may fall behind by
/// before it is told to resynchronise.
const FEED_CAPACITY: usize = 256;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rapport remote store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and the change feed are
/// reference-counted, and every clone announces on the same feed.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  changes:         broadcast::Sender<ChangeEvent>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_connection(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_connection(conn).await
  }

  async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (changes, _) = broadcast::channel(FEED_CAPACITY);
    let store = Self { conn, changes };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Announce a committed write. Having no subscribers is not an error.
  pub(crate) fn emit(&self, table: Table, kind: ChangeKind, record_id: Option<Uuid>) {
    tracing::trace!(table = table.as_str(), ?kind, ?record_id, "change");
    let _ = self.changes.send(ChangeEvent { table, kind, record_id });
  }

  /// Number of open change-feed subscriptions across all clones.
  pub fn subscriber_count(&self) -> usize { self.changes.receiver_count() }
}

// ─── Backend / ChangeFeed ────────────────────────────────────────────────────

impl Backend for SqliteStore {
  type Error = Error;
}

impl ChangeFeed for SqliteStore {
  fn subscribe(&self, table: Table, mask: EventMask) -> ChangeStream {
    let rx = self.changes.subscribe();
    stream::unfold(rx, move |mut rx| async move {
      loop {
        match rx.recv().await {
          Ok(ev) if ev.table == table && mask.contains(ev.kind) => {
            return Some((ev, rx));
          }
          Ok(_) => continue,
          // Events were dropped; we cannot say which, so report a generic
          // update and let the consumer refetch.
          Err(RecvError::Lagged(n)) => {
            tracing::warn!(table = table.as_str(), skipped = n, "change feed lagged");
            let ev = ChangeEvent { table, kind: ChangeKind::Update, record_id: None };
            return Some((ev, rx));
          }
          Err(RecvError::Closed) => return None,
        }
      }
    })
    .boxed()
  }
}
