//! An in-memory, single-process reference [`EventStore`]. Backed by a
//! `Vec<Event>` guarded by a single `tokio::sync::Mutex`, so the
//! check-and-insert step of [`EventStore::append`] is trivially atomic:
//! the whole operation holds the lock for its entire duration.
//!
//! This exists as ambient test tooling (the relational-database backend
//! is the sibling `eventstore-postgres` crate) so that this crate's own
//! unit tests, and the banking sample's, don't need a live database to
//! exercise filter matching, ordering and conditional-append semantics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::event::{Event, NewEvent, SequenceNumber};
use crate::filter::Filter;
use crate::store::{validate_append_batch, EventStore, QueryResult};

/// Safe to clone: every clone shares the same underlying log through an
/// [`Arc`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Vec<Event>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(anyhow::anyhow!(
                "store has been closed"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn migrate(&self) -> Result<()> {
        self.ensure_open()
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(err, level = "debug", name = "InMemoryStore::query", skip(self))
    )]
    async fn query(&self, filter: &Filter) -> Result<QueryResult> {
        self.ensure_open()?;

        let log = self.inner.lock().await;
        let events: Vec<Event> = log.iter().filter(|e| filter.matches(e)).cloned().collect();

        Ok(QueryResult::new(events))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(err, level = "debug", name = "InMemoryStore::append", skip(self, events))
    )]
    async fn append(
        &self,
        filter: &Filter,
        events: Vec<NewEvent>,
        expected_max_sequence_number: Option<SequenceNumber>,
    ) -> Result<()> {
        self.ensure_open()?;
        validate_append_batch(&events)?;

        let mut log = self.inner.lock().await;

        let current_max = log
            .iter()
            .filter(|e| filter.matches(e))
            .map(|e| e.sequence_number)
            .max()
            .unwrap_or(0);

        if let Some(expected) = expected_max_sequence_number {
            if expected != current_max {
                return Err(Error::ConcurrencyConflict);
            }
        }

        let mut next_seq = log.last().map_or(0, |e| e.sequence_number) + 1;
        let now = Utc::now();

        for new_event in events {
            log.push(Event {
                sequence_number: next_seq,
                occurred_at: now,
                event_type: new_event.event_type,
                payload: new_event.payload,
                metadata: new_event.metadata,
            });
            next_seq += 1;
        }

        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
