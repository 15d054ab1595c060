//! Abstractions for the event store: [`EventStore::query`] executes a
//! [`Filter`] against the log, [`EventStore::append`] fuses the
//! optimistic-concurrency check with the insert into one atomic
//! operation.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::event::{Event, NewEvent, SequenceNumber};
use crate::filter::Filter;

pub mod memory;

/// Hard upper bound on the number of events a single [`EventStore::append`]
/// call accepts. Backends must accept batches of at least 1,000 events;
/// this crate documents 10,000 as the ceiling every backend enforces
/// identically, so slice authors see the same limit regardless of which
/// backend they run against.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// The result of [`EventStore::query`]: every event matching the filter,
/// in ascending sequence order, plus the highest sequence number among
/// them (`0` if the result set is empty).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Matching events, strictly ascending by [`Event::sequence_number`].
    pub events: Vec<Event>,

    /// `max { e.sequence_number | e in events }`, or `0` if `events` is
    /// empty.
    pub max_sequence_number: SequenceNumber,
}

impl QueryResult {
    /// Builds a result from an already sequence-ordered list of matching
    /// events, computing `max_sequence_number` from its last element.
    pub fn new(events: Vec<Event>) -> Self {
        let max_sequence_number = events.last().map_or(0, |e| e.sequence_number);
        Self {
            events,
            max_sequence_number,
        }
    }
}

/// The event store's programmatic API. A backend implementing this
/// trait must uphold the monotonic-sequence, atomic-batch and
/// conditional-append invariants regardless of how many callers share
/// it concurrently.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Idempotent schema bootstrap. Creates the backing table and
    /// indexes if absent; safe to call any number of times, including
    /// concurrently.
    async fn migrate(&self) -> Result<()>;

    /// Executes `filter` against the log and returns every matching
    /// event in ascending sequence order, plus the max sequence number
    /// observed within the filter. An empty result set is success, not
    /// failure.
    async fn query(&self, filter: &Filter) -> Result<QueryResult>;

    /// Atomically recomputes the filter's current max sequence number,
    /// checks it against `expected_max_sequence_number` (skipping the
    /// check entirely when `None`), and, only if the check passes,
    /// inserts `events` in order. Either all events are inserted or
    /// none are.
    ///
    /// Fails with [`Error::ConcurrencyConflict`] if the check fails,
    /// [`Error::BadFilter`]/[`Error::BadEvent`] if `filter`/`events` are
    /// malformed, or [`Error::StoreUnavailable`]/[`Error::StoreInternal`]
    /// on backend failure. On any failure, no events are inserted.
    async fn append(
        &self,
        filter: &Filter,
        events: Vec<NewEvent>,
        expected_max_sequence_number: Option<SequenceNumber>,
    ) -> Result<()>;

    /// Drains the connection pool. After `close`, every operation fails
    /// with [`Error::StoreUnavailable`].
    async fn close(&self);
}

/// Shared precondition check every [`EventStore::append`] implementation
/// runs before touching the backend: batch size within [`MAX_BATCH_SIZE`]
/// and every event well-formed. Exposed so that every backend crate
/// (not just this one's in-memory reference) enforces the identical
/// limit without duplicating the logic.
pub fn validate_append_batch(events: &[NewEvent]) -> Result<()> {
    if events.len() > MAX_BATCH_SIZE {
        return Err(Error::BadEvent(format!(
            "batch of {} events exceeds the {MAX_BATCH_SIZE}-event limit",
            events.len()
        )));
    }

    if let Some(bad) = events.iter().find(|e| !e.is_valid()) {
        return Err(Error::BadEvent(format!(
            "event type tag must not be blank, got {:?}",
            bad.event_type
        )));
    }

    Ok(())
}
