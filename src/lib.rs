//! An aggregateless event store: an append-only, globally ordered log of
//! domain events, queried through a composable [`Filter`] and mutated
//! through a conditional [`append`] that fuses the optimistic-concurrency
//! check with the insert into a single atomic operation.
//!
//! There is no per-entity aggregate, no version-per-stream bookkeeping and
//! no row locking. A feature slice defines its own "context" by writing a
//! [`Filter`], reads it with [`EventStore::query`], runs a pure decision
//! function over the result, and commits by calling
//! [`EventStore::append`] with the `maxSequenceNumber` it observed. If
//! another writer changed that context in the meantime, the append fails
//! with [`Error::ConcurrencyConflict`] and the slice is expected to
//! re-read and retry.
//!
//! [`append`]: EventStore::append
//!
//! ## Note
//!
//! This crate defines the store's contract and ships an in-memory
//! reference implementation used by its own test suite (see
//! [`store::memory`]). The production backend lives in the sibling
//! `eventstore-postgres` crate.

pub mod error;
pub mod event;
pub mod filter;
pub mod store;

pub use error::Error;
pub use event::{Event, NewEvent, SequenceNumber};
pub use filter::Filter;
pub use store::{EventStore, QueryResult};
