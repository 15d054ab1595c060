//! The store's closed error taxonomy. Every backend reports through
//! these five variants; mapping onto domain-specific errors is a
//! feature-slice concern the store never performs itself.

/// Errors returned by [`crate::Filter::new`], [`crate::store::EventStore::query`]
/// and [`crate::store::EventStore::append`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The filter is malformed: an empty type set, or a blank type tag.
    #[error("bad filter: {0}")]
    BadFilter(String),

    /// The event is malformed: an empty type tag.
    #[error("bad event: {0}")]
    BadEvent(String),

    /// `expectedMaxSequenceNumber` did not match the filter's current
    /// max sequence number. Always safe to retry after re-reading the
    /// context.
    #[error("concurrency conflict: context changed since it was read")]
    ConcurrencyConflict,

    /// The backend is unreachable, the connection pool is drained, or
    /// the store has been closed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    /// The backend returned an error that doesn't classify as any of the
    /// above (integrity violation, unclassified serialization failure).
    #[error("store internal error: {0}")]
    StoreInternal(#[source] anyhow::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
