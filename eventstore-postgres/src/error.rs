//! Classification of backend failures into [`eventstore_core::Error`].
//!
//! Grounded on `eventually-postgres::store::Error`, a `thiserror` enum
//! wrapping the driver's error types. Here we classify straight into the
//! store's own taxonomy instead of keeping a crate-local error type,
//! since every backend is required to report through the same five
//! variants.

use eventstore_core::Error;

/// A `tokio_postgres::Error` carrying a database error (a constraint
/// violation, a bad query, …) is an internal failure; anything else
/// (broken connection, TLS handshake failure, timeout) means the
/// backend itself is unreachable.
pub(crate) fn from_postgres(err: tokio_postgres::Error) -> Error {
    if err.as_db_error().is_some() {
        Error::StoreInternal(err.into())
    } else {
        Error::StoreUnavailable(err.into())
    }
}

/// `bb8`'s pool errors (timeout acquiring a connection, or a connection
/// that failed its health check) mean the store can't currently reach
/// the backend.
pub(crate) fn from_pool(err: bb8::RunError<tokio_postgres::Error>) -> Error {
    match err {
        bb8::RunError::User(err) => from_postgres(err),
        bb8::RunError::TimedOut => {
            Error::StoreUnavailable(anyhow::anyhow!("timed out acquiring a pooled connection"))
        },
    }
}

/// Migration failures are always internal: the schema itself is
/// malformed or the backend rejected DDL the store issued.
pub(crate) fn from_migration(err: refinery::Error) -> Error {
    Error::StoreInternal(err.into())
}
