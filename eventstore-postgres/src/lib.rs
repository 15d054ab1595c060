#![deny(unsafe_code, unused_qualifications, trivial_casts)]

//! PostgreSQL backend for [`eventstore_core`], implementing its
//! [`EventStore`] trait with a fused CTE-guarded `INSERT ... SELECT`
//! for the conditional append and `refinery`-managed migrations for
//! [`EventStore::migrate`].
//!
//! [`EventStore`]: eventstore_core::store::EventStore

mod config;
mod error;
mod store;

pub use config::Config;
pub use store::PostgresStore;
