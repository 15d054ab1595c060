//! An [`EventStoreTrait`] implementation using PostgreSQL as the backend,
//! via `tokio-postgres` and a `bb8` connection pool.
//!
//! The conditional append is a single statement: a CTE recomputes the
//! filter's current max sequence number, and an `INSERT ... SELECT ...
//! WHERE` guarded on that value either inserts every row of the batch or
//! none, so the check and the insert can never be split by a concurrent
//! append.

use std::time::Duration;

use async_trait::async_trait;
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use chrono::{DateTime, Utc};
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Socket};

#[cfg(feature = "with-tracing")]
use tracing_futures::Instrument;

use eventstore_core::error::{Error, Result};
use eventstore_core::event::{Event, NewEvent, SequenceNumber};
use eventstore_core::filter::Filter;
use eventstore_core::store::{validate_append_batch, EventStore as EventStoreTrait, QueryResult};

use crate::config::Config;
use crate::error::{from_migration, from_pool, from_postgres};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("src/migrations");
}

const QUERY: &str = "SELECT sequence_number, occurred_at, event_type, payload, metadata
    FROM events
    WHERE event_type = ANY($1::text[])
      AND (cardinality($2::jsonb[]) = 0 OR payload @> ANY($2::jsonb[]))
    ORDER BY sequence_number ASC";

const APPEND: &str = "WITH current AS (
        SELECT COALESCE(MAX(sequence_number), 0) AS max_seq
        FROM events
        WHERE event_type = ANY($1::text[])
          AND (cardinality($2::jsonb[]) = 0 OR payload @> ANY($2::jsonb[]))
    ),
    ins AS (
        INSERT INTO events (event_type, payload, metadata)
        SELECT v.event_type, v.payload, v.metadata
        FROM unnest($5::text[], $6::jsonb[], $7::jsonb[]) AS v(event_type, payload, metadata)
        WHERE (NOT $3::bool) OR (SELECT max_seq FROM current) = $4::bigint
        RETURNING sequence_number
    )
    SELECT (SELECT max_seq FROM current) AS current_max_seq,
           (SELECT count(*) FROM ins) AS inserted_count";

/// A PostgreSQL-backed [`EventStoreTrait`]. Cheap to clone: it wraps a
/// [`Pool`] of connections shared across clones.
///
/// `Tls` follows `tokio-postgres`'s own generic TLS connector bound;
/// use [`PostgresStore::connect`] for the common `NoTls` case.
#[derive(Clone)]
pub struct PostgresStore<Tls = NoTls>
where
    Tls: MakeTlsConnect<Socket> + Clone + Send + Sync + 'static,
    <Tls as MakeTlsConnect<Socket>>::Stream: Send + Sync,
    <Tls as MakeTlsConnect<Socket>>::TlsConnect: Send,
    <<Tls as MakeTlsConnect<Socket>>::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    pool: Pool<PostgresConnectionManager<Tls>>,
    statement_timeout: Duration,
}

impl PostgresStore<NoTls> {
    /// Connects using the given [`Config`] with no TLS, building the
    /// connection pool but not running migrations - call
    /// [`EventStoreTrait::migrate`] before first use.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config.database_url.parse().map_err(from_postgres)?;

        let manager = PostgresConnectionManager::new(pg_config, NoTls);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .build(manager)
            .await
            .map_err(from_postgres)?;

        Ok(Self {
            pool,
            statement_timeout: config.statement_timeout,
        })
    }
}

impl<Tls> PostgresStore<Tls>
where
    Tls: MakeTlsConnect<Socket> + Clone + Send + Sync + 'static,
    <Tls as MakeTlsConnect<Socket>>::Stream: Send + Sync,
    <Tls as MakeTlsConnect<Socket>>::TlsConnect: Send,
    <<Tls as MakeTlsConnect<Socket>>::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    /// Builds a store from an already-configured pool, e.g. one using a
    /// TLS connector other than [`NoTls`].
    pub fn from_pool(pool: Pool<PostgresConnectionManager<Tls>>, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Runs `fut` under the configured statement timeout, converting an
    /// elapsed deadline into [`Error::StoreUnavailable`], the same
    /// outcome a caller-supplied cancellation would produce.
    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.statement_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::StoreUnavailable(anyhow::anyhow!(
                "statement timed out after {:?}",
                self.statement_timeout
            ))),
        }
    }
}

fn type_array(filter: &Filter) -> Vec<&str> {
    filter.event_types().iter().map(String::as_str).collect()
}

fn row_to_event(row: &tokio_postgres::Row) -> std::result::Result<Event, tokio_postgres::Error> {
    Ok(Event {
        sequence_number: row.try_get("sequence_number")?,
        occurred_at: row.try_get::<_, DateTime<Utc>>("occurred_at")?,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        metadata: row.try_get("metadata")?,
    })
}

#[async_trait]
impl<Tls> EventStoreTrait for PostgresStore<Tls>
where
    Tls: MakeTlsConnect<Socket> + Clone + Send + Sync + 'static,
    <Tls as MakeTlsConnect<Socket>>::Stream: Send + Sync,
    <Tls as MakeTlsConnect<Socket>>::TlsConnect: Send,
    <<Tls as MakeTlsConnect<Socket>>::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    #[cfg_attr(
        feature = "with-tracing",
        tracing::instrument(err, level = "debug", name = "PostgresStore::migrate", skip(self))
    )]
    async fn migrate(&self) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(from_pool)?;

        embedded::migrations::runner()
            .run_async(&mut *conn)
            .await
            .map_err(from_migration)?;

        Ok(())
    }

    async fn query(&self, filter: &Filter) -> Result<QueryResult> {
        let query_fut = async move {
            let conn = self.pool.get().await.map_err(from_pool)?;

            let types = type_array(filter);
            let predicates = filter.payload_predicates();

            let params: &[&(dyn ToSql + Sync)] = &[&types, &predicates];

            let rows = conn.query(QUERY, params).await.map_err(from_postgres)?;

            let events = rows
                .iter()
                .map(row_to_event)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_postgres)?;

            Ok(QueryResult::new(events))
        };

        #[cfg(feature = "with-tracing")]
        let query_fut = query_fut.instrument(tracing::debug_span!("PostgresStore::query", filter = ?filter));

        self.with_timeout(query_fut).await
    }

    async fn append(
        &self,
        filter: &Filter,
        events: Vec<NewEvent>,
        expected_max_sequence_number: Option<SequenceNumber>,
    ) -> Result<()> {
        validate_append_batch(&events)?;

        let append_fut = async move {
            let conn = self.pool.get().await.map_err(from_pool)?;

            let types = type_array(filter);
            let predicates = filter.payload_predicates();

            let event_types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
            let payloads: Vec<&serde_json::Value> = events.iter().map(|e| &e.payload).collect();
            let metadata: Vec<&serde_json::Value> = events.iter().map(|e| &e.metadata).collect();

            let check = expected_max_sequence_number.is_some();
            let expected: i64 = expected_max_sequence_number.unwrap_or(0);

            let params: &[&(dyn ToSql + Sync)] = &[
                &types,
                &predicates,
                &check,
                &expected,
                &event_types,
                &payloads,
                &metadata,
            ];

            let row = conn.query_one(APPEND, params).await.map_err(from_postgres)?;

            let current_max_seq: i64 = row.try_get("current_max_seq").map_err(from_postgres)?;
            let inserted_count: i64 = row.try_get("inserted_count").map_err(from_postgres)?;

            if check && expected != current_max_seq {
                return Err(Error::ConcurrencyConflict);
            }

            if inserted_count != events.len() as i64 {
                return Err(Error::StoreInternal(anyhow::anyhow!(
                    "expected to insert {} events but the backend reported {}",
                    events.len(),
                    inserted_count
                )));
            }

            Ok(())
        };

        #[cfg(feature = "with-tracing")]
        let append_fut = append_fut.instrument(tracing::debug_span!(
            "PostgresStore::append",
            expected_max_sequence_number,
        ));

        self.with_timeout(append_fut).await
    }

    async fn close(&self) {
        // bb8 drains idle connections when the last `Pool` handle (and
        // every clone sharing its inner `Arc`) is dropped; there is no
        // explicit "drain now" hook to call eagerly, so `close` is a
        // documented no-op here. A lingering clone's next `get()` will
        // run against a pool nobody else is using; wrap it behind
        // `Arc`/a shared flag at the call site if eager rejection after
        // `close` is required.
    }
}
