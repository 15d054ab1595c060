//! Sample banking feature slices built on top of [`eventstore_core`]:
//! open, deposit, withdraw, transfer and get-account. Each operation
//! queries a filter scoped to one account id, runs a pure decision
//! function over the returned events, and appends the result with
//! `expected_max_sequence_number` pinned to the query's
//! `max_sequence_number` - the store rejects the append if another
//! writer touched the same account in between.
//!
//! This crate is a worked example, not a reusable library: callers
//! embedding the pattern elsewhere are expected to write their own
//! slice, the way [`domain`] does for bank accounts.

pub mod domain;

use rust_decimal::Decimal;
use serde_json::json;

use eventstore_core::{Error, Event, EventStore, Filter, NewEvent};

use domain::{
    decide_deposit, decide_open, decide_transfer, decide_withdraw, fold, BankAccountError,
    BankAccountEvent, BankAccountView, BANK_ACCOUNT_OPENED, EVENT_TYPES, MONEY_DEPOSITED,
    MONEY_TRANSFERRED, MONEY_WITHDRAWN,
};

/// Errors a bank account slice can fail with: either a business rule
/// from [`domain`], or the store reporting a lost optimistic-concurrency
/// race or a backend failure.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error(transparent)]
    Domain(#[from] BankAccountError),

    #[error("account context changed while the operation was in flight, retry")]
    Conflict,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

fn account_filter(account_id: &str) -> Filter {
    Filter::new(EVENT_TYPES, None)
        .expect("EVENT_TYPES is a fixed non-empty, non-blank set")
        .with_payload_predicate("account_id", json!(account_id))
        .with_payload_predicate("from_account_id", json!(account_id))
        .with_payload_predicate("to_account_id", json!(account_id))
}

fn decode_events(account_id: &str, events: &[Event]) -> Vec<BankAccountEvent> {
    events
        .iter()
        .filter_map(|e| BankAccountEvent::decode(&e.event_type, &e.payload))
        .filter(|e| match e {
            BankAccountEvent::Opened(o) => o.account_id == account_id,
            BankAccountEvent::Deposited(d) => d.account_id == account_id,
            BankAccountEvent::Withdrawn(w) => w.account_id == account_id,
            BankAccountEvent::Transferred(t) => {
                t.from_account_id == account_id || t.to_account_id == account_id
            },
        })
        .collect()
}

fn map_append_err(err: Error) -> BankError {
    match err {
        Error::ConcurrencyConflict => BankError::Conflict,
        other => BankError::Store(other.into()),
    }
}

/// Wraps an [`EventStore`] with the bank account feature slices. Cheap
/// to clone whenever the underlying store is.
#[derive(Clone)]
pub struct BankService<S> {
    store: S,
}

impl<S: EventStore> BankService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn load(&self, account_id: &str) -> Result<(Vec<BankAccountEvent>, Option<BankAccountView>, i64), BankError> {
        let filter = account_filter(account_id);
        let result = self.store.query(&filter).await.map_err(|e| BankError::Store(e.into()))?;
        let events = decode_events(account_id, &result.events);
        let view = fold(account_id, &events);
        Ok((events, view, result.max_sequence_number))
    }

    pub async fn open(
        &self,
        account_id: &str,
        account_holder_id: &str,
        opening_balance: Decimal,
    ) -> Result<(), BankError> {
        let (_, view, max_seq) = self.load(account_id).await?;

        let opened = decide_open(account_id, account_holder_id, opening_balance, view.as_ref())?;

        let filter = account_filter(account_id);
        let event = NewEvent::new(BANK_ACCOUNT_OPENED, serde_json::to_value(opened).expect("Opened always serializes"));

        self.store
            .append(&filter, vec![event], Some(max_seq))
            .await
            .map_err(map_append_err)
    }

    pub async fn deposit(&self, account_id: &str, amount: Decimal) -> Result<(), BankError> {
        let (_, view, max_seq) = self.load(account_id).await?;

        let deposited = decide_deposit(account_id, amount, view.as_ref())?;

        let filter = account_filter(account_id);
        let event = NewEvent::new(MONEY_DEPOSITED, serde_json::to_value(deposited).expect("Deposited always serializes"));

        self.store
            .append(&filter, vec![event], Some(max_seq))
            .await
            .map_err(map_append_err)
    }

    pub async fn withdraw(&self, account_id: &str, amount: Decimal) -> Result<(), BankError> {
        let (_, view, max_seq) = self.load(account_id).await?;

        let withdrawn = decide_withdraw(account_id, amount, view.as_ref())?;

        let filter = account_filter(account_id);
        let event = NewEvent::new(MONEY_WITHDRAWN, serde_json::to_value(withdrawn).expect("Withdrawn always serializes"));

        self.store
            .append(&filter, vec![event], Some(max_seq))
            .await
            .map_err(map_append_err)
    }

    /// Records a transfer out of `from_account_id`, scoped to the
    /// sender's context alone: the receiving side observes the same
    /// event the next time its own filter is queried. Idempotent on
    /// `transaction_id` - replaying a transfer that already landed is a
    /// no-op, not an error.
    pub async fn transfer(
        &self,
        from_account_id: &str,
        to_account_id: &str,
        transaction_id: &str,
        amount: Decimal,
    ) -> Result<(), BankError> {
        let (events, view, max_seq) = self.load(from_account_id).await?;

        let transferred = decide_transfer(
            from_account_id,
            to_account_id,
            transaction_id,
            amount,
            view.as_ref(),
            &events,
        )?;

        let Some(transferred) = transferred else {
            return Ok(());
        };

        let filter = account_filter(from_account_id);
        let event = NewEvent::new(
            MONEY_TRANSFERRED,
            serde_json::to_value(transferred).expect("Transferred always serializes"),
        );

        self.store
            .append(&filter, vec![event], Some(max_seq))
            .await
            .map_err(map_append_err)
    }

    /// Read-only projection; does not append.
    pub async fn get_account(&self, account_id: &str) -> Result<Option<BankAccountView>, BankError> {
        let (_, view, _) = self.load(account_id).await?;
        Ok(view)
    }
}
