//! Event shapes and the pure decision functions for the bank account
//! feature slices. Nothing here talks to a store: each function takes
//! the events a query already returned and either yields the next event
//! to append or a [`BankAccountError`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type BankAccountId = String;
pub type BankAccountHolderId = String;
pub type TransactionId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opened {
    pub account_id: BankAccountId,
    pub account_holder_id: BankAccountHolderId,
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub account_id: BankAccountId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub account_id: BankAccountId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transferred {
    pub transaction_id: TransactionId,
    pub from_account_id: BankAccountId,
    pub to_account_id: BankAccountId,
    pub amount: Decimal,
}

pub const BANK_ACCOUNT_OPENED: &str = "BankAccountOpened";
pub const MONEY_DEPOSITED: &str = "MoneyDeposited";
pub const MONEY_WITHDRAWN: &str = "MoneyWithdrawn";
pub const MONEY_TRANSFERRED: &str = "MoneyTransferred";

/// Every event type a bank account feature slice cares about.
pub const EVENT_TYPES: [&str; 4] = [
    BANK_ACCOUNT_OPENED,
    MONEY_DEPOSITED,
    MONEY_WITHDRAWN,
    MONEY_TRANSFERRED,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BankAccountError {
    #[error("bank account has not been opened yet")]
    NotOpenedYet,
    #[error("bank account has already been opened")]
    AlreadyOpened,
    #[error("empty id provided for the new bank account")]
    EmptyAccountId,
    #[error("empty account holder id provided for the new bank account")]
    EmptyAccountHolderId,
    #[error("a deposit or withdrawal was attempted with a non-positive amount")]
    NonPositiveAmount,
    #[error("withdrawal or transfer could not be completed due to insufficient funds")]
    InsufficientFunds,
    #[error("transfer must move money between two different accounts")]
    SelfTransfer,
}

/// A read-only view folded from a bank account's events, returned by
/// `get-account`. `None` if the account has never been opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccountView {
    pub account_id: BankAccountId,
    pub account_holder_id: BankAccountHolderId,
    pub balance: Decimal,
}

/// One event out of the four payload shapes above, tagged by
/// `event_type` the way the store hands events back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankAccountEvent {
    Opened(Opened),
    Deposited(Deposited),
    Withdrawn(Withdrawn),
    Transferred(Transferred),
}

impl BankAccountEvent {
    pub fn decode(event_type: &str, payload: &serde_json::Value) -> Option<Self> {
        match event_type {
            BANK_ACCOUNT_OPENED => serde_json::from_value(payload.clone()).ok().map(Self::Opened),
            MONEY_DEPOSITED => serde_json::from_value(payload.clone()).ok().map(Self::Deposited),
            MONEY_WITHDRAWN => serde_json::from_value(payload.clone()).ok().map(Self::Withdrawn),
            MONEY_TRANSFERRED => serde_json::from_value(payload.clone()).ok().map(Self::Transferred),
            _ => None,
        }
    }
}

/// Folds a bank account's events, in sequence order, into a view. The
/// first event in the slice must be an [`Opened`] one; anything else
/// (including an empty slice) means the account does not exist yet.
pub fn fold(account_id: &str, events: &[BankAccountEvent]) -> Option<BankAccountView> {
    let mut events = events.iter();

    let Some(BankAccountEvent::Opened(opened)) = events.next() else {
        return None;
    };

    let mut view = BankAccountView {
        account_id: opened.account_id.clone(),
        account_holder_id: opened.account_holder_id.clone(),
        balance: opened.opening_balance,
    };

    for event in events {
        match event {
            BankAccountEvent::Opened(_) => {},
            BankAccountEvent::Deposited(e) => view.balance += e.amount,
            BankAccountEvent::Withdrawn(e) => view.balance -= e.amount,
            BankAccountEvent::Transferred(e) if e.from_account_id == account_id => {
                view.balance -= e.amount;
            },
            BankAccountEvent::Transferred(e) if e.to_account_id == account_id => {
                view.balance += e.amount;
            },
            BankAccountEvent::Transferred(_) => {},
        }
    }

    Some(view)
}

/// Decides whether `account_id`/`account_holder_id` can be opened given
/// the account's current (necessarily empty) event context.
pub fn decide_open(
    account_id: &str,
    account_holder_id: &str,
    opening_balance: Decimal,
    existing: Option<&BankAccountView>,
) -> Result<Opened, BankAccountError> {
    if account_id.is_empty() {
        return Err(BankAccountError::EmptyAccountId);
    }
    if account_holder_id.is_empty() {
        return Err(BankAccountError::EmptyAccountHolderId);
    }
    if existing.is_some() {
        return Err(BankAccountError::AlreadyOpened);
    }

    Ok(Opened {
        account_id: account_id.to_owned(),
        account_holder_id: account_holder_id.to_owned(),
        opening_balance,
    })
}

pub fn decide_deposit(
    account_id: &str,
    amount: Decimal,
    view: Option<&BankAccountView>,
) -> Result<Deposited, BankAccountError> {
    view.ok_or(BankAccountError::NotOpenedYet)?;

    if amount.is_sign_negative() || amount.is_zero() {
        return Err(BankAccountError::NonPositiveAmount);
    }

    Ok(Deposited {
        account_id: account_id.to_owned(),
        amount,
    })
}

pub fn decide_withdraw(
    account_id: &str,
    amount: Decimal,
    view: Option<&BankAccountView>,
) -> Result<Withdrawn, BankAccountError> {
    let view = view.ok_or(BankAccountError::NotOpenedYet)?;

    if amount.is_sign_negative() || amount.is_zero() {
        return Err(BankAccountError::NonPositiveAmount);
    }
    if view.balance < amount {
        return Err(BankAccountError::InsufficientFunds);
    }

    Ok(Withdrawn {
        account_id: account_id.to_owned(),
        amount,
    })
}

/// Decides a transfer from the sender's point of view. `existing` is the
/// sender's already-folded context; a transfer already recorded under
/// `transaction_id` makes this call idempotent: `Ok(None)` signals
/// "nothing left to append".
pub fn decide_transfer(
    from_account_id: &str,
    to_account_id: &str,
    transaction_id: &str,
    amount: Decimal,
    view: Option<&BankAccountView>,
    events: &[BankAccountEvent],
) -> Result<Option<Transferred>, BankAccountError> {
    let view = view.ok_or(BankAccountError::NotOpenedYet)?;

    if from_account_id == to_account_id {
        return Err(BankAccountError::SelfTransfer);
    }
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(BankAccountError::NonPositiveAmount);
    }

    let already_recorded = events.iter().any(|event| {
        matches!(event, BankAccountEvent::Transferred(t) if t.transaction_id == transaction_id)
    });
    if already_recorded {
        return Ok(None);
    }

    if view.balance < amount {
        return Err(BankAccountError::InsufficientFunds);
    }

    Ok(Some(Transferred {
        transaction_id: transaction_id.to_owned(),
        from_account_id: from_account_id.to_owned(),
        to_account_id: to_account_id.to_owned(),
        amount,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn fold_returns_none_for_empty_events() {
        assert_eq!(fold("acc-1", &[]), None);
    }

    #[test]
    fn fold_applies_deposits_and_withdrawals() {
        let events = vec![
            BankAccountEvent::Opened(Opened {
                account_id: "acc-1".into(),
                account_holder_id: "dani".into(),
                opening_balance: dec(100),
            }),
            BankAccountEvent::Deposited(Deposited {
                account_id: "acc-1".into(),
                amount: dec(50),
            }),
            BankAccountEvent::Withdrawn(Withdrawn {
                account_id: "acc-1".into(),
                amount: dec(30),
            }),
        ];

        let view = fold("acc-1", &events).unwrap();
        assert_eq!(view.balance, dec(120));
    }

    #[test]
    fn fold_credits_receiver_and_debits_sender() {
        let transfer = BankAccountEvent::Transferred(Transferred {
            transaction_id: "tx-1".into(),
            from_account_id: "acc-1".into(),
            to_account_id: "acc-2".into(),
            amount: dec(40),
        });

        let sender_view = fold(
            "acc-1",
            &[
                BankAccountEvent::Opened(Opened {
                    account_id: "acc-1".into(),
                    account_holder_id: "dani".into(),
                    opening_balance: dec(100),
                }),
                transfer.clone(),
            ],
        )
        .unwrap();
        assert_eq!(sender_view.balance, dec(60));

        let receiver_view = fold(
            "acc-2",
            &[
                BankAccountEvent::Opened(Opened {
                    account_id: "acc-2".into(),
                    account_holder_id: "mark".into(),
                    opening_balance: dec(0),
                }),
                transfer,
            ],
        )
        .unwrap();
        assert_eq!(receiver_view.balance, dec(40));
    }

    #[test]
    fn decide_open_rejects_blank_ids() {
        assert_eq!(
            decide_open("", "dani", dec(0), None),
            Err(BankAccountError::EmptyAccountId)
        );
        assert_eq!(
            decide_open("acc-1", "", dec(0), None),
            Err(BankAccountError::EmptyAccountHolderId)
        );
    }

    #[test]
    fn decide_open_rejects_reopen() {
        let view = BankAccountView {
            account_id: "acc-1".into(),
            account_holder_id: "dani".into(),
            balance: dec(0),
        };
        assert_eq!(
            decide_open("acc-1", "dani", dec(0), Some(&view)),
            Err(BankAccountError::AlreadyOpened)
        );
    }

    #[test]
    fn decide_withdraw_rejects_insufficient_funds() {
        let view = BankAccountView {
            account_id: "acc-1".into(),
            account_holder_id: "dani".into(),
            balance: dec(10),
        };
        assert_eq!(
            decide_withdraw("acc-1", dec(20), Some(&view)),
            Err(BankAccountError::InsufficientFunds)
        );
    }

    #[test]
    fn decide_transfer_is_idempotent_on_replayed_transaction_id() {
        let view = BankAccountView {
            account_id: "acc-1".into(),
            account_holder_id: "dani".into(),
            balance: dec(100),
        };
        let events = vec![BankAccountEvent::Transferred(Transferred {
            transaction_id: "tx-1".into(),
            from_account_id: "acc-1".into(),
            to_account_id: "acc-2".into(),
            amount: dec(40),
        })];

        let result = decide_transfer("acc-1", "acc-2", "tx-1", dec(40), Some(&view), &events);
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn decide_transfer_rejects_self_transfer() {
        let view = BankAccountView {
            account_id: "acc-1".into(),
            account_holder_id: "dani".into(),
            balance: dec(100),
        };
        assert_eq!(
            decide_transfer("acc-1", "acc-1", "tx-1", dec(40), Some(&view), &[]),
            Err(BankAccountError::SelfTransfer)
        );
    }
}
