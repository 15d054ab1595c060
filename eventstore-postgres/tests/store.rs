use serde_json::json;

use eventstore_core::store::EventStore;
use eventstore_core::{Error, Filter, NewEvent};

mod setup;

#[tokio::test]
async fn append_then_query_returns_the_event_in_order() {
    let (store, _container) = setup::store().await;
    let filter = Filter::new(["Deposited"], None).unwrap();

    store
        .append(
            &filter,
            vec![
                NewEvent::new("Deposited", json!({"amount": 10})),
                NewEvent::new("Deposited", json!({"amount": 20})),
            ],
            Some(0),
        )
        .await
        .unwrap();

    let result = store.query(&filter).await.unwrap();

    assert_eq!(result.events.len(), 2);
    assert!(result.events[0].sequence_number < result.events[1].sequence_number);
    assert_eq!(result.events[0].payload, json!({"amount": 10}));
    assert_eq!(result.max_sequence_number, result.events[1].sequence_number);
}

#[tokio::test]
async fn stale_expectation_is_rejected_and_inserts_nothing() {
    let (store, _container) = setup::store().await;
    let filter = Filter::new(["Withdrawn"], None).unwrap();

    store
        .append(&filter, vec![NewEvent::new("Withdrawn", json!({}))], Some(0))
        .await
        .unwrap();

    let err = store
        .append(&filter, vec![NewEvent::new("Withdrawn", json!({}))], Some(0))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ConcurrencyConflict));
    assert_eq!(store.query(&filter).await.unwrap().events.len(), 1);
}

#[tokio::test]
async fn append_without_expectation_never_conflicts() {
    let (store, _container) = setup::store().await;
    let filter = Filter::new(["Logged"], None).unwrap();

    store
        .append(&filter, vec![NewEvent::new("Logged", json!({}))], None)
        .await
        .unwrap();
    store
        .append(&filter, vec![NewEvent::new("Logged", json!({}))], None)
        .await
        .unwrap();

    assert_eq!(store.query(&filter).await.unwrap().events.len(), 2);
}

#[tokio::test]
async fn payload_disjunction_narrows_the_query() {
    let (store, _container) = setup::store().await;
    let filter = Filter::new(["PriceChanged"], None).unwrap();

    store
        .append(
            &filter,
            vec![
                NewEvent::new("PriceChanged", json!({"currency": "USD"})),
                NewEvent::new("PriceChanged", json!({"currency": "EUR"})),
                NewEvent::new("PriceChanged", json!({"currency": "GBP"})),
            ],
            Some(0),
        )
        .await
        .unwrap();

    let narrowed = filter
        .with_payload_predicate("currency", json!("USD"))
        .with_payload_predicate("currency", json!("GBP"));

    let result = store.query(&narrowed).await.unwrap();
    let currencies: Vec<_> = result
        .events
        .iter()
        .map(|e| e.payload["currency"].clone())
        .collect();

    assert_eq!(currencies, vec![json!("USD"), json!("GBP")]);
}

#[tokio::test]
async fn empty_batch_append_still_enforces_the_expectation() {
    let (store, _container) = setup::store().await;
    let filter = Filter::new(["Noted"], None).unwrap();

    store.append(&filter, vec![], Some(0)).await.unwrap();

    let err = store.append(&filter, vec![], Some(5)).await.unwrap_err();
    assert!(matches!(err, Error::ConcurrencyConflict));
}

#[tokio::test]
async fn concurrent_conflicting_appends_let_exactly_one_through() {
    let (store, _container) = setup::store().await;
    let filter = Filter::new(["Counter"], None).unwrap();
    let expected = store.query(&filter).await.unwrap().max_sequence_number;

    let store_a = store.clone();
    let filter_a = filter.clone();
    let store_b = store.clone();
    let filter_b = filter.clone();

    let a = tokio::spawn(async move {
        store_a
            .append(&filter_a, vec![NewEvent::new("Counter", json!({}))], Some(expected))
            .await
    });
    let b = tokio::spawn(async move {
        store_b
            .append(&filter_b, vec![NewEvent::new("Counter", json!({}))], Some(expected))
            .await
    });

    let (a, b) = tokio::join!(a, b);
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(Error::ConcurrencyConflict)))
            .count(),
        1
    );
    assert_eq!(store.query(&filter).await.unwrap().events.len(), 1);
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let (store, _container) = setup::store().await;
    store.migrate().await.unwrap();
    store.migrate().await.unwrap();
}
