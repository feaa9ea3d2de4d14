mod common;

use common::FlakyStore;

use std::collections::BTreeSet;

use assert_matches::assert_matches;
use ticketing_events::Subject;
use ticketing_messaging::{
    EnsureOutcome, Error, LogStore, Retention, ensure_catalog_stream, ensure_stream,
};
use ticketing_messaging_memory::{self as memory, MemoryLogStore};

fn set(subjects: &[&str]) -> BTreeSet<String> {
    subjects.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_creates_missing_stream() {
    let store = MemoryLogStore::new();

    let handle = ensure_stream(&store, "ticketing", ["ticket.created"])
        .await
        .unwrap();

    assert_eq!(handle.outcome, EnsureOutcome::Created);
    assert_eq!(handle.retention, Retention::Interest);
    assert_eq!(handle.subjects, set(&["ticket.created"]));
}

#[tokio::test]
async fn test_same_subjects_are_idempotent() {
    let store = MemoryLogStore::new();

    ensure_stream(&store, "ticketing", ["ticket.created", "order.created"])
        .await
        .unwrap();
    let again = ensure_stream(&store, "ticketing", ["order.created", "ticket.created"])
        .await
        .unwrap();

    assert_eq!(again.outcome, EnsureOutcome::Unchanged);
    assert_eq!(store.streams().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_subjects_grow_monotonically() {
    let store = MemoryLogStore::new();

    ensure_stream(&store, "ticketing", ["a", "b"]).await.unwrap();
    let handle = ensure_stream(&store, "ticketing", ["b", "c"]).await.unwrap();

    assert_eq!(
        handle.outcome,
        EnsureOutcome::Updated {
            added: set(&["c"])
        }
    );
    assert_eq!(handle.subjects, set(&["a", "b", "c"]));

    let stored = store.streams().await.unwrap();
    assert_eq!(stored[0].subjects, set(&["a", "b", "c"]));
}

#[tokio::test]
async fn test_subset_request_removes_nothing() {
    let store = MemoryLogStore::new();

    ensure_stream(&store, "ticketing", ["a", "b", "c"])
        .await
        .unwrap();
    let handle = ensure_stream(&store, "ticketing", ["a"]).await.unwrap();

    assert_eq!(handle.outcome, EnsureOutcome::Unchanged);
    assert_eq!(handle.subjects, set(&["a", "b", "c"]));
}

#[tokio::test]
async fn test_concurrent_callers_converge_on_union() {
    let store = MemoryLogStore::new();

    let (first, second) = tokio::join!(
        ensure_stream(&store, "ticketing", ["a"]),
        ensure_stream(&store, "ticketing", ["b"]),
    );
    first.unwrap();
    second.unwrap();

    let stored = store.streams().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].subjects, set(&["a", "b"]));
}

#[tokio::test]
async fn test_empty_subjects_rejected() {
    let store = MemoryLogStore::new();

    let result = ensure_stream(&store, "ticketing", Vec::<String>::new()).await;

    assert_matches!(result, Err(Error::EmptySubjects(name)) if name == "ticketing");
    assert!(store.streams().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let store = MemoryLogStore::new();

    let result = ensure_stream(&store, "ticketing", ["ticket..created"]).await;

    assert_matches!(result, Err(Error::Store(memory::Error::InvalidSubject(_))));
}

#[tokio::test]
async fn test_catalog_stream_has_every_subject() {
    let store = MemoryLogStore::new();

    let handle = ensure_catalog_stream(&store, "ticketing").await.unwrap();

    let expected: BTreeSet<String> = Subject::all_names().map(str::to_string).collect();
    assert_eq!(handle.subjects, expected);
    assert_eq!(handle.subjects.len(), Subject::ALL.len());
}

#[tokio::test]
async fn test_concurrent_create_is_reconciled() {
    let store = FlakyStore::new(MemoryLogStore::new());
    store.race_creates(1);

    let handle = ensure_stream(&store, "ticketing", ["ticket.created", "order.created"])
        .await
        .unwrap();

    assert_eq!(handle.outcome, EnsureOutcome::Unchanged);
    assert_eq!(handle.subjects, set(&["order.created", "ticket.created"]));
    assert_eq!(store.remaining_races(), 0);
    assert_eq!(store.streams().await.unwrap().len(), 1);
}
