use std::time::Duration;

use assert_matches::assert_matches;
use ticketing_events::{
    AnyEvent, Event, ExpirationComplete, ExpirationCompleteData, TicketCreated, TicketCreatedData,
};
use ticketing_messaging::{
    AckMessage, ConsumerConfig, DEFAULT_STREAM_NAME, Error, LogStore, Publisher, ensure_stream,
    publish_event,
};
use ticketing_messaging_memory::{self as memory, MemoryLogStore};

fn ticket(id: &str) -> TicketCreatedData {
    TicketCreatedData {
        id: id.to_string(),
        version: 0,
        title: "concert".to_string(),
        price: 20.0,
        user_id: "u1".to_string(),
    }
}

#[tokio::test]
async fn test_publish_appends_json_under_subject() {
    let store = MemoryLogStore::new();
    ensure_stream(&store, DEFAULT_STREAM_NAME, ["ticket.created"])
        .await
        .unwrap();
    let consumer = store
        .create_consumer(
            DEFAULT_STREAM_NAME,
            ConsumerConfig::durable("audit", "ticket.created", Duration::from_secs(5)),
        )
        .await
        .unwrap();

    let publisher: Publisher<_, TicketCreated> = Publisher::new(store.clone());
    let first = publisher.publish(&ticket("t1")).await.unwrap();
    let second = publisher.publish(&ticket("t2")).await.unwrap();

    assert_eq!(first.stream, DEFAULT_STREAM_NAME);
    assert!(second.sequence > first.sequence);

    let messages = store
        .fetch(&consumer, 10, Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].subject(), "ticket.created");
    assert_eq!(
        TicketCreated::decode(messages[0].payload()).unwrap(),
        ticket("t1")
    );
}

#[tokio::test]
async fn test_publish_event_routes_by_subject() {
    let store = MemoryLogStore::new();
    ensure_stream(&store, DEFAULT_STREAM_NAME, ["expiration.complete"])
        .await
        .unwrap();
    let consumer = store
        .create_consumer(
            DEFAULT_STREAM_NAME,
            ConsumerConfig::durable("orders", "expiration.complete", Duration::from_secs(5)),
        )
        .await
        .unwrap();

    let event = AnyEvent::ExpirationComplete(ExpirationCompleteData {
        order_id: "o1".to_string(),
    });
    publish_event(&store, &event).await.unwrap();

    let messages = store
        .fetch(&consumer, 10, Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(messages[0].subject(), "expiration.complete");
    assert_eq!(
        ExpirationComplete::decode(messages[0].payload()).unwrap(),
        ExpirationCompleteData {
            order_id: "o1".to_string()
        }
    );
}

#[tokio::test]
async fn test_publish_without_stream_fails() {
    let store = MemoryLogStore::new();
    let publisher: Publisher<_, TicketCreated> = Publisher::new(store);

    assert_matches!(
        publisher.publish(&ticket("t1")).await,
        Err(Error::Store(memory::Error::NoStreamForSubject(subject))) if subject == "ticket.created"
    );
}
