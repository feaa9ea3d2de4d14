//! Operator CLI for the ticketing event stream.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod handler;

use handler::PrintHandler;

use std::time::Duration;

use clap::{Parser, Subcommand};
use ticketing_events::{
    AnyEvent, Event, ExpirationComplete, OrderCancelled, OrderCreated, PaymentCreated, Subject,
    TicketCreated, TicketUpdated,
};
use ticketing_messaging::{
    LogStore, Subscriber, SubscriberConfig, SubscriberOptions, ensure_catalog_stream,
    publish_event,
};
use ticketing_messaging_nats::NatsLogStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Messaging error
    #[error(transparent)]
    Messaging(#[from] ticketing_messaging::Error<ticketing_messaging_nats::Error>),

    /// NATS connection error
    #[error(transparent)]
    Nats(#[from] ticketing_messaging_nats::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// NATS server URL
    #[arg(
        long,
        default_value = "nats://localhost:4222",
        env = "TICKETING_NATS_URL"
    )]
    nats_url: String,

    /// Name of the shared event stream
    #[arg(
        long,
        default_value = ticketing_messaging::DEFAULT_STREAM_NAME,
        env = "TICKETING_STREAM_NAME"
    )]
    stream_name: String,

    /// Seconds to wait for the NATS connection
    #[arg(
        long,
        default_value_t = 5,
        env = "TICKETING_NATS_CONNECT_TIMEOUT_SECS"
    )]
    connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Create the stream, or add missing catalog subjects to it
    EnsureStream,

    /// Publish one event given as its JSON payload
    Publish {
        /// Subject of the event, e.g. `ticket.created`
        subject: Subject,

        /// JSON payload matching the schema of the subject
        json: String,
    },

    /// Print events from a subject through a durable consumer
    Tail {
        /// Subject to consume
        subject: Subject,

        /// Durable consumer name
        #[arg(long)]
        durable: String,

        /// Handle a single batch and exit
        #[arg(long)]
        once: bool,
    },
}

async fn ensure_stream<L>(
    store: &L,
    stream_name: &str,
) -> Result<(), ticketing_messaging::Error<L::Error>>
where
    L: LogStore,
{
    let handle = ensure_catalog_stream(store, stream_name).await?;

    info!(
        stream = %handle.name,
        outcome = ?handle.outcome,
        subjects = ?handle.subjects,
        "stream ready"
    );

    Ok(())
}

async fn publish<L>(
    store: &L,
    subject: Subject,
    json: &str,
) -> Result<(), ticketing_messaging::Error<L::Error>>
where
    L: LogStore,
{
    let event = AnyEvent::decode(subject, json.as_bytes())?;
    let ack = publish_event(store, &event).await?;

    info!(subject = %subject, stream = %ack.stream, sequence = ack.sequence, "published");

    Ok(())
}

async fn tail<L, E>(
    store: L,
    stream_name: String,
    durable_name: String,
    once: bool,
    shutdown_token: CancellationToken,
) -> Result<(), ticketing_messaging::Error<L::Error>>
where
    L: LogStore,
    E: Event,
{
    let subscriber = Subscriber::<L, E, PrintHandler<E>>::new(SubscriberConfig {
        store,
        stream_name,
        durable_name,
        options: SubscriberOptions::for_event::<E>(),
        handler: PrintHandler::new(),
    })
    .await;

    if once {
        let handled = subscriber.consume_batch().await?;
        info!(subject = %E::SUBJECT, handled, "batch handled");

        return Ok(());
    }

    info!(subject = %E::SUBJECT, durable = %subscriber.durable_name(), "tailing");
    subscriber.consume(shutdown_token).await
}

async fn tail_subject<L>(
    store: L,
    subject: Subject,
    stream_name: String,
    durable_name: String,
    once: bool,
    shutdown_token: CancellationToken,
) -> Result<(), ticketing_messaging::Error<L::Error>>
where
    L: LogStore,
{
    match subject {
        Subject::TicketCreated => {
            tail::<L, TicketCreated>(store, stream_name, durable_name, once, shutdown_token).await
        }
        Subject::TicketUpdated => {
            tail::<L, TicketUpdated>(store, stream_name, durable_name, once, shutdown_token).await
        }
        Subject::OrderCreated => {
            tail::<L, OrderCreated>(store, stream_name, durable_name, once, shutdown_token).await
        }
        Subject::OrderCancelled => {
            tail::<L, OrderCancelled>(store, stream_name, durable_name, once, shutdown_token).await
        }
        Subject::PaymentCreated => {
            tail::<L, PaymentCreated>(store, stream_name, durable_name, once, shutdown_token).await
        }
        Subject::ExpirationComplete => {
            tail::<L, ExpirationComplete>(store, stream_name, durable_name, once, shutdown_token)
                .await
        }
    }
}

fn spawn_signal_handler(shutdown_token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match (
                signal(SignalKind::terminate()),
                signal(SignalKind::interrupt()),
            ) {
                (Ok(mut sigterm), Ok(mut sigint)) => {
                    tokio::select! {
                        _ = sigterm.recv() => info!("Received SIGTERM"),
                        _ = sigint.recv() => info!("Received SIGINT"),
                    }
                }
                _ => {
                    warn!("failed to install signal handlers, falling back to ctrl-c");
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Received interrupt signal");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received interrupt signal");
        }

        info!("Shutting down");
        shutdown_token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let Args {
        nats_url,
        stream_name,
        connect_timeout_secs,
        command,
    } = Args::parse();

    let shutdown_token = CancellationToken::new();
    spawn_signal_handler(shutdown_token.clone());

    let store =
        NatsLogStore::connect(&nats_url, Duration::from_secs(connect_timeout_secs)).await?;

    match command {
        Command::EnsureStream => ensure_stream(&store, &stream_name).await?,
        Command::Publish { subject, json } => publish(&store, subject, &json).await?,
        Command::Tail {
            subject,
            durable,
            once,
        } => tail_subject(store, subject, stream_name, durable, once, shutdown_token).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use clap::CommandFactory;
    use ticketing_messaging::DEFAULT_STREAM_NAME;
    use ticketing_messaging_memory::MemoryLogStore;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_tail_arguments() {
        let args = Args::try_parse_from([
            "ticketing-events",
            "--stream-name",
            "events",
            "tail",
            "order.created",
            "--durable",
            "payments-service",
            "--once",
        ])
        .unwrap();

        assert_eq!(args.stream_name, "events");
        assert_eq!(args.connect_timeout_secs, 5);
        assert_matches!(
            args.command,
            Command::Tail { subject: Subject::OrderCreated, durable, once: true }
                if durable == "payments-service"
        );
    }

    #[test]
    fn test_unknown_subject_is_rejected() {
        assert!(
            Args::try_parse_from(["ticketing-events", "publish", "order.shipped", "{}"]).is_err()
        );
    }

    #[tokio::test]
    async fn test_publish_decodes_against_subject_schema() {
        let store = MemoryLogStore::new();
        ensure_stream(&store, DEFAULT_STREAM_NAME).await.unwrap();

        let json = r#"{"id":"t-1","version":0,"title":"concert","price":20,"userId":"u-1"}"#;
        publish(&store, Subject::TicketCreated, json).await.unwrap();
        assert_eq!(store.last_sequence(DEFAULT_STREAM_NAME).await.unwrap(), 1);

        assert_matches!(
            publish(&store, Subject::OrderCreated, json).await,
            Err(ticketing_messaging::Error::Events(
                ticketing_events::Error::InvalidPayload { .. }
            ))
        );
        assert_matches!(
            publish(&store, Subject::TicketCreated, "not json").await,
            Err(ticketing_messaging::Error::Events(
                ticketing_events::Error::InvalidPayload { subject: Subject::TicketCreated, .. }
            ))
        );
        assert_eq!(store.last_sequence(DEFAULT_STREAM_NAME).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tail_once_handles_one_batch() {
        let store = MemoryLogStore::new();
        ensure_stream(&store, DEFAULT_STREAM_NAME).await.unwrap();

        let tail_once = || {
            tail_subject(
                store.clone(),
                Subject::TicketCreated,
                DEFAULT_STREAM_NAME.to_string(),
                "tail".to_string(),
                true,
                CancellationToken::new(),
            )
        };

        // Registers the durable so the next publish is retained for it.
        tail_once().await.unwrap();

        let json = r#"{"id":"t-1","version":0,"title":"concert","price":20,"userId":"u-1"}"#;
        publish(&store, Subject::TicketCreated, json).await.unwrap();
        assert_eq!(store.message_count(DEFAULT_STREAM_NAME).await.unwrap(), 1);

        tail_once().await.unwrap();
        assert_eq!(store.message_count(DEFAULT_STREAM_NAME).await.unwrap(), 0);
    }
}
