use crate::error::Error;

use async_nats::jetstream::consumer::{
    self, AckPolicy as NatsAckPolicy, DeliverPolicy as NatsDeliverPolicy, pull,
};
use async_nats::jetstream::stream::{self, RetentionPolicy};
use ticketing_messaging::{
    AckPolicy, ConsumerConfig, ConsumerInfo, DeliverPolicy, Retention, StreamConfig,
};

pub fn stream_config_to_nats(config: &StreamConfig) -> stream::Config {
    stream::Config {
        name: config.name.clone(),
        subjects: config.subjects.iter().cloned().collect(),
        retention: match config.retention {
            Retention::Interest => RetentionPolicy::Interest,
            Retention::Limits => RetentionPolicy::Limits,
            Retention::WorkQueue => RetentionPolicy::WorkQueue,
        },
        ..Default::default()
    }
}

pub fn stream_config_from_nats(config: &stream::Config) -> StreamConfig {
    StreamConfig {
        name: config.name.clone(),
        subjects: config.subjects.iter().cloned().collect(),
        retention: match config.retention {
            RetentionPolicy::Interest => Retention::Interest,
            RetentionPolicy::Limits => Retention::Limits,
            RetentionPolicy::WorkQueue => Retention::WorkQueue,
        },
    }
}

/// Applies `config` on top of an existing NATS stream configuration so
/// settings this crate does not model are kept.
pub fn merge_stream_config(mut existing: stream::Config, config: &StreamConfig) -> stream::Config {
    let requested = stream_config_to_nats(config);

    existing.subjects = requested.subjects;
    existing.retention = requested.retention;
    existing
}

pub fn consumer_config_to_nats(config: &ConsumerConfig) -> pull::Config {
    pull::Config {
        durable_name: Some(config.durable_name.clone()),
        filter_subject: config.filter_subject.clone(),
        ack_policy: match config.ack_policy {
            AckPolicy::Explicit => NatsAckPolicy::Explicit,
            AckPolicy::All => NatsAckPolicy::All,
            AckPolicy::None => NatsAckPolicy::None,
        },
        deliver_policy: match config.deliver_policy {
            DeliverPolicy::All => NatsDeliverPolicy::All,
            DeliverPolicy::Last => NatsDeliverPolicy::Last,
            DeliverPolicy::New => NatsDeliverPolicy::New,
            DeliverPolicy::ByStartSequence(start_sequence) => {
                NatsDeliverPolicy::ByStartSequence { start_sequence }
            }
            DeliverPolicy::LastPerSubject => NatsDeliverPolicy::LastPerSubject,
        },
        ack_wait: config.ack_wait,
        ..Default::default()
    }
}

pub fn consumer_info_from_nats(info: &consumer::Info) -> Result<ConsumerInfo, Error> {
    let config = &info.config;

    let deliver_policy = match config.deliver_policy {
        NatsDeliverPolicy::All => DeliverPolicy::All,
        NatsDeliverPolicy::Last => DeliverPolicy::Last,
        NatsDeliverPolicy::New => DeliverPolicy::New,
        NatsDeliverPolicy::ByStartSequence { start_sequence } => {
            DeliverPolicy::ByStartSequence(start_sequence)
        }
        NatsDeliverPolicy::LastPerSubject => DeliverPolicy::LastPerSubject,
        NatsDeliverPolicy::ByStartTime { .. } => {
            return Err(Error::UnsupportedPolicy(format!(
                "consumer `{}` delivers by start time",
                info.name
            )));
        }
    };

    Ok(ConsumerInfo {
        stream_name: info.stream_name.clone(),
        config: ConsumerConfig {
            durable_name: config.durable_name.clone().unwrap_or_else(|| info.name.clone()),
            filter_subject: config.filter_subject.clone(),
            ack_policy: match config.ack_policy {
                NatsAckPolicy::Explicit => AckPolicy::Explicit,
                NatsAckPolicy::All => AckPolicy::All,
                NatsAckPolicy::None => AckPolicy::None,
            },
            deliver_policy,
            ack_wait: config.ack_wait,
        },
        ack_floor: info.ack_floor.stream_sequence,
        num_pending: info.num_pending,
        num_ack_pending: info.num_ack_pending as u64,
    })
}
