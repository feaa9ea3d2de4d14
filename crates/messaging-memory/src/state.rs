use crate::error::Error;
use crate::subject;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bytes::Bytes;
use ticketing_messaging::{
    AckPolicy, ConsumerConfig, ConsumerInfo, DeliverPolicy, PublishAck, Retention, StreamConfig,
};
use tokio::time::Instant;
use tracing::debug;

/// A message handed out by a pull, before it is wrapped for the caller.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub delivered: u64,
    pub payload: Bytes,
    pub sequence: u64,
    pub subject: String,
}

#[derive(Debug)]
struct StoredMessage {
    subject: String,
    payload: Bytes,
    /// Durables that have yet to acknowledge the message.
    interest: BTreeSet<String>,
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    deadline: Instant,
    delivered: u64,
}

#[derive(Debug)]
struct ConsumerState {
    config: ConsumerConfig,
    next_sequence: u64,
    pending: BTreeMap<u64, Pending>,
}

#[derive(Debug)]
struct StreamState {
    config: StreamConfig,
    last_sequence: u64,
    messages: BTreeMap<u64, StoredMessage>,
    consumers: HashMap<String, ConsumerState>,
}

impl StreamState {
    fn new(config: StreamConfig) -> Self {
        Self {
            config,
            last_sequence: 0,
            messages: BTreeMap::new(),
            consumers: HashMap::new(),
        }
    }

    fn consumer_info(&self, durable: &str) -> Result<ConsumerInfo, Error> {
        let consumer = self
            .consumers
            .get(durable)
            .ok_or_else(|| Error::ConsumerNotFound(durable.to_string()))?;

        let delivered_up_to = consumer.next_sequence.saturating_sub(1);
        let ack_floor = consumer
            .pending
            .keys()
            .next()
            .map_or(delivered_up_to, |first| first - 1);

        let num_pending = self
            .messages
            .range(consumer.next_sequence..)
            .filter(|(_, message)| message.interest.contains(durable))
            .count() as u64;

        Ok(ConsumerInfo {
            stream_name: self.config.name.clone(),
            config: consumer.config.clone(),
            ack_floor,
            num_pending,
            num_ack_pending: consumer.pending.len() as u64,
        })
    }

    fn settle(&mut self, durable: &str, sequence: u64) {
        let Some(message) = self.messages.get_mut(&sequence) else {
            return;
        };

        message.interest.remove(durable);

        let remove = match self.config.retention {
            Retention::Interest => message.interest.is_empty(),
            Retention::WorkQueue => true,
            Retention::Limits => false,
        };

        if remove {
            self.messages.remove(&sequence);
            debug!(stream = %self.config.name, sequence, "message removed after acknowledgement");
        }
    }
}

/// Every stream held by a memory store.
#[derive(Debug, Default)]
pub struct State {
    streams: BTreeMap<String, StreamState>,
}

impl State {
    pub fn streams(&self) -> Vec<StreamConfig> {
        self.streams
            .values()
            .map(|stream| stream.config.clone())
            .collect()
    }

    pub fn create_stream(&mut self, config: StreamConfig) -> Result<StreamConfig, Error> {
        validate_stream(&config)?;

        if let Some(existing) = self.streams.get(&config.name) {
            if existing.config == config {
                return Ok(config);
            }

            return Err(Error::StreamNameInUse(config.name));
        }

        self.check_overlap(&config)?;
        self.streams
            .insert(config.name.clone(), StreamState::new(config.clone()));

        Ok(config)
    }

    pub fn update_stream(&mut self, config: StreamConfig) -> Result<StreamConfig, Error> {
        validate_stream(&config)?;
        self.check_overlap(&config)?;

        let stream = self
            .streams
            .get_mut(&config.name)
            .ok_or_else(|| Error::StreamNotFound(config.name.clone()))?;

        if stream.config.retention != config.retention {
            return Err(Error::ImmutableRetention(config.name));
        }

        stream.config = config.clone();

        Ok(config)
    }

    pub fn consumers(&self, stream_name: &str) -> Result<Vec<ConsumerInfo>, Error> {
        let stream = self.stream(stream_name)?;

        let mut durables: Vec<&String> = stream.consumers.keys().collect();
        durables.sort();

        durables
            .into_iter()
            .map(|durable| stream.consumer_info(durable))
            .collect()
    }

    pub fn consumer_info(&self, stream_name: &str, durable: &str) -> Result<ConsumerInfo, Error> {
        self.stream(stream_name)?.consumer_info(durable)
    }

    pub fn create_consumer(&mut self, stream_name: &str, config: ConsumerConfig) -> Result<(), Error> {
        if config.durable_name.is_empty()
            || config
                .durable_name
                .chars()
                .any(|c| c == '.' || c == '*' || c == '>' || c.is_whitespace())
        {
            return Err(Error::InvalidDurableName(config.durable_name));
        }

        if !subject::is_valid(&config.filter_subject, true) {
            return Err(Error::InvalidSubject(config.filter_subject));
        }

        let stream = self.stream_mut(stream_name)?;

        if let Some(existing) = stream.consumers.get(&config.durable_name) {
            if existing.config == config {
                return Ok(());
            }

            return Err(Error::ConsumerNameInUse(config.durable_name));
        }

        if !stream
            .config
            .subjects
            .iter()
            .any(|routed| subject::is_subset(&config.filter_subject, routed))
        {
            return Err(Error::FilterNotInStream {
                filter: config.filter_subject,
                stream: stream_name.to_string(),
            });
        }

        let next_sequence = match config.deliver_policy {
            DeliverPolicy::All => 1,
            DeliverPolicy::New => stream.last_sequence + 1,
            DeliverPolicy::ByStartSequence(sequence) => sequence.max(1),
            DeliverPolicy::Last | DeliverPolicy::LastPerSubject => stream
                .messages
                .iter()
                .rev()
                .find(|(_, message)| subject::matches(&config.filter_subject, &message.subject))
                .map_or(stream.last_sequence + 1, |(sequence, _)| *sequence),
        };

        for message in stream
            .messages
            .range_mut(next_sequence..)
            .map(|(_, message)| message)
            .filter(|message| subject::matches(&config.filter_subject, &message.subject))
        {
            message.interest.insert(config.durable_name.clone());
        }

        debug!(stream = %stream_name, durable = %config.durable_name, next_sequence, "consumer created");

        stream.consumers.insert(
            config.durable_name.clone(),
            ConsumerState {
                config,
                next_sequence,
                pending: BTreeMap::new(),
            },
        );

        Ok(())
    }

    pub fn has_consumer(&self, stream_name: &str, durable: &str) -> Result<bool, Error> {
        Ok(self.stream(stream_name)?.consumers.contains_key(durable))
    }

    pub fn publish(&mut self, subject_name: &str, payload: Bytes) -> Result<PublishAck, Error> {
        if !subject::is_valid(subject_name, false) {
            return Err(Error::InvalidSubject(subject_name.to_string()));
        }

        let stream = self
            .streams
            .values_mut()
            .find(|stream| {
                stream
                    .config
                    .subjects
                    .iter()
                    .any(|routed| subject::matches(routed, subject_name))
            })
            .ok_or_else(|| Error::NoStreamForSubject(subject_name.to_string()))?;

        stream.last_sequence += 1;
        let sequence = stream.last_sequence;

        let interest: BTreeSet<String> = stream
            .consumers
            .values()
            .filter(|consumer| subject::matches(&consumer.config.filter_subject, subject_name))
            .map(|consumer| consumer.config.durable_name.clone())
            .collect();

        if interest.is_empty() && stream.config.retention != Retention::Limits {
            debug!(stream = %stream.config.name, subject = %subject_name, sequence, "no interest, message dropped");
        } else {
            stream.messages.insert(
                sequence,
                StoredMessage {
                    subject: subject_name.to_string(),
                    payload,
                    interest,
                },
            );
        }

        Ok(PublishAck {
            stream: stream.config.name.clone(),
            sequence,
        })
    }

    /// Hands out up to `max` messages: expired deliveries first, then new ones.
    pub fn take_ready(
        &mut self,
        stream_name: &str,
        durable: &str,
        max: usize,
        now: Instant,
    ) -> Result<Vec<Delivery>, Error> {
        let stream = self.stream_mut(stream_name)?;
        let consumer = stream
            .consumers
            .get_mut(durable)
            .ok_or_else(|| Error::ConsumerNotFound(durable.to_string()))?;

        let ack_wait = consumer.config.ack_wait;
        let ack_policy = consumer.config.ack_policy;
        let mut batch = Vec::new();
        let mut settled = Vec::new();

        let expired: Vec<u64> = consumer
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(sequence, _)| *sequence)
            .collect();

        for sequence in expired {
            if batch.len() >= max {
                break;
            }

            let Some(message) = stream.messages.get(&sequence) else {
                consumer.pending.remove(&sequence);
                continue;
            };

            if let Some(pending) = consumer.pending.get_mut(&sequence) {
                pending.delivered += 1;
                pending.deadline = now + ack_wait;

                batch.push(Delivery {
                    delivered: pending.delivered,
                    payload: message.payload.clone(),
                    sequence,
                    subject: message.subject.clone(),
                });
            }
        }

        let fresh: Vec<u64> = stream
            .messages
            .range(consumer.next_sequence..)
            .filter(|(_, message)| message.interest.contains(durable))
            .map(|(sequence, _)| *sequence)
            .take(max.saturating_sub(batch.len()))
            .collect();

        for sequence in fresh {
            let Some(message) = stream.messages.get(&sequence) else {
                continue;
            };

            batch.push(Delivery {
                delivered: 1,
                payload: message.payload.clone(),
                sequence,
                subject: message.subject.clone(),
            });

            consumer.next_sequence = sequence + 1;

            if ack_policy == AckPolicy::None {
                settled.push(sequence);
            } else {
                consumer.pending.insert(
                    sequence,
                    Pending {
                        deadline: now + ack_wait,
                        delivered: 1,
                    },
                );
            }
        }

        if batch.len() < max {
            consumer.next_sequence = consumer.next_sequence.max(stream.last_sequence + 1);
        }

        for sequence in settled {
            stream.settle(durable, sequence);
        }

        Ok(batch)
    }

    /// The earliest redelivery deadline of the consumer, if any delivery is outstanding.
    pub fn next_deadline(&self, stream_name: &str, durable: &str) -> Result<Option<Instant>, Error> {
        let stream = self.stream(stream_name)?;
        let consumer = stream
            .consumers
            .get(durable)
            .ok_or_else(|| Error::ConsumerNotFound(durable.to_string()))?;

        Ok(consumer
            .pending
            .values()
            .map(|pending| pending.deadline)
            .min())
    }

    pub fn ack(&mut self, stream_name: &str, durable: &str, sequence: u64) -> Result<(), Error> {
        let stream = self.stream_mut(stream_name)?;
        let consumer = stream
            .consumers
            .get_mut(durable)
            .ok_or_else(|| Error::ConsumerNotFound(durable.to_string()))?;

        let acked: Vec<u64> = match consumer.config.ack_policy {
            AckPolicy::All => consumer.pending.range(..=sequence).map(|(s, _)| *s).collect(),
            AckPolicy::Explicit | AckPolicy::None => vec![sequence],
        };

        for sequence in &acked {
            consumer.pending.remove(sequence);
        }

        for sequence in acked {
            stream.settle(durable, sequence);
        }

        Ok(())
    }

    /// Moves the redelivery deadline of an outstanding delivery.
    pub fn reschedule(
        &mut self,
        stream_name: &str,
        durable: &str,
        sequence: u64,
        deadline: Deadline,
        now: Instant,
    ) -> Result<(), Error> {
        let consumer = self
            .stream_mut(stream_name)?
            .consumers
            .get_mut(durable)
            .ok_or_else(|| Error::ConsumerNotFound(durable.to_string()))?;

        let ack_wait = consumer.config.ack_wait;

        if let Some(pending) = consumer.pending.get_mut(&sequence) {
            pending.deadline = match deadline {
                Deadline::Now => now,
                Deadline::AckWait => now + ack_wait,
            };
        }

        Ok(())
    }

    pub fn message_count(&self, stream_name: &str) -> Result<usize, Error> {
        Ok(self.stream(stream_name)?.messages.len())
    }

    pub fn last_sequence(&self, stream_name: &str) -> Result<u64, Error> {
        Ok(self.stream(stream_name)?.last_sequence)
    }

    fn stream(&self, name: &str) -> Result<&StreamState, Error> {
        self.streams
            .get(name)
            .ok_or_else(|| Error::StreamNotFound(name.to_string()))
    }

    fn stream_mut(&mut self, name: &str) -> Result<&mut StreamState, Error> {
        self.streams
            .get_mut(name)
            .ok_or_else(|| Error::StreamNotFound(name.to_string()))
    }

    fn check_overlap(&self, config: &StreamConfig) -> Result<(), Error> {
        for other in self.streams.values() {
            if other.config.name == config.name {
                continue;
            }

            for requested in &config.subjects {
                if other
                    .config
                    .subjects
                    .iter()
                    .any(|routed| subject::overlaps(routed, requested))
                {
                    return Err(Error::SubjectOverlap {
                        subject: requested.clone(),
                        stream: other.config.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Where to move a redelivery deadline.
#[derive(Clone, Copy, Debug)]
pub enum Deadline {
    /// Redeliver on the next pull.
    Now,

    /// Restart the ack-wait.
    AckWait,
}

fn validate_stream(config: &StreamConfig) -> Result<(), Error> {
    if config.name.is_empty()
        || config
            .name
            .chars()
            .any(|c| c == '.' || c == '*' || c == '>' || c.is_whitespace())
    {
        return Err(Error::InvalidStreamName(config.name.clone()));
    }

    if let Some(invalid) = config
        .subjects
        .iter()
        .find(|subject_name| !subject::is_valid(subject_name, true))
    {
        return Err(Error::InvalidSubject(invalid.clone()));
    }

    Ok(())
}
