//! Kafka backend
//!
//! The `kafka` crate is synchronous, so every broker call runs on a
//! blocking thread with the client behind a mutex.

use super::{BusRecord, EventSink, EventSource};
use crate::config::KafkaConfig;
use crate::error::{BotError, Result};
use crate::utils::retry_with_backoff;
use async_trait::async_trait;
use ::kafka::client::KafkaClient;
use ::kafka::consumer::{Consumer, FetchOffset, GroupOffsetStorage};
use ::kafka::producer::{Producer, Record, RequiredAcks};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const SEND_RETRY_DELAY: Duration = Duration::from_millis(200);

pub struct KafkaSource {
    consumer: Arc<Mutex<Consumer>>,
    topic: String,
    group: String,
}

impl KafkaSource {
    pub async fn connect(config: &KafkaConfig, topic: &str, group: &str) -> Result<Self> {
        let hosts = config.bootstrap_servers.clone();
        let (topic_owned, group_owned) = (topic.to_string(), group.to_string());

        let consumer = tokio::task::spawn_blocking(move || {
            Consumer::from_hosts(hosts)
                .with_topic(topic_owned)
                .with_group(group_owned)
                .with_fallback_offset(FetchOffset::Earliest)
                .with_offset_storage(Some(GroupOffsetStorage::Kafka))
                .create()
        })
        .await??;

        tracing::info!("📥 Subscribed to {} as {}", topic, group);
        Ok(Self {
            consumer: Arc::new(Mutex::new(consumer)),
            topic: topic.to_string(),
            group: group.to_string(),
        })
    }
}

#[async_trait]
impl EventSource for KafkaSource {
    async fn poll(&mut self) -> Result<Vec<BusRecord>> {
        let consumer = self.consumer.clone();
        let records = tokio::task::spawn_blocking(move || -> Result<Vec<BusRecord>> {
            let mut consumer = consumer.lock();
            let sets = consumer.poll()?;
            let mut records = Vec::new();
            for set in sets.iter() {
                for message in set.messages() {
                    records.push(BusRecord {
                        topic: set.topic().to_string(),
                        partition: set.partition(),
                        offset: message.offset,
                        key: String::from_utf8_lossy(message.key).into_owned(),
                        payload: message.value.to_vec(),
                    });
                }
                // Marks the set as consumed locally; nothing is stored
                // in Kafka until commit_consumed.
                consumer.consume_messageset(set)?;
            }
            Ok(records)
        })
        .await??;

        if !records.is_empty() {
            tracing::debug!("📨 {} records from {} ({})", records.len(), self.topic, self.group);
        }
        Ok(records)
    }

    async fn commit(&mut self) -> Result<()> {
        let consumer = self.consumer.clone();
        tokio::task::spawn_blocking(move || consumer.lock().commit_consumed()).await??;
        Ok(())
    }
}

pub struct KafkaSink {
    producer: Arc<Mutex<Producer>>,
    retries: u32,
}

impl KafkaSink {
    pub async fn connect(config: &KafkaConfig) -> Result<Self> {
        let hosts = config.bootstrap_servers.clone();
        let ack_timeout = Duration::from_millis(config.ack_timeout_ms);

        let producer = tokio::task::spawn_blocking(move || {
            Producer::from_hosts(hosts)
                .with_ack_timeout(ack_timeout)
                .with_required_acks(RequiredAcks::All)
                .create()
        })
        .await??;

        tracing::info!("📤 Kafka producer connected to {}", config.bootstrap_servers.join(","));
        Ok(Self {
            producer: Arc::new(Mutex::new(producer)),
            retries: config.send_retries,
        })
    }

    async fn send_once(&self, topic: &str, key: &str, payload: &[u8]) -> Result<()> {
        let producer = self.producer.clone();
        let (topic, key, payload) = (topic.to_string(), key.to_string(), payload.to_vec());
        tokio::task::spawn_blocking(move || {
            let record = Record::from_key_value(&topic, key.as_bytes(), payload.as_slice());
            producer.lock().send(&record).map_err(BotError::from)
        })
        .await?
    }
}

#[async_trait]
impl EventSink for KafkaSink {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        retry_with_backoff(&format!("publish to {}", topic), self.retries, SEND_RETRY_DELAY, false, || {
            self.send_once(topic, key, &payload)
        })
        .await
    }
}

/// Load cluster metadata to check the brokers answer
pub async fn ping(config: &KafkaConfig) -> Result<()> {
    let hosts = config.bootstrap_servers.clone();
    tokio::task::spawn_blocking(move || {
        let mut client = KafkaClient::new(hosts);
        client.load_metadata_all().map_err(BotError::from)
    })
    .await?
}
