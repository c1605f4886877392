//! In-process bus with Kafka-like consumer groups
//!
//! Each topic is an append-only log. Every group has a committed offset
//! per topic, and a source starts reading from it, so a source dropped
//! without committing hands its batch to the next source in that group.

use super::{BusRecord, EventSink, EventSource};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_BATCH: usize = 100;

#[derive(Default)]
struct State {
    logs: HashMap<String, Vec<BusRecord>>,
    /// (group, topic) -> next offset to read
    committed: HashMap<(String, String), usize>,
}

#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<State>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> MemorySink {
        MemorySink { bus: self.clone() }
    }

    pub fn source(&self, topic: &str, group: &str) -> MemorySource {
        let position = self.committed(topic, group);
        MemorySource {
            bus: self.clone(),
            topic: topic.to_string(),
            group: group.to_string(),
            position,
        }
    }

    pub fn append(&self, topic: &str, key: &str, payload: Vec<u8>) -> i64 {
        let mut state = self.state.lock();
        let log = state.logs.entry(topic.to_string()).or_default();
        let offset = log.len() as i64;
        log.push(BusRecord {
            topic: topic.to_string(),
            partition: 0,
            offset,
            key: key.to_string(),
            payload,
        });
        offset
    }

    /// Everything ever published to `topic`
    pub fn records(&self, topic: &str) -> Vec<BusRecord> {
        self.state.lock().logs.get(topic).cloned().unwrap_or_default()
    }

    pub fn committed(&self, topic: &str, group: &str) -> usize {
        self.state
            .lock()
            .committed
            .get(&(group.to_string(), topic.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

pub struct MemorySink {
    bus: MemoryBus,
}

#[async_trait]
impl EventSink for MemorySink {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        self.bus.append(topic, key, payload);
        Ok(())
    }
}

pub struct MemorySource {
    bus: MemoryBus,
    topic: String,
    group: String,
    position: usize,
}

#[async_trait]
impl EventSource for MemorySource {
    async fn poll(&mut self) -> Result<Vec<BusRecord>> {
        let state = self.bus.state.lock();
        let batch: Vec<BusRecord> = state
            .logs
            .get(&self.topic)
            .map(|log| log.iter().skip(self.position).take(MAX_BATCH).cloned().collect())
            .unwrap_or_default();
        self.position += batch.len();
        Ok(batch)
    }

    async fn commit(&mut self) -> Result<()> {
        let mut state = self.bus.state.lock();
        state
            .committed
            .insert((self.group.clone(), self.topic.clone()), self.position);
        Ok(())
    }
}
