use std::cell::Cell;

use bytes::Bytes;

use crate::host::{HostError, HostErrorCode, HostMessages, HostResult};

/// One decoded stream message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRecord {
    /// Raw payload.
    pub payload: Bytes,
    /// Source topic.
    pub topic: String,
    /// Message key; empty when the broker sent none.
    pub key: Bytes,
    /// Broker timestamp in milliseconds.
    pub timestamp: i64,
}

impl MessageRecord {
    /// Creates a keyless message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>, timestamp: i64) -> Self {
        Self {
            payload: payload.into(),
            topic: topic.into(),
            key: Bytes::new(),
            timestamp,
        }
    }

    /// Sets the key.
    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }
}

/// A message batch valid until [`MemoryMessages::invalidate`] is called.
#[derive(Debug)]
pub struct MemoryMessages {
    records: Vec<MessageRecord>,
    valid: Cell<bool>,
}

impl MemoryMessages {
    /// Wraps decoded messages.
    pub fn new(records: Vec<MessageRecord>) -> Self {
        Self {
            records,
            valid: Cell::new(true),
        }
    }

    /// Ends the batch's scope.
    pub fn invalidate(&self) {
        self.valid.set(false);
    }

    fn record(&self, index: usize) -> HostResult<&MessageRecord> {
        if !self.valid.get() {
            return Err(HostError::new(
                HostErrorCode::LogicError,
                "message batch is no longer valid",
            ));
        }
        self.records.get(index).ok_or_else(|| {
            HostError::new(
                HostErrorCode::OutOfRange,
                format!("message index {index} out of {}", self.records.len()),
            )
        })
    }
}

impl HostMessages for MemoryMessages {
    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn total_messages(&self) -> HostResult<usize> {
        Ok(self.records.len())
    }

    fn payload(&self, index: usize) -> HostResult<Bytes> {
        Ok(self.record(index)?.payload.clone())
    }

    fn topic_name(&self, index: usize) -> HostResult<String> {
        Ok(self.record(index)?.topic.clone())
    }

    fn key(&self, index: usize) -> HostResult<Bytes> {
        Ok(self.record(index)?.key.clone())
    }

    fn timestamp(&self, index: usize) -> HostResult<i64> {
        Ok(self.record(index)?.timestamp)
    }
}
