use std::cell::Cell;
use std::fmt;

use bytes::Bytes;

use crate::error::{ElementKind, ProcError, Result};
use crate::host::MessagesRef;

/// One message of a stream batch.
#[derive(Clone)]
pub struct Message {
    messages: MessagesRef,
    index: usize,
}

impl Message {
    fn check(&self) -> Result<()> {
        if self.messages.is_valid() {
            Ok(())
        } else {
            Err(ProcError::stale(ElementKind::Message))
        }
    }

    /// Returns `true` while the batch is being processed.
    pub fn is_valid(&self) -> bool {
        self.messages.is_valid()
    }

    /// Raw payload.
    pub fn payload(&self) -> Result<Bytes> {
        self.check()?;
        Ok(self.messages.payload(self.index)?)
    }

    /// Source topic.
    pub fn topic_name(&self) -> Result<String> {
        self.check()?;
        Ok(self.messages.topic_name(self.index)?)
    }

    /// Message key.
    pub fn key(&self) -> Result<Bytes> {
        self.check()?;
        Ok(self.messages.key(self.index)?)
    }

    /// Broker timestamp.
    pub fn timestamp(&self) -> Result<i64> {
        self.check()?;
        Ok(self.messages.timestamp(self.index)?)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Message").field(&self.index).finish()
    }
}

/// A batch of stream messages.
pub struct Messages {
    messages: MessagesRef,
    len: Cell<Option<usize>>,
}

impl Messages {
    /// Wraps a native message batch.
    pub fn new(messages: MessagesRef) -> Self {
        Self {
            messages,
            len: Cell::new(None),
        }
    }

    fn check(&self) -> Result<()> {
        if self.messages.is_valid() {
            Ok(())
        } else {
            Err(ProcError::stale(ElementKind::Messages))
        }
    }

    /// Returns `true` while the batch is being processed.
    pub fn is_valid(&self) -> bool {
        self.messages.is_valid()
    }

    /// Number of messages in the batch.
    pub fn total_messages(&self) -> Result<usize> {
        self.check()?;
        if let Some(len) = self.len.get() {
            return Ok(len);
        }
        let len = self.messages.total_messages()?;
        self.len.set(Some(len));
        Ok(len)
    }

    /// Message at `index`.
    pub fn message_at(&self, index: usize) -> Result<Message> {
        let total = self.total_messages()?;
        if index >= total {
            return Err(ProcError::Range(format!(
                "message index {index} out of {total}"
            )));
        }
        Ok(Message {
            messages: self.messages.clone(),
            index,
        })
    }

    /// Starts a new pass over the batch.
    pub fn iter(&self) -> Result<MessageIter> {
        let total = self.total_messages()?;
        Ok(MessageIter {
            messages: self.messages.clone(),
            next: 0,
            total,
            done: false,
        })
    }
}

impl fmt::Debug for Messages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messages")
            .field("valid", &self.messages.is_valid())
            .finish()
    }
}

/// Iterator over a message batch; each step re-checks the batch.
pub struct MessageIter {
    messages: MessagesRef,
    next: usize,
    total: usize,
    done: bool,
}

impl Iterator for MessageIter {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next >= self.total {
            return None;
        }
        if !self.messages.is_valid() {
            self.done = true;
            return Some(Err(ProcError::stale(ElementKind::Messages)));
        }
        let message = Message {
            messages: self.messages.clone(),
            index: self.next,
        };
        self.next += 1;
        Some(Ok(message))
    }
}
