use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use crossbeam::channel::{Receiver, Sender, bounded, unbounded};

use crate::error::VmError;

use super::Value;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Multi-producer multi-consumer channel shared between environments running
/// on different threads.
pub struct Channel {
    id: u64,
    tx: Mutex<Option<Sender<Value>>>,
    rx: Receiver<Value>,
}

impl Channel {
    /// `capacity == 0` makes an unbounded channel.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = if capacity == 0 { unbounded() } else { bounded(capacity) };
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn send(&self, value: Value) -> Result<()> {
        let tx = self.tx.lock().unwrap().clone();
        match tx {
            Some(tx) => tx
                .send(value)
                .map_err(|_| VmError::user(format!("channel {} is closed", self.id)).into()),
            None => Err(VmError::user(format!("channel {} is closed", self.id)).into()),
        }
    }

    /// Drop the sending side; receivers drain what is buffered and then see `End`.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }

    /// Blocks until a value arrives. Yields `Value::End` once the channel is closed and drained.
    pub fn recv(&self) -> Value {
        self.rx.recv().unwrap_or(Value::End)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("id", &self.id).finish()
    }
}
