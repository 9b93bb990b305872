//! Per-service detail page view counters kept in a key-value cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use redis::Commands;

use crate::marketplace::domain::ServiceId;

/// Cache key for a service's counter.
pub fn counter_key(id: ServiceId) -> String {
    format!("services/{}", id.0)
}

/// Monotonic view counter. Keys are created at zero when a service is
/// published and dropped when it is deleted.
pub trait ViewCounter: Send + Sync {
    fn initialize(&self, id: ServiceId) -> Result<(), CounterError>;
    fn increment(&self, id: ServiceId) -> Result<u64, CounterError>;
    fn get(&self, id: ServiceId) -> Result<Option<u64>, CounterError>;
    fn remove(&self, id: ServiceId) -> Result<(), CounterError>;
    /// Ask the backing store to write its dataset to durable storage.
    fn persist_snapshot(&self) -> Result<(), CounterError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("view counter store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for CounterError {
    fn from(value: redis::RedisError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// Counters held in process memory; increments are lock-free once the key
/// exists.
#[derive(Debug, Default)]
pub struct InMemoryViewCounter {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl InMemoryViewCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> CounterError {
        CounterError::Unavailable("counter lock poisoned".to_string())
    }

    fn slot(&self, key: &str) -> Result<Option<Arc<AtomicU64>>, CounterError> {
        let counters = self.counters.read().map_err(|_| Self::poisoned())?;
        Ok(counters.get(key).cloned())
    }
}

impl ViewCounter for InMemoryViewCounter {
    fn initialize(&self, id: ServiceId) -> Result<(), CounterError> {
        let mut counters = self.counters.write().map_err(|_| Self::poisoned())?;
        counters.insert(counter_key(id), Arc::new(AtomicU64::new(0)));
        Ok(())
    }

    fn increment(&self, id: ServiceId) -> Result<u64, CounterError> {
        let key = counter_key(id);
        if let Some(slot) = self.slot(&key)? {
            return Ok(slot.fetch_add(1, Ordering::AcqRel) + 1);
        }
        // Missing keys start from zero, matching INCR on an absent key.
        let mut counters = self.counters.write().map_err(|_| Self::poisoned())?;
        let slot = counters
            .entry(key)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)));
        Ok(slot.fetch_add(1, Ordering::AcqRel) + 1)
    }

    fn get(&self, id: ServiceId) -> Result<Option<u64>, CounterError> {
        Ok(self
            .slot(&counter_key(id))?
            .map(|slot| slot.load(Ordering::Acquire)))
    }

    fn remove(&self, id: ServiceId) -> Result<(), CounterError> {
        let mut counters = self.counters.write().map_err(|_| Self::poisoned())?;
        counters.remove(&counter_key(id));
        Ok(())
    }

    fn persist_snapshot(&self) -> Result<(), CounterError> {
        Ok(())
    }
}

/// Counters stored in Redis. A connection is opened per call; connecting,
/// reading and writing are each bounded by `timeout` so an unreachable cache
/// fails fast instead of stalling the request.
#[derive(Debug, Clone)]
pub struct RedisViewCounter {
    client: redis::Client,
    timeout: Duration,
}

impl RedisViewCounter {
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, CounterError> {
        let client = redis::Client::open(url)?;
        Ok(Self { client, timeout })
    }

    fn connection(&self) -> Result<redis::Connection, CounterError> {
        let connection = self.client.get_connection_with_timeout(self.timeout)?;
        connection.set_read_timeout(Some(self.timeout))?;
        connection.set_write_timeout(Some(self.timeout))?;
        Ok(connection)
    }
}

impl ViewCounter for RedisViewCounter {
    fn initialize(&self, id: ServiceId) -> Result<(), CounterError> {
        let mut connection = self.connection()?;
        connection.set::<_, _, ()>(counter_key(id), 0u64)?;
        Ok(())
    }

    fn increment(&self, id: ServiceId) -> Result<u64, CounterError> {
        let mut connection = self.connection()?;
        Ok(connection.incr(counter_key(id), 1u64)?)
    }

    fn get(&self, id: ServiceId) -> Result<Option<u64>, CounterError> {
        let mut connection = self.connection()?;
        Ok(connection.get(counter_key(id))?)
    }

    fn remove(&self, id: ServiceId) -> Result<(), CounterError> {
        let mut connection = self.connection()?;
        connection.del::<_, ()>(counter_key(id))?;
        Ok(())
    }

    fn persist_snapshot(&self) -> Result<(), CounterError> {
        let mut connection = self.connection()?;
        redis::cmd("SAVE").query::<()>(&mut connection)?;
        Ok(())
    }
}
