use crossbeam::utils::CachePadded;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cheaply clonable 64-bit counter handle.
/// Wraps an `AtomicU64` in `Arc<CachePadded<...>>` to avoid false sharing
/// with the observability reader on another thread.
#[derive(Clone)]
#[repr(transparent)]
pub struct Counter(Arc<CachePadded<AtomicU64>>);

impl Counter {
    pub fn new(initial: u64) -> Self {
        Self(Arc::new(CachePadded::new(AtomicU64::new(initial))))
    }

    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn set(&self, v: u64) {
        self.0.store(v, Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn inc(&self) {
        self.add(1)
    }

    #[inline(always)]
    pub fn add(&self, v: u64) {
        self.0.fetch_add(v, Ordering::Relaxed);
    }

    /// Replace the value, returning the previous one.
    #[inline(always)]
    pub fn swap(&self, v: u64) -> u64 {
        self.0.swap(v, Ordering::Relaxed)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Counter").field(&self.get()).finish()
    }
}

pub struct CounterEntry {
    /// 8-byte little-endian agent id followed by the UTF-8 agent name.
    pub key: Vec<u8>,
    pub label: String,
    pub counter: Counter,
}

/// Per-agent counter directory. Handles stay valid after `close`; the
/// directory itself stops listing them for the observability reader.
pub struct CounterDir {
    agent_id: i64,
    agent_name: String,
    entries: Vec<CounterEntry>,
    closed: bool,
}

impl CounterDir {
    pub fn new(agent_id: i64, agent_name: &str) -> Self {
        Self {
            agent_id,
            agent_name: agent_name.to_string(),
            entries: Vec::with_capacity(8),
            closed: false,
        }
    }

    pub fn register(&mut self, counter_name: &str) -> Counter {
        let mut key = Vec::with_capacity(8 + self.agent_name.len());
        key.extend_from_slice(&self.agent_id.to_le_bytes());
        key.extend_from_slice(self.agent_name.as_bytes());

        let counter = Counter::new(0);
        self.entries.push(CounterEntry {
            key,
            label: format!(
                "{counter_name}: NodeId={} Name={}",
                self.agent_id, self.agent_name
            ),
            counter: counter.clone(),
        });
        counter
    }

    pub fn entries(&self) -> &[CounterEntry] {
        &self.entries
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.entries.clear();
        self.closed = true;
    }
}

/// The fixed counter set every agent publishes.
#[derive(Clone)]
pub struct AgentCounters {
    pub duty_cycles: Counter,
    pub work_done: Counter,
    pub properties_published: Counter,
}

impl AgentCounters {
    pub fn register(dir: &mut CounterDir) -> Self {
        Self {
            duty_cycles: dir.register("TotalDutyCycles"),
            work_done: dir.register("TotalWorkDone"),
            properties_published: dir.register("PropertiesPublished"),
        }
    }
}
