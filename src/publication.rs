use crate::symbols::Sym;

/// Sentinel for "never published" / "not scheduled".
pub const NEVER: i64 = -1;

/// When to emit a registered (property, stream) pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PublishStrategy {
    /// Fire when the property was written since the last publish.
    OnUpdate,
    /// Fire on an aligned cadence, first due one interval after
    /// registration.
    Periodic { interval_ns: i64 },
    /// Fire on update, but never within `min_interval_ns` of the previous
    /// publish.
    RateLimited { min_interval_ns: i64 },
    /// Fire exactly once at or after the given instant.
    Scheduled { at_ns: i64 },
}

impl PublishStrategy {
    /// Pure due-check over the config's bookkeeping fields.
    #[inline]
    pub fn should_publish(
        &self,
        last_published_ns: i64,
        next_scheduled_ns: i64,
        property_ts_ns: i64,
        now_ns: i64,
    ) -> bool {
        match *self {
            PublishStrategy::OnUpdate => property_ts_ns > last_published_ns,
            PublishStrategy::Periodic { .. } => {
                next_scheduled_ns == NEVER || now_ns >= next_scheduled_ns
            }
            PublishStrategy::RateLimited { min_interval_ns } => {
                property_ts_ns > last_published_ns
                    && (last_published_ns == NEVER
                        || now_ns - last_published_ns >= min_interval_ns)
            }
            PublishStrategy::Scheduled { at_ns } => now_ns >= at_ns && last_published_ns < at_ns,
        }
    }

    /// Next precomputed fire time, or `NEVER` for unscheduled strategies.
    #[inline]
    pub fn next_time(&self, now_ns: i64) -> i64 {
        match *self {
            PublishStrategy::OnUpdate => NEVER,
            PublishStrategy::Periodic { interval_ns } => now_ns + interval_ns,
            PublishStrategy::RateLimited { min_interval_ns } => now_ns + min_interval_ns,
            PublishStrategy::Scheduled { at_ns } => at_ns,
        }
    }
}

/// Mutable record tying a property to an output stream and a strategy.
#[derive(Debug, Clone)]
pub struct PublicationConfig {
    pub field: Sym,
    /// 1-based index into the agent's output stream set, validated at
    /// registration.
    pub stream_index: usize,
    pub strategy: PublishStrategy,
    pub last_published_ns: i64,
    pub next_scheduled_ns: i64,
}

impl PublicationConfig {
    pub fn new(field: Sym, stream_index: usize, strategy: PublishStrategy, now_ns: i64) -> Self {
        Self {
            field,
            stream_index,
            strategy,
            last_published_ns: NEVER,
            next_scheduled_ns: strategy.next_time(now_ns),
        }
    }

    /// Record a successful publish.
    ///
    /// `last_published_ns` takes `max(property_ts, now)`: at least the
    /// property timestamp so `OnUpdate` stays quiet until the next write
    /// even when the cached clock is frozen, and at least `now` so the
    /// interval strategies keep their pacing. `Periodic` advances its
    /// precomputed fire time by whole intervals (aligned cadence, no burst
    /// catch-up after a stall).
    pub fn mark_published(&mut self, property_ts_ns: i64, now_ns: i64) {
        self.last_published_ns = property_ts_ns.max(now_ns);
        self.next_scheduled_ns = match self.strategy {
            PublishStrategy::Periodic { interval_ns } if interval_ns > 0 => {
                let next = self.next_scheduled_ns;
                let behind = (now_ns - next) / interval_ns + 1;
                next + behind.max(1) * interval_ns
            }
            ref strategy => strategy.next_time(now_ns),
        };
    }

    #[inline]
    pub fn is_due(&self, property_ts_ns: i64, now_ns: i64) -> bool {
        self.strategy.should_publish(
            self.last_published_ns,
            self.next_scheduled_ns,
            property_ts_ns,
            now_ns,
        )
    }
}

/// Registration-ordered set of publication configs.
#[derive(Default)]
pub struct PublicationRegistry {
    configs: Vec<PublicationConfig>,
}

impl PublicationRegistry {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            configs: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, config: PublicationConfig) {
        self.configs.push(config);
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PublicationConfig> {
        self.configs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PublicationConfig> {
        self.configs.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublicationConfig> {
        self.configs.iter()
    }
}
