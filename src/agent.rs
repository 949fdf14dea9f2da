//! The base agent: one long-lived unit of work pinned to a thread.
//!
//! Owns the cached clock, property store, timers, pollers, publication
//! registry, proxies, and counters, and wires them into one duty-cycle
//! function. Everything on the duty cycle path is preallocated; after one
//! warm pass no step allocates.

use std::time::Duration;

use crate::adapters::{ControlAdapter, InputAdapter};
use crate::clock::CachedClock;
use crate::codec;
use crate::config::AgentConfig;
use crate::counters::{AgentCounters, CounterDir};
use crate::error::{AgentError, PropertyError, TimerError};
use crate::events::Event;
use crate::hsm;
use crate::ids::CorrelationIds;
use crate::pollers::{
    PRIORITY_CONTROL_STREAM, PRIORITY_INPUT_STREAMS, PRIORITY_PROPERTIES, PRIORITY_TIMERS, Poller,
    PollerRegistry,
};
use crate::properties::{Access, Getter, PropertySlot, PropertyStore, Setter};
use crate::publication::{PublicationConfig, PublicationRegistry, PublishStrategy};
use crate::states::AgentState;
use crate::symbols::{Sym, SymbolTable, sym};
use crate::timers::{TimerEntry, TimerScheduler};
use crate::transport::Transport;
use crate::proxy::{PropertyProxy, StatusProxy};
use crate::value::Value;

const TIMER_CAPACITY: usize = 32;
const POLLER_CAPACITY: usize = 16;
const PUBLICATION_CAPACITY: usize = 32;
const DECODE_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// A single-threaded real-time control agent.
///
/// Not `Send`, not `Clone`: one agent, one thread. The runner drives
/// `on_start`, then `do_work` until [`is_terminating`](Self::is_terminating),
/// then `on_close`.
pub struct BaseAgent<T: Transport> {
    config: AgentConfig,
    transport: T,

    pub(crate) symbols: SymbolTable,
    pub(crate) clock: CachedClock,
    pub(crate) ids: CorrelationIds,
    pub(crate) properties: PropertyStore,
    pub(crate) publications: PublicationRegistry,
    pub(crate) timers: TimerScheduler,
    pub(crate) pollers: PollerRegistry<T>,
    pub(crate) counters: AgentCounters,
    counter_dir: CounterDir,

    status_proxy: Option<StatusProxy<T::Pub>>,
    property_proxy: Option<PropertyProxy<T::Pub>>,

    pub(crate) state: AgentState,
    state_syms: [Sym; AgentState::COUNT],
    entry_counts: [u32; AgentState::COUNT],
    exit_counts: [u32; AgentState::COUNT],

    started: bool,
    terminating: bool,

    messages_processed: u64,
    last_stats_time_ns: i64,
    last_msg_count: u64,
    last_work_count: u64,
    stats_scratch: Value,
    mem_scratch: Value,
    mem_sampler: MemSampler,
}

impl<T: Transport + 'static> BaseAgent<T> {
    pub fn new(config: AgentConfig, transport: T) -> Result<Self, AgentError> {
        if config.name.is_empty() {
            return Err(AgentError::Configuration("agent name is empty".to_string()));
        }
        let mut symbols = SymbolTable::new();

        let mut state_syms = [Sym(0); AgentState::COUNT];
        for s in AgentState::ALL {
            state_syms[s.index()] = symbols.intern(crate::hsm::StateSet::name(s));
        }

        let mut counter_dir = CounterDir::new(config.node_id, &config.name);
        let counters = AgentCounters::register(&mut counter_dir);

        let mut properties = PropertyStore::new();
        let log_key = symbols.intern("LogLevel");
        properties.define(
            PropertySlot::new(
                log_key,
                Value::Str(config.log_level.clone()),
                Access::READ_WRITE,
            )
            .with_setter(validate_log_level),
        )?;

        let ids = CorrelationIds::new(config.node_id);

        Ok(Self {
            transport,
            symbols,
            clock: CachedClock::system(),
            ids,
            properties,
            publications: PublicationRegistry::with_capacity(PUBLICATION_CAPACITY),
            timers: TimerScheduler::with_capacity(TIMER_CAPACITY),
            pollers: PollerRegistry::with_capacity(POLLER_CAPACITY),
            counters,
            counter_dir,
            status_proxy: None,
            property_proxy: None,
            state: AgentState::Root,
            state_syms,
            entry_counts: [0; AgentState::COUNT],
            exit_counts: [0; AgentState::COUNT],
            started: false,
            terminating: false,
            messages_processed: 0,
            last_stats_time_ns: 0,
            last_msg_count: 0,
            last_work_count: 0,
            stats_scratch: Value::Tuple(vec![
                Value::Float(0.0),
                Value::Float(0.0),
                Value::Int(0),
            ]),
            mem_scratch: Value::Tuple(vec![Value::Int(0), Value::Int(0)]),
            mem_sampler: MemSampler::new(),
            config,
        })
    }

    // ---- introspection ----------------------------------------------------

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn node_id(&self) -> i64 {
        self.config.node_id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn now_ns(&self) -> i64 {
        self.clock.now_ns()
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    pub fn counters(&self) -> &AgentCounters {
        &self.counters
    }

    pub fn counter_dir(&self) -> &CounterDir {
        &self.counter_dir
    }

    /// Swap in a different clock (manual clocks for tests and replay).
    /// Only sensible before `on_start`.
    pub fn set_clock(&mut self, clock: CachedClock) {
        self.clock = clock;
    }

    pub fn clock_mut(&mut self) -> &mut CachedClock {
        &mut self.clock
    }

    /// Cumulative `on_entry` count per state.
    pub fn entry_count(&self, state: AgentState) -> u32 {
        self.entry_counts[state.index()]
    }

    /// Cumulative `on_exit` count per state.
    pub fn exit_count(&self, state: AgentState) -> u32 {
        self.exit_counts[state.index()]
    }

    pub fn messages_processed(&self) -> u64 {
        self.messages_processed
    }

    pub(crate) fn state_sym(&self, state: AgentState) -> Sym {
        self.state_syms[state.index()]
    }

    pub(crate) fn symbol_name(&self, sym: Sym) -> &str {
        self.symbols.name(sym)
    }

    pub(crate) fn heartbeat_period_ns(&self) -> i64 {
        self.config.heartbeat_period_ns
    }

    pub(crate) fn note_entry(&mut self, state: AgentState) {
        self.entry_counts[state.index()] += 1;
    }

    pub(crate) fn note_exit(&mut self, state: AgentState) {
        self.exit_counts[state.index()] += 1;
    }

    pub(crate) fn raise_termination(&mut self) {
        self.terminating = true;
    }

    // ---- symbols & properties ---------------------------------------------

    pub fn intern(&mut self, name: &str) -> Sym {
        self.symbols.intern(name)
    }

    pub fn define_property(
        &mut self,
        name: &str,
        initial: Value,
        access: Access,
    ) -> Result<Sym, AgentError> {
        self.define_property_with(name, initial, access, None, None)
    }

    pub fn define_property_with(
        &mut self,
        name: &str,
        initial: Value,
        access: Access,
        setter: Option<Setter>,
        getter: Option<Getter>,
    ) -> Result<Sym, AgentError> {
        let key = self.symbols.intern(name);
        let mut slot = PropertySlot::new(key, initial, access);
        if let Some(setter) = setter {
            slot = slot.with_setter(setter);
        }
        if let Some(getter) = getter {
            slot = slot.with_getter(getter);
        }
        self.properties.define(slot)?;
        Ok(key)
    }

    pub fn has_property(&self, key: Sym) -> bool {
        self.properties.contains(key)
    }

    /// Internal write with the cached clock's timestamp.
    pub fn set_property(&mut self, key: Sym, value: Value) -> Result<(), AgentError> {
        let now = self.clock.now_ns();
        self.properties.store(key, value, now, &self.symbols)?;
        Ok(())
    }

    pub fn property(&self, key: Sym) -> Result<&Value, AgentError> {
        Ok(self.properties.value(key, &self.symbols)?)
    }

    pub fn property_ts(&self, key: Sym) -> Result<i64, AgentError> {
        Ok(self.properties.last_update_ns(key, &self.symbols)?)
    }

    // ---- publications -----------------------------------------------------

    /// Register a (property, stream, strategy) triple. The stream index is
    /// 1-based and validated against the configured output streams.
    pub fn register_publication(
        &mut self,
        field: &str,
        stream_index: usize,
        strategy: PublishStrategy,
    ) -> Result<(), AgentError> {
        let key = self
            .symbols
            .lookup(field)
            .filter(|k| self.properties.contains(*k))
            .ok_or_else(|| PropertyError::NotFound(field.to_string()))?;
        if stream_index == 0 || stream_index > self.config.pub_data.len() {
            return Err(AgentError::StreamNotFound {
                name: field.to_string(),
                index: stream_index,
            });
        }
        let now = self.clock.now_ns();
        self.publications
            .push(PublicationConfig::new(key, stream_index, strategy, now));
        Ok(())
    }

    pub fn publication_count(&self) -> usize {
        self.publications.len()
    }

    // ---- timers -------------------------------------------------------------

    pub fn schedule(&mut self, delay_ns: i64, event: Sym) -> Result<i64, AgentError> {
        if delay_ns < 0 {
            return Err(TimerError::Invalid(format!("negative delay {delay_ns}")).into());
        }
        let deadline = self.clock.now_ns() + delay_ns;
        self.schedule_at(deadline, event)
    }

    pub fn schedule_at(&mut self, deadline_ns: i64, event: Sym) -> Result<i64, AgentError> {
        let id = self.ids.next_id();
        self.timers.insert(id, deadline_ns, event)?;
        Ok(id)
    }

    pub fn cancel_timer(&mut self, id: i64) -> Result<(), AgentError> {
        Ok(self.timers.cancel_id(id)?)
    }

    /// Cancel every timer carrying this event name. Returns the count.
    pub fn cancel_timer_event(&mut self, event: Sym) -> usize {
        self.timers.cancel_event(event)
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    // ---- pollers ------------------------------------------------------------

    /// Queue a poller; it first runs on the next duty cycle.
    pub fn register_poller(
        &mut self,
        name: &str,
        priority: i32,
        poller: Box<dyn Poller<T>>,
    ) -> Result<(), AgentError> {
        self.pollers.register(name, priority, poller)
    }

    /// Queue a poller removal; it last runs on the current cycle.
    pub fn unregister_poller(&mut self, name: &str) {
        self.pollers.unregister(name)
    }

    /// Immediately drop every poller, built-ins included.
    pub fn clear_pollers(&mut self) -> usize {
        self.pollers.clear()
    }

    pub fn poller_count(&self) -> usize {
        self.pollers.len()
    }

    pub fn has_poller(&self, name: &str) -> bool {
        self.pollers.contains(name)
    }

    // ---- lifecycle ----------------------------------------------------------

    /// Create proxies and adapters, register the built-in pollers, schedule
    /// the recurring timers, and dispatch `AgentStarted`.
    pub fn on_start(&mut self) -> Result<(), AgentError> {
        if self.started {
            return Err(AgentError::State {
                current: crate::hsm::StateSet::name(self.state),
                attempted: "on_start",
            });
        }
        self.clock.refresh();

        let status_pub = self
            .transport
            .add_publication(&self.config.status.uri, self.config.status.stream_id)?;
        self.status_proxy = Some(StatusProxy::new(status_pub, self.config.name.clone()));

        let mut data_pubs = Vec::with_capacity(self.config.pub_data.len());
        for ep in &self.config.pub_data {
            data_pubs.push(self.transport.add_publication(&ep.uri, ep.stream_id)?);
        }
        self.property_proxy = Some(PropertyProxy::new(data_pubs, self.config.name.clone()));

        let control_sub = self
            .transport
            .add_subscription(&self.config.control.uri, self.config.control.stream_id)?;
        self.pollers.register(
            "control_stream",
            PRIORITY_CONTROL_STREAM,
            Box::new(ControlAdapter::<T>::new(control_sub)),
        )?;

        if !self.config.sub_data.is_empty() {
            let mut subs = Vec::with_capacity(self.config.sub_data.len());
            for ep in &self.config.sub_data {
                subs.push(self.transport.add_subscription(&ep.uri, ep.stream_id)?);
            }
            self.pollers.register(
                "input_streams",
                PRIORITY_INPUT_STREAMS,
                Box::new(InputAdapter::<T>::new(subs)),
            )?;
        }

        self.pollers
            .register("properties", PRIORITY_PROPERTIES, Box::new(PropertiesPoller))?;
        self.pollers.register(
            "timers",
            PRIORITY_TIMERS,
            Box::new(TimersPoller::with_capacity(TIMER_CAPACITY)),
        )?;
        self.pollers.apply();

        self.schedule(0, sym::HEARTBEAT)?;
        self.schedule(self.config.stats_period_ns, sym::STATS_UPDATE)?;
        self.schedule(self.config.mem_stats_period_ns, sym::MEM_STATS)?;
        self.last_stats_time_ns = self.clock.now_ns();

        hsm::init(self)?;
        self.started = true;
        tracing::info!(agent = %self.config.name, node_id = self.config.node_id, "agent started");
        self.dispatch_named(sym::AGENT_STARTED);
        Ok(())
    }

    /// One duty cycle: refresh the clock, run every active poller in
    /// priority order, fold in deferred poller changes, bump counters.
    pub fn do_work(&mut self) -> u32 {
        self.clock.refresh();

        let mut work: u32 = 0;
        let cycle_len = self.pollers.len();
        for i in 0..cycle_len {
            // the slot is emptied for the duration of the call so the
            // poller and the agent borrow independently
            let Some(mut poller) = self.pollers.take_slot(i) else {
                continue;
            };
            work += poller.poll(self);
            self.pollers.return_slot(i, poller);
        }
        self.pollers.apply();

        self.counters.duty_cycles.inc();
        self.counters.work_done.add(work as u64);
        work
    }

    /// Cancel timers, drop pollers and proxies, close the counter
    /// directory. Dispatches `AgentOnClose` first so the machine reaches
    /// `Exit`.
    pub fn on_close(&mut self) {
        if !self.started {
            return;
        }
        if self.state != AgentState::Exit {
            self.dispatch_named(sym::AGENT_ON_CLOSE);
        }
        let cancelled = self.timers.cancel_all();
        let removed = self.pollers.clear();
        self.counter_dir.close();
        self.status_proxy = None;
        self.property_proxy = None;
        self.started = false;
        tracing::info!(
            agent = %self.config.name,
            cancelled_timers = cancelled,
            removed_pollers = removed,
            "agent closed"
        );
    }

    // ---- event dispatch -----------------------------------------------------

    /// Route an event through the state machine. Handler errors become
    /// `Error` events; the termination sentinel sets the terminating flag.
    pub fn dispatch(&mut self, event: &Event<'_>) -> bool {
        match hsm::dispatch(self, event) {
            Ok(handled) => handled,
            Err(AgentError::Termination) => {
                self.terminating = true;
                true
            }
            Err(err) => {
                let now = self.clock.now_ns();
                let fault = Event::fault(event.tag, &err, now);
                match hsm::dispatch(self, &fault) {
                    Ok(_) => {}
                    Err(AgentError::Termination) => self.terminating = true,
                    Err(second) => {
                        tracing::error!(error = %second, "error handler failed; event dropped")
                    }
                }
                true
            }
        }
    }

    pub fn dispatch_named(&mut self, tag: Sym) -> bool {
        let now = self.clock.now_ns();
        self.dispatch(&Event::named(tag, now))
    }

    /// Decode one reassembled inbound message and dispatch it as an event
    /// keyed by the message key. Control messages are tag-filtered; stale
    /// messages dispatch as `LateMessage` instead.
    pub(crate) fn on_inbound_message(&mut self, bytes: &[u8], control: bool) {
        let msg = match codec::decode(bytes, &mut self.symbols) {
            Ok(msg) => msg,
            Err(e) => {
                crate::warn_throttled!(DECODE_LOG_INTERVAL, "dropping undecodable message: {e}");
                return;
            }
        };

        if control
            && let Some(filter) = &self.config.control_filter
            && !filter.is_empty()
            && msg.tag != filter.as_str()
        {
            return;
        }

        self.messages_processed += 1;
        let now = self.clock.now_ns();

        if let Some(threshold) = self.config.late_message_threshold_ns
            && msg.timestamp_ns >= 0
            && now - msg.timestamp_ns > threshold
        {
            let late = Event {
                tag: sym::LATE_MESSAGE,
                timestamp_ns: msg.timestamp_ns,
                correlation_id: msg.correlation_id,
                payload: crate::events::Payload::None,
            };
            self.dispatch(&late);
            return;
        }

        let event = Event::with_value(msg.key, &msg.value, msg.timestamp_ns, msg.correlation_id);
        self.dispatch(&event);
    }

    // ---- publishing ---------------------------------------------------------

    /// Publish a status event. A zero correlation id is replaced with a
    /// fresh one.
    pub(crate) fn publish_status(&mut self, key: Sym, value: &Value, correlation_id: i64) -> bool {
        let now = self.clock.now_ns();
        let id = if correlation_id != 0 {
            correlation_id
        } else {
            self.ids.next_id()
        };
        match self.status_proxy.as_mut() {
            Some(proxy) => proxy.publish_event(key, value, &self.symbols, now, id),
            None => false,
        }
    }

    /// Publish the property behind a publication config on its data stream.
    pub(crate) fn publish_property_indexed(&mut self, index: usize) -> Result<(), AgentError> {
        let now = self.clock.now_ns();
        let Some(cfg) = self.publications.get(index) else {
            return Ok(());
        };
        let field = cfg.field;
        let stream_index = cfg.stream_index;
        let id = self.ids.next_id();

        let Some(proxy) = self.property_proxy.as_mut() else {
            return Err(AgentError::CommunicationNotInitialized {
                op: "publish property",
            });
        };
        let value = self.properties.value(field, &self.symbols)?;
        proxy.publish(stream_index, field, value, &self.symbols, now, id);
        Ok(())
    }

    /// Publish every readable property as an event response.
    pub(crate) fn publish_readable_properties(&mut self, correlation_id: i64) {
        for i in 0..self.properties.len() {
            let Some(slot) = self.properties.slot(i) else {
                break;
            };
            if !slot.access().is_readable() {
                continue;
            }
            let key = slot.key();
            let value = self
                .properties
                .read(key, &self.symbols)
                .unwrap_or(Value::Nothing);
            self.publish_status(key, &value, correlation_id);
        }
    }

    /// Root default handler: an event named after a property key is a read
    /// (no value) or a write (value present), echoed back either way.
    pub(crate) fn handle_property_event(
        &mut self,
        key: Sym,
        event: &Event<'_>,
    ) -> Result<(), AgentError> {
        if let Some(value) = event.value() {
            let now = self.clock.now_ns();
            self.properties
                .write(key, value.clone(), now, &self.symbols)?;
        }
        let echo = self
            .properties
            .read(key, &self.symbols)
            .unwrap_or(Value::Nothing);
        self.publish_status(key, &echo, event.correlation_id);
        Ok(())
    }

    // ---- derived stats --------------------------------------------------------

    pub(crate) fn handle_stats_update(&mut self) {
        let now = self.clock.now_ns();
        let elapsed = (now - self.last_stats_time_ns).max(1);
        let msgs = self.messages_processed;
        let work = self.counters.work_done.get();

        let msg_rate = (msgs - self.last_msg_count) as f64 * 1e9 / elapsed as f64;
        let work_rate = (work - self.last_work_count) as f64 * 1e9 / elapsed as f64;
        self.last_stats_time_ns = now;
        self.last_msg_count = msgs;
        self.last_work_count = work;

        if let Value::Tuple(items) = &mut self.stats_scratch {
            items[0] = Value::Float(msg_rate);
            items[1] = Value::Float(work_rate);
            items[2] = Value::Int(self.counters.duty_cycles.get() as i64);
        }
        tracing::debug!(msg_rate, work_rate, "stats update");

        let id = self.ids.next_id();
        if let Some(proxy) = self.status_proxy.as_mut() {
            proxy.publish_event(sym::STATS_UPDATE, &self.stats_scratch, &self.symbols, now, id);
        }
        if let Err(e) = self.schedule(self.config.stats_period_ns, sym::STATS_UPDATE) {
            tracing::warn!(error = %e, "failed to reschedule stats timer");
        }
    }

    pub(crate) fn handle_mem_stats(&mut self) {
        let now = self.clock.now_ns();
        if let Some((virtual_bytes, resident_bytes)) = self.mem_sampler.sample() {
            if let Value::Tuple(items) = &mut self.mem_scratch {
                items[0] = Value::Int(virtual_bytes);
                items[1] = Value::Int(resident_bytes);
            }
            let id = self.ids.next_id();
            if let Some(proxy) = self.status_proxy.as_mut() {
                proxy.publish_event(sym::MEM_STATS, &self.mem_scratch, &self.symbols, now, id);
            }
        }
        if let Err(e) = self.schedule(self.config.mem_stats_period_ns, sym::MEM_STATS) {
            tracing::warn!(error = %e, "failed to reschedule mem-stats timer");
        }
    }
}

fn validate_log_level(value: &Value) -> Result<(), PropertyError> {
    use std::str::FromStr;
    match value {
        Value::Str(s) if tracing::Level::from_str(s).is_ok() => Ok(()),
        Value::Str(s) => Err(PropertyError::Validation {
            name: "LogLevel".to_string(),
            message: format!("unknown level {s:?}"),
        }),
        _ => Ok(()),
    }
}

/// Built-in poller: fires due timers as events. Due entries are drained
/// into a scratch list first, so handlers are free to reschedule.
struct TimersPoller {
    due: Vec<TimerEntry>,
}

impl TimersPoller {
    fn with_capacity(cap: usize) -> Self {
        Self {
            due: Vec::with_capacity(cap),
        }
    }
}

impl<T: Transport + 'static> Poller<T> for TimersPoller {
    fn poll(&mut self, agent: &mut BaseAgent<T>) -> u32 {
        let now = agent.clock.now_ns();
        let fired = agent.timers.drain_due(now, &mut self.due);
        for entry in self.due.drain(..) {
            agent.dispatch(&Event::named(entry.event, now));
        }
        fired
    }
}

/// Built-in poller: evaluates every publication config and dispatches
/// `PublishProperty` for each one that is due.
struct PropertiesPoller;

impl<T: Transport + 'static> Poller<T> for PropertiesPoller {
    fn poll(&mut self, agent: &mut BaseAgent<T>) -> u32 {
        let now = agent.clock.now_ns();
        let mut fired = 0;
        for i in 0..agent.publications.len() {
            let Some(cfg) = agent.publications.get(i) else {
                break;
            };
            let field = cfg.field;
            let Ok(ts) = agent.properties.last_update_ns(field, &agent.symbols) else {
                continue;
            };
            if !cfg.is_due(ts, now) {
                continue;
            }

            agent.dispatch(&Event::publication(i, now));
            if let Some(cfg) = agent.publications.get_mut(i) {
                cfg.mark_published(ts, now);
            }
            agent.counters.properties_published.inc();
            fired += 1;
        }
        fired
    }
}

/// Resident/virtual size sampler over `/proc/self/statm`.
///
/// The file is opened once and re-read at offset zero with a fixed buffer,
/// so a sample performs no allocation.
struct MemSampler {
    #[cfg(unix)]
    file: Option<std::fs::File>,
    buf: [u8; 160],
}

impl MemSampler {
    fn new() -> Self {
        Self {
            #[cfg(unix)]
            file: std::fs::File::open("/proc/self/statm").ok(),
            buf: [0; 160],
        }
    }

    #[cfg(unix)]
    fn sample(&mut self) -> Option<(i64, i64)> {
        use std::os::unix::fs::FileExt;

        const PAGE_SIZE: i64 = 4096;

        let file = self.file.as_ref()?;
        let n = file.read_at(&mut self.buf, 0).ok()?;
        let mut fields = [0i64; 2];
        let mut field = 0;
        let mut current: i64 = 0;
        let mut have_digit = false;
        for &b in &self.buf[..n] {
            if b.is_ascii_digit() {
                current = current * 10 + (b - b'0') as i64;
                have_digit = true;
            } else if have_digit {
                fields[field] = current;
                field += 1;
                if field == 2 {
                    break;
                }
                current = 0;
                have_digit = false;
            }
        }
        if field < 2 {
            return None;
        }
        Some((fields[0] * PAGE_SIZE, fields[1] * PAGE_SIZE))
    }

    #[cfg(not(unix))]
    fn sample(&mut self) -> Option<(i64, i64)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mem::MemTransport;

    fn agent() -> BaseAgent<MemTransport> {
        let mut a = BaseAgent::new(AgentConfig::for_agent("t", 1), MemTransport::new()).unwrap();
        a.set_clock(CachedClock::manual(0));
        a
    }

    #[test]
    fn log_level_property_is_validated() {
        let mut a = agent();
        let key = a.symbols.lookup("LogLevel").unwrap();
        assert!(a.set_property(key, Value::Str("debug".to_string())).is_ok());
        assert!(a.set_property(key, Value::Str("loud".to_string())).is_err());
    }

    #[test]
    fn publication_registration_validates_stream_index() {
        let mut a = agent();
        a.define_property("X", Value::Int(0), Access::READ_WRITE)
            .unwrap();
        // no output streams configured
        let err = a
            .register_publication("X", 1, PublishStrategy::OnUpdate)
            .unwrap_err();
        assert!(matches!(err, AgentError::StreamNotFound { .. }));
    }

    #[test]
    fn publication_registration_requires_the_property() {
        let mut a = agent();
        let err = a
            .register_publication("Missing", 1, PublishStrategy::OnUpdate)
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::Property(PropertyError::NotFound(_))
        ));
    }

    #[test]
    fn schedule_rejects_negative_delay() {
        let mut a = agent();
        assert!(matches!(
            a.schedule(-1, sym::HEARTBEAT),
            Err(AgentError::Timer(TimerError::Invalid(_)))
        ));
    }

    #[test]
    fn mem_sampler_reads_something_on_linux() {
        let mut sampler = MemSampler::new();
        if cfg!(target_os = "linux") {
            let (virt, rss) = sampler.sample().unwrap();
            assert!(virt > 0);
            assert!(rss > 0);
        } else {
            let _ = sampler.sample();
        }
    }
}
