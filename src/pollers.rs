use crate::agent::BaseAgent;
use crate::error::AgentError;
use crate::transport::Transport;

/// Built-in poller priorities. Lower runs first; custom pollers may slot
/// anywhere between.
pub const PRIORITY_INPUT_STREAMS: i32 = 10;
pub const PRIORITY_PROPERTIES: i32 = 50;
pub const PRIORITY_TIMERS: i32 = 75;
pub const PRIORITY_CONTROL_STREAM: i32 = 200;

/// A unit of per-cycle work. Pollers receive the agent by reference each
/// cycle instead of capturing it.
pub trait Poller<T: Transport> {
    fn poll(&mut self, agent: &mut BaseAgent<T>) -> u32;
}

/// Closure adapter; see [`poller_fn`].
pub struct FnPoller<F>(pub F);

impl<T: Transport, F> Poller<T> for FnPoller<F>
where
    F: FnMut(&mut BaseAgent<T>) -> u32,
{
    fn poll(&mut self, agent: &mut BaseAgent<T>) -> u32 {
        (self.0)(agent)
    }
}

/// Box a closure as a poller.
pub fn poller_fn<T, F>(f: F) -> Box<dyn Poller<T>>
where
    T: Transport,
    F: FnMut(&mut BaseAgent<T>) -> u32 + 'static,
{
    Box::new(FnPoller(f))
}

struct PollerSlot<T: Transport> {
    name: String,
    priority: i32,
    /// Taken out for the duration of its call so the poller and the agent
    /// can be borrowed independently.
    poller: Option<Box<dyn Poller<T>>>,
}

/// Priority-ordered poller list with deferred mutation.
///
/// `register`/`unregister` only touch the pending buffers; [`apply`] folds
/// them into the active list between cycles, so iteration is a plain
/// indexed loop with no reentrancy surprises. `clear` is the one immediate
/// operation.
///
/// [`apply`]: PollerRegistry::apply
pub struct PollerRegistry<T: Transport> {
    active: Vec<PollerSlot<T>>,
    pending_add: Vec<PollerSlot<T>>,
    pending_remove: Vec<String>,
}

impl<T: Transport> PollerRegistry<T> {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            active: Vec::with_capacity(cap),
            pending_add: Vec::with_capacity(cap),
            pending_remove: Vec::with_capacity(cap),
        }
    }

    /// Queue a poller for addition at the end of the current cycle.
    ///
    /// A name already active (and not pending removal) or already pending
    /// addition is rejected; unregister-then-register within one cycle is
    /// allowed.
    pub fn register(
        &mut self,
        name: &str,
        priority: i32,
        poller: Box<dyn Poller<T>>,
    ) -> Result<(), AgentError> {
        let in_active = self.active.iter().any(|s| s.name == name)
            && !self.pending_remove.iter().any(|n| n == name);
        let in_pending = self.pending_add.iter().any(|s| s.name == name);
        if in_active || in_pending {
            return Err(AgentError::DuplicatePoller(name.to_string()));
        }
        self.pending_add.push(PollerSlot {
            name: name.to_string(),
            priority,
            poller: Some(poller),
        });
        Ok(())
    }

    /// Queue a poller for removal. Idempotent; cancels a pending addition
    /// of the same name first.
    pub fn unregister(&mut self, name: &str) {
        if let Some(pos) = self.pending_add.iter().position(|s| s.name == name) {
            self.pending_add.remove(pos);
            return;
        }
        let in_active = self.active.iter().any(|s| s.name == name);
        let already_queued = self.pending_remove.iter().any(|n| n == name);
        if in_active && !already_queued {
            self.pending_remove.push(name.to_string());
        }
    }

    /// Immediate full wipe, built-ins included. Returns the removed count.
    pub fn clear(&mut self) -> usize {
        let n = self.active.len() + self.pending_add.len();
        self.active.clear();
        self.pending_add.clear();
        self.pending_remove.clear();
        n
    }

    /// Fold pending removals, then pending additions, into the active
    /// list. Insertion lands after the last entry of equal priority, so
    /// ties stay FIFO.
    pub fn apply(&mut self) {
        if !self.pending_remove.is_empty() {
            let mut removals = std::mem::take(&mut self.pending_remove);
            self.active.retain(|s| !removals.iter().any(|n| n == &s.name));
            removals.clear();
            self.pending_remove = removals;
        }
        if !self.pending_add.is_empty() {
            let mut adds = std::mem::take(&mut self.pending_add);
            for slot in adds.drain(..) {
                let pos = self
                    .active
                    .partition_point(|s| s.priority <= slot.priority);
                self.active.insert(pos, slot);
            }
            self.pending_add = adds;
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.active.iter().any(|s| s.name == name)
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.active.get(index).map(|s| s.name.as_str())
    }

    pub fn priority_at(&self, index: usize) -> Option<i32> {
        self.active.get(index).map(|s| s.priority)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(|s| s.name.as_str())
    }

    /// Borrow the poller at `index` out of its slot for one call.
    pub(crate) fn take_slot(&mut self, index: usize) -> Option<Box<dyn Poller<T>>> {
        self.active.get_mut(index).and_then(|s| s.poller.take())
    }

    /// Put a poller back after its call. Dropped silently if the registry
    /// was cleared while the poller ran.
    pub(crate) fn return_slot(&mut self, index: usize, poller: Box<dyn Poller<T>>) {
        if let Some(slot) = self.active.get_mut(index) {
            slot.poller = Some(poller);
        }
    }
}
