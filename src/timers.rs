use crate::error::TimerError;
use crate::symbols::Sym;

/// One pending timer. Fires at most once per scheduling; recurring timers
/// are handlers that reschedule themselves.
#[derive(Debug, Clone, Copy)]
pub struct TimerEntry {
    pub id: i64,
    pub deadline_ns: i64,
    pub event: Sym,
}

/// Polled timer set, ordered by deadline then insertion.
///
/// The pending list is kept sorted on insert so a poll is a prefix drain.
pub struct TimerScheduler {
    pending: Vec<TimerEntry>,
}

impl TimerScheduler {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            pending: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_deadline_ns(&self) -> Option<i64> {
        self.pending.first().map(|e| e.deadline_ns)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.pending.iter().any(|e| e.id == id)
    }

    /// Insert a timer with a caller-supplied id.
    pub fn insert(&mut self, id: i64, deadline_ns: i64, event: Sym) -> Result<(), TimerError> {
        if deadline_ns < 0 {
            return Err(TimerError::Scheduling {
                reason: "deadline before epoch".to_string(),
                deadline_ns,
            });
        }
        if self.contains(id) {
            return Err(TimerError::Invalid(format!("duplicate timer id {id}")));
        }
        // after the last entry with the same deadline keeps insertion order
        let pos = self
            .pending
            .partition_point(|e| e.deadline_ns <= deadline_ns);
        self.pending.insert(
            pos,
            TimerEntry {
                id,
                deadline_ns,
                event,
            },
        );
        Ok(())
    }

    pub fn cancel_id(&mut self, id: i64) -> Result<(), TimerError> {
        match self.pending.iter().position(|e| e.id == id) {
            Some(pos) => {
                self.pending.remove(pos);
                Ok(())
            }
            None => Err(TimerError::NotFound(id)),
        }
    }

    /// Remove every timer carrying the event name. Returns the count.
    pub fn cancel_event(&mut self, event: Sym) -> usize {
        let before = self.pending.len();
        self.pending.retain(|e| e.event != event);
        before - self.pending.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// Move every due entry (deadline ≤ now) into `out`, preserving the
    /// deadline-then-insertion order. Returns the count.
    pub fn drain_due(&mut self, now_ns: i64, out: &mut Vec<TimerEntry>) -> u32 {
        let k = self.pending.partition_point(|e| e.deadline_ns <= now_ns);
        out.extend(self.pending.drain(..k));
        k as u32
    }
}
