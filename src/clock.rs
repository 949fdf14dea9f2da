use std::time::{SystemTime, UNIX_EPOCH};

#[inline(always)]
pub fn epoch_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as i64
}

/// Epoch clock refreshed once per duty cycle and read many times.
///
/// The cached value never decreases. A manual clock (tests, replay) is
/// stepped explicitly and ignores `refresh`.
#[derive(Debug)]
pub struct CachedClock {
    now_ns: i64,
    manual: bool,
}

impl CachedClock {
    pub fn system() -> Self {
        Self {
            now_ns: epoch_nanos(),
            manual: false,
        }
    }

    pub fn manual(start_ns: i64) -> Self {
        Self {
            now_ns: start_ns,
            manual: true,
        }
    }

    #[inline(always)]
    pub fn refresh(&mut self) {
        if !self.manual {
            self.now_ns = self.now_ns.max(epoch_nanos());
        }
    }

    #[inline(always)]
    pub fn now_ns(&self) -> i64 {
        self.now_ns
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// Step a manual clock forward. No-op on a system clock.
    pub fn advance(&mut self, delta_ns: i64) {
        if self.manual {
            self.now_ns += delta_ns.max(0);
        }
    }

    pub fn set(&mut self, now_ns: i64) {
        if self.manual {
            self.now_ns = self.now_ns.max(now_ns);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_steps_and_never_rewinds() {
        let mut clock = CachedClock::manual(1_000);
        assert_eq!(clock.now_ns(), 1_000);

        clock.advance(500);
        assert_eq!(clock.now_ns(), 1_500);

        clock.refresh();
        assert_eq!(clock.now_ns(), 1_500);

        clock.set(200);
        assert_eq!(clock.now_ns(), 1_500);
    }

    #[test]
    fn system_clock_is_monotone_across_refreshes() {
        let mut clock = CachedClock::system();
        let first = clock.now_ns();
        clock.refresh();
        assert!(clock.now_ns() >= first);
    }
}
