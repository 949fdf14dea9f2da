//! Drives an agent's duty-cycle loop on the current or a dedicated thread.
//!
//! The loop never blocks: zero-work cycles escalate through a
//! spin / yield / short-sleep ladder and reset on the first productive
//! cycle. TERM signals and the agent's own termination flag both end the
//! loop through `on_close`.

use anyhow::{Context, Result, anyhow};
use core_affinity::{CoreId, get_core_ids, set_for_current};
use serde::{Deserialize, Serialize};
use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;
use std::hint::spin_loop;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::agent::BaseAgent;
use crate::transport::Transport;

/// Runner knobs. Kept small and explicit.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Logical CPU core to pin the agent thread to (`None` = no pinning).
    pub core_id: Option<usize>,

    /// Zero-work cycles before escalating from spinning to yielding
    /// (`None` = 64).
    pub idle_spins: Option<u32>,

    /// Zero-work cycles before escalating from yielding to sleeping
    /// (`None` = 256).
    pub idle_yields: Option<u32>,

    /// Sleep length once fully idle, in microseconds (`None` = 2).
    pub idle_sleep_us: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            core_id: None,
            idle_spins: None,
            idle_yields: None,
            idle_sleep_us: None,
        }
    }
}

pub fn try_pin_core(core_id: usize) -> Result<usize> {
    if let Some(core_ids) = get_core_ids()
        && core_ids.len() > core_id
        && set_for_current(CoreId { id: core_id })
    {
        return Ok(core_id);
    }
    Err(anyhow!("failed to pin core {core_id}"))
}

/// Run an agent to completion on the current thread:
/// `on_start` → duty cycles → `on_close`.
pub fn run<T: Transport + 'static>(agent: &mut BaseAgent<T>, cfg: &RunnerConfig) -> Result<()> {
    let idle_spins = cfg.idle_spins.unwrap_or(64);
    let idle_yields = cfg.idle_yields.unwrap_or(256);
    let idle_sleep = Duration::from_micros(cfg.idle_sleep_us.unwrap_or(2));

    let term_flag = Arc::new(AtomicBool::new(false));
    for sig in TERM_SIGNALS {
        let _ = flag::register(*sig, term_flag.clone());
    }

    if let Some(core_id) = cfg.core_id {
        let pinned = try_pin_core(core_id).context("cannot pin agent core")?;
        tracing::info!(core = pinned, agent = agent.name(), "pinned to core");
    }

    agent
        .on_start()
        .map_err(|e| anyhow!("agent start failed: {e}"))?;

    let mut idle: u32 = 0;
    loop {
        if term_flag.load(Ordering::Relaxed) {
            tracing::warn!(agent = agent.name(), "termination signal received");
            break;
        }
        if agent.is_terminating() {
            tracing::info!(agent = agent.name(), "agent requested termination");
            break;
        }

        let work = agent.do_work();
        if work > 0 {
            idle = 0;
        } else {
            idle = idle.saturating_add(1);
            if idle < idle_spins {
                spin_loop();
            } else if idle < idle_yields {
                thread::yield_now();
            } else {
                thread::sleep(idle_sleep);
            }
        }
    }

    agent.on_close();
    Ok(())
}

/// Handle to an agent thread spawned by [`spawn`].
pub struct RunnerHandle {
    join: Option<thread::JoinHandle<Result<()>>>,
}

impl RunnerHandle {
    pub fn join(mut self) -> Result<()> {
        match self.join.take() {
            Some(join) => join.join().map_err(|_| anyhow!("agent thread panicked"))?,
            None => Ok(()),
        }
    }
}

/// Build and run an agent on a dedicated thread. The agent is constructed
/// inside the thread, so only the builder needs to be `Send`.
pub fn spawn<T, F>(cfg: RunnerConfig, build: F) -> RunnerHandle
where
    T: Transport + 'static,
    F: FnOnce() -> Result<BaseAgent<T>> + Send + 'static,
{
    let join = thread::spawn(move || {
        let mut agent = build()?;
        run(&mut agent, &cfg)
    });
    RunnerHandle { join: Some(join) }
}
