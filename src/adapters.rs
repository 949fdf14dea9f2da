use crate::agent::BaseAgent;
use crate::pollers::Poller;
use crate::transport::{FragmentAssembler, Subscription, Transport};

const CONTROL_FRAGMENT_LIMIT: usize = 1;
const INPUT_FRAGMENT_LIMIT: usize = 10;
const ASSEMBLY_CAPACITY: usize = 16 * 1024;

/// Polls the control subscription and dispatches each decoded message as an
/// event keyed by the message key. One fragment per cycle keeps control
/// traffic from starving data pollers.
pub struct ControlAdapter<T: Transport> {
    sub: T::Sub,
    assembler: FragmentAssembler,
    fragment_limit: usize,
}

impl<T: Transport> ControlAdapter<T> {
    pub fn new(sub: T::Sub) -> Self {
        Self {
            sub,
            assembler: FragmentAssembler::with_capacity(ASSEMBLY_CAPACITY),
            fragment_limit: CONTROL_FRAGMENT_LIMIT,
        }
    }
}

impl<T: Transport + 'static> Poller<T> for ControlAdapter<T> {
    fn poll(&mut self, agent: &mut BaseAgent<T>) -> u32 {
        let limit = self.fragment_limit;
        let Self {
            sub, assembler, ..
        } = self;
        sub.poll(
            &mut |data, flags| {
                assembler.on_frame(data, flags, &mut |msg| {
                    agent.on_inbound_message(msg, true);
                })
            },
            limit,
        )
    }
}

/// Polls every input data subscription with a per-cycle fragment budget.
pub struct InputAdapter<T: Transport> {
    subs: Vec<T::Sub>,
    assembler: FragmentAssembler,
    fragment_limit: usize,
}

impl<T: Transport> InputAdapter<T> {
    pub fn new(subs: Vec<T::Sub>) -> Self {
        Self {
            subs,
            assembler: FragmentAssembler::with_capacity(ASSEMBLY_CAPACITY),
            fragment_limit: INPUT_FRAGMENT_LIMIT,
        }
    }
}

impl<T: Transport + 'static> Poller<T> for InputAdapter<T> {
    fn poll(&mut self, agent: &mut BaseAgent<T>) -> u32 {
        let limit = self.fragment_limit;
        let Self {
            subs, assembler, ..
        } = self;
        let mut work = 0;
        for sub in subs.iter_mut() {
            work += sub.poll(
                &mut |data, flags| {
                    assembler.on_frame(data, flags, &mut |msg| {
                        agent.on_inbound_message(msg, false);
                    })
                },
                limit,
            );
        }
        work
    }
}
