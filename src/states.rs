//! Fixed state topology of the base agent and its event handlers.
//!
//! ```text
//! Root
//! ├── Startup            — initial child of Root
//! ├── Top                — operational superstate
//! │   ├── Ready          — initial child of Top
//! │   │   ├── Stopped    — initial child of Ready
//! │   │   └── Processing
//! │   │       ├── Paused — initial child of Processing
//! │   │       └── Playing
//! │   ├── Error
//! │   └── Exit           — terminal
//! ```

use crate::agent::BaseAgent;
use crate::error::AgentError;
use crate::events::{Event, Payload};
use crate::hsm::{Automaton, Outcome, StateSet};
use crate::symbols::sym;
use crate::transport::Transport;
use crate::value::Value;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(usize)]
pub enum AgentState {
    Root = 0,
    Startup = 1,
    Top = 2,
    Ready = 3,
    Stopped = 4,
    Processing = 5,
    Paused = 6,
    Playing = 7,
    Error = 8,
    Exit = 9,
}

impl AgentState {
    pub const COUNT: usize = 10;

    pub const ALL: [AgentState; Self::COUNT] = [
        AgentState::Root,
        AgentState::Startup,
        AgentState::Top,
        AgentState::Ready,
        AgentState::Stopped,
        AgentState::Processing,
        AgentState::Paused,
        AgentState::Playing,
        AgentState::Error,
        AgentState::Exit,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl StateSet for AgentState {
    fn parent(self) -> Option<Self> {
        match self {
            AgentState::Root => None,
            AgentState::Startup | AgentState::Top => Some(AgentState::Root),
            AgentState::Ready | AgentState::Error | AgentState::Exit => Some(AgentState::Top),
            AgentState::Stopped | AgentState::Processing => Some(AgentState::Ready),
            AgentState::Paused | AgentState::Playing => Some(AgentState::Processing),
        }
    }

    fn initial(self) -> Option<Self> {
        match self {
            AgentState::Root => Some(AgentState::Startup),
            AgentState::Top => Some(AgentState::Ready),
            AgentState::Ready => Some(AgentState::Stopped),
            AgentState::Processing => Some(AgentState::Paused),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AgentState::Root => "Root",
            AgentState::Startup => "Startup",
            AgentState::Top => "Top",
            AgentState::Ready => "Ready",
            AgentState::Stopped => "Stopped",
            AgentState::Processing => "Processing",
            AgentState::Paused => "Paused",
            AgentState::Playing => "Playing",
            AgentState::Error => "Error",
            AgentState::Exit => "Exit",
        }
    }
}

impl<T: Transport + 'static> Automaton for BaseAgent<T> {
    type State = AgentState;

    fn state(&self) -> AgentState {
        self.state
    }

    fn set_state(&mut self, next: AgentState) {
        self.state = next;
    }

    fn handle(
        &mut self,
        state: AgentState,
        event: &Event<'_>,
    ) -> Result<Outcome<AgentState>, AgentError> {
        use AgentState::*;

        Ok(match (state, event.tag) {
            (Startup, t) if t == sym::AGENT_STARTED => Outcome::Transition(Top),

            (Stopped | Paused, t) if t == sym::PLAY => Outcome::Transition(Playing),
            (Playing | Stopped, t) if t == sym::PAUSE => Outcome::Transition(Paused),
            (Processing, t) if t == sym::STOP => Outcome::Transition(Stopped),
            (Ready, t) if t == sym::RESET => Outcome::Transition(Ready),

            (Playing, t) if t == sym::PUBLISH_PROPERTY => {
                if let Payload::Publication(index) = event.payload {
                    self.publish_property_indexed(index)?;
                }
                Outcome::Handled
            }

            (Top, t) if t == sym::HEARTBEAT => {
                let leaf = Value::Symbol(self.state_sym(self.state));
                self.publish_status(sym::HEARTBEAT, &leaf, event.correlation_id);
                self.schedule(self.heartbeat_period_ns(), sym::HEARTBEAT)?;
                Outcome::Handled
            }

            (Top, t) if t == sym::STATE => {
                let leaf = Value::Symbol(self.state_sym(self.state));
                self.publish_status(sym::STATE, &leaf, event.correlation_id);
                Outcome::Handled
            }

            (Top, t) if t == sym::ERROR => {
                if let Payload::Fault { source, error } = &event.payload {
                    tracing::warn!(
                        source = self.symbol_name(*source),
                        error = %error,
                        "agent error"
                    );
                    let text = Value::Str(error.to_string());
                    self.publish_status(sym::ERROR, &text, event.correlation_id);
                }
                Outcome::Handled
            }

            (Top, t) if t == sym::AGENT_ON_CLOSE || t == sym::EXIT => Outcome::Transition(Exit),

            (Top, t) if t == sym::LATE_MESSAGE => {
                self.publish_status(sym::LATE_MESSAGE, &Value::Nothing, event.correlation_id);
                Outcome::Handled
            }

            (Top, t) if t == sym::PROPERTIES => {
                self.publish_readable_properties(event.correlation_id);
                Outcome::Handled
            }

            (Top, t) if t == sym::STATS_UPDATE => {
                self.handle_stats_update();
                Outcome::Handled
            }

            (Top, t) if t == sym::MEM_STATS => {
                self.handle_mem_stats();
                Outcome::Handled
            }

            // default: any event named after a property key is a read or
            // write of that property
            (Root, t) if self.has_property(t) => {
                self.handle_property_event(t, event)?;
                Outcome::Handled
            }

            _ => Outcome::Unhandled,
        })
    }

    fn on_entry(&mut self, state: AgentState) -> Result<(), AgentError> {
        self.note_entry(state);
        tracing::trace!(state = state.name(), "enter");
        if state == AgentState::Exit {
            self.raise_termination();
        }
        Ok(())
    }

    fn on_exit(&mut self, state: AgentState) -> Result<(), AgentError> {
        self.note_exit(state);
        tracing::trace!(state = state.name(), "exit");
        Ok(())
    }

    fn on_leaf_change(&mut self, from: AgentState, to: AgentState) {
        tracing::debug!(from = from.name(), to = to.name(), "state change");
        let leaf = Value::Symbol(self.state_sym(to));
        self.publish_status(sym::STATE_CHANGE, &leaf, 0);
    }
}
