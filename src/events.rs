use crate::error::AgentError;
use crate::symbols::Sym;
use crate::value::Value;

/// Payload carried alongside an event tag. Hot-path variants are plain
/// copies or borrows; nothing here owns heap data.
#[derive(Debug)]
pub enum Payload<'a> {
    None,
    /// Index into the agent's publication registry.
    Publication(usize),
    /// Decoded inbound value, borrowed from the adapter that decoded it.
    Value(&'a Value),
    /// A handler failure being re-dispatched.
    Fault {
        source: Sym,
        error: &'a AgentError,
    },
}

/// An event routed through the state machine. Events are created on the
/// stack per dispatch; handlers receive them by reference.
#[derive(Debug)]
pub struct Event<'a> {
    pub tag: Sym,
    pub timestamp_ns: i64,
    pub correlation_id: i64,
    pub payload: Payload<'a>,
}

impl<'a> Event<'a> {
    pub fn named(tag: Sym, timestamp_ns: i64) -> Self {
        Self {
            tag,
            timestamp_ns,
            correlation_id: 0,
            payload: Payload::None,
        }
    }

    pub fn publication(index: usize, timestamp_ns: i64) -> Self {
        Self {
            tag: crate::symbols::sym::PUBLISH_PROPERTY,
            timestamp_ns,
            correlation_id: 0,
            payload: Payload::Publication(index),
        }
    }

    pub fn with_value(
        tag: Sym,
        value: &'a Value,
        timestamp_ns: i64,
        correlation_id: i64,
    ) -> Self {
        Self {
            tag,
            timestamp_ns,
            correlation_id,
            payload: Payload::Value(value),
        }
    }

    pub fn fault(source: Sym, error: &'a AgentError, timestamp_ns: i64) -> Self {
        Self {
            tag: crate::symbols::sym::ERROR,
            timestamp_ns,
            correlation_id: 0,
            payload: Payload::Fault { source, error },
        }
    }

    /// Inbound value, if any. `Nothing` counts as absent (a read request).
    pub fn value(&self) -> Option<&'a Value> {
        match &self.payload {
            Payload::Value(v) if !v.is_nothing() => Some(*v),
            _ => None,
        }
    }
}
