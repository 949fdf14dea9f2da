pub use crate::agent::BaseAgent;
pub use crate::clock::CachedClock;
pub use crate::config::{AgentConfig, EndpointConfig, load_cfg};
pub use crate::counters::{AgentCounters, Counter};
pub use crate::error::{AgentError, PropertyError, TimerError};
pub use crate::events::{Event, Payload};
pub use crate::hsm::{Automaton, Outcome, StateSet};
pub use crate::logger::LoggerConfig;
pub use crate::pollers::{Poller, PollerRegistry, poller_fn};
pub use crate::properties::{Access, PropertySlot, PropertyStore};
pub use crate::publication::{PublicationConfig, PublishStrategy};
pub use crate::runner::{RunnerConfig, run, spawn};
pub use crate::states::AgentState;
pub use crate::symbols::{Sym, SymbolTable, sym};
pub use crate::transport::mem::MemTransport;
pub use crate::transport::{
    ClaimBuf, FragmentAssembler, FragmentFlags, OfferResult, Publication, Subscription, Transport,
};
pub use crate::value::{Format, MajorOrder, Tensor, Value};
