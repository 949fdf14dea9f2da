pub mod adapters;
pub mod agent;
pub mod clock;
pub mod codec;
pub mod config;
pub mod counters;
pub mod error;
pub mod events;
pub mod hsm;
pub mod ids;
pub mod logger;
pub mod pollers;
pub mod prelude;
pub mod properties;
pub mod proxy;
pub mod publication;
pub mod runner;
pub mod states;
pub mod symbols;
pub mod timers;
pub mod transport;
pub mod value;
