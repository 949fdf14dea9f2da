use crate::error::AgentError;
use anyhow::Context;
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_HEARTBEAT_PERIOD_NS: i64 = 10_000_000_000;
pub const DEFAULT_STATS_PERIOD_NS: i64 = 5_000_000_000;
pub const DEFAULT_MEM_STATS_PERIOD_NS: i64 = 10_000_000_000;

/// One transport endpoint: a channel URI plus a stream id within it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub uri: String,
    pub stream_id: i32,
}

impl EndpointConfig {
    pub fn new(uri: impl Into<String>, stream_id: i32) -> Self {
        Self {
            uri: uri.into(),
            stream_id,
        }
    }
}

/// Static agent configuration, read once before construction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Agent name used in counter labels and message tags.
    pub name: String,

    /// Node id fed to the correlation-id generator and counter keys.
    pub node_id: i64,

    /// Status publication endpoint.
    pub status: EndpointConfig,

    /// Control subscription endpoint.
    pub control: EndpointConfig,

    /// Optional tag filter for control messages (`None` = accept all).
    pub control_filter: Option<String>,

    /// Heartbeat reschedule period (default 10s).
    pub heartbeat_period_ns: i64,

    /// Inbound messages older than this dispatch as `LateMessage`
    /// (`None` = no late check).
    pub late_message_threshold_ns: Option<i64>,

    /// Stats derivation period (default 5s).
    pub stats_period_ns: i64,

    /// Memory-stats publish period (default 10s).
    pub mem_stats_period_ns: i64,

    /// Logging threshold name; also exposed as the LogLevel property.
    pub log_level: String,

    /// Output data streams, addressed by 1-based index.
    pub pub_data: Vec<EndpointConfig>,

    /// Input data streams.
    pub sub_data: Vec<EndpointConfig>,
}

impl AgentConfig {
    /// Minimal config for tests and embedded use; endpoints default to a
    /// loopback naming scheme.
    pub fn for_agent(name: impl Into<String>, node_id: i64) -> Self {
        Self {
            name: name.into(),
            node_id,
            status: EndpointConfig::new("mem:status", 1),
            control: EndpointConfig::new("mem:control", 1),
            control_filter: None,
            heartbeat_period_ns: DEFAULT_HEARTBEAT_PERIOD_NS,
            late_message_threshold_ns: None,
            stats_period_ns: DEFAULT_STATS_PERIOD_NS,
            mem_stats_period_ns: DEFAULT_MEM_STATS_PERIOD_NS,
            log_level: "info".to_string(),
            pub_data: Vec::new(),
            sub_data: Vec::new(),
        }
    }

    /// Read the full configuration from the environment. `BLOCK_NAME`,
    /// `BLOCK_ID`, and the status/control endpoints are required; numbered
    /// `PUB_DATA_*`/`SUB_DATA_*` pairs are collected until the first gap.
    pub fn from_env() -> Result<Self, AgentError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            name: require("BLOCK_NAME")?,
            node_id: require_parsed("BLOCK_ID")?,
            status: EndpointConfig {
                uri: require("STATUS_URI")?,
                stream_id: require_parsed("STATUS_STREAM_ID")?,
            },
            control: EndpointConfig {
                uri: require("CONTROL_URI")?,
                stream_id: require_parsed("CONTROL_STREAM_ID")?,
            },
            control_filter: optional("CONTROL_FILTER"),
            heartbeat_period_ns: optional_parsed("HEARTBEAT_PERIOD_NS")?
                .unwrap_or(DEFAULT_HEARTBEAT_PERIOD_NS),
            late_message_threshold_ns: optional_parsed("LATE_MESSAGE_THRESHOLD_NS")?,
            stats_period_ns: optional_parsed("STATS_PERIOD_NS")?.unwrap_or(DEFAULT_STATS_PERIOD_NS),
            mem_stats_period_ns: optional_parsed("GC_STATS_PERIOD_NS")?
                .unwrap_or(DEFAULT_MEM_STATS_PERIOD_NS),
            log_level: optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            pub_data: numbered_endpoints("PUB_DATA_URI_", "PUB_DATA_STREAM_")?,
            sub_data: numbered_endpoints("SUB_DATA_URI_", "SUB_DATA_STREAM_")?,
        })
    }
}

fn require(name: &str) -> Result<String, AgentError> {
    std::env::var(name).map_err(|_| AgentError::EnvironmentVariable(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn require_parsed<T: std::str::FromStr>(name: &str) -> Result<T, AgentError> {
    require(name)?
        .parse()
        .map_err(|_| AgentError::EnvironmentVariable(name.to_string()))
}

fn optional_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AgentError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AgentError::EnvironmentVariable(name.to_string())),
        Err(_) => Ok(None),
    }
}

fn numbered_endpoints(
    uri_prefix: &str,
    stream_prefix: &str,
) -> Result<Vec<EndpointConfig>, AgentError> {
    let mut out = Vec::new();
    for n in 1.. {
        let uri_var = format!("{uri_prefix}{n}");
        let Ok(uri) = std::env::var(&uri_var) else {
            break;
        };
        let stream_var = format!("{stream_prefix}{n}");
        let stream_id = std::env::var(&stream_var)
            .map_err(|_| AgentError::EnvironmentVariable(stream_var.clone()))?
            .parse()
            .map_err(|_| AgentError::EnvironmentVariable(stream_var))?;
        out.push(EndpointConfig { uri, stream_id });
    }
    Ok(out)
}

/// Load any deserializable config from a file.
pub fn load_cfg<T: for<'a> Deserialize<'a>>(path: impl AsRef<str>) -> anyhow::Result<T> {
    let cfg = Config::builder()
        .add_source(config::File::from(PathBuf::from(path.as_ref())))
        .build()
        .with_context(|| format!("failed to read config from {}", path.as_ref()))?;

    let parsed: T = cfg
        .try_deserialize()
        .with_context(|| format!("failed to deserialize config from {}", path.as_ref()))?;

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let cfg = AgentConfig::for_agent("pump", 3);
        assert_eq!(cfg.heartbeat_period_ns, DEFAULT_HEARTBEAT_PERIOD_NS);
        assert_eq!(cfg.stats_period_ns, DEFAULT_STATS_PERIOD_NS);
        assert_eq!(cfg.mem_stats_period_ns, DEFAULT_MEM_STATS_PERIOD_NS);
        assert!(cfg.pub_data.is_empty());
        assert!(cfg.control_filter.is_none());
    }
}
