//! Engine settings.

use chatflow_conversation::FlowId;
use serde::Deserialize;

/// Flow new leads are bound to unless configured otherwise.
pub const DEFAULT_FLOW: &str = "35175244";

/// Channel assumed for events that do not name one.
pub const DEFAULT_CHANNEL: &str = "telegram";

/// Maximum `Enter`/`Evaluate` transitions in one interpretation.
pub const DEFAULT_MAX_HOPS: usize = 64;

/// Flow engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Flow that newly created leads start in.
    #[serde(default = "default_flow")]
    pub default_flow: FlowId,

    /// Channel used when an inbound event does not carry one.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Upper bound on step transitions per interpretation; guards against
    /// `goto` cycles.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

fn default_flow() -> FlowId {
    FlowId::new(DEFAULT_FLOW)
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_flow: default_flow(),
            channel: default_channel(),
            max_hops: default_max_hops(),
        }
    }
}
