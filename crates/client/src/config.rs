use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON-RPC address of the bootstrap seed.
    #[serde(default = "d_seed")]
    pub seed_rpc_server_addr: String,
    /// Fixed delay between reconnect attempts.
    #[serde(default = "d_1000")]
    pub reconnect_interval_ms: u64,
    /// Timeout for each seed request.
    #[serde(default = "d_10000")]
    pub rpc_timeout_ms: u64,
    /// Events a generation may buffer before the read loop waits for the
    /// consumer.
    #[serde(default = "d_1")]
    pub event_buffer: usize,
}

impl ClientConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            seed_rpc_server_addr: d_seed(),
            reconnect_interval_ms: 1000,
            rpc_timeout_ms: 10_000,
            event_buffer: 1,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_seed() -> String {
    "http://testnet-seed-0001.nkn.org:30003".into()
}
fn d_1000() -> u64 {
    1000
}
fn d_10000() -> u64 {
    10_000
}
fn d_1() -> usize {
    1
}
