//! Engine configuration, built once by the launcher.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SmmError};
use crate::policy::ContractPolicy;

/// Everything the engine needs besides credentials.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Contracts to quote, e.g. `BTC_USDT`.
    pub contracts: Vec<String>,
    /// Book depth kept per side.
    pub depth: usize,
    /// Stream cadence for the book subscription, e.g. `20ms`.
    pub cadence: String,
    /// Buffering dwell time before the bootstrap snapshot request.
    pub settle_delay_ms: u64,
    /// Strategy tag threaded through every order (`text` field on the
    /// venue; user tags must start with `t-`).
    pub strategy: String,
    /// Optional CSV order-log path.
    pub order_log_path: Option<PathBuf>,
    /// Policy applied to contracts without an override.
    pub default_policy: ContractPolicy,
    /// Per-contract policy overrides, usually loaded from a JSON file.
    pub policy_overrides: HashMap<String, ContractPolicy>,
}

impl EngineConfig {
    /// Effective policy for one contract.
    pub fn policy_for(&self, contract: &str) -> ContractPolicy {
        self.policy_overrides
            .get(contract)
            .cloned()
            .unwrap_or_else(|| self.default_policy.clone())
    }

    /// Fatal-at-startup validation.
    pub fn validate(&self) -> Result<()> {
        if self.contracts.is_empty() {
            return Err(SmmError::Config("no contracts configured".into()));
        }
        if !self.strategy.starts_with("t-") {
            return Err(SmmError::Config(format!(
                "strategy tag must start with \"t-\" (got {:?})",
                self.strategy
            )));
        }
        for contract in &self.contracts {
            self.policy_for(contract)
                .validate()
                .map_err(|e| SmmError::Config(format!("{contract}: {e}")))?;
        }
        Ok(())
    }

    /// Load a `{contract: policy}` JSON map. Decimal fields (`price_step`,
    /// `quote_step_size`) are encoded as strings.
    pub fn load_policy_file(path: &Path) -> Result<HashMap<String, ContractPolicy>> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| SmmError::Config(format!("{}: {e}", path.display())))
    }
}
