use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::policy::{ContractPolicy, MidPriceMode};

/// smm - a two-sided quoting engine for USDT perpetual futures.
#[derive(Parser, Debug)]
#[command(name = "smm", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the market maker
    Run(RunArgs),

    /// Stream a contract's reconstructed order book to stdout
    Book(BookArgs),
}

/// Arguments for the `run` subcommand. The policy flags form the default
/// policy; `--policy-file` overrides it per contract.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Contracts to quote (e.g. BTC_USDT ETH_USDT)
    #[arg(required = true)]
    pub contracts: Vec<String>,

    /// Book depth per side
    #[arg(long, default_value = "20")]
    pub depth: usize,

    /// Book stream cadence
    #[arg(long, default_value = "20ms")]
    pub cadence: String,

    /// Delta-buffering dwell time before the bootstrap snapshot (ms)
    #[arg(long, default_value = "2000")]
    pub settle_delay_ms: u64,

    /// Order tag threaded through the ledger (must start with "t-")
    #[arg(long, default_value = "t-smm")]
    pub strategy: String,

    /// Inventory bound for the long side
    #[arg(long, default_value = "100")]
    pub max_long: f64,

    /// Inventory bound for the short side (non-positive)
    #[arg(long, default_value = "-100", allow_hyphen_values = true)]
    pub max_short: f64,

    /// Bid size at zero inventory
    #[arg(long, default_value = "10")]
    pub default_long_size: f64,

    /// Ask size at zero inventory
    #[arg(long, default_value = "10")]
    pub default_short_size: f64,

    /// Ask offset above mid (bps)
    #[arg(long, default_value = "10")]
    pub positive_quote_distance_bps: f64,

    /// Bid offset below mid (bps)
    #[arg(long, default_value = "10")]
    pub negative_quote_distance_bps: f64,

    /// Minimum relative bid change for a requote (bps)
    #[arg(long, default_value = "5")]
    pub long_adjustment_threshold_bps: f64,

    /// Minimum relative ask change for a requote (bps)
    #[arg(long, default_value = "5")]
    pub short_adjustment_threshold_bps: f64,

    /// Decimal digits for submitted prices
    #[arg(long, default_value = "2")]
    pub price_rounding_precision: u32,

    /// Minimum price increment
    #[arg(long, default_value = "0.01")]
    pub price_step: Decimal,

    /// Minimum size increment
    #[arg(long, default_value = "1")]
    pub quote_step_size: Decimal,

    /// Do not post bids
    #[arg(long)]
    pub disable_long_quotes: bool,

    /// Do not post asks
    #[arg(long)]
    pub disable_short_quotes: bool,

    /// Use the volume-weighted mid over this depth instead of the
    /// arithmetic mid
    #[arg(long)]
    pub vwmp_depth: Option<usize>,

    /// JSON file mapping contract -> policy overrides
    #[arg(long)]
    pub policy_file: Option<PathBuf>,

    /// CSV order-log path
    #[arg(long)]
    pub order_log: Option<PathBuf>,
}

impl RunArgs {
    /// Assemble the engine configuration from the flags and the optional
    /// policy file.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let default_policy = ContractPolicy {
            max_long: self.max_long,
            max_short: self.max_short,
            default_long_size: self.default_long_size,
            default_short_size: self.default_short_size,
            positive_quote_distance_bps: self.positive_quote_distance_bps,
            negative_quote_distance_bps: self.negative_quote_distance_bps,
            long_adjustment_threshold_bps: self.long_adjustment_threshold_bps,
            short_adjustment_threshold_bps: self.short_adjustment_threshold_bps,
            price_rounding_precision: self.price_rounding_precision,
            price_step: self.price_step,
            quote_step_size: self.quote_step_size,
            enable_long_quotes: !self.disable_long_quotes,
            enable_short_quotes: !self.disable_short_quotes,
            mid_price_mode: match self.vwmp_depth {
                Some(depth) => MidPriceMode::VolumeWeighted { depth },
                None => MidPriceMode::Arithmetic,
            },
        };

        let policy_overrides = match &self.policy_file {
            Some(path) => EngineConfig::load_policy_file(path)?,
            None => HashMap::new(),
        };

        Ok(EngineConfig {
            contracts: self.contracts.clone(),
            depth: self.depth,
            cadence: self.cadence.clone(),
            settle_delay_ms: self.settle_delay_ms,
            strategy: self.strategy.clone(),
            order_log_path: self.order_log.clone(),
            default_policy,
            policy_overrides,
        })
    }
}

/// Arguments for the `book` subcommand.
#[derive(Parser, Debug)]
pub struct BookArgs {
    /// Contract to stream (e.g. BTC_USDT)
    pub contract: String,

    /// Book depth per side
    #[arg(long, default_value = "20")]
    pub depth: usize,

    /// Book stream cadence
    #[arg(long, default_value = "20ms")]
    pub cadence: String,
}
