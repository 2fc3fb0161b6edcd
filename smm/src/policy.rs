//! Per-contract quoting policy.
//!
//! Immutable during a run. Carries the inventory bounds, nominal sizes,
//! quote distances, requote thresholds, and tick/lot geometry for one
//! contract, plus the sizing reduction curves that taper quotes toward the
//! inventory bounds.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Deserialize;

/// How the reference mid price is computed from the book.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MidPriceMode {
    /// `(best_bid + best_ask) / 2`.
    Arithmetic,
    /// Volume-weighted mid over the top `depth` levels of each side.
    VolumeWeighted { depth: usize },
}

/// Tuneable parameters for one contract.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractPolicy {
    /// Inventory bound beyond which long quoting collapses to zero.
    pub max_long: f64,
    /// Inventory bound (`<= 0`) beyond which short quoting collapses to zero.
    pub max_short: f64,
    /// Nominal bid size at zero inventory.
    pub default_long_size: f64,
    /// Nominal ask size at zero inventory (absolute).
    pub default_short_size: f64,
    /// Ask offset above mid, in basis points.
    pub positive_quote_distance_bps: f64,
    /// Bid offset below mid, in basis points.
    pub negative_quote_distance_bps: f64,
    /// Minimum relative bid-price change that triggers a requote.
    pub long_adjustment_threshold_bps: f64,
    /// Minimum relative ask-price change that triggers a requote.
    pub short_adjustment_threshold_bps: f64,
    /// Decimal digits for submitted prices.
    pub price_rounding_precision: u32,
    /// Minimum price increment.
    pub price_step: Decimal,
    /// Minimum size increment.
    pub quote_step_size: Decimal,
    pub enable_long_quotes: bool,
    pub enable_short_quotes: bool,
    #[serde(default = "default_mid_mode")]
    pub mid_price_mode: MidPriceMode,
}

fn default_mid_mode() -> MidPriceMode {
    MidPriceMode::Arithmetic
}

impl Default for ContractPolicy {
    fn default() -> Self {
        Self {
            max_long: 100.0,
            max_short: -100.0,
            default_long_size: 10.0,
            default_short_size: 10.0,
            positive_quote_distance_bps: 10.0,
            negative_quote_distance_bps: 10.0,
            long_adjustment_threshold_bps: 5.0,
            short_adjustment_threshold_bps: 5.0,
            price_rounding_precision: 2,
            price_step: Decimal::new(1, 2),
            quote_step_size: Decimal::ONE,
            enable_long_quotes: true,
            enable_short_quotes: true,
            mid_price_mode: MidPriceMode::Arithmetic,
        }
    }
}

impl ContractPolicy {
    /// Reject configurations the quoting pipeline cannot run on.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_short <= 0.0 && 0.0 <= self.max_long) {
            return Err(format!(
                "inventory bounds must satisfy max_short <= 0 <= max_long (got {} / {})",
                self.max_short, self.max_long
            ));
        }
        if self.price_step <= Decimal::ZERO {
            return Err("price_step must be positive".into());
        }
        if self.quote_step_size <= Decimal::ZERO {
            return Err("quote_step_size must be positive".into());
        }
        if self.default_long_size < 0.0 || self.default_short_size < 0.0 {
            return Err("default quote sizes must be non-negative".into());
        }
        Ok(())
    }

    /// Allowed bid size at the given signed inventory, snapped to
    /// `quote_step_size`. Monotone non-increasing in position, exactly
    /// zero at `max_long` and beyond.
    pub fn long_quote_size(&self, position: f64) -> Decimal {
        if !self.enable_long_quotes {
            return Decimal::ZERO;
        }
        let raw = if position <= 0.0 {
            self.default_long_size
        } else if position <= self.max_long {
            self.default_long_size * (1.0 - position / self.max_long)
        } else {
            0.0
        };
        self.snap_size(raw)
    }

    /// Allowed ask size (absolute) at the given signed inventory, snapped
    /// to `quote_step_size`. Zero at `max_short` and beyond.
    pub fn short_quote_size(&self, position: f64) -> Decimal {
        if !self.enable_short_quotes {
            return Decimal::ZERO;
        }
        let raw = if position >= 0.0 {
            self.default_short_size
        } else if position >= self.max_short {
            // Both operands negative: the ratio tapers from 0 toward 1.
            self.default_short_size * (1.0 - position / self.max_short)
        } else {
            0.0
        };
        self.snap_size(raw)
    }

    fn snap_size(&self, raw: f64) -> Decimal {
        let size = Decimal::from_f64_retain(raw).unwrap_or_default();
        if size <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (size / self.quote_step_size).floor() * self.quote_step_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn policy() -> ContractPolicy {
        ContractPolicy::default()
    }

    #[test]
    fn zero_inventory_quotes_default_sizes() {
        let p = policy();
        assert_eq!(p.long_quote_size(0.0), dec!(10));
        assert_eq!(p.short_quote_size(0.0), dec!(10));
    }

    #[test]
    fn long_inventory_tapers_bid_side_only() {
        // default 10, max_long 100, position 50 -> bid size 5, ask size 10.
        let p = policy();
        assert_eq!(p.long_quote_size(50.0), dec!(5));
        assert_eq!(p.short_quote_size(50.0), dec!(10));
    }

    #[test]
    fn short_inventory_tapers_ask_side_only() {
        let p = policy();
        assert_eq!(p.short_quote_size(-50.0), dec!(5));
        assert_eq!(p.long_quote_size(-50.0), dec!(10));
    }

    #[test]
    fn size_reaches_zero_exactly_at_the_bound() {
        let p = policy();
        assert_eq!(p.long_quote_size(100.0), Decimal::ZERO);
        assert_eq!(p.short_quote_size(-100.0), Decimal::ZERO);
    }

    #[test]
    fn size_collapses_beyond_the_bound() {
        let p = policy();
        assert_eq!(p.long_quote_size(150.0), Decimal::ZERO);
        assert_eq!(p.short_quote_size(-150.0), Decimal::ZERO);
    }

    #[test]
    fn sizes_snap_down_to_the_quote_step() {
        let mut p = policy();
        p.quote_step_size = dec!(2);
        // position 30 -> raw 7.0 -> snapped down to 6.
        assert_eq!(p.long_quote_size(30.0), dec!(6));
    }

    #[test]
    fn disabled_sides_quote_nothing() {
        let mut p = policy();
        p.enable_long_quotes = false;
        p.enable_short_quotes = false;
        assert_eq!(p.long_quote_size(0.0), Decimal::ZERO);
        assert_eq!(p.short_quote_size(0.0), Decimal::ZERO);
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let mut p = policy();
        p.max_short = 1.0;
        assert!(p.validate().is_err());
        let mut p = policy();
        p.price_step = Decimal::ZERO;
        assert!(p.validate().is_err());
    }

    proptest! {
        #[test]
        fn long_curve_is_monotone_non_increasing(a in 0.0f64..200.0, b in 0.0f64..200.0) {
            let p = policy();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(p.long_quote_size(lo) >= p.long_quote_size(hi));
        }

        #[test]
        fn short_curve_is_monotone_non_increasing_in_magnitude(a in 0.0f64..200.0, b in 0.0f64..200.0) {
            let p = policy();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(p.short_quote_size(-lo) >= p.short_quote_size(-hi));
        }

        #[test]
        fn sizes_are_whole_multiples_of_the_step(pos in -200.0f64..200.0) {
            let p = policy();
            for size in [p.long_quote_size(pos), p.short_quote_size(pos)] {
                let steps = size / p.quote_step_size;
                prop_assert_eq!(steps, steps.floor());
            }
        }
    }
}
