//! Quote generation.
//!
//! Converts a book view, the contract policy, and the current inventory
//! into a two-sided target quote. Prices are computed in
//! `rust_decimal::Decimal` so tick alignment is exact. A per-side
//! threshold gate suppresses requotes for sub-threshold price drift.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::book::BookView;
use crate::features::Features;
use crate::policy::{ContractPolicy, MidPriceMode};

/// Target quote for one contract. A side with zero size is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetQuote {
    pub contract: String,
    pub bid_price: Decimal,
    pub bid_size: Decimal,
    pub ask_price: Decimal,
    pub ask_size: Decimal,
}

impl TargetQuote {
    pub fn has_bid(&self) -> bool {
        self.bid_size > Decimal::ZERO
    }

    pub fn has_ask(&self) -> bool {
        self.ask_size > Decimal::ZERO
    }
}

/// One posted side of the current record.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QuotedSide {
    price: Decimal,
    size: Decimal,
}

/// Per-contract quote state: policy plus the last emitted record.
pub struct QuoteGenerator {
    contract: String,
    policy: ContractPolicy,
    current_bid: Option<QuotedSide>,
    current_ask: Option<QuotedSide>,
}

impl QuoteGenerator {
    pub fn new(contract: impl Into<String>, policy: ContractPolicy) -> Self {
        Self {
            contract: contract.into(),
            policy,
            current_bid: None,
            current_ask: None,
        }
    }

    pub fn policy(&self) -> &ContractPolicy {
        &self.policy
    }

    /// Recompute the target for a fresh book view and inventory level.
    ///
    /// Returns `Some` only when at least one side crossed its adjustment
    /// threshold (or was previously empty); the returned record carries
    /// the merged current quote for both sides.
    pub fn on_book_update(&mut self, view: &BookView, position: f64) -> Option<TargetQuote> {
        let features = Features::new(&view.bids, &view.asks);
        let (best_bid, best_ask) = features.best_bid_ask()?;
        let mid = match self.policy.mid_price_mode {
            MidPriceMode::Arithmetic => features.mid_price()?,
            MidPriceMode::VolumeWeighted { depth } => features.volume_weighted_mid(depth)?,
        };

        let (bid_price, ask_price) = self.price_pair(mid, best_bid, best_ask);
        let bid_size = self.policy.long_quote_size(position);
        let ask_size = self.policy.short_quote_size(position);

        let new_bid = (bid_price > Decimal::ZERO && bid_size > Decimal::ZERO).then_some(QuotedSide {
            price: bid_price,
            size: bid_size,
        });
        let new_ask = (ask_price > Decimal::ZERO && ask_size > Decimal::ZERO).then_some(QuotedSide {
            price: ask_price,
            size: ask_size,
        });

        let bid_changed = side_crossed_threshold(
            self.current_bid.as_ref(),
            new_bid.as_ref(),
            self.policy.long_adjustment_threshold_bps,
        );
        let ask_changed = side_crossed_threshold(
            self.current_ask.as_ref(),
            new_ask.as_ref(),
            self.policy.short_adjustment_threshold_bps,
        );

        if !bid_changed && !ask_changed {
            return None;
        }

        // Only the side(s) crossing threshold replace the current record.
        if bid_changed {
            self.current_bid = new_bid;
        }
        if ask_changed {
            self.current_ask = new_ask;
        }
        Some(self.current_record())
    }

    /// Raw-then-clamped-then-aligned price pair for the given mid.
    fn price_pair(&self, mid: f64, best_bid: f64, best_ask: f64) -> (Decimal, Decimal) {
        let mid = to_decimal(mid);
        let best_bid = to_decimal(best_bid);
        let best_ask = to_decimal(best_ask);
        let step = self.policy.price_step;
        let bps = Decimal::from(10_000u32);

        let neg = to_decimal(self.policy.negative_quote_distance_bps);
        let pos = to_decimal(self.policy.positive_quote_distance_bps);
        let mut raw_bid = mid * (Decimal::ONE - neg / bps);
        let mut raw_ask = mid * (Decimal::ONE + pos / bps);

        // Never sit at or through the touch.
        if raw_bid >= best_bid {
            raw_bid = best_bid - step;
        }
        if raw_ask <= best_ask {
            raw_ask = best_ask + step;
        }

        // Bid snaps down, ask snaps up, so alignment cannot re-cross.
        let bid = ((raw_bid / step).floor() * step).round_dp_with_strategy(
            self.policy.price_rounding_precision,
            RoundingStrategy::ToNegativeInfinity,
        );
        let ask = ((raw_ask / step).ceil() * step).round_dp_with_strategy(
            self.policy.price_rounding_precision,
            RoundingStrategy::ToPositiveInfinity,
        );
        (bid, ask)
    }

    /// The current merged record as a [`TargetQuote`].
    fn current_record(&self) -> TargetQuote {
        let (bid_price, bid_size) = self
            .current_bid
            .map(|s| (s.price, s.size))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));
        let (ask_price, ask_size) = self
            .current_ask
            .map(|s| (s.price, s.size))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));
        TargetQuote {
            contract: self.contract.clone(),
            bid_price,
            bid_size,
            ask_price,
            ask_size,
        }
    }
}

/// Gate one side: a transition between empty and quoted always passes;
/// otherwise the relative price change must reach the threshold.
fn side_crossed_threshold(
    old: Option<&QuotedSide>,
    new: Option<&QuotedSide>,
    threshold_bps: f64,
) -> bool {
    match (old, new) {
        (None, None) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(old), Some(new)) => {
            if old.price <= Decimal::ZERO {
                return true;
            }
            let rel = ((new.price - old.price) / old.price).abs();
            rel >= to_decimal(threshold_bps) / Decimal::from(10_000u32)
        }
    }
}

/// Convert an f64 venue price to `Decimal`, shedding binary representation
/// noise well below any real tick size.
fn to_decimal(x: f64) -> Decimal {
    Decimal::from_f64_retain(x).unwrap_or_default().round_dp(12)
}
