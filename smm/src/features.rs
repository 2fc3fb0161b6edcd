//! Derived quantities over the current book.

use crate::book::PriceLevel;

/// Feature computations over one book view. Bids must be descending and
/// asks ascending, as published by the book.
pub struct Features<'a> {
    bids: &'a [PriceLevel],
    asks: &'a [PriceLevel],
}

impl<'a> Features<'a> {
    pub fn new(bids: &'a [PriceLevel], asks: &'a [PriceLevel]) -> Self {
        Self { bids, asks }
    }

    /// Arithmetic mid of the best bid and ask, `None` if either side is
    /// empty.
    pub fn mid_price(&self) -> Option<f64> {
        let (bid, ask) = self.best_bid_ask()?;
        Some((bid + ask) / 2.0)
    }

    /// Best bid and ask prices.
    pub fn best_bid_ask(&self) -> Option<(f64, f64)> {
        match (self.bids.first(), self.asks.first()) {
            (Some(b), Some(a)) => Some((b.price, a.price)),
            _ => None,
        }
    }

    /// Volume-weighted mid price over the top `depth` levels: each side is
    /// volume-weighted separately, then the two are averaged. `None` when
    /// either side carries no volume.
    pub fn volume_weighted_mid(&self, depth: usize) -> Option<f64> {
        let weighted_bid = weighted_price(&self.bids[..self.bids.len().min(depth)])?;
        let weighted_ask = weighted_price(&self.asks[..self.asks.len().min(depth)])?;
        Some((weighted_bid + weighted_ask) / 2.0)
    }

    /// Order-book imbalance over the top `depth` levels, in [-1, 1]:
    /// positive means more bid volume.
    pub fn imbalance(&self, depth: usize) -> f64 {
        let bid_volume: f64 = self.bids.iter().take(depth).map(|l| l.size).sum();
        let ask_volume: f64 = self.asks.iter().take(depth).map(|l| l.size).sum();
        let total = bid_volume + ask_volume;
        if total == 0.0 {
            return 0.0;
        }
        (bid_volume - ask_volume) / total
    }
}

fn weighted_price(levels: &[PriceLevel]) -> Option<f64> {
    let volume: f64 = levels.iter().map(|l| l.size).sum();
    if volume <= 0.0 {
        return None;
    }
    let notional: f64 = levels.iter().map(|l| l.price * l.size).sum();
    Some(notional / volume)
}
