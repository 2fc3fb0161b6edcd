//! Local order book with incremental merge and repair.
//!
//! [`BookSide`] keeps one side as a `BTreeMap` keyed by price for O(log n)
//! level updates and free sorted iteration. [`ContractBook`] layers the
//! venue's (U, u) sequencing contract on top: deltas buffered until a REST
//! snapshot anchors the book, then applied in receive order, with any
//! sequence gap or crossed top-of-book forcing a resync.

use std::collections::BTreeMap;

use gateio::types::BookLevel;
use gateio::BookUpdateMsg;
use ordered_float::OrderedFloat;

/// An ordered (price, size) pair as exposed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

/// Bootstrap state of one contract's book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    /// Accumulating deltas while waiting for a snapshot anchor.
    Buffering,
    /// Snapshot installed; deltas apply directly.
    Initialized,
}

/// Result of feeding one delta to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The delta advanced the book; subscribers should be notified.
    Applied,
    /// Stale delta (`u <= last_update_id`); book unchanged.
    Ignored,
    /// Stored while Buffering.
    Buffered,
    /// Sequence gap or invariant breach; the book reset to Buffering.
    NeedsResync,
}

/// Result of installing a REST snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Snapshot anchored and buffered deltas drained; book Initialized.
    Ready,
    /// Snapshot id was zero or not newer than one already seen; discarded.
    Stale,
    /// A buffered delta exposed a gap past the snapshot; back to Buffering.
    NeedsResync,
}

/// Immutable view of the top of the book, published on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct BookView {
    pub contract: String,
    /// Descending by price.
    pub bids: Vec<PriceLevel>,
    /// Ascending by price.
    pub asks: Vec<PriceLevel>,
    pub last_update_id: u64,
}

// ---------------------------------------------------------------------------
// BookSide
// ---------------------------------------------------------------------------

/// One side of the book. `is_bid` decides which end is best and which end
/// gets trimmed.
#[derive(Debug, Clone)]
pub struct BookSide {
    levels: BTreeMap<OrderedFloat<f64>, f64>,
    is_bid: bool,
}

impl BookSide {
    pub fn new(is_bid: bool) -> Self {
        Self {
            levels: BTreeMap::new(),
            is_bid,
        }
    }

    /// Apply delta levels: an entry with `s == 0` removes that price,
    /// anything else replaces it.
    pub fn apply(&mut self, entries: &[BookLevel]) {
        for entry in entries {
            let key = OrderedFloat(entry.p);
            if entry.s == 0.0 {
                self.levels.remove(&key);
            } else {
                self.levels.insert(key, entry.s);
            }
        }
    }

    /// Replace all levels with a snapshot. Zero-size entries are ignored.
    pub fn set_snapshot(&mut self, entries: &[BookLevel]) {
        self.levels.clear();
        for entry in entries {
            if entry.s > 0.0 {
                self.levels.insert(OrderedFloat(entry.p), entry.s);
            }
        }
    }

    /// Best price: highest bid or lowest ask.
    pub fn best(&self) -> Option<f64> {
        if self.is_bid {
            self.levels.keys().next_back().map(|k| k.0)
        } else {
            self.levels.keys().next().map(|k| k.0)
        }
    }

    /// Drop worst-priced levels until at most `depth` remain.
    pub fn truncate(&mut self, depth: usize) {
        while self.levels.len() > depth {
            if self.is_bid {
                self.levels.pop_first();
            } else {
                self.levels.pop_last();
            }
        }
    }

    /// Top `depth` levels in book order (bids descending, asks ascending).
    pub fn top(&self, depth: usize) -> Vec<PriceLevel> {
        let mapped = |(k, v): (&OrderedFloat<f64>, &f64)| PriceLevel {
            price: k.0,
            size: *v,
        };
        if self.is_bid {
            self.levels.iter().rev().take(depth).map(mapped).collect()
        } else {
            self.levels.iter().take(depth).map(mapped).collect()
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

// ---------------------------------------------------------------------------
// ContractBook
// ---------------------------------------------------------------------------

/// Per-contract book with the bootstrap/repair state machine.
#[derive(Debug)]
pub struct ContractBook {
    contract: String,
    depth: usize,
    state: BookState,
    bids: BookSide,
    asks: BookSide,
    last_update_id: u64,
    last_snapshot_id: u64,
    buffer: Vec<BookUpdateMsg>,
}

impl ContractBook {
    pub fn new(contract: impl Into<String>, depth: usize) -> Self {
        Self {
            contract: contract.into(),
            depth,
            state: BookState::Buffering,
            bids: BookSide::new(true),
            asks: BookSide::new(false),
            last_update_id: 0,
            last_snapshot_id: 0,
            buffer: Vec::new(),
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn state(&self) -> BookState {
        self.state
    }

    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    /// Feed one streamed delta.
    pub fn handle_update(&mut self, msg: BookUpdateMsg) -> ApplyOutcome {
        match self.state {
            BookState::Buffering => {
                self.buffer.push(msg);
                ApplyOutcome::Buffered
            }
            BookState::Initialized => self.apply_update(&msg),
        }
    }

    /// Anchor the book on a REST snapshot, then drain the delta buffer in
    /// arrival order.
    pub fn install_snapshot(&mut self, snapshot: &gateio::BookSnapshot) -> InstallOutcome {
        if snapshot.id == 0 || snapshot.id <= self.last_snapshot_id {
            return InstallOutcome::Stale;
        }

        self.bids.set_snapshot(&snapshot.bids);
        self.asks.set_snapshot(&snapshot.asks);
        self.bids.truncate(self.depth);
        self.asks.truncate(self.depth);
        self.last_snapshot_id = snapshot.id;
        self.last_update_id = snapshot.id;

        for msg in std::mem::take(&mut self.buffer) {
            match self.apply_update(&msg) {
                ApplyOutcome::Applied | ApplyOutcome::Ignored => {}
                ApplyOutcome::NeedsResync => return InstallOutcome::NeedsResync,
                // apply_update never buffers.
                ApplyOutcome::Buffered => unreachable!(),
            }
        }

        self.state = BookState::Initialized;
        InstallOutcome::Ready
    }

    /// Apply one delta under the (U, u) contract.
    fn apply_update(&mut self, msg: &BookUpdateMsg) -> ApplyOutcome {
        if msg.last_id <= self.last_update_id {
            return ApplyOutcome::Ignored;
        }
        if msg.first_id > self.last_update_id + 1 {
            self.resync();
            return ApplyOutcome::NeedsResync;
        }

        self.bids.apply(&msg.b);
        self.asks.apply(&msg.a);
        self.bids.truncate(self.depth);
        self.asks.truncate(self.depth);
        self.last_update_id = msg.last_id;

        if self.is_crossed() {
            self.resync();
            return ApplyOutcome::NeedsResync;
        }
        ApplyOutcome::Applied
    }

    /// Discard all reconstructed state and return to Buffering. The last
    /// seen snapshot id is kept so a stale snapshot cannot re-anchor the
    /// book.
    fn resync(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.buffer.clear();
        self.last_update_id = 0;
        self.state = BookState::Buffering;
    }

    /// A crossed top-of-book is evidence of a missed gap.
    fn is_crossed(&self) -> bool {
        match (self.bids.best(), self.asks.best()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Current top-of-book view for subscribers.
    pub fn view(&self) -> BookView {
        BookView {
            contract: self.contract.clone(),
            bids: self.bids.top(self.depth),
            asks: self.asks.top(self.depth),
            last_update_id: self.last_update_id,
        }
    }
}
