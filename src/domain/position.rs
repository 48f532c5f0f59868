//! Open lots, the per-instrument lot queue, and closed positions.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::transaction::Transaction;

/// Decimal places kept on a pro-rated cost or fee slice. Unrounded slices of
/// a repeating quotient fill all 28 digits and lose precision when subtracted
/// from larger amounts.
pub const SLICE_SCALE: u32 = 10;

/// Quantity acquired by one Buy, tracked until fully disposed.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub instrument: String,
    pub acquired_at: NaiveDateTime,
    pub remaining: Decimal,
    pub unit_cost: Decimal,
    pub remaining_cost: Decimal,
}

impl Lot {
    /// Open a lot from a Buy. Fees are folded into the unit cost.
    pub fn open(buy: &Transaction) -> Self {
        let total_cost = buy.gross_amount() + buy.fees;
        Lot {
            instrument: buy.instrument.clone(),
            acquired_at: buy.timestamp,
            remaining: buy.quantity,
            unit_cost: total_cost / buy.quantity,
            remaining_cost: total_cost,
        }
    }

    /// Remove `quantity` from the lot and return its cost basis.
    ///
    /// Taking everything that is left returns the exact remaining cost, so a
    /// lot closed in several slices attributes its whole acquisition cost.
    pub fn take(&mut self, quantity: Decimal) -> Decimal {
        if quantity >= self.remaining {
            let basis = self.remaining_cost;
            self.remaining = Decimal::ZERO;
            self.remaining_cost = Decimal::ZERO;
            return basis;
        }
        let basis = (self.unit_cost * quantity)
            .round_dp(SLICE_SCALE)
            .min(self.remaining_cost);
        self.remaining -= quantity;
        self.remaining_cost -= basis;
        basis
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining <= Decimal::ZERO
    }
}

/// FIFO queue of open lots for one instrument.
///
/// Lots live in a vector and `head` marks the oldest one still open; popping
/// only advances the index.
#[derive(Debug, Clone, Default)]
pub struct LotQueue {
    lots: Vec<Lot>,
    head: usize,
}

impl LotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, lot: Lot) {
        if self.head == self.lots.len() {
            self.lots.clear();
            self.head = 0;
        }
        self.lots.push(lot);
    }

    pub fn front_mut(&mut self) -> Option<&mut Lot> {
        self.lots.get_mut(self.head)
    }

    pub fn pop_front(&mut self) -> Option<Lot> {
        let lot = self.lots.get(self.head).cloned()?;
        self.head += 1;
        Some(lot)
    }

    pub fn is_empty(&self) -> bool {
        self.head >= self.lots.len()
    }

    pub fn len(&self) -> usize {
        self.lots.len() - self.head
    }

    pub fn open_quantity(&self) -> Decimal {
        self.iter().map(|l| l.remaining).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lot> {
        self.lots[self.head..].iter()
    }
}

/// One matched slice of a Sell against one lot.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub instrument: String,
    pub acquired_at: NaiveDateTime,
    pub disposed_at: NaiveDateTime,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub realized_pl: Decimal,
    pub holding_period_days: i64,
    /// Unmatched part of the originating Sell, set on its last slice only.
    pub shortfall: Option<Decimal>,
}

impl ClosedPosition {
    pub fn new(
        instrument: String,
        acquired_at: NaiveDateTime,
        disposed_at: NaiveDateTime,
        quantity: Decimal,
        cost_basis: Decimal,
        proceeds: Decimal,
    ) -> Self {
        ClosedPosition {
            instrument,
            acquired_at,
            disposed_at,
            quantity,
            cost_basis,
            proceeds,
            realized_pl: proceeds - cost_basis,
            holding_period_days: (disposed_at - acquired_at).num_days(),
            shortfall: None,
        }
    }

    pub fn is_win(&self) -> bool {
        self.realized_pl > Decimal::ZERO
    }

    pub fn is_flagged(&self) -> bool {
        self.shortfall.is_some()
    }
}

/// A lot still open once every transaction has been processed.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenLot {
    pub instrument: String,
    pub acquired_at: NaiveDateTime,
    pub remaining: Decimal,
    pub unit_cost: Decimal,
    pub remaining_cost: Decimal,
}

impl From<&Lot> for OpenLot {
    fn from(lot: &Lot) -> Self {
        OpenLot {
            instrument: lot.instrument.clone(),
            acquired_at: lot.acquired_at,
            remaining: lot.remaining,
            unit_cost: lot.unit_cost,
            remaining_cost: lot.remaining_cost,
        }
    }
}
