//! Normalized brokerage activity and the trade filter.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Map a brokerage transaction code to a trade side. Anything other than
    /// a plain buy or sell (dividends, transfers, option codes) is `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => Some(Side::Buy),
            "sell" | "s" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// A Buy or Sell ready for lot matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub timestamp: NaiveDateTime,
    pub instrument: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
}

impl Transaction {
    /// price × quantity, before fees.
    pub fn gross_amount(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// One row of a brokerage export after number and date normalization, before
/// trade filtering. Quantity and price are optional because cash movements
/// and corporate notices leave them blank.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub line: u64,
    pub timestamp: NaiveDateTime,
    pub instrument: String,
    pub code: String,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub fees: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterResult {
    pub trades: Vec<Transaction>,
    pub non_trade: usize,
    pub incomplete: usize,
}

/// Keep Buy/Sell activities that carry a usable quantity and price.
pub fn filter_trades(activities: &[Activity]) -> FilterResult {
    let mut result = FilterResult::default();

    for activity in activities {
        let Some(side) = Side::from_code(&activity.code) else {
            result.non_trade += 1;
            continue;
        };

        let (quantity, price) = match (activity.quantity, activity.price) {
            (Some(q), Some(p)) if q > Decimal::ZERO && p >= Decimal::ZERO => (q, p),
            _ => {
                log::warn!(
                    "line {}: dropping {} {} with missing or invalid quantity/price",
                    activity.line,
                    side,
                    activity.instrument
                );
                result.incomplete += 1;
                continue;
            }
        };

        if activity.instrument.trim().is_empty() {
            result.incomplete += 1;
            continue;
        }

        result.trades.push(Transaction {
            timestamp: activity.timestamp,
            instrument: activity.instrument.trim().to_string(),
            side,
            quantity,
            price,
            fees: activity.fees.max(Decimal::ZERO),
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn activity(code: &str, qty: Option<Decimal>, price: Option<Decimal>) -> Activity {
        Activity {
            line: 2,
            timestamp: ts(1),
            instrument: "AAPL".into(),
            code: code.into(),
            quantity: qty,
            price,
            fees: Decimal::ZERO,
        }
    }

    #[test]
    fn side_from_code() {
        assert_eq!(Side::from_code("Buy"), Some(Side::Buy));
        assert_eq!(Side::from_code(" SELL "), Some(Side::Sell));
        assert_eq!(Side::from_code("CDIV"), None);
        assert_eq!(Side::from_code("BTO"), None);
    }

    #[test]
    fn filter_keeps_complete_trades() {
        let acts = vec![
            activity("Buy", Some(dec!(10)), Some(dec!(5))),
            activity("Sell", Some(dec!(4)), Some(dec!(6))),
        ];
        let result = filter_trades(&acts);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].side, Side::Buy);
        assert_eq!(result.trades[1].side, Side::Sell);
        assert_eq!(result.non_trade, 0);
        assert_eq!(result.incomplete, 0);
    }

    #[test]
    fn filter_drops_non_trade_codes() {
        let acts = vec![
            activity("CDIV", None, None),
            activity("ACH", None, None),
            activity("Buy", Some(dec!(1)), Some(dec!(1))),
        ];
        let result = filter_trades(&acts);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.non_trade, 2);
    }

    #[test]
    fn filter_drops_incomplete_trades() {
        let acts = vec![
            activity("Buy", None, Some(dec!(1))),
            activity("Buy", Some(dec!(1)), None),
            activity("Sell", Some(dec!(0)), Some(dec!(1))),
            activity("Sell", Some(dec!(1)), Some(dec!(-1))),
        ];
        let result = filter_trades(&acts);
        assert!(result.trades.is_empty());
        assert_eq!(result.incomplete, 4);
    }

    #[test]
    fn zero_price_is_allowed() {
        let acts = vec![activity("Buy", Some(dec!(3)), Some(dec!(0)))];
        let result = filter_trades(&acts);
        assert_eq!(result.trades.len(), 1);
    }

    #[test]
    fn gross_amount() {
        let t = Transaction {
            timestamp: ts(1),
            instrument: "X".into(),
            side: Side::Sell,
            quantity: dec!(2.5),
            price: dec!(4),
            fees: dec!(1),
        };
        assert_eq!(t.gross_amount(), dec!(10.0));
    }
}
