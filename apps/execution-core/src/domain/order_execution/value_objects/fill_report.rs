//! Fill report from broker execution.

use serde::{Deserialize, Serialize};

use crate::domain::shared::{Money, Quantity, Timestamp};

/// One execution fill, as surfaced by `Broker::get_fill_details`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    /// Quantity filled (cumulative or incremental, per caller contract).
    pub quantity: Quantity,
    /// Price at which the fill occurred.
    pub price: Money,
    /// Timestamp of the fill.
    pub timestamp: Timestamp,
}

impl FillReport {
    /// Create a new fill report.
    #[must_use]
    pub const fn new(quantity: Quantity, price: Money, timestamp: Timestamp) -> Self {
        Self {
            quantity,
            price,
            timestamp,
        }
    }

    /// Notional value of this fill.
    #[must_use]
    pub fn notional(&self) -> Money {
        Money::new(self.price.amount() * self.quantity.amount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn fill_report_notional() {
        let fill = FillReport::new(Quantity::from_i64(100), Money::usd(150.00), Timestamp::now());
        assert_eq!(fill.notional().amount(), Decimal::try_from(15000.0).unwrap());
    }

    #[test]
    fn fill_report_serde_roundtrip() {
        let fill = FillReport::new(Quantity::from_i64(50), Money::usd(10.25), Timestamp::now());
        let json = serde_json::to_string(&fill).unwrap();
        let parsed: FillReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, fill);
    }
}
