//! Order side (long or short).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trading intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Opening or adding to a long position.
    Long,
    /// Opening or adding to a short position.
    Short,
}

impl OrderSide {
    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    /// Returns the sign for position calculations (long = +1, short = -1).
    #[must_use]
    pub const fn sign(&self) -> i32 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_side_opposite() {
        assert_eq!(OrderSide::Long.opposite(), OrderSide::Short);
        assert_eq!(OrderSide::Short.opposite(), OrderSide::Long);
    }

    #[test]
    fn order_side_sign() {
        assert_eq!(OrderSide::Long.sign(), 1);
        assert_eq!(OrderSide::Short.sign(), -1);
    }

    #[test]
    fn order_side_display() {
        assert_eq!(format!("{}", OrderSide::Long), "LONG");
        assert_eq!(format!("{}", OrderSide::Short), "SHORT");
    }

    #[test]
    fn order_side_serde() {
        let json = serde_json::to_string(&OrderSide::Long).unwrap();
        assert_eq!(json, "\"LONG\"");

        let parsed: OrderSide = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(parsed, OrderSide::Short);
    }
}
