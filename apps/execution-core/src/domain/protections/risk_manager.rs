//! Final pre-trade gate: validates and possibly caps order size against
//! account-level risk limits. Runs after the protection stack (§4.10 step 4).

use rust_decimal::Decimal;

use crate::domain::shared::{Money, Quantity};

use super::decision::ProtectionDecision;

/// Account-level limits the risk manager enforces.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_position_size_usd: Money,
    pub max_portfolio_exposure_usd: Money,
    pub min_buying_power_reserve: Money,
}

/// Live account figures the risk manager checks a proposed order against.
#[derive(Debug, Clone)]
pub struct AccountState {
    pub portfolio_value: Money,
    pub buying_power: Money,
    pub current_exposure: Money,
}

pub struct RiskManager {
    limits: RiskLimits,
}

impl RiskManager {
    #[must_use]
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Validate `quantity @ price` against the configured limits. Returns
    /// `allowed=true` with `approved_qty` set when the order must be
    /// shrunk to fit, or a rejection when it cannot fit at any size.
    #[must_use]
    pub fn evaluate(&self, quantity: Quantity, price: Money, account: &AccountState) -> (ProtectionDecision, Option<Quantity>) {
        if quantity.is_zero() || quantity.is_negative() {
            return (ProtectionDecision::reject("risk_manager", "quantity must be positive"), None);
        }

        let notional = notional_of(quantity, price);
        if notional > self.limits.max_position_size_usd {
            let capped = cap_quantity(self.limits.max_position_size_usd, price);
            if capped.is_zero() {
                return (
                    ProtectionDecision::reject("risk_manager", "position size exceeds max_position_size_usd"),
                    None,
                );
            }
            return self.evaluate_capped(capped, price, account, "capped to max_position_size_usd");
        }

        let projected_exposure = account.current_exposure + notional;
        if projected_exposure > self.limits.max_portfolio_exposure_usd {
            let room = self.limits.max_portfolio_exposure_usd - account.current_exposure;
            if !room.is_positive() {
                return (
                    ProtectionDecision::reject("risk_manager", "portfolio exposure limit already reached"),
                    None,
                );
            }
            let capped = cap_quantity(room, price);
            if capped.is_zero() {
                return (
                    ProtectionDecision::reject("risk_manager", "no room left under max_portfolio_exposure_usd"),
                    None,
                );
            }
            return self.evaluate_capped(capped, price, account, "capped to max_portfolio_exposure_usd");
        }

        let remaining_buying_power = account.buying_power - notional;
        if remaining_buying_power < self.limits.min_buying_power_reserve {
            return (
                ProtectionDecision::reject("risk_manager", "order would breach min_buying_power_reserve"),
                None,
            );
        }

        (ProtectionDecision::allow("risk_manager"), None)
    }

    fn evaluate_capped(
        &self,
        capped: Quantity,
        price: Money,
        account: &AccountState,
        reason: &str,
    ) -> (ProtectionDecision, Option<Quantity>) {
        let notional = notional_of(capped, price);
        let remaining_buying_power = account.buying_power - notional;
        if remaining_buying_power < self.limits.min_buying_power_reserve {
            return (
                ProtectionDecision::reject("risk_manager", "order would breach min_buying_power_reserve"),
                None,
            );
        }
        (ProtectionDecision::fail_open("risk_manager", reason), Some(capped))
    }
}

fn notional_of(quantity: Quantity, price: Money) -> Money {
    let qty_decimal: Decimal = quantity.into();
    let price_decimal: Decimal = price.into();
    Money::from(qty_decimal * price_decimal)
}

fn cap_quantity(budget: Money, price: Money) -> Quantity {
    let price_decimal: Decimal = price.into();
    if price_decimal.is_zero() {
        return Quantity::from_i64(0);
    }
    let budget_decimal: Decimal = budget.into();
    Quantity::from(budget_decimal / price_decimal).round_down()
}
