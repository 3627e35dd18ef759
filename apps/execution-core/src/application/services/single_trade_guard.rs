//! Single-trade-per-symbol guard (C6).
//!
//! Enforces at-most-one concurrent entry per symbol. Lives in the
//! application layer rather than `domain::protections`: its reservation map
//! is process-wide runtime state restored from a snapshot, not a pure
//! stateless policy check.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::domain::shared::{Clock, OrderId, Symbol, Timestamp};

/// Result of a `try_reserve` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    Reserved,
    Blocked { blocking_order_id: OrderId },
}

/// One entry in the guard's audit history (§10.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardHistoryEntry {
    pub symbol: Symbol,
    pub order_id: OrderId,
    pub action: GuardAction,
    pub at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardAction {
    Reserved,
    Blocked,
    Released,
    ReleaseNoOp,
    Restored,
}

/// Atomic per-symbol entry reservation (C6, §4.6).
pub struct SingleTradeGuard {
    clock: std::sync::Arc<dyn Clock>,
    reservations: Mutex<HashMap<Symbol, OrderId>>,
    history: Mutex<Vec<GuardHistoryEntry>>,
}

impl SingleTradeGuard {
    #[must_use]
    pub fn new(clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            clock,
            reservations: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Atomically reserve `symbol` for `order_id`, or report who already
    /// holds it.
    pub fn try_reserve(&self, symbol: &Symbol, order_id: &OrderId) -> ReservationOutcome {
        let mut reservations = self.reservations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let outcome = match reservations.get(symbol) {
            Some(holder) if holder != order_id => ReservationOutcome::Blocked {
                blocking_order_id: holder.clone(),
            },
            Some(_) => ReservationOutcome::Reserved,
            None => {
                reservations.insert(symbol.clone(), order_id.clone());
                ReservationOutcome::Reserved
            }
        };
        drop(reservations);

        let action = match &outcome {
            ReservationOutcome::Reserved => GuardAction::Reserved,
            ReservationOutcome::Blocked { .. } => GuardAction::Blocked,
        };
        self.record(symbol.clone(), order_id.clone(), action);
        outcome
    }

    /// Release `symbol`'s reservation, if any. Idempotent: releasing an
    /// unreserved symbol is a recorded no-op, not an error.
    pub fn release(&self, symbol: &Symbol) {
        let mut reservations = self.reservations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let removed = reservations.remove(symbol);
        drop(reservations);
        match removed {
            Some(order_id) => self.record(symbol.clone(), order_id, GuardAction::Released),
            None => self.record(symbol.clone(), OrderId::new(""), GuardAction::ReleaseNoOp),
        }
    }

    /// Current reservations, symbol → holding order id.
    #[must_use]
    pub fn reserved_symbols(&self) -> HashMap<Symbol, OrderId> {
        self.reservations.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Bulk-restore reservations from a recovery snapshot. Symbols already
    /// reserved are left untouched; returns the count of newly-restored
    /// entries.
    pub fn restore_reservations(&self, snapshot: &HashMap<Symbol, OrderId>) -> usize {
        let mut reservations = self.reservations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut restored = 0;
        for (symbol, order_id) in snapshot {
            if reservations.contains_key(symbol) {
                continue;
            }
            reservations.insert(symbol.clone(), order_id.clone());
            restored += 1;
            drop(reservations);
            self.record(symbol.clone(), order_id.clone(), GuardAction::Restored);
            reservations = self.reservations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        restored
    }

    /// Drop every reservation; returns the count cleared.
    pub fn clear_all(&self) -> usize {
        let mut reservations = self.reservations.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let count = reservations.len();
        reservations.clear();
        count
    }

    /// Full audit history of reserve/block/release/restore decisions.
    #[must_use]
    pub fn history(&self) -> Vec<GuardHistoryEntry> {
        self.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn record(&self, symbol: Symbol, order_id: OrderId, action: GuardAction) {
        self.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(GuardHistoryEntry {
            symbol,
            order_id,
            action,
            at: self.clock.now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::SystemClock;
    use std::sync::Arc;

    fn guard() -> SingleTradeGuard {
        SingleTradeGuard::new(Arc::new(SystemClock))
    }

    #[test]
    fn second_reservation_for_same_symbol_is_blocked() {
        let guard = guard();
        let spy = Symbol::new("SPY");
        assert_eq!(guard.try_reserve(&spy, &OrderId::new("A")), ReservationOutcome::Reserved);
        assert_eq!(
            guard.try_reserve(&spy, &OrderId::new("B")),
            ReservationOutcome::Blocked {
                blocking_order_id: OrderId::new("A")
            }
        );
    }

    #[test]
    fn release_then_reserve_succeeds() {
        let guard = guard();
        let spy = Symbol::new("SPY");
        guard.try_reserve(&spy, &OrderId::new("A"));
        guard.release(&spy);
        assert_eq!(guard.try_reserve(&spy, &OrderId::new("C")), ReservationOutcome::Reserved);
    }

    #[test]
    fn restore_skips_already_reserved_symbols() {
        let guard = guard();
        let spy = Symbol::new("SPY");
        guard.try_reserve(&spy, &OrderId::new("A"));

        let mut snapshot = HashMap::new();
        snapshot.insert(spy.clone(), OrderId::new("B"));
        snapshot.insert(Symbol::new("AAPL"), OrderId::new("C"));

        assert_eq!(guard.restore_reservations(&snapshot), 1);
        assert_eq!(guard.reserved_symbols().get(&spy), Some(&OrderId::new("A")));
    }

    #[test]
    fn history_records_every_decision() {
        let guard = guard();
        let spy = Symbol::new("SPY");
        guard.try_reserve(&spy, &OrderId::new("A"));
        guard.release(&spy);
        assert_eq!(guard.history().len(), 2);
    }
}
