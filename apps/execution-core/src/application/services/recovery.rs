//! Recovery coordinator and state persistence (C12).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::reconciler::{Discrepancy, StartupReconciler};
use crate::application::services::single_trade_guard::SingleTradeGuard;
use crate::domain::order_execution::aggregate::Order;
use crate::domain::order_execution::services::OrderStateMachine;
use crate::domain::shared::{OrderId, Symbol, Timestamp};
use crate::infrastructure::PositionStore;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("state persistence I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state persistence serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("order state error: {0}")]
    OrderState(#[from] crate::domain::order_execution::errors::OrderError),
}

/// Snapshot of runtime state captured periodically for fast recovery
/// (§3.1, §6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub positions: Vec<crate::infrastructure::Position>,
    /// Full records of every order still in flight as of `captured_at`, not
    /// just their ids: the transaction log only carries state *transitions*,
    /// so reconstructing an order after a crash needs its original terms
    /// (symbol, quantity, side, ...) from somewhere, and this is it.
    pub pending_orders: Vec<Order>,
    pub reserved_symbols: HashMap<Symbol, OrderId>,
    pub captured_at: Timestamp,
    pub position_count: usize,
}

/// Atomic write-tmp-then-rename snapshot writer with rolling backups.
pub struct StatePersistence {
    dir: PathBuf,
    max_backups: usize,
}

impl StatePersistence {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            dir: dir.into(),
            max_backups,
        }
    }

    /// Write a new snapshot, rotating older ones into numbered backups.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or written.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<(), RecoveryError> {
        fs::create_dir_all(&self.dir)?;
        let current = self.dir.join("snapshot.json");
        if current.exists() {
            self.rotate_backups()?;
        }
        let tmp = self.dir.join("snapshot.json.tmp");
        fs::write(&tmp, serde_json::to_vec(snapshot)?)?;
        fs::rename(&tmp, &current)?;
        Ok(())
    }

    fn rotate_backups(&self) -> Result<(), RecoveryError> {
        let current = self.dir.join("snapshot.json");
        for i in (1..self.max_backups).rev() {
            let from = self.dir.join(format!("snapshot.json.{i}"));
            let to = self.dir.join(format!("snapshot.json.{}", i + 1));
            if from.exists() {
                let _ = fs::rename(from, to);
            }
        }
        if self.max_backups > 0 {
            let _ = fs::rename(&current, self.dir.join("snapshot.json.1"));
        }
        Ok(())
    }

    /// Load the freshest non-corrupt snapshot, falling back through backups
    /// in order if the newest file fails to parse.
    ///
    /// # Errors
    ///
    /// Returns an error only if every candidate file is missing or corrupt.
    pub fn load_latest(&self) -> Result<Option<StateSnapshot>, RecoveryError> {
        let mut candidates = vec![self.dir.join("snapshot.json")];
        for i in 1..=self.max_backups {
            candidates.push(self.dir.join(format!("snapshot.json.{i}")));
        }
        for path in candidates {
            if let Ok(bytes) = fs::read(&path) {
                if let Ok(snapshot) = serde_json::from_slice(&bytes) {
                    return Ok(Some(snapshot));
                }
                tracing::warn!(path = %path.display(), "snapshot file present but corrupt, trying next backup");
            }
        }
        Ok(None)
    }
}

/// Outcome of `RecoveryCoordinator::recover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Success,
    Partial,
    Rebuilt,
    Failed,
}

/// Runs the §4.12 recovery sequence at startup.
pub struct RecoveryCoordinator {
    persistence: StatePersistence,
    machine: Arc<OrderStateMachine>,
    guard: Arc<SingleTradeGuard>,
    reconciler: StartupReconciler,
}

impl RecoveryCoordinator {
    #[must_use]
    pub fn new(persistence: StatePersistence, machine: Arc<OrderStateMachine>, guard: Arc<SingleTradeGuard>, reconciler: StartupReconciler) -> Self {
        Self {
            persistence,
            machine,
            guard,
            reconciler,
        }
    }

    /// Run the five-step recovery sequence (§4.12). Returns the outcome plus
    /// whatever discrepancies step 4 turned up.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that make the outcome
    /// unambiguously [`RecoveryOutcome::Failed`] impossible to report
    /// otherwise (disk I/O failures while reading the snapshot directory).
    pub fn recover(&self) -> Result<(RecoveryOutcome, Vec<Discrepancy>), RecoveryError> {
        let snapshot = self.persistence.load_latest()?;

        let had_snapshot = snapshot.is_some();
        if let Some(snapshot) = &snapshot {
            self.guard.restore_reservations(&snapshot.reserved_symbols);
            for order in &snapshot.pending_orders {
                match self.machine.seed_order(order.clone()) {
                    Ok(()) | Err(crate::domain::order_execution::errors::OrderError::DuplicateOrder { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let restored = self.machine.restore_pending_orders()?;

        let discrepancies = match self.reconciler.reconcile() {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "recovery: position store reconciliation failed");
                return Ok((RecoveryOutcome::Failed, Vec::new()));
            }
        };

        if self.reconciler.should_halt(&discrepancies) {
            return Ok((RecoveryOutcome::Failed, discrepancies));
        }

        let outcome = if !had_snapshot {
            RecoveryOutcome::Rebuilt
        } else if restored == self.machine.get_pending_orders().len() {
            RecoveryOutcome::Success
        } else {
            RecoveryOutcome::Partial
        };

        Ok((outcome, discrepancies))
    }
}

/// Per-subsystem consecutive-failure counter feeding the halt decision
/// (§4.12, §6.4 `critical_subsystems`/`failure_threshold`).
pub struct SubsystemHealthMonitor {
    critical: Vec<String>,
    threshold: u32,
    counters: Mutex<HashMap<String, AtomicU32>>,
}

impl SubsystemHealthMonitor {
    #[must_use]
    pub fn new(critical: Vec<String>, threshold: u32) -> Self {
        Self {
            critical,
            threshold,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `subsystem`, incrementing its consecutive count.
    pub fn record_failure(&self, subsystem: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        counters.entry(subsystem.to_string()).or_insert_with(|| AtomicU32::new(0)).fetch_add(1, Ordering::Relaxed);
    }

    /// Reset `subsystem`'s consecutive-failure count to zero on success.
    pub fn record_success(&self, subsystem: &str) {
        let counters = self.counters.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(counter) = counters.get(subsystem) {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// `true` if any critical subsystem has exceeded its failure threshold.
    #[must_use]
    pub fn should_halt(&self) -> bool {
        let counters = self.counters.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.critical.iter().any(|name| counters.get(name).is_some_and(|c| c.load(Ordering::Relaxed) >= self.threshold))
    }
}

#[must_use]
pub fn base_dir_for(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().to_path_buf()
}

#[must_use]
pub fn capture_snapshot(positions: &PositionStore, machine: &OrderStateMachine, guard: &SingleTradeGuard, now: Timestamp) -> Result<StateSnapshot, crate::infrastructure::position_store::PositionStoreError> {
    let positions = positions.get_all()?;
    let pending_orders = machine.get_pending_orders();
    Ok(StateSnapshot {
        position_count: positions.len(),
        positions,
        pending_orders,
        reserved_symbols: guard.reserved_symbols(),
        captured_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::broker_port::NullExecution;
    use crate::application::services::reconciler::ReconciliationPolicy;
    use crate::domain::order_execution::aggregate::NewOrder;
    use crate::domain::order_execution::ports::{InMemoryTransactionLog, NullEventBus, TransactionLogPort};
    use crate::domain::order_execution::value_objects::{OrderSide, OrderType, TimeInForce};
    use crate::domain::shared::{Quantity, SystemClock, Symbol};

    fn test_order(id: &str) -> Order {
        let cmd = NewOrder {
            symbol: Symbol::new("SPY"),
            quantity: Quantity::from_i64(10),
            side: OrderSide::Long,
            order_type: OrderType::Market,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            time_in_force: TimeInForce::Day,
            strategy: "momentum".to_string(),
        };
        Order::pending(OrderId::new(id), cmd, Timestamp::now()).unwrap()
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path(), 3);
        let snapshot = StateSnapshot {
            positions: Vec::new(),
            pending_orders: vec![test_order("ord-1")],
            reserved_symbols: HashMap::new(),
            captured_at: Timestamp::now(),
            position_count: 0,
        };
        persistence.save(&snapshot).unwrap();
        let loaded = persistence.load_latest().unwrap().unwrap();
        assert_eq!(loaded.pending_orders.len(), 1);
        assert_eq!(loaded.pending_orders[0].id(), &OrderId::new("ord-1"));
    }

    #[test]
    fn second_save_rotates_first_into_backup() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path(), 3);
        for i in 0..3 {
            let snapshot = StateSnapshot {
                positions: Vec::new(),
                pending_orders: vec![test_order(&format!("ord-{i}"))],
                reserved_symbols: HashMap::new(),
                captured_at: Timestamp::now(),
                position_count: 0,
            };
            persistence.save(&snapshot).unwrap();
        }
        assert!(dir.path().join("snapshot.json.1").exists());
    }

    #[test]
    fn load_latest_with_no_snapshot_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path(), 3);
        assert!(persistence.load_latest().unwrap().is_none());
    }

    #[test]
    fn health_monitor_halts_after_threshold_consecutive_failures() {
        let monitor = SubsystemHealthMonitor::new(vec!["journal".to_string()], 3);
        assert!(!monitor.should_halt());
        monitor.record_failure("journal");
        monitor.record_failure("journal");
        assert!(!monitor.should_halt());
        monitor.record_failure("journal");
        assert!(monitor.should_halt());
    }

    #[test]
    fn health_monitor_success_resets_counter() {
        let monitor = SubsystemHealthMonitor::new(vec!["journal".to_string()], 2);
        monitor.record_failure("journal");
        monitor.record_success("journal");
        monitor.record_failure("journal");
        assert!(!monitor.should_halt());
    }

    #[test]
    fn recover_with_no_snapshot_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path(), 3);
        let log: Arc<dyn TransactionLogPort> = Arc::new(InMemoryTransactionLog::default());
        let machine = Arc::new(OrderStateMachine::with_clock(log, Arc::new(NullEventBus), Arc::new(SystemClock)));
        let guard = Arc::new(SingleTradeGuard::new(Arc::new(SystemClock)));
        let positions = Arc::new(PositionStore::open_in_memory().unwrap());
        let reconciler = StartupReconciler::new(positions, machine.clone(), Arc::new(NullExecution::new()), Arc::new(SystemClock), ReconciliationPolicy::Paper);
        let coordinator = RecoveryCoordinator::new(persistence, machine, guard, reconciler);

        let (outcome, discrepancies) = coordinator.recover().unwrap();
        assert_eq!(outcome, RecoveryOutcome::Rebuilt);
        assert!(discrepancies.is_empty());
    }

    #[test]
    fn recover_seeds_snapshot_orders_then_replays_log_onto_them() {
        use crate::domain::order_execution::services::{OrderStateMachine, TransitionInputs};
        use crate::domain::order_execution::value_objects::OrderState;
        use crate::domain::shared::BrokerId;

        let dir = tempfile::tempdir().unwrap();
        let log: Arc<dyn TransactionLogPort> = Arc::new(InMemoryTransactionLog::default());

        // First process: create an order, snapshot it while still PENDING,
        // then submit it (the log now holds the PENDING -> SUBMITTED event
        // that the snapshot predates).
        let id = OrderId::new("ord-1");
        let before_restart = OrderStateMachine::with_clock(log.clone(), Arc::new(NullEventBus), Arc::new(SystemClock));
        before_restart.create_order(id.clone(), NewOrder {
            symbol: Symbol::new("SPY"),
            quantity: Quantity::from_i64(10),
            side: OrderSide::Long,
            order_type: OrderType::Market,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            time_in_force: TimeInForce::Day,
            strategy: "momentum".to_string(),
        }).unwrap();
        let snapshotted_order = before_restart.get_order(&id).unwrap();
        before_restart
            .transition(&id, OrderState::Pending, OrderState::Submitted, TransitionInputs::submitted(BrokerId::new("b-1")))
            .unwrap();

        let persistence = StatePersistence::new(dir.path(), 3);
        persistence
            .save(&StateSnapshot {
                positions: Vec::new(),
                pending_orders: vec![snapshotted_order],
                reserved_symbols: HashMap::new(),
                captured_at: Timestamp::now(),
                position_count: 0,
            })
            .unwrap();

        // Restart: fresh, empty state machine backed by the same log.
        let machine = Arc::new(OrderStateMachine::with_clock(log, Arc::new(NullEventBus), Arc::new(SystemClock)));
        let guard = Arc::new(SingleTradeGuard::new(Arc::new(SystemClock)));
        let positions = Arc::new(PositionStore::open_in_memory().unwrap());
        let reconciler = StartupReconciler::new(positions, machine.clone(), Arc::new(NullExecution::new()), Arc::new(SystemClock), ReconciliationPolicy::Paper);
        let coordinator = RecoveryCoordinator::new(persistence, machine.clone(), guard, reconciler);

        let (outcome, _discrepancies) = coordinator.recover().unwrap();
        assert_eq!(outcome, RecoveryOutcome::Success);
        assert_eq!(machine.get_order(&id).unwrap().state(), OrderState::Submitted);
    }
}
