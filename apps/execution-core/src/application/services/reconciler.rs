//! Reconciler (C9): compares local state against broker truth at startup
//! and on a timed interval.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::application::ports::broker_port::Broker;
use crate::domain::order_execution::services::OrderStateMachine;
use crate::domain::shared::{Clock, Symbol, Timestamp};
use crate::infrastructure::PositionStore;

/// The kind of drift detected between local and broker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyType {
    MissingPosition,
    ExtraPosition,
    QtyMismatch,
    OrderMissingLocal,
    OrderMissingBroker,
    OrderStatusMismatch,
    ReconciliationError,
}

/// One detected drift between local records and broker-reported truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    pub discrepancy_type: DiscrepancyType,
    pub symbol: Symbol,
    pub local_value: String,
    pub broker_value: String,
    pub resolution: String,
    pub timestamp: Timestamp,
}

/// Whether the runtime is in a mode that tolerates drift (paper) or must
/// halt on it (live).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationPolicy {
    Paper,
    Live,
}

/// Runs once at boot, comparing local positions/orders against broker truth.
pub struct StartupReconciler {
    positions: std::sync::Arc<PositionStore>,
    machine: std::sync::Arc<OrderStateMachine>,
    broker: std::sync::Arc<dyn Broker>,
    clock: std::sync::Arc<dyn Clock>,
    policy: ReconciliationPolicy,
}

impl StartupReconciler {
    #[must_use]
    pub fn new(
        positions: std::sync::Arc<PositionStore>,
        machine: std::sync::Arc<OrderStateMachine>,
        broker: std::sync::Arc<dyn Broker>,
        clock: std::sync::Arc<dyn Clock>,
        policy: ReconciliationPolicy,
    ) -> Self {
        Self {
            positions,
            machine,
            broker,
            clock,
            policy,
        }
    }

    /// Run one full reconciliation pass and return every discrepancy found.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local position store itself cannot be
    /// read; broker failures are folded into a `reconciliation_error`
    /// discrepancy instead of propagating.
    pub fn reconcile(&self) -> Result<Vec<Discrepancy>, crate::infrastructure::position_store::PositionStoreError> {
        let now = self.clock.now();
        let mut discrepancies = Vec::new();

        let local_positions = self.positions.get_all()?;
        let broker_positions = match self.broker_positions_blocking() {
            Ok(p) => p,
            Err(e) => {
                discrepancies.push(reconciliation_error(now, e.to_string()));
                return Ok(discrepancies);
            }
        };

        for local in &local_positions {
            match broker_positions.iter().find(|b| b.symbol == local.symbol) {
                None => discrepancies.push(Discrepancy {
                    discrepancy_type: DiscrepancyType::ExtraPosition,
                    symbol: local.symbol.clone(),
                    local_value: local.quantity.amount().to_string(),
                    broker_value: "none".to_string(),
                    resolution: resolution_for(self.policy),
                    timestamp: now,
                }),
                Some(broker) if broker.quantity != local.quantity => discrepancies.push(Discrepancy {
                    discrepancy_type: DiscrepancyType::QtyMismatch,
                    symbol: local.symbol.clone(),
                    local_value: local.quantity.amount().to_string(),
                    broker_value: broker.quantity.amount().to_string(),
                    resolution: resolution_for(self.policy),
                    timestamp: now,
                }),
                Some(_) => {}
            }
        }
        for broker in &broker_positions {
            if !local_positions.iter().any(|l| l.symbol == broker.symbol) {
                discrepancies.push(Discrepancy {
                    discrepancy_type: DiscrepancyType::MissingPosition,
                    symbol: broker.symbol.clone(),
                    local_value: "none".to_string(),
                    broker_value: broker.quantity.amount().to_string(),
                    resolution: resolution_for(self.policy),
                    timestamp: now,
                });
            }
        }

        let local_open_orders = self.machine.get_pending_orders();
        let broker_open_orders = match self.broker_open_orders_blocking() {
            Ok(o) => o,
            Err(e) => {
                discrepancies.push(reconciliation_error(now, e.to_string()));
                return Ok(discrepancies);
            }
        };
        for local in &local_open_orders {
            let Some(broker_order_id) = local.broker_order_id() else { continue };
            match broker_open_orders.iter().find(|b| &b.broker_order_id == broker_order_id) {
                None => discrepancies.push(Discrepancy {
                    discrepancy_type: DiscrepancyType::OrderMissingBroker,
                    symbol: local.symbol().clone(),
                    local_value: local.state().to_string(),
                    broker_value: "none".to_string(),
                    resolution: resolution_for(self.policy),
                    timestamp: now,
                }),
                Some(broker) if broker.status != local.state().to_string() => discrepancies.push(Discrepancy {
                    discrepancy_type: DiscrepancyType::OrderStatusMismatch,
                    symbol: local.symbol().clone(),
                    local_value: local.state().to_string(),
                    broker_value: broker.status.clone(),
                    resolution: resolution_for(self.policy),
                    timestamp: now,
                }),
                Some(_) => {}
            }
        }

        Ok(discrepancies)
    }

    /// Whether, given `discrepancies` and the configured policy, the runtime
    /// must halt before starting the main loop.
    #[must_use]
    pub fn should_halt(&self, discrepancies: &[Discrepancy]) -> bool {
        self.policy == ReconciliationPolicy::Live && !discrepancies.is_empty()
    }

    fn broker_positions_blocking(&self) -> Result<Vec<crate::application::ports::broker_port::BrokerPosition>, crate::application::ports::broker_port::BrokerError> {
        block_on_current_thread(self.broker.get_positions())
    }

    fn broker_open_orders_blocking(&self) -> Result<Vec<crate::application::ports::broker_port::BrokerOpenOrder>, crate::application::ports::broker_port::BrokerError> {
        block_on_current_thread(self.broker.get_open_orders())
    }
}

fn resolution_for(policy: ReconciliationPolicy) -> String {
    match policy {
        ReconciliationPolicy::Paper => "logged".to_string(),
        ReconciliationPolicy::Live => "halt".to_string(),
    }
}

fn reconciliation_error(now: Timestamp, message: String) -> Discrepancy {
    Discrepancy {
        discrepancy_type: DiscrepancyType::ReconciliationError,
        symbol: Symbol::new("N/A"),
        local_value: String::new(),
        broker_value: message,
        resolution: "logged".to_string(),
        timestamp: now,
    }
}

/// §5's "the main loop runs cooperatively on a single thread" rule applies
/// here too: block on the one broker call this reconciler needs rather than
/// infecting the whole reconciler API with async.
fn block_on_current_thread<F: std::future::Future>(fut: F) -> F::Output {
    match tokio::runtime::Handle::try_current() {
        Err(_) => tokio::runtime::Runtime::new().expect("tokio runtime").block_on(fut),
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
    }
}

/// Wraps a `StartupReconciler` with a timed gate so `check()` runs at most
/// once per `interval_s` even under concurrent callers (§4.9, P8).
pub struct PeriodicReconciler {
    inner: StartupReconciler,
    clock: std::sync::Arc<dyn Clock>,
    interval_s: i64,
    last_run: Mutex<Option<Timestamp>>,
    running: Mutex<()>,
}

/// Result of one `check()` call.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub ran: bool,
    pub skipped_reason: Option<String>,
    pub discrepancies: Vec<Discrepancy>,
}

impl PeriodicReconciler {
    #[must_use]
    pub fn new(inner: StartupReconciler, clock: std::sync::Arc<dyn Clock>, interval_s: i64) -> Self {
        Self {
            inner,
            clock,
            interval_s,
            last_run: Mutex::new(None),
            running: Mutex::new(()),
        }
    }

    /// Run a full reconciliation if `interval_s` has elapsed since the last
    /// run, otherwise report a skip. Serialized: concurrent callers block on
    /// each other rather than racing to both run.
    pub fn check(&self) -> CheckResult {
        let _guard = self.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = self.clock.now();
        let mut last_run = self.last_run.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(last) = *last_run {
            if now.duration_since(last).num_seconds() < self.interval_s {
                return CheckResult {
                    ran: false,
                    skipped_reason: Some("interval_not_elapsed".to_string()),
                    discrepancies: Vec::new(),
                };
            }
        }
        *last_run = Some(now);
        drop(last_run);

        match self.inner.reconcile() {
            Ok(discrepancies) => CheckResult {
                ran: true,
                skipped_reason: None,
                discrepancies,
            },
            Err(e) => CheckResult {
                ran: true,
                skipped_reason: None,
                discrepancies: vec![reconciliation_error(now, e.to_string())],
            },
        }
    }

    #[must_use]
    pub fn should_halt(&self, discrepancies: &[Discrepancy]) -> bool {
        self.inner.should_halt(discrepancies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::broker_port::NullExecution;
    use crate::domain::order_execution::ports::NullEventBus;
    use crate::domain::shared::SystemClock;
    use std::sync::Arc;

    fn reconciler() -> StartupReconciler {
        let positions = Arc::new(PositionStore::open_in_memory().unwrap());
        let log = Arc::new(InMemoryLog::default());
        let machine = Arc::new(OrderStateMachine::with_clock(log, Arc::new(NullEventBus), Arc::new(SystemClock)));
        StartupReconciler::new(positions, machine, Arc::new(NullExecution::new()), Arc::new(SystemClock), ReconciliationPolicy::Paper)
    }

    #[derive(Default)]
    struct InMemoryLog(crate::domain::order_execution::ports::InMemoryTransactionLog);
    impl crate::domain::order_execution::ports::TransactionLogPort for InMemoryLog {
        fn append(&self, event: &crate::domain::order_execution::events::OrderStateChanged) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.0.append(event)
        }
        fn replay(&self) -> Result<Vec<crate::domain::order_execution::events::OrderStateChanged>, Box<dyn std::error::Error + Send + Sync>> {
            self.0.replay()
        }
    }

    #[test]
    fn reconcile_with_nothing_on_either_side_finds_no_discrepancies() {
        let reconciler = reconciler();
        let discrepancies = reconciler.reconcile().unwrap();
        assert!(discrepancies.is_empty());
    }

    #[test]
    fn live_policy_halts_on_any_discrepancy() {
        let reconciler = reconciler();
        let discrepancy = Discrepancy {
            discrepancy_type: DiscrepancyType::QtyMismatch,
            symbol: Symbol::new("SPY"),
            local_value: "10".to_string(),
            broker_value: "12".to_string(),
            resolution: "halt".to_string(),
            timestamp: Timestamp::now(),
        };
        let live = StartupReconciler {
            policy: ReconciliationPolicy::Live,
            ..reconciler
        };
        assert!(live.should_halt(&[discrepancy]));
    }

    #[test]
    fn periodic_reconciler_skips_within_interval() {
        let periodic = PeriodicReconciler::new(reconciler(), Arc::new(SystemClock), 300);
        let first = periodic.check();
        assert!(first.ran);
        let second = periodic.check();
        assert!(!second.ran);
        assert_eq!(second.skipped_reason.as_deref(), Some("interval_not_elapsed"));
    }
}
