//! Execution Core Binary
//!
//! Runs the order-execution core as a single cooperative-thread loop: no
//! implicit async/await in the loop body, every suspension point (broker
//! calls, signal wait) is an explicit blocking call.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin execution-core -- [config path]
//! ```
//!
//! # Environment Variables
//!
//! - `EXECUTION_CORE_CONFIG`: path to the YAML config file (default: `config.yaml`)
//! - `EXECUTION_CORE_DATA_DIR`: base directory for the transaction log, position
//!   store, journal, and state snapshots (default: `./data`)
//! - `RUST_LOG`: log level (default: info)

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use execution_core::application::ports::NullExecution;
use execution_core::application::services::{PeriodicReconciler, ReconciliationPolicy, RecoveryCoordinator, StartupReconciler, StatePersistence};
use execution_core::config::{self, RunMode};
use execution_core::domain::order_execution::services::OrderStateMachine;
use execution_core::domain::shared::SystemClock;
use execution_core::{EventBus, PositionStore, SingleTradeGuard, TransactionLog};

/// How long the main loop sleeps between poll/reconcile ticks.
const LOOP_TICK: Duration = Duration::from_millis(500);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("execution_core=info".parse().expect("static directive parses")))
        .init();

    let exit_code = run();
    std::process::exit(exit_code);
}

#[allow(clippy::too_many_lines)]
fn run() -> i32 {
    let config_path = std::env::var("EXECUTION_CORE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, path = %config_path, "failed to load configuration");
            return 1;
        }
    };

    let data_dir = PathBuf::from(std::env::var("EXECUTION_CORE_DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(error = %e, "failed to create data directory");
        return 1;
    }

    let clock = Arc::new(SystemClock);

    let log = match TransactionLog::open(data_dir.join("transaction.log")) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            tracing::error!(error = %e, "failed to open transaction log");
            return 1;
        }
    };

    let positions = match PositionStore::open(data_dir.join("positions.db")) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "failed to open position store");
            return 1;
        }
    };

    let bus_policy = match config.event_bus.backpressure_policy {
        config::BackpressurePolicySetting::Block => execution_core::infrastructure::BackpressurePolicy::Block,
        config::BackpressurePolicySetting::Drop => execution_core::infrastructure::BackpressurePolicy::Drop,
    };
    let bus = Arc::new(EventBus::new(config.event_bus.queue_size, bus_policy));
    bus.start();

    let machine = Arc::new(OrderStateMachine::with_clock(log.clone(), bus.clone(), clock.clone()));

    let guard = Arc::new(SingleTradeGuard::new(clock.clone()));

    let broker = Arc::new(NullExecution::new());

    let policy = match config.mode {
        RunMode::Live => ReconciliationPolicy::Live,
        RunMode::Paper | RunMode::Backtest => ReconciliationPolicy::Paper,
    };

    let persistence = StatePersistence::new(data_dir.join("snapshots"), 5);
    let reconciler = StartupReconciler::new(positions.clone(), machine.clone(), broker.clone(), clock.clone(), policy);
    let coordinator = RecoveryCoordinator::new(persistence, machine.clone(), guard.clone(), reconciler);

    let (outcome, discrepancies) = match coordinator.recover() {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "recovery sequence failed with an internal error");
            return 1;
        }
    };
    tracing::info!(?outcome, discrepancy_count = discrepancies.len(), "recovery complete");
    for discrepancy in &discrepancies {
        tracing::warn!(?discrepancy, "reconciliation discrepancy at startup");
    }
    if matches!(outcome, execution_core::application::services::RecoveryOutcome::Failed) {
        tracing::error!("recovery outcome FAILED, refusing to start the main loop");
        return 1;
    }

    let periodic_reconciler = PeriodicReconciler::new(
        StartupReconciler::new(positions, machine.clone(), broker.clone(), clock.clone(), policy),
        clock.clone(),
        config.reconciliation_interval_s,
    );

    let engine = match execution_core::ExecutionEngine::new(machine, broker, log, clock) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!(error = %e, "failed to construct execution engine");
            return 1;
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_listener(shutdown.clone());

    tracing::info!("execution core main loop starting");
    while !shutdown.load(Ordering::Relaxed) {
        if let Err(e) = block_on(engine.poll_open_orders()) {
            tracing::error!(error = %e, "poll_open_orders failed");
        }

        let check = periodic_reconciler.check();
        if check.ran {
            for discrepancy in &check.discrepancies {
                tracing::warn!(?discrepancy, "reconciliation discrepancy");
            }
            if periodic_reconciler.should_halt(&check.discrepancies) {
                tracing::error!("live-mode reconciliation found discrepancies, halting");
                return 1;
            }
        }

        std::thread::sleep(LOOP_TICK);
    }

    bus.stop(Duration::from_secs(5));
    tracing::info!("execution core shut down cleanly");
    0
}

/// Block the current (single cooperative) thread on one future. Used at
/// each of the loop's explicit suspension points instead of making the loop
/// itself `async fn`.
fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    match tokio::runtime::Handle::try_current() {
        Err(_) => tokio::runtime::Builder::new_current_thread().enable_all().build().expect("tokio runtime").block_on(fut),
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
    }
}

/// Spawn a dedicated OS thread that owns a tiny runtime just to wait on
/// SIGINT/SIGTERM, then flips `shutdown`. Kept off the main loop's thread so
/// the loop itself stays free of implicit async/await.
fn spawn_signal_listener(shutdown: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "failed to start signal listener runtime");
                return;
            }
        };
        runtime.block_on(async {
            let ctrl_c = async {
                let _ = tokio::signal::ctrl_c().await;
            };

            #[cfg(unix)]
            let terminate = async {
                if let Ok(mut stream) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    stream.recv().await;
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                () = ctrl_c => tracing::info!("received Ctrl+C, initiating shutdown"),
                () = terminate => tracing::info!("received SIGTERM, initiating shutdown"),
            }
        });
        shutdown.store(true, Ordering::Relaxed);
    });
}
