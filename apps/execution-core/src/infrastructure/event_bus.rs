//! Bounded, single-worker-thread event bus (C4).
//!
//! `publish`/`emit` enqueue and return immediately; a dedicated worker
//! thread drains the queue and fans each event out to every subscriber.
//! A misbehaving handler is caught and counted, never allowed to crash the
//! worker or block delivery to the other subscribers of the same event.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::domain::order_execution::events::OrderStateChanged;
use crate::domain::order_execution::ports::OrderEventBus;

/// What happens to a publish when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Block the producer until space frees up.
    Block,
    /// Drop the event and increment the dropped-events counter.
    Drop,
}

type Handler = Box<dyn Fn(&OrderStateChanged) + Send + Sync>;

struct RunningState {
    sender: SyncSender<OrderStateChanged>,
    stop_flag: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Real, thread-safe implementation of [`OrderEventBus`].
///
/// `start()`/`stop(timeout)` are idempotent and may be called repeatedly
/// across the bus's lifetime without leaking worker threads.
pub struct EventBus {
    capacity: usize,
    policy: BackpressurePolicy,
    subscribers: Arc<Mutex<Vec<Handler>>>,
    dropped: Arc<AtomicU64>,
    handler_errors: Arc<AtomicU64>,
    running: Mutex<Option<RunningState>>,
}

impl EventBus {
    /// Create a bus with the given bounded queue capacity and backpressure
    /// policy. Call [`start`](Self::start) to spawn the worker thread.
    #[must_use]
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        Self {
            capacity: capacity.max(1),
            policy,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            dropped: Arc::new(AtomicU64::new(0)),
            handler_errors: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        }
    }

    /// Register a handler invoked, on the worker thread, for every event.
    /// May be called before or after `start()`.
    pub fn subscribe(&self, handler: impl Fn(&OrderStateChanged) + Send + Sync + 'static) {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Spawn the worker thread and open the queue. No-op if already running.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if running.is_some() {
            return;
        }
        let (sender, receiver) = mpsc::sync_channel(self.capacity);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let worker_stop_flag = Arc::clone(&stop_flag);
        let subscribers = Arc::clone(&self.subscribers);
        let handler_errors = Arc::clone(&self.handler_errors);
        let worker = std::thread::spawn(move || loop {
            match receiver.recv_timeout(Duration::from_millis(50)) {
                Ok(event) => dispatch(&subscribers, &handler_errors, &event),
                Err(RecvTimeoutError::Timeout) => {
                    if worker_stop_flag.load(Ordering::Relaxed) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        *running = Some(RunningState {
            sender,
            stop_flag,
            worker,
        });
    }

    /// Signal shutdown, drain whatever is already queued, and join the
    /// worker. `timeout` bounds how long this call blocks; a worker that
    /// hasn't finished draining by then is abandoned to its own thread and
    /// `stop` returns anyway, so the caller's shutdown path never hangs.
    pub fn stop(&self, timeout: Duration) {
        let state = self.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take();
        let Some(state) = state else { return };
        state.stop_flag.store(true, Ordering::Relaxed);
        drop(state.sender);

        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = state.worker.join();
            let _ = done_tx.send(());
        });
        let _ = done_rx.recv_timeout(timeout);
    }

    /// Number of events dropped due to backpressure.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of handler invocations that panicked.
    #[must_use]
    pub fn handler_error_count(&self) -> u64 {
        self.handler_errors.load(Ordering::Relaxed)
    }

    /// Enqueue an event; returns without waiting for delivery. A no-op if
    /// the bus has not been started.
    pub fn emit(&self, event: OrderStateChanged) {
        let running = self.running.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(state) = running.as_ref() else { return };
        match self.policy {
            BackpressurePolicy::Block => {
                let _ = state.sender.send(event);
            }
            BackpressurePolicy::Drop => match state.sender.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            },
        }
    }
}

fn dispatch(subscribers: &Arc<Mutex<Vec<Handler>>>, handler_errors: &Arc<AtomicU64>, event: &OrderStateChanged) {
    let subscribers = subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    for handler in subscribers.iter() {
        if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
            tracing::error!(order_id = %event.order_id, "event bus handler panicked");
            handler_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl OrderEventBus for EventBus {
    fn publish(&self, event: OrderStateChanged) {
        self.emit(event);
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.stop(Duration::from_millis(500));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_execution::value_objects::OrderState;
    use crate::domain::shared::OrderId;
    use std::sync::atomic::AtomicUsize;

    fn event(order_id: &str) -> OrderStateChanged {
        OrderStateChanged {
            order_id: OrderId::new(order_id),
            from: OrderState::Pending,
            to: OrderState::Submitted,
            broker_order_id: None,
            filled_qty: None,
            fill_price: None,
            reason: None,
            occurred_at: crate::domain::shared::Timestamp::now(),
        }
    }

    #[test]
    fn subscriber_receives_published_event() {
        let bus = EventBus::new(16, BackpressurePolicy::Block);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.subscribe(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.start();
        bus.publish(event("ord-1"));
        bus.stop(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_stop_other_handlers() {
        let bus = EventBus::new(16, BackpressurePolicy::Block);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.subscribe(|_event| panic!("boom"));
        bus.subscribe(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.start();
        bus.publish(event("ord-1"));
        bus.stop(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_error_count(), 1);
    }

    #[test]
    fn drop_policy_counts_saturated_queue() {
        let bus = EventBus::new(1, BackpressurePolicy::Drop);
        bus.subscribe(|_event| std::thread::sleep(Duration::from_millis(200)));
        bus.start();
        // The worker immediately pulls the first event into its sleeping
        // handler, leaving the single queue slot free for exactly one more
        // before subsequent emits are dropped.
        for i in 0..5 {
            bus.emit(event(&format!("ord-{i}")));
        }
        bus.stop(Duration::from_secs(1));
        assert!(bus.dropped_count() >= 1);
    }

    #[test]
    fn start_stop_cycles_do_not_leak_threads() {
        let bus = EventBus::new(16, BackpressurePolicy::Block);
        for _ in 0..3 {
            bus.start();
            bus.stop(Duration::from_millis(200));
        }
    }
}
