//! Concurrency admission gate.
//!
//! At most `limit` calls hold a [`Slot`] at once. A caller arriving while the
//! gate is saturated is queued in a [`BoundedDeque`], rejected, or admitted at
//! the expense of the oldest waiter, depending on the [`DropPolicy`]. A freed
//! slot is handed straight to the next waiter, so slots never sit idle while
//! callers wait.
//!
//! Admission is decided synchronously by [`ConcurrencyGate::enqueue`]; the
//! returned [`Ticket`] is then awaited for the slot. Dropping a ticket (or a
//! future waiting on one) withdraws the call from the queue.

use crate::application::metrics::Metrics;
use crate::domain::deque::{BoundedDeque, NodeId};
use crate::domain::error::ThrottleError;
use crate::domain::outcome::Outcome;
use crate::domain::policy::{DropPolicy, QueueOrder};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Hook invoked each time the gate becomes fully idle.
pub type DoneHook = Arc<dyn Fn() + Send + Sync>;

/// Observer for errors raised on behalf of callers and hooks.
pub type ErrorHandler = Arc<dyn Fn(&ThrottleError) + Send + Sync>;

/// Configuration for a [`ConcurrencyGate`].
#[derive(Clone)]
pub struct GateConfig {
    /// Maximum number of slots held at once
    pub limit: usize,
    /// What to do with callers arriving at a saturated gate
    pub policy: DropPolicy,
    /// Order in which waiters are admitted
    pub order: QueueOrder,
    /// Fixed wait-queue size; `None` lets the queue grow
    pub queue_capacity: Option<usize>,
    /// Called whenever the last slot is released with nobody waiting
    pub on_done: Option<DoneHook>,
    /// Told about hook panics
    pub error_handler: Option<ErrorHandler>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            limit: 1,
            policy: DropPolicy::Queue,
            order: QueueOrder::Fifo,
            queue_capacity: None,
            on_done: None,
            error_handler: None,
        }
    }
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("limit", &self.limit)
            .field("policy", &self.policy)
            .field("order", &self.order)
            .field("queue_capacity", &self.queue_capacity)
            .field("on_done", &self.on_done.as_ref().map(|_| "<fn>"))
            .field("error_handler", &self.error_handler.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

struct PendingCall {
    /// Distinguishes this call from a later one recycling the same node
    ticket: u64,
    grant: oneshot::Sender<Outcome<()>>,
}

struct GateState {
    limit: usize,
    in_flight: usize,
    queue: BoundedDeque<PendingCall>,
    policy: DropPolicy,
    order: QueueOrder,
    next_ticket: u64,
}

impl GateState {
    fn owns(&self, node: NodeId, ticket: u64) -> bool {
        self.queue.get(node).is_some_and(|call| call.ticket == ticket)
    }
}

struct GateShared {
    state: Mutex<GateState>,
    on_done: Option<DoneHook>,
    error_handler: Option<ErrorHandler>,
    metrics: Metrics,
}

/// Semaphore-like gate with a policy-driven wait queue.
///
/// Clones share the same slots.
#[derive(Clone)]
pub struct ConcurrencyGate {
    shared: Arc<GateShared>,
}

impl ConcurrencyGate {
    /// Create a FIFO queueing gate with `limit` slots.
    ///
    /// # Errors
    /// `InvalidArgument` if `limit` is zero.
    pub fn new(limit: usize) -> Result<Self, ThrottleError> {
        Self::with_config(GateConfig {
            limit,
            ..GateConfig::default()
        })
    }

    /// Create a gate from a configuration.
    ///
    /// # Errors
    /// `InvalidArgument` if `limit` or a fixed `queue_capacity` is zero.
    pub fn with_config(config: GateConfig) -> Result<Self, ThrottleError> {
        Self::with_metrics(config, Metrics::new())
    }

    /// Create a gate that records into an existing metrics handle.
    pub fn with_metrics(config: GateConfig, metrics: Metrics) -> Result<Self, ThrottleError> {
        if config.limit == 0 {
            return Err(ThrottleError::invalid("concurrency limit must be at least 1"));
        }
        let queue = match config.queue_capacity {
            None => BoundedDeque::new(),
            Some(0) => {
                return Err(ThrottleError::invalid("queue capacity must be at least 1"));
            }
            Some(capacity) => BoundedDeque::with_capacity(capacity),
        };

        Ok(Self {
            shared: Arc::new(GateShared {
                state: Mutex::new(GateState {
                    limit: config.limit,
                    in_flight: 0,
                    queue,
                    policy: config.policy,
                    order: config.order,
                    next_ticket: 0,
                }),
                on_done: config.on_done,
                error_handler: config.error_handler,
                metrics,
            }),
        })
    }

    /// Decide admission for a new caller.
    ///
    /// The ticket is granted if a slot is free, dropped if the policy sheds
    /// the caller, or queued otherwise.
    ///
    /// # Errors
    /// `QueueFull` if the caller must queue and the fixed-size queue is full.
    pub fn enqueue(&self) -> Result<Ticket, ThrottleError> {
        let metrics = &self.shared.metrics;
        let mut state = self.lock();

        if state.in_flight < state.limit {
            state.in_flight += 1;
            metrics.record_admitted();
            return Ok(self.ticket(TicketState::Granted));
        }

        match state.policy {
            DropPolicy::Queue => {}
            DropPolicy::DropNewest => {
                metrics.record_dropped();
                tracing::debug!(in_flight = state.in_flight, "gate saturated, call dropped");
                return Ok(self.ticket(TicketState::Dropped));
            }
            DropPolicy::DropOldest => {
                if let Some(evicted) = state.queue.pop_front() {
                    // The waiter may already be gone; nothing to tell then.
                    let _ = evicted.grant.send(Outcome::Dropped);
                    metrics.record_dropped();
                    tracing::debug!(ticket = evicted.ticket, "oldest queued call evicted");
                }
            }
        }

        let ticket = state.next_ticket;
        let (grant, granted) = oneshot::channel();
        let node = state.queue.push_back(PendingCall { ticket, grant })?;
        state.next_ticket += 1;
        metrics.record_queued();
        tracing::trace!(ticket, queued = state.queue.len(), "call queued");

        Ok(self.ticket(TicketState::Queued {
            node,
            ticket,
            granted,
        }))
    }

    /// Wait for a slot.
    ///
    /// # Errors
    /// `QueueFull` if the caller must queue and the fixed-size queue is full.
    pub async fn acquire(&self) -> Result<Outcome<Slot>, ThrottleError> {
        Ok(self.enqueue()?.wait().await)
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<Slot> {
        let mut state = self.lock();
        if state.in_flight >= state.limit {
            return None;
        }
        state.in_flight += 1;
        self.shared.metrics.record_admitted();
        Some(Slot::new(self.clone()))
    }

    /// Maximum number of slots.
    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Callers waiting for a slot.
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Check if no slot is held and nobody waits.
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.in_flight == 0 && state.queue.is_empty()
    }

    /// Counters shared with every clone of this gate.
    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    fn ticket(&self, state: TicketState) -> Ticket {
        Ticket {
            gate: self.clone(),
            state,
        }
    }

    /// Take a queued call out of the queue if it is still waiting.
    fn withdraw(&self, node: NodeId, ticket: u64) -> Option<PendingCall> {
        let mut state = self.lock();
        if !state.owns(node, ticket) {
            return None;
        }
        let call = state.queue.remove(node);
        if call.is_some() {
            self.shared.metrics.record_cancelled();
            tracing::debug!(ticket, "queued call cancelled");
        }
        call
    }

    /// Give a slot back: hand it to the next waiter, or free it.
    fn release_slot(&self) {
        let became_idle = {
            let mut state = self.lock();
            if state.in_flight == 0 {
                tracing::warn!("slot released with no call admitted");
                return;
            }
            loop {
                let next = match state.order {
                    QueueOrder::Fifo => state.queue.pop_front(),
                    QueueOrder::Lifo => state.queue.pop_back(),
                };
                match next {
                    Some(call) => {
                        if call.grant.send(Outcome::Completed(())).is_ok() {
                            self.shared.metrics.record_admitted();
                            break false;
                        }
                    }
                    None => {
                        state.in_flight -= 1;
                        break state.in_flight == 0;
                    }
                }
            }
        };

        if became_idle {
            self.notify_idle();
        }
    }

    fn notify_idle(&self) {
        if let Some(hook) = &self.shared.on_done {
            run_idle_hook(hook, self.shared.error_handler.as_ref());
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run an `on_done` hook, reporting a panic instead of unwinding into the
/// releasing caller.
pub(crate) fn run_idle_hook(hook: &DoneHook, error_handler: Option<&ErrorHandler>) {
    if panic::catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
        tracing::error!("on_done hook panicked");
        if let Some(handler) = error_handler {
            handler(&ThrottleError::HookPanicked);
        }
    }
}

impl fmt::Debug for ConcurrencyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ConcurrencyGate")
            .field("limit", &state.limit)
            .field("in_flight", &state.in_flight)
            .field("queued", &state.queue.len())
            .field("policy", &state.policy)
            .field("order", &state.order)
            .finish()
    }
}

enum TicketState {
    Granted,
    Dropped,
    Queued {
        node: NodeId,
        ticket: u64,
        granted: oneshot::Receiver<Outcome<()>>,
    },
    Finished,
}

/// Admission decision for one caller.
///
/// A ticket that is dropped while queued leaves the queue; a granted ticket
/// that is dropped without being waited on gives its slot back.
#[must_use = "a ticket does nothing unless waited on"]
pub struct Ticket {
    gate: ConcurrencyGate,
    state: TicketState,
}

impl Ticket {
    /// Check if the caller is waiting in the queue.
    pub fn is_queued(&self) -> bool {
        matches!(self.state, TicketState::Queued { .. })
    }

    /// Check if the caller was shed at admission.
    pub fn is_dropped(&self) -> bool {
        matches!(self.state, TicketState::Dropped)
    }

    /// Handle for withdrawing the call while it is queued.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        match &self.state {
            TicketState::Queued { node, ticket, .. } => Some(CancelHandle {
                gate: self.gate.clone(),
                node: *node,
                ticket: *ticket,
            }),
            _ => None,
        }
    }

    /// Wait for the slot, or for the call to be dropped.
    pub async fn wait(mut self) -> Outcome<Slot> {
        let outcome = match &mut self.state {
            TicketState::Granted => Outcome::Completed(()),
            TicketState::Dropped | TicketState::Finished => Outcome::Dropped,
            TicketState::Queued { granted, .. } => granted.await.unwrap_or(Outcome::Dropped),
        };
        self.state = TicketState::Finished;
        outcome.map(|()| Slot::new(self.gate.clone()))
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.state, TicketState::Finished) {
            TicketState::Granted => self.gate.release_slot(),
            TicketState::Queued {
                node,
                ticket,
                mut granted,
            } => {
                if self.gate.withdraw(node, ticket).is_none() {
                    // Already popped: the slot may have been handed over
                    // before anyone received it.
                    if let Ok(Outcome::Completed(())) = granted.try_recv() {
                        self.gate.release_slot();
                    }
                }
            }
            TicketState::Dropped | TicketState::Finished => {}
        }
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            TicketState::Granted => "granted",
            TicketState::Dropped => "dropped",
            TicketState::Queued { .. } => "queued",
            TicketState::Finished => "finished",
        };
        f.debug_struct("Ticket").field("state", &state).finish()
    }
}

/// Withdraws a queued call from outside the task waiting on it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    gate: ConcurrencyGate,
    node: NodeId,
    ticket: u64,
}

impl CancelHandle {
    /// Drop the call if it is still queued.
    ///
    /// The waiting caller receives `Outcome::Dropped`. Returns `false` if the
    /// call was already admitted, dropped or cancelled.
    pub fn cancel(&self) -> bool {
        match self.gate.withdraw(self.node, self.ticket) {
            Some(call) => {
                let _ = call.grant.send(Outcome::Dropped);
                true
            }
            None => false,
        }
    }
}

/// One unit of gate capacity, released on drop.
#[must_use = "dropping a slot releases it immediately"]
pub struct Slot {
    gate: Option<ConcurrencyGate>,
    /// Runs once, right after the gate has the slot back
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl Slot {
    fn new(gate: ConcurrencyGate) -> Self {
        Self {
            gate: Some(gate),
            on_release: None,
        }
    }

    /// Attach a callback to run after the slot is released.
    pub(crate) fn on_release(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(callback));
        self
    }

    /// Give the slot back to the gate.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.release_slot();
        }
        if let Some(callback) = self.on_release.take() {
            callback();
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("released", &self.gate.is_none())
            .finish()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.release_once();
    }
}

/// Completion callback handed to callback-style jobs.
///
/// Releasing is idempotent across clones; the slot is also released once the
/// last clone is dropped.
#[derive(Debug, Clone)]
pub struct Done {
    slot: Arc<Mutex<Option<Slot>>>,
}

impl Done {
    pub(crate) fn new(slot: Slot) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(slot))),
        }
    }

    /// Signal that the job finished.
    pub fn release(&self) {
        let slot = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(slot);
    }

    /// Check if the slot was already released.
    pub fn is_released(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
