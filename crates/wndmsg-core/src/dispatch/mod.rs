//! Listener fan-out on the consumer thread.
//!
//! The pump thread never calls a listener.  It only pushes into the
//! [`EventQueue`]; the host calls [`Dispatcher::dispatch_tick`] from its
//! update loop, which drains the queue and hands each event to every
//! registered listener whose [`CategoryFilter`] accepts it.
//!
//! # Fault isolation
//!
//! A listener that returns `Err` or panics produces a [`ListenerFault`].  The
//! fault is logged, counted and reported in the [`DispatchReport`]; the
//! remaining listeners still receive the event and the faulty listener stays
//! registered for the next one.
//!
//! # Re-entrancy
//!
//! Registrations are snapshotted at the start of a tick, so a listener may
//! call `subscribe`/`unsubscribe` while being invoked.  Changes take effect on
//! the next tick.  A listener that calls `dispatch_tick` gets
//! [`DispatchError::AlreadyDispatching`].

pub mod registry;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::event::TranslatedEvent;
use crate::pipeline::metrics::PipelineMetrics;
use crate::pipeline::queue::EventQueue;

pub use registry::{CategoryFilter, EventListener, ListenerId, ListenerRegistry};

/// Errors returned by [`Dispatcher::dispatch_tick`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("a dispatch tick is already running")]
    AlreadyDispatching,
}

/// One failed listener invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{id} failed on event #{sequence}: {reason}")]
pub struct ListenerFault {
    pub id: ListenerId,
    /// Sequence number of the event being delivered.
    pub sequence: u64,
    pub reason: String,
}

/// Summary of one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Events drained from the queue.
    pub events: usize,
    /// Successful listener invocations.
    pub deliveries: usize,
    pub faults: Vec<ListenerFault>,
}

/// Resets the in-flight flag when a tick ends, including by unwinding.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains an [`EventQueue`] into registered listeners.
pub struct Dispatcher {
    queue: Arc<EventQueue>,
    registry: Mutex<ListenerRegistry>,
    in_flight: AtomicBool,
    metrics: Arc<PipelineMetrics>,
}

impl Dispatcher {
    pub fn new(queue: Arc<EventQueue>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            queue,
            registry: Mutex::new(ListenerRegistry::new()),
            in_flight: AtomicBool::new(false),
            metrics,
        }
    }

    /// Registers a closure listener.
    pub fn subscribe<F>(&self, filter: CategoryFilter, callback: F) -> ListenerId
    where
        F: FnMut(&TranslatedEvent) -> anyhow::Result<()> + Send + 'static,
    {
        self.subscribe_listener(filter, callback)
    }

    /// Registers any [`EventListener`] implementation.
    pub fn subscribe_listener<L>(&self, filter: CategoryFilter, listener: L) -> ListenerId
    where
        L: EventListener + 'static,
    {
        let id = self.registry.lock().subscribe(filter, Box::new(listener));
        debug!(%id, "listener subscribed");
        id
    }

    /// Removes a listener.  Returns `false` if `id` is not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = self.registry.lock().unsubscribe(id);
        if removed {
            debug!(%id, "listener unsubscribed");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.registry.lock().contains(id)
    }

    /// Registered listener ids, in the order they are called.
    pub fn listener_ids(&self) -> Vec<ListenerId> {
        self.registry.lock().ids()
    }

    pub fn is_dispatching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Drains the queue and delivers every event, in order, to every
    /// listener whose filter accepts its category.
    pub fn dispatch_tick(&self) -> Result<DispatchReport, DispatchError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DispatchError::AlreadyDispatching);
        }
        let _guard = TickGuard(&self.in_flight);

        let events = self.queue.drain_all();
        let registrations = self.registry.lock().snapshot();
        let mut report = DispatchReport {
            events: events.len(),
            ..DispatchReport::default()
        };

        for event in &events {
            for registration in &registrations {
                if !registration.filter.accepts(&event.category) {
                    continue;
                }
                match deliver(&registration.listener, event) {
                    Ok(()) => report.deliveries += 1,
                    Err(reason) => {
                        let fault = ListenerFault {
                            id: registration.id,
                            sequence: event.sequence,
                            reason,
                        };
                        warn!(
                            listener = %fault.id,
                            sequence = fault.sequence,
                            category = %event.category,
                            reason = %fault.reason,
                            "listener fault"
                        );
                        report.faults.push(fault);
                    }
                }
            }
        }

        self.metrics.record_dispatch_tick();
        self.metrics.record_delivered(report.deliveries as u64);
        self.metrics.record_listener_faults(report.faults.len() as u64);
        Ok(report)
    }
}

fn deliver(listener: &registry::SharedListener, event: &TranslatedEvent) -> Result<(), String> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| listener.lock().on_event(event)));
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
