//! Deterministic discrete-event simulation of a two-wire bus.
//!
//! Simulated time only moves when [`Simulation::advance`] is called. Wire changes and timer
//! expirations wake the tasks waiting on them, and [`Simulation::settle`] polls every spawned
//! task until none of them can make progress at the current instant.

use crate::bus::{BusWires, HIGH};
use std::{
    cell::{Cell, RefCell},
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll, Wake, Waker},
    time::Duration,
};
use tracing::warn;

pub mod clock;
pub mod testbench;
pub mod wire;

pub use clock::SimClock;
pub use testbench::Testbench;
pub use wire::SimWire;

/// A one-shot slot a task waits on until the simulator fires it.
#[derive(Debug)]
pub(crate) struct Waiter<T: Copy> {
    value: Cell<Option<T>>,
    waker: RefCell<Option<Waker>>,
}

impl<T: Copy> Waiter<T> {
    pub(crate) const fn new() -> Self {
        Self {
            value: Cell::new(None),
            waker: RefCell::new(None),
        }
    }

    pub(crate) fn fire(&self, value: T) {
        self.value.set(Some(value));
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    pub(crate) fn poll(&self, cx: &Context<'_>) -> Poll<T> {
        match self.value.get() {
            Some(value) => Poll::Ready(value),
            None => {
                *self.waker.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[derive(Debug, Default)]
struct WakeFlag(AtomicBool);

impl WakeFlag {
    fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }
}

impl Wake for WakeFlag {
    fn wake(self: Arc<Self>) {
        self.set();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.set();
    }
}

/// Single-threaded executor driven by simulated time.
#[must_use]
pub struct Simulation<'a> {
    clock: SimClock,
    tasks: Vec<Pin<Box<dyn Future<Output = ()> + 'a>>>,
    woken: Arc<WakeFlag>,
}

impl fmt::Debug for Simulation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.clock.now())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Simulation<'a> {
    /// Polling passes allowed at a single instant before giving up on reaching quiescence.
    pub const MAX_PASSES: usize = 1024;

    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            tasks: Vec::new(),
            woken: Arc::new(WakeFlag::default()),
        }
    }

    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Number of tasks that have not completed.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Adds a task and polls it until it first suspends.
    pub fn spawn(&mut self, task: impl Future<Output = ()> + 'a) {
        self.tasks.push(Box::pin(task));
        self.woken.set();
        self.settle();
    }

    /// Polls tasks until none of them were woken at the current instant.
    pub fn settle(&mut self) {
        let waker = Waker::from(Arc::clone(&self.woken));
        let mut cx = Context::from_waker(&waker);
        for _ in 0..Self::MAX_PASSES {
            if !self.woken.take() {
                return;
            }
            self.tasks
                .retain_mut(|task| task.as_mut().poll(&mut cx).is_pending());
        }
        warn!(
            "simulation did not settle after {} passes at {:?}",
            Self::MAX_PASSES,
            self.clock.now()
        );
    }

    /// Moves simulated time forward by `duration`, firing timers in deadline order.
    pub fn advance(&mut self, duration: Duration) {
        self.settle();
        let target = self.clock.now_ns().saturating_add(clock::as_nanos(duration));
        while self.clock.fire_next(target) {
            self.settle();
        }
        self.clock.set_now(target);
        self.settle();
    }
}

/// Simulated bus wires with a master-driven data line and a responder-driven data line.
///
/// The responder observes only the master's data line. The resolved bus level seen by the
/// master is the open-drain wired-AND of both drivers.
#[derive(Debug, Clone)]
#[must_use]
pub struct SimBus {
    clock: SimClock,
    pub scl: SimWire,
    pub sda: SimWire,
    pub sda_slave: SimWire,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            scl: SimWire::new("scl", HIGH),
            sda: SimWire::new("sda", HIGH),
            sda_slave: SimWire::new("sda_slave", HIGH),
        }
    }

    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }

    /// Wires for attaching a responder to this bus.
    pub fn wires(&self) -> BusWires<SimWire, SimWire, SimWire> {
        BusWires::new(self.scl.clone(), self.sda.clone(), self.sda_slave.clone())
    }

    /// Resolved data line level.
    #[must_use]
    pub fn bus_level(&self) -> u8 {
        self.sda.level() & self.sda_slave.level()
    }
}
