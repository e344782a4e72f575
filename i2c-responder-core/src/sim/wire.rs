use crate::{
    bus::{Drive, Signal, HIGH, LOW},
    sim::Waiter,
};
use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};
use tracing::trace;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Edge {
    Rising,
    Falling,
}

#[derive(Debug)]
struct WireState {
    name: String,
    level: Cell<u8>,
    transitions: Cell<u64>,
    waiters: RefCell<Vec<(Edge, Rc<Waiter<u8>>)>>,
}

/// A single-bit simulated wire shared between its drivers and observers.
#[derive(Debug, Clone)]
#[must_use]
pub struct SimWire {
    state: Rc<WireState>,
}

impl SimWire {
    pub fn new(name: impl Into<String>, level: u8) -> Self {
        Self {
            state: Rc::new(WireState {
                name: name.into(),
                level: Cell::new(Self::normalize(level)),
                transitions: Cell::new(0),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    const fn normalize(level: u8) -> u8 {
        if level == LOW {
            LOW
        } else {
            HIGH
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.state.name
    }

    #[must_use]
    pub fn level(&self) -> u8 {
        self.state.level.get()
    }

    /// Number of level changes since the wire was created.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.state.transitions.get()
    }

    /// Sets the wire level, waking tasks waiting on the resulting edge.
    pub fn set(&self, level: u8) {
        let level = Self::normalize(level);
        if level == self.state.level.get() {
            return;
        }
        self.state.level.set(level);
        self.state.transitions.set(self.state.transitions.get() + 1);
        trace!("{} -> {level}", self.state.name);

        let edge = if level == HIGH {
            Edge::Rising
        } else {
            Edge::Falling
        };
        let fired = {
            let mut waiters = self.state.waiters.borrow_mut();
            let (fired, waiting): (Vec<_>, Vec<_>) =
                waiters.drain(..).partition(|(e, _)| *e == edge);
            *waiters = waiting;
            fired
        };
        for (_, waiter) in fired {
            waiter.fire(level);
        }
    }

    fn wait_for(&self, edge: Edge) -> EdgeWait {
        EdgeWait {
            wire: self.clone(),
            edge,
            waiter: None,
        }
    }
}

/// Future returned by [`SimWire`]'s edge waits.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct EdgeWait {
    wire: SimWire,
    edge: Edge,
    waiter: Option<Rc<Waiter<u8>>>,
}

impl Future for EdgeWait {
    type Output = u8;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let waiter = this.waiter.get_or_insert_with(|| {
            let waiter = Rc::new(Waiter::new());
            this.wire
                .state
                .waiters
                .borrow_mut()
                .push((this.edge, Rc::clone(&waiter)));
            waiter
        });
        waiter.poll(cx)
    }
}

impl Signal for SimWire {
    fn value(&self) -> u8 {
        self.level()
    }

    fn rising_edge(&self) -> impl Future<Output = u8> {
        self.wait_for(Edge::Rising)
    }

    fn falling_edge(&self) -> impl Future<Output = u8> {
        self.wait_for(Edge::Falling)
    }
}

impl Drive for SimWire {
    fn drive(&self, level: u8) {
        self.set(level);
    }
}
