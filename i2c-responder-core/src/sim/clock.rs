use crate::{bus::Delay, sim::Waiter};
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
    time::Duration,
};

pub(crate) fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default)]
struct Timers {
    now: Cell<u64>,
    next_id: Cell<u64>,
    // Keyed by (deadline, id) so timers sharing a deadline fire in scheduling order
    pending: RefCell<BTreeMap<(u64, u64), Rc<Waiter<()>>>>,
}

/// Simulated time source with nanosecond resolution.
#[derive(Debug, Default, Clone)]
#[must_use]
pub struct SimClock {
    timers: Rc<Timers>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns())
    }

    #[must_use]
    pub fn now_ns(&self) -> u64 {
        self.timers.now.get()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers
            .pending
            .borrow()
            .keys()
            .next()
            .map(|&(deadline, _)| deadline)
    }

    pub(crate) fn schedule(&self, duration: Duration) -> Rc<Waiter<()>> {
        let deadline = self.now_ns().saturating_add(as_nanos(duration));
        let id = self.timers.next_id.get();
        self.timers.next_id.set(id + 1);
        let waiter = Rc::new(Waiter::new());
        self.timers
            .pending
            .borrow_mut()
            .insert((deadline, id), Rc::clone(&waiter));
        waiter
    }

    /// Fires the earliest timer due at or before `limit`, moving time to its deadline.
    pub(crate) fn fire_next(&self, limit: u64) -> bool {
        let next = {
            let mut pending = self.timers.pending.borrow_mut();
            match pending.first_key_value() {
                Some((&(deadline, _), _)) if deadline <= limit => pending.pop_first(),
                _ => None,
            }
        };
        match next {
            Some(((deadline, _), waiter)) => {
                self.set_now(deadline);
                waiter.fire(());
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_now(&self, now: u64) {
        if now > self.timers.now.get() {
            self.timers.now.set(now);
        }
    }
}

/// Future returned by [`SimClock::wait`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    clock: SimClock,
    duration: Duration,
    waiter: Option<Rc<Waiter<()>>>,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let waiter = this
            .waiter
            .get_or_insert_with(|| this.clock.schedule(this.duration));
        waiter.poll(cx)
    }
}

impl Delay for SimClock {
    fn wait(&self, duration: Duration) -> impl Future<Output = ()> {
        Sleep {
            clock: self.clone(),
            duration,
            waiter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_next_respects_limit() {
        let clock = SimClock::new();
        let late = clock.schedule(Duration::from_nanos(50));
        let early = clock.schedule(Duration::from_nanos(10));
        assert_eq!(clock.next_deadline(), Some(10));

        assert!(clock.fire_next(20));
        assert_eq!(clock.now_ns(), 10);
        assert_eq!(early.value.get(), Some(()));
        assert!(!clock.fire_next(20));
        assert_eq!(late.value.get(), None);

        clock.set_now(5);
        assert_eq!(clock.now_ns(), 10, "time never moves backwards");
        assert!(clock.fire_next(u64::MAX));
        assert_eq!(clock.now_ns(), 50);
        assert_eq!(clock.next_deadline(), None);
    }
}
