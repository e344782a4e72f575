//! Signal abstractions the responder consumes from its host simulation.
//!
//! Bus wires carry single-bit levels as `u8`: `0` is low and `1` is high (or released, for an
//! open-drain output).

use std::{future::Future, time::Duration};

/// Logic low. Pulls an open-drain line down.
pub const LOW: u8 = 0;
/// Logic high. Releases an open-drain line.
pub const HIGH: u8 = 1;

/// A readable wire whose transitions can be awaited.
pub trait Signal {
    /// Current stable level of the wire.
    fn value(&self) -> u8;

    /// Resolves on the next low to high transition with the new level.
    fn rising_edge(&self) -> impl Future<Output = u8>;

    /// Resolves on the next high to low transition with the new level.
    fn falling_edge(&self) -> impl Future<Output = u8>;
}

/// An open-drain output. Driving [`LOW`] pulls the line down and [`HIGH`] releases it.
pub trait Drive {
    fn drive(&self, level: u8);
}

/// A source of fixed simulated delays.
pub trait Delay {
    fn wait(&self, duration: Duration) -> impl Future<Output = ()>;
}

impl<T: Signal> Signal for &T {
    fn value(&self) -> u8 {
        (**self).value()
    }

    fn rising_edge(&self) -> impl Future<Output = u8> {
        (**self).rising_edge()
    }

    fn falling_edge(&self) -> impl Future<Output = u8> {
        (**self).falling_edge()
    }
}

impl<T: Drive> Drive for &T {
    fn drive(&self, level: u8) {
        (**self).drive(level);
    }
}

impl<T: Delay> Delay for &T {
    fn wait(&self, duration: Duration) -> impl Future<Output = ()> {
        (**self).wait(duration)
    }
}

/// The three wire connections of a responder attachment.
#[derive(Debug, Clone)]
#[must_use]
pub struct BusWires<C, D, O> {
    /// Bus clock (SCL), read-only.
    pub clock: C,
    /// Data line (SDA) as driven by the bus master, read-only.
    pub data_in: D,
    /// Data line (SDA) as driven by this responder, write-only.
    pub data_out: O,
}

impl<C, D, O> BusWires<C, D, O>
where
    C: Signal,
    D: Signal,
    O: Drive,
{
    pub const fn new(clock: C, data_in: D, data_out: O) -> Self {
        Self {
            clock,
            data_in,
            data_out,
        }
    }
}

/// Bit-period timing derived from a bus speed in bits per second.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[must_use]
pub struct BitTiming {
    bit_rate: u64,
}

impl BitTiming {
    const NS_PER_SEC: u64 = 1_000_000_000;

    /// Timing for `bit_rate`. Returns `None` for a zero bit rate.
    pub fn new(bit_rate: u32) -> Option<Self> {
        (bit_rate > 0).then_some(Self {
            bit_rate: u64::from(bit_rate),
        })
    }

    const fn fraction(&self, divisor: u64) -> Duration {
        Duration::from_nanos(Self::NS_PER_SEC / (divisor * self.bit_rate))
    }

    #[must_use]
    pub const fn bit(&self) -> Duration {
        self.fraction(1)
    }

    #[must_use]
    pub const fn half_bit(&self) -> Duration {
        self.fraction(2)
    }

    #[must_use]
    pub const fn quarter_bit(&self) -> Duration {
        self.fraction(4)
    }

    #[must_use]
    pub const fn eighth_bit(&self) -> Duration {
        self.fraction(8)
    }
}
