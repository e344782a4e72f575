//! Scripted bus master used to exercise a responder in simulation.
//!
//! Each bit follows the same timing relative to the clock fall that starts it: the master
//! changes its data line an eighth of a bit in, raises the clock at half a bit and samples the
//! resolved bus level, then lowers the clock a full bit after the previous fall. A responder
//! drives its data line a quarter of a bit in, so the value is stable before the rise.

use crate::{
    bus::{BitTiming, Delay, Drive, Signal, HIGH, LOW},
    sim::{SimBus, Simulation},
    slave::I2cSlave,
};
use std::time::Duration;
use tracing::debug;

#[must_use]
#[derive(Debug)]
pub struct Testbench<'a> {
    bus: SimBus,
    sim: Simulation<'a>,
    timing: BitTiming,
}

impl<'a> Testbench<'a> {
    /// Spawns `slave` on a new simulation of `bus`, clocked at the slave's configured speed.
    pub fn new<C, D, O, T>(bus: &SimBus, slave: &'a I2cSlave<C, D, O, T>) -> Self
    where
        C: Signal + 'a,
        D: Signal + 'a,
        O: Drive + 'a,
        T: Delay + 'a,
    {
        let mut sim = Simulation::new(bus.clock());
        sim.spawn(slave.run());
        Self {
            bus: bus.clone(),
            sim,
            timing: slave.timing(),
        }
    }

    pub const fn bus(&self) -> &SimBus {
        &self.bus
    }

    pub const fn timing(&self) -> BitTiming {
        self.timing
    }

    pub fn sim(&mut self) -> &mut Simulation<'a> {
        &mut self.sim
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.sim.now()
    }

    /// Lets simulated time pass without touching the bus.
    pub fn wait(&mut self, duration: Duration) {
        self.sim.advance(duration);
    }

    /// Holds the bus idle for `bits` bit periods.
    pub fn idle(&mut self, bits: u32) {
        self.wait(self.timing.bit() * bits);
    }

    fn set_scl(&mut self, level: u8) {
        self.bus.scl.drive(level);
        self.sim.settle();
    }

    fn set_sda(&mut self, level: u8) {
        self.bus.sda.drive(level);
        self.sim.settle();
    }

    /// Issues a start condition. When the clock is low, the data line is released and the
    /// clock raised first, producing a repeated start. A data line held low under a high clock
    /// is first parked with the clock low so releasing it is not seen as a stop.
    pub fn start(&mut self) {
        if self.bus.scl.level() == HIGH && self.bus.sda.level() == LOW {
            self.wait(self.timing.quarter_bit());
            self.set_scl(LOW);
            self.wait(self.timing.half_bit());
        }
        if self.bus.scl.level() == LOW {
            self.wait(self.timing.eighth_bit());
            self.set_sda(HIGH);
            self.wait(self.timing.half_bit() - self.timing.eighth_bit());
            self.set_scl(HIGH);
            self.wait(self.timing.quarter_bit());
            self.set_sda(LOW);
            self.wait(self.timing.quarter_bit());
        } else {
            self.set_sda(LOW);
            self.wait(self.timing.half_bit());
        }
        self.set_scl(LOW);
    }

    /// Issues a stop condition, leaving both lines released.
    pub fn stop(&mut self) {
        if self.bus.scl.level() == LOW {
            self.wait(self.timing.eighth_bit());
            self.set_sda(LOW);
            self.wait(self.timing.half_bit() - self.timing.eighth_bit());
            self.set_scl(HIGH);
            self.wait(self.timing.quarter_bit());
        }
        self.set_sda(HIGH);
        self.wait(self.timing.quarter_bit());
    }

    /// Clocks out one bit and returns the resolved bus level sampled on the clock rise.
    pub fn write_bit(&mut self, bit: u8) -> u8 {
        self.wait(self.timing.eighth_bit());
        self.set_sda(bit);
        self.wait(self.timing.half_bit() - self.timing.eighth_bit());
        self.set_scl(HIGH);
        let level = self.bus.bus_level();
        self.wait(self.timing.half_bit());
        self.set_scl(LOW);
        level
    }

    /// Releases the data line for one bit and returns the level the responder drove.
    pub fn read_bit(&mut self) -> u8 {
        self.write_bit(HIGH)
    }

    /// Sends `byte` MSB first. Returns whether the responder acknowledged it.
    pub fn write_byte(&mut self, byte: u8) -> bool {
        for shift in (0..8).rev() {
            self.write_bit((byte >> shift) & 0x01);
        }
        self.read_bit() == LOW
    }

    /// Receives a byte MSB first, then answers with ACK or NACK.
    pub fn read_byte(&mut self, ack: bool) -> u8 {
        let byte = (0..8).fold(0, |byte, _| (byte << 1) | self.read_bit());
        self.write_bit(if ack { LOW } else { HIGH });
        byte
    }

    /// Writes `data` to the device at 7-bit `address` in one transaction. Returns the
    /// acknowledge of the address byte followed by one per data byte.
    pub fn write(&mut self, address: u8, data: &[u8]) -> Vec<bool> {
        debug!("Write {data:02x?} to device at I2C address 0x{address:02x}");
        self.start();
        let mut acks = Vec::with_capacity(data.len() + 1);
        acks.push(self.write_byte((address & 0x7F) << 1));
        if !acks[0] {
            debug!("Got NACK");
        }
        for &byte in data {
            let acked = self.write_byte(byte);
            if !acked {
                debug!("Got NACK");
            }
            acks.push(acked);
        }
        self.stop();
        acks
    }

    /// Reads `count` bytes from the device at 7-bit `address` in one transaction, NACKing the
    /// last byte. Returns `None` if the address was not acknowledged.
    pub fn read(&mut self, address: u8, count: usize) -> Option<Vec<u8>> {
        debug!("Read {count} bytes from device at I2C address 0x{address:02x}");
        self.start();
        if !self.write_byte(((address & 0x7F) << 1) | 0x01) {
            debug!("Got NACK");
            self.stop();
            return None;
        }
        let data: Vec<u8> = (0..count).map(|i| self.read_byte(i + 1 < count)).collect();
        self.stop();
        Some(data)
    }
}
