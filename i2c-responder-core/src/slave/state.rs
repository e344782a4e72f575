//! Protocol state shared by the responder's edge reactions.
//!
//! Each reaction is a plain method so the state machine can be exercised without a simulator:
//!
//! - [`SlaveState::start`] / [`SlaveState::stop`]: data transitions while the clock is high.
//! - [`SlaveState::clock_fall`]: advances the bit slot and returns the level to drive.
//! - [`SlaveState::clock_rise`]: samples the data line and decodes completed bytes.

use crate::{
    bus::{HIGH, LOW},
    slave::record::{Direction, Record},
};
use serde::{Deserialize, Serialize};

/// Position within the nine clock cycles of a byte transfer.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum BitSlot {
    /// No byte in progress.
    #[default]
    Idle,
    /// Data bit `n` of the byte, where `0` carries the most significant bit.
    Data(u8),
    /// Acknowledge slot following the eighth data bit.
    Ack,
}

impl BitSlot {
    /// The slot after one more clock cycle.
    pub const fn next(self) -> Self {
        match self {
            Self::Idle | Self::Ack => Self::Data(0),
            Self::Data(n) if n >= 7 => Self::Ack,
            Self::Data(n) => Self::Data(n + 1),
        }
    }

    /// Conventional bit position: 0 when idle, 1..=8 for data bits and 9 for the acknowledge.
    #[must_use]
    pub const fn bit_position(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Data(n) => n + 1,
            Self::Ack => 9,
        }
    }

    /// Shift of the byte bit carried in this slot, if it is a data slot.
    #[must_use]
    pub const fn shift(self) -> Option<u8> {
        match self {
            Self::Data(n) if n <= 7 => Some(7 - n),
            _ => None,
        }
    }
}

/// Transaction phase.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum Phase {
    #[default]
    Idle,
    /// Receiving the address byte that follows a start condition.
    Address,
    /// Transmitting data to the master.
    Read,
    /// Receiving data from the master.
    Write,
}

impl From<Direction> for Phase {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Read => Self::Read,
            Direction::Write => Self::Write,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct SlaveState {
    pub own_address: u8,
    pub slot: BitSlot,
    pub start_pending: bool,
    pub stop_seen: bool,
    pub phase: Phase,
    /// The address byte is complete and its acknowledge slot has not finished yet.
    pub address_ack: bool,
    pub address_matched: bool,
    pub last_address: Option<u8>,
    pub shift_register: u8,
    pub data_register: u8,
}

impl SlaveState {
    pub const fn new(own_address: u8, seed: u8) -> Self {
        Self {
            own_address,
            slot: BitSlot::Idle,
            start_pending: false,
            stop_seen: false,
            phase: Phase::Idle,
            address_ack: false,
            address_matched: false,
            last_address: None,
            shift_register: 0,
            data_register: seed,
        }
    }

    #[must_use]
    pub const fn bit_position(&self) -> u8 {
        self.slot.bit_position()
    }

    #[must_use]
    pub fn address_phase(&self) -> bool {
        self.phase == Phase::Address
    }

    #[must_use]
    pub fn read_phase(&self) -> bool {
        self.phase == Phase::Read
    }

    #[must_use]
    pub fn write_phase(&self) -> bool {
        self.phase == Phase::Write
    }

    /// Start condition: data fell while the clock was high.
    ///
    /// Any partially received byte is discarded and the next clock fall begins a new address
    /// byte, regardless of the phase the previous transaction was in.
    pub fn start(&mut self) -> Record {
        self.start_pending = true;
        self.slot = BitSlot::Idle;
        self.phase = Phase::Address;
        self.address_ack = false;
        self.address_matched = false;
        Record::Start
    }

    /// Stop condition: data rose while the clock was high. Latched until the host clears it.
    pub fn stop(&mut self) -> Record {
        self.stop_seen = true;
        Record::Stop
    }

    /// Clock fell. Advances the bit slot and returns the level to drive for it.
    ///
    /// The returned level defaults to released. The address byte is only acknowledged when it
    /// matches, but later slots follow the phase alone: write bytes are always acknowledged
    /// and read slots always carry the data register.
    #[must_use]
    pub fn clock_fall(&mut self) -> u8 {
        if self.start_pending || self.slot != BitSlot::Idle {
            self.slot = self.slot.next();
            self.start_pending = false;
        }

        match (self.phase, self.slot) {
            (_, BitSlot::Ack) if self.address_ack => {
                if self.address_matched {
                    LOW
                } else {
                    HIGH
                }
            }
            (Phase::Write, BitSlot::Ack) => LOW,
            (Phase::Read, slot) => match slot.shift() {
                Some(shift) => (self.data_register >> shift) & 0x01,
                None => HIGH,
            },
            _ => HIGH,
        }
    }

    /// Clock rose with `sda` on the data line. Returns a record when a byte boundary produced
    /// one.
    pub fn clock_rise(&mut self, sda: u8) -> Option<Record> {
        let mut record = None;

        if let Some(shift) = self.slot.shift() {
            if self.slot == BitSlot::Data(0) {
                self.shift_register = 0;
            }
            self.shift_register |= (sda & 0x01) << shift;

            if self.slot == BitSlot::Data(7) {
                let byte = self.shift_register;
                match self.phase {
                    Phase::Address => {
                        let address = byte >> 1;
                        let direction = Direction::from_bit(byte);
                        self.last_address = Some(address);
                        self.address_matched = address == self.own_address;
                        self.phase = Phase::from(direction);
                        self.address_ack = true;
                        record = Some(Record::Address {
                            byte,
                            address,
                            direction,
                            matched: self.address_matched,
                        });
                    }
                    Phase::Write => record = Some(Record::Received { byte }),
                    Phase::Read | Phase::Idle => (),
                }
            }
        }

        if self.slot == BitSlot::Ack {
            if self.address_ack {
                self.address_ack = false;
            } else if self.phase == Phase::Read {
                let byte = self.data_register;
                self.data_register = self.data_register.wrapping_add(1);
                record = Some(Record::Transmitted {
                    byte,
                    acked: sda & 0x01 == LOW,
                });
            }
        }

        record
    }
}
