//! Passive I2C responder attached to simulated bus wires.
//!
//! The responder runs three reactive loops that share one [`SlaveState`]:
//!
//! - the bus monitor detects start and stop conditions on the data line,
//! - the bit clock sampler drives the next outgoing bit a quarter bit after each clock fall,
//! - the byte assembler samples the data line on each clock rise.
//!
//! The loops only borrow the state between awaits, so each reaction runs to completion before
//! another one can observe it.

use crate::{
    bus::{BitTiming, BusWires, Delay, Drive, Signal, HIGH},
    error::{Error, Result},
    fs,
};
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, path::Path};
use tracing::{debug, info, trace};

pub mod record;
pub mod state;

pub use record::{Direction, Record};
pub use state::{BitSlot, Phase, SlaveState};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
#[serde(default)] // Ensures new fields don't break existing configurations
/// Responder configuration.
pub struct Config {
    /// 7-bit bus address.
    pub address: u8,
    /// Bus speed in bits per second.
    pub bit_rate: u32,
    /// Initial data register value transmitted by the first read.
    pub seed: u8,
    /// Keep decoded records for [`I2cSlave::take_records`].
    pub capture_records: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: Self::DEFAULT_ADDRESS,
            bit_rate: Self::DEFAULT_BIT_RATE,
            seed: Self::DEFAULT_SEED,
            capture_records: true,
        }
    }
}

impl Config {
    pub const DEFAULT_ADDRESS: u8 = 0x45;
    pub const DEFAULT_BIT_RATE: u32 = 400_000;
    pub const DEFAULT_SEED: u8 = 0x81;
    pub const MAX_ADDRESS: u8 = 0x7F;

    pub fn validate(&self) -> Result<BitTiming> {
        if self.address > Self::MAX_ADDRESS {
            return Err(Error::InvalidAddress {
                address: self.address,
            });
        }
        BitTiming::new(self.bit_rate).ok_or(Error::InvalidBitRate {
            bit_rate: self.bit_rate,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = fs::load_json(path)?;
        config.validate().map_err(|err| Error::InvalidConfig {
            path: path.to_path_buf(),
            error: err.to_string(),
        })?;
        info!("loaded configuration: {path:?}");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::save_json(path, self)
    }
}

/// An I2C responder attached to a clock wire, an observed data wire and a driven data wire.
#[derive(Debug)]
#[must_use]
pub struct I2cSlave<C, D, O, T> {
    wires: BusWires<C, D, O>,
    delay: T,
    config: Config,
    timing: BitTiming,
    state: RefCell<SlaveState>,
    records: RefCell<Vec<Record>>,
}

impl<C, D, O, T> I2cSlave<C, D, O, T>
where
    C: Signal,
    D: Signal,
    O: Drive,
    T: Delay,
{
    /// Attach a responder at `address` to a bus running at `bit_rate` bits per second.
    ///
    /// # Errors
    ///
    /// Fails if `address` does not fit in 7 bits or `bit_rate` is zero.
    pub fn attach(wires: BusWires<C, D, O>, delay: T, address: u8, bit_rate: u32) -> Result<Self> {
        Self::with_config(
            wires,
            delay,
            Config {
                address,
                bit_rate,
                ..Config::default()
            },
        )
    }

    /// Attach a responder using `config`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid. See [`Config::validate`].
    pub fn with_config(wires: BusWires<C, D, O>, delay: T, config: Config) -> Result<Self> {
        let timing = config.validate()?;

        info!("I2C Slave");
        info!("i2c-responder version {}", env!("CARGO_PKG_VERSION"));
        info!("I2C slave configuration:");
        info!("  Address: 0x{:02x}", config.address);
        info!("  Speed: {} bps", config.bit_rate);
        debug!("  Data register seed: 0x{:02x}", config.seed);

        wires.data_out.drive(HIGH);

        Ok(Self {
            wires,
            delay,
            config,
            timing,
            state: RefCell::new(SlaveState::new(config.address, config.seed)),
            records: RefCell::new(Vec::new()),
        })
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn timing(&self) -> BitTiming {
        self.timing
    }

    pub const fn wires(&self) -> &BusWires<C, D, O> {
        &self.wires
    }

    /// Snapshot of the protocol state.
    pub fn state(&self) -> SlaveState {
        *self.state.borrow()
    }

    /// Clears the latched stop flag.
    pub fn clear_stop(&self) {
        self.with_state_mut(|state| state.stop_seen = false);
    }

    /// Drains the records decoded since the last call.
    #[must_use]
    pub fn take_records(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.borrow_mut())
    }

    fn with_state_mut<R>(&self, f: impl FnOnce(&mut SlaveState) -> R) -> R {
        f(&mut *self.state.borrow_mut())
    }

    fn emit(&self, record: Record) {
        info!("{record}");
        if self.config.capture_records {
            self.records.borrow_mut().push(record);
        }
    }

    /// Runs the responder for the lifetime of the attachment. Never completes.
    pub async fn run(&self) {
        embassy_futures::join::join3(
            self.bus_monitor(),
            self.bit_clock_sampler(),
            self.byte_assembler(),
        )
        .await;
    }

    /// Watches the data line for start and stop conditions.
    pub async fn bus_monitor(&self) {
        embassy_futures::join::join(self.detect_start(), self.detect_stop()).await;
    }

    async fn detect_start(&self) {
        loop {
            self.wires.data_in.falling_edge().await;
            if self.wires.clock.value() == HIGH {
                let record = self.with_state_mut(SlaveState::start);
                self.emit(record);
            }
        }
    }

    async fn detect_stop(&self) {
        loop {
            self.wires.data_in.rising_edge().await;
            if self.wires.clock.value() == HIGH {
                let record = self.with_state_mut(SlaveState::stop);
                self.emit(record);
            }
        }
    }

    /// Drives the data line for each bit slot, a quarter bit after the clock falls.
    pub async fn bit_clock_sampler(&self) {
        loop {
            self.wires.clock.falling_edge().await;
            self.delay.wait(self.timing.quarter_bit()).await;
            let (level, slot) = self.with_state_mut(|state| (state.clock_fall(), state.slot));
            self.wires.data_out.drive(level);
            trace!("clock fall: slot {slot:?}, driving {level}");
        }
    }

    /// Samples the data line on each clock rise and decodes completed bytes.
    pub async fn byte_assembler(&self) {
        loop {
            self.wires.clock.rising_edge().await;
            let sda = self.wires.data_in.value();
            if let Some(record) = self.with_state_mut(|state| state.clock_rise(sda)) {
                self.emit(record);
            }
        }
    }
}
