#![doc = include_str!("../README.md")]

pub mod bus;
pub mod error;
pub mod fs;
pub mod sim;
pub mod slave;

pub mod prelude {
    //! The prelude re-exports the common types used to attach and drive a responder.

    pub use crate::{
        bus::{BitTiming, BusWires, Delay, Drive, Signal, HIGH, LOW},
        error::{Error, Result},
        sim::{SimBus, SimClock, SimWire, Simulation, Testbench},
        slave::{BitSlot, Config, Direction, I2cSlave, Phase, Record, SlaveState},
    };
}
