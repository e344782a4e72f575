//! Runs scripted I2C transactions against a simulated slave responder.
//!
//! USAGE:
//!     i2c-responder [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -c, --clean      Skip the config file.
//!         --json       Print records and final state as JSON lines.
//!     -h, --help       Prints help information
//!     -V, --version    Prints version information
//!
//! OPTIONS:
//!         --config <config>              Custom config path.
//!         --save-config <save-config>    Save the merged configuration.
//!     -a, --address <address>            7-bit responder address [default: 0x45]
//!     -b, --bit-rate <bit-rate>          Bus speed in bits per second [default: 400000]
//!     -s, --seed <seed>                  Initial data register value [default: 0x81]
//!     -t, --target <target>              Address the master targets [default: responder address]
//!     -w, --write <write>...             Bytes to write in the first transaction
//!     -r, --read <read>                  Bytes to read in the second transaction [default: 1]

pub mod logging;
pub mod opts;

use clap::Parser;
use i2c_responder_core::prelude::*;
use opts::{Opts, Script};
use tracing::debug;

fn main() -> anyhow::Result<()> {
    logging::init();

    let opts = Opts::parse();
    debug!("CLI Options: {opts:?}");
    let (config, script) = opts.load()?;

    let bus = SimBus::new();
    let slave = I2cSlave::with_config(bus.wires(), bus.clock(), config)?;
    let mut tb = Testbench::new(&bus, &slave);

    tb.idle(2);
    let acks = tb.write(script.target, &script.write);
    debug!("write acknowledges: {acks:?}");
    let data = if script.read > 0 {
        tb.idle(2);
        tb.read(script.target, script.read)
    } else {
        None
    };
    debug!("read data: {data:02x?}");
    tb.idle(2);

    report(&script, &slave.take_records(), &slave.state(), tb.now())
}

fn report(
    script: &Script,
    records: &[Record],
    state: &SlaveState,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    if script.json {
        for record in records {
            println!("{}", serde_json::to_string(record)?);
        }
        println!("{}", serde_json::to_string(state)?);
    } else {
        for record in records {
            println!("{record}");
        }
        println!(
            "address matched: {}, data register: 0x{:02x}, stop seen: {}, simulated time: {elapsed:?}",
            state.address_matched, state.data_register, state.stop_seen
        );
    }
    Ok(())
}
