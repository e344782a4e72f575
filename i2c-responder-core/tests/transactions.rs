use anyhow::Context;
use i2c_responder_core::prelude::*;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn attach(
    bus: &SimBus,
    address: u8,
) -> anyhow::Result<I2cSlave<SimWire, SimWire, SimWire, SimClock>> {
    init_logging();
    I2cSlave::attach(bus.wires(), bus.clock(), address, 400_000).context("valid attachment")
}

#[test]
fn scenario_a_matched_read() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    tb.start();
    assert!(tb.write_byte(0x8B), "address acknowledged");
    let state = slave.state();
    assert!(state.address_matched);
    assert!(state.read_phase());
    assert!(!state.write_phase());
    assert_eq!(state.bit_position(), 9);
    assert_eq!(state.data_register, Config::DEFAULT_SEED);

    assert_eq!(tb.read_byte(true), Config::DEFAULT_SEED);
    assert_eq!(slave.state().data_register, Config::DEFAULT_SEED + 1);
    tb.stop();

    assert_eq!(
        slave.take_records(),
        [
            Record::Start,
            Record::Address {
                byte: 0x8B,
                address: 0x45,
                direction: Direction::Read,
                matched: true,
            },
            Record::Transmitted {
                byte: 0x81,
                acked: true,
            },
            Record::Stop,
        ]
    );
    Ok(())
}

#[test]
fn scenario_b_mismatched_write_address_released() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    tb.start();
    for shift in (0..8).rev() {
        tb.write_bit((0x10 >> shift) & 0x01);
    }
    let ack = tb.read_bit();
    assert_eq!(ack, HIGH, "ACK slot left released");
    assert_eq!(bus.sda_slave.transitions(), 0, "responder never drove the line");

    let state = slave.state();
    assert!(!state.address_matched);
    assert!(state.write_phase());
    assert_eq!(state.last_address, Some(0x08));

    assert!(tb.write_byte(0x55), "write phase acknowledges data");
    assert_eq!(bus.sda_slave.transitions(), 1, "pulled low for the data ACK only");
    tb.stop();
    assert_eq!(bus.sda_slave.value(), HIGH, "released after the ACK slot");
    assert_eq!(slave.state().data_register, Config::DEFAULT_SEED);
    Ok(())
}

#[test]
fn mismatched_write_data_is_acknowledged() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    assert_eq!(tb.write(0x08, &[0x5A, 0xA5]), [false, true, true]);
    assert_eq!(
        slave.take_records(),
        [
            Record::Start,
            Record::Address {
                byte: 0x10,
                address: 0x08,
                direction: Direction::Write,
                matched: false,
            },
            Record::Received { byte: 0x5A },
            Record::Received { byte: 0xA5 },
            Record::Stop,
        ]
    );
    assert_eq!(slave.state().data_register, Config::DEFAULT_SEED);
    Ok(())
}

#[test]
fn mismatched_read_transmits_register() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    tb.start();
    assert!(!tb.write_byte((0x10 << 1) | 0x01), "address left released");
    let state = slave.state();
    assert!(!state.address_matched);
    assert!(state.read_phase());

    assert_eq!(tb.read_byte(true), 0x81);
    assert_eq!(tb.read_byte(false), 0x82);
    tb.stop();
    assert_eq!(slave.state().data_register, 0x83);

    let transmitted = slave
        .take_records()
        .into_iter()
        .filter_map(|record| match record {
            Record::Transmitted { byte, acked } => Some((byte, acked)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(transmitted, [(0x81, true), (0x82, false)]);
    Ok(())
}

#[test]
fn start_with_data_held_low_is_not_a_stop() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    bus.sda.drive(LOW);
    tb.sim().settle();
    tb.start();
    assert_eq!(slave.take_records(), [Record::Start, Record::Start]);
    assert!(!slave.state().stop_seen);

    assert!(tb.write_byte(0x8A));
    assert!(slave.state().write_phase());
    Ok(())
}

#[test]
fn scenario_c_start_mid_transaction() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    tb.start();
    assert!(tb.write_byte(0x8A));
    assert!(tb.write_byte(0x33));
    for bit in [1, 0, 1] {
        tb.write_bit(bit);
    }

    tb.start();
    let state = slave.state();
    assert_eq!(state.bit_position(), 0, "start resets the bit slot");
    assert!(state.start_pending);
    assert!(state.address_phase());
    assert!(!state.read_phase() && !state.write_phase());

    // The next falling edge begins a fresh address byte
    tb.wait(tb.timing().quarter_bit());
    assert_eq!(slave.state().slot, BitSlot::Data(0));

    let _ = slave.take_records();
    assert!(tb.write_byte(0x8B));
    assert!(slave.state().read_phase());
    assert_eq!(
        slave.take_records(),
        [Record::Address {
            byte: 0x8B,
            address: 0x45,
            direction: Direction::Read,
            matched: true,
        }]
    );
    assert_eq!(tb.read_byte(false), 0x81);
    tb.stop();
    assert!(slave.state().stop_seen);
    Ok(())
}

#[test]
fn address_match_for_every_address() -> anyhow::Result<()> {
    for own in [0x00, 0x01, 0x45, 0x50, 0x7E, 0x7F] {
        let bus = SimBus::new();
        let slave = attach(&bus, own)?;
        let mut tb = Testbench::new(&bus, &slave);
        for probe in 0..=0x7F {
            tb.start();
            let acked = tb.write_byte(probe << 1);
            tb.stop();
            assert_eq!(acked, probe == own, "probe 0x{probe:02x} own 0x{own:02x}");
            assert_eq!(slave.state().address_matched, probe == own);
            assert_eq!(slave.state().last_address, Some(probe));
        }
    }
    Ok(())
}

#[test]
fn rejects_addresses_wider_than_seven_bits() {
    let bus = SimBus::new();
    for address in 0x80..=0xFF {
        let err = I2cSlave::attach(bus.wires(), bus.clock(), address, 400_000).unwrap_err();
        assert!(err.is_configuration(), "{err:?}");
    }
}

#[test]
fn register_only_advances_on_reads() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    assert_eq!(tb.write(0x45, &[0xDE, 0xAD]), [true, true, true]);
    assert_eq!(slave.state().data_register, 0x81);

    assert_eq!(tb.read(0x45, 3), Some(vec![0x81, 0x82, 0x83]));
    assert_eq!(slave.state().data_register, 0x84);

    assert_eq!(tb.read(0x12, 2), None);
    assert_eq!(slave.state().data_register, 0x84);

    let received = slave
        .take_records()
        .into_iter()
        .filter_map(|record| match record {
            Record::Received { byte } => Some(byte),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(received, [0xDE, 0xAD]);
    Ok(())
}

#[test]
fn register_wraps_around() -> anyhow::Result<()> {
    init_logging();
    let bus = SimBus::new();
    let slave = I2cSlave::with_config(
        bus.wires(),
        bus.clock(),
        Config {
            address: 0x20,
            seed: 0xFE,
            bit_rate: 100_000,
            ..Config::default()
        },
    )?;
    let mut tb = Testbench::new(&bus, &slave);
    assert_eq!(tb.read(0x20, 4), Some(vec![0xFE, 0xFF, 0x00, 0x01]));
    assert_eq!(slave.state().data_register, 0x02);
    Ok(())
}

#[test]
fn stop_detection() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    tb.start();
    assert!(tb.write_byte(0x8A));
    let before = slave.state();
    tb.stop();
    let after = slave.state();
    assert!(!before.stop_seen);
    assert!(after.stop_seen);
    assert_eq!(after.phase, before.phase, "stop leaves the phase alone");
    assert!(after.address_matched, "stop leaves the match alone");

    slave.clear_stop();
    tb.idle(4);
    assert!(!slave.state().stop_seen);

    tb.write(0x45, &[]);
    tb.write(0x45, &[0x01]);
    let stops = slave
        .take_records()
        .into_iter()
        .filter(|record| *record == Record::Stop)
        .count();
    assert_eq!(stops, 3, "one record per stop condition");
    Ok(())
}

#[test]
fn bit_position_stays_in_range() -> anyhow::Result<()> {
    let bus = SimBus::new();
    let slave = attach(&bus, 0x45)?;
    let mut tb = Testbench::new(&bus, &slave);

    // Clock activity before any start leaves the responder idle
    bus.scl.drive(LOW);
    tb.sim().settle();
    for _ in 0..3 {
        tb.write_bit(HIGH);
        assert_eq!(slave.state().bit_position(), 0);
    }
    tb.stop();
    assert_eq!(slave.state().bit_position(), 0);

    tb.start();
    let mut positions = Vec::new();
    for _ in 0..27 {
        tb.write_bit(HIGH);
        tb.wait(tb.timing().quarter_bit());
        positions.push(slave.state().bit_position());
        tb.wait(tb.timing().bit() - tb.timing().quarter_bit());
    }
    let expected = (0..27).map(|i| (i % 9) + 2).map(|p| if p > 9 { p - 9 } else { p });
    assert!(positions.iter().all(|&p| (1..=9).contains(&p)));
    assert_eq!(positions, expected.collect::<Vec<u8>>());
    Ok(())
}
