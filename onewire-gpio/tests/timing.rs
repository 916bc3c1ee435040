//! Slot timing checked against the discrete-event line simulation.
//!
//! The delta vectors are the microsecond gaps between consecutive master
//! transitions, starting from time zero: a write-0 slot shows up as a
//! 60 µs low followed by a 20 µs gap to the next slot (10 µs recovery plus
//! the 10 µs settle of the idle check), a write-1 as 6 µs low and a 74 µs
//! gap, a reset as 480 µs low.

use onewire_core::{OneWire, OneWireError};
use onewire_gpio::sim::{SimBus, SimClock, SimPin};
use onewire_gpio::{GpioOneWire, GpioOneWireBuilder, Timings};

fn master(sim: &SimBus) -> GpioOneWire<SimPin, SimClock> {
    GpioOneWireBuilder::new()
        .build(sim.pin(), sim.clock())
        .unwrap()
}

#[test]
fn reset_without_devices_sees_no_presence() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    assert_eq!(bus.reset(), Ok(false));
    assert_eq!(sim.master_edge_deltas(), vec![10, 480]);
    assert!(!sim.collision());
}

#[test]
fn reset_detects_presence_pulse() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    // presence 90 µs after the reset release, held for 70 µs
    sim.script_slave(true, &[580, 70]);
    assert_eq!(bus.reset(), Ok(true));
    assert_eq!(sim.master_edge_deltas(), vec![10, 480]);
    assert!(!sim.collision());
}

#[test]
fn reset_misses_a_presence_pulse_past_the_window() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    // the answer comes 150 µs after release, past the 70 µs poll window
    sim.script_slave(true, &[640, 70]);
    assert_eq!(bus.reset(), Ok(false));
    assert_eq!(sim.master_edge_deltas(), vec![10, 480]);
    assert!(!sim.collision());
}

#[test]
fn reset_waits_for_busy_line_first() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    // a slave holds the line until t=200; the reset starts only then
    sim.script_slave(false, &[200, 580, 70]);
    assert_eq!(bus.reset(), Ok(true));
    assert_eq!(sim.master_edge_deltas(), vec![210, 480]);
    assert!(!sim.collision());
}

#[test]
fn reset_gives_up_on_stuck_line() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    // the line frees up only after the 500 µs release timeout
    sim.script_slave(false, &[520, 580, 70]);
    assert_eq!(bus.reset(), Err(OneWireError::BusNotReleased));
    assert!(sim.master_edge_deltas().is_empty());
}

#[test]
fn write_0xf0_slot_timing() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    bus.write_byte(0xf0).unwrap();
    assert_eq!(
        sim.master_edge_deltas(),
        vec![10, 60, 20, 60, 20, 60, 20, 60, 20, 6, 74, 6, 74, 6, 74, 6]
    );
    assert!(!sim.collision());
}

#[test]
fn write_0xaa_slot_timing() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    bus.write_byte(0xaa).unwrap();
    assert_eq!(
        sim.master_edge_deltas(),
        vec![10, 60, 20, 6, 74, 60, 20, 6, 74, 60, 20, 6, 74, 60, 20, 6]
    );
    assert!(!sim.collision());
}

#[test]
fn read_from_idle_line_gives_all_ones() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    assert_eq!(bus.read_byte(), Ok(0xff));
    assert_eq!(
        sim.master_edge_deltas(),
        vec![10, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6]
    );
    assert!(!sim.collision());
}

#[test]
fn read_slave_pulling_every_slot_low_gives_zero() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    sim.script_slave(
        true,
        &[20, 20, 60, 20, 60, 20, 60, 20, 60, 20, 60, 20, 60, 20, 60, 20, 60],
    );
    assert_eq!(bus.read_byte(), Ok(0x00));
    assert_eq!(
        sim.master_edge_deltas(),
        vec![10, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6]
    );
    assert!(!sim.collision());
}

#[test]
fn read_mixed_bit_pattern() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    // slave transmits 0x92: holds the line through slots 0, 2, 3, 5 and 6
    sim.script_slave(true, &[20, 20, 140, 20, 60, 20, 140, 20, 60, 20, 140]);
    assert_eq!(bus.read_byte(), Ok(0x92));
    assert_eq!(
        sim.master_edge_deltas(),
        vec![10, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6, 74, 6]
    );
    assert!(!sim.collision());
}

#[test]
fn custom_timings_stretch_the_slots() {
    let sim = SimBus::new();
    let timings = Timings {
        write_0_low_us: 80,
        ..Timings::STANDARD
    };
    let mut bus = GpioOneWireBuilder::new()
        .with_timings(timings)
        .build(sim.pin(), sim.clock())
        .unwrap();
    bus.write_bit(false).unwrap();
    assert_eq!(sim.master_edge_deltas(), vec![10, 80]);
}

#[test]
fn select_all_is_a_skip_rom_write() {
    let sim = SimBus::new();
    let mut bus = master(&sim);
    // 0xcc = bits 0,0,1,1,0,0,1,1 starting from the LSB
    bus.select_all().unwrap();
    assert_eq!(
        sim.master_edge_deltas(),
        vec![10, 60, 20, 60, 20, 6, 74, 6, 74, 60, 20, 60, 20, 6, 74, 6]
    );
    assert!(!sim.collision());
}
