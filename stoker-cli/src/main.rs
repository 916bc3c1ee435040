//! Diagnostic run of the stove controller core on simulated hardware:
//! slot timing on the discrete-event line simulation, device discovery
//! and temperature readout on a virtual sensor bus, and the persistent
//! settings store on an in-memory flash.

mod virtual_bus;

use clap::Parser;
use eeprom_log::mem::MemFlash;
use onewire_core::OneWire;
use onewire_gpio::sim::SimBus;
use onewire_gpio::GpioOneWireBuilder;
use stoker_core::records::SensorConfig;
use stoker_core::{SensorPoller, Settings};
use virtual_bus::{VirtualBus, VirtualSensor};

/// Exercises the controller core without stove hardware.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of simulated temperature sensors on the bus
    #[arg(short, long, default_value_t = 3)]
    sensors: usize,
    /// Settings commits to run through the wear-leveling store
    #[arg(short, long, default_value_t = 2000)]
    writes: u32,
}

/// 4 KiB data flash with 512-byte pages, the controller's geometry.
type Flash = MemFlash<4096, 512>;

fn main() {
    env_logger::init();
    let args = Args::parse();

    slot_timing_demo();
    let sensors = sensor_demo(args.sensors);
    storage_demo(args.writes, sensors);
}

/// Runs the bit-banged master against the line simulation and logs the
/// timing it produced.
fn slot_timing_demo() {
    let sim = SimBus::new();
    let mut bus = GpioOneWireBuilder::new()
        .build(sim.pin(), sim.clock())
        .expect("sim pin cannot fail");

    // a device answering 90 µs after the reset release, for 70 µs
    sim.script_slave(true, &[580, 70]);
    let presence = bus.reset().expect("line is healthy");
    bus.write_byte(0xf0).expect("line is healthy");
    log::info!("presence detected: {presence}");
    log::info!(
        "master edge timing for reset + 0xf0 (µs): {:?}",
        sim.master_edge_deltas()
    );
}

/// Discovers the virtual sensors and reads every temperature, then runs
/// the tick-driven poller over a few measurement slots.
fn sensor_demo(count: usize) -> SensorConfig {
    let sensors: Vec<VirtualSensor> = (0..count)
        .map(|i| {
            let serial = [i as u8 + 1, 0x42, 0x30, 0x12, 0x05, 0x00];
            VirtualSensor::new(serial, 21.5 + 4.25 * i as f32)
        })
        .collect();
    let mut bus = VirtualBus::new(sensors);

    let mut found = Vec::new();
    ds18x20::enum_devices(&mut bus, |address| {
        log::info!("found sensor {address}");
        found.push(address);
        true
    })
    .expect("virtual bus cannot fail");
    log::info!("{} sensors on the bus", found.len());

    ds18x20::request_temp_all(&mut bus).expect("devices present");
    for address in &found {
        match ds18x20::read_temp_celsius(&mut bus, address) {
            Ok(celsius) => log::info!("{address}: {celsius} °C"),
            Err(err) => log::warn!("{address}: readout failed: {err:?}"),
        }
    }

    // wire the first two sensors up as input and output and let the
    // cooperative poller take three measurement slots
    let config = SensorConfig {
        input_temp: *found.first().expect("at least one sensor").as_bytes(),
        output_temp: *found.get(1).unwrap_or(&found[0]).as_bytes(),
    };
    let mut poller = SensorPoller::new();
    for now_ms in 0..30_000u32 {
        poller.tick(&mut bus, now_ms, &config);
    }
    log::info!(
        "poller: input {:?} °C (trend {:.2}), output {:?} °C (trend {:.2})",
        poller.input().value(),
        poller.input_trend(10),
        poller.output().value(),
        poller.output_trend(10),
    );
    config
}

/// Hammers the settings store and shows what the flash went through.
fn storage_demo(writes: u32, sensors: SensorConfig) {
    let mut settings = Settings::new(Flash::new());
    settings.begin().expect("fresh flash");
    settings.sensors = sensors;
    settings.save();
    settings.commit().expect("fresh flash");

    for _ in 0..writes {
        settings.runtime.fan_time += 30;
        settings.tray.feeder_time += 8;
        settings.save();
        settings.commit().expect("storage has headroom");
    }
    log::info!(
        "after {} commits: fan {} s, feeder {} s, fill {} kg",
        writes,
        settings.runtime.fan_time,
        settings.tray.feeder_time,
        settings.tray.current_fill(),
    );

    let eeprom = settings.into_eeprom();
    let crc_errors = eeprom.crc_error_counter();
    let flash = eeprom.into_inner();
    log::info!(
        "flash wear: {} writes, {} erases, {} crc errors",
        flash.write_count(),
        flash.erase_count(),
        crc_errors,
    );

    // power cycle: everything must come back
    let mut settings = Settings::new(flash);
    settings.begin().expect("store recovers on begin");
    log::info!(
        "after restart: fan {} s, feeder {} s, input sensor {:02x?}",
        settings.runtime.fan_time,
        settings.tray.feeder_time,
        settings.sensors.input_temp,
    );
    assert_eq!(settings.runtime.fan_time, writes * 30);
    assert_eq!(settings.tray.feeder_time, writes * 8);
}
