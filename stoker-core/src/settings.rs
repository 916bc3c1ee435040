use eeprom_log::{Eeprom, EepromResult};
use embedded_storage::nor_flash::NorFlash;

use crate::records::{Config, Counters1, Counters2, Runtime, Runtime2, SensorConfig, Tray};

/// File number of the [Config] record.
pub const FILE_CONFIG: u8 = 0;
/// File number of the [Tray] record.
pub const FILE_TRAY: u8 = 1;
/// File number of the [Runtime] record.
pub const FILE_RUNTIME1: u8 = 2;
/// File number of the [Counters1] record.
pub const FILE_COUNTERS1: u8 = 3;
/// File number of the [Runtime2] record.
pub const FILE_RUNTIME2: u8 = 4;
/// File number of the [SensorConfig] record.
pub const FILE_SENSORS: u8 = 5;
/// File number of the [Counters2] record.
pub const FILE_COUNTERS2: u8 = 6;
/// Directory slots of the settings store, one spare for growth.
pub const SETTINGS_FILES: usize = 8;
/// Sector payload size; every record must fit it.
pub const SECTOR_PAYLOAD: usize = 20;

/// The store geometry the controller uses on its data flash.
pub type StoveEeprom<F> = Eeprom<F, SECTOR_PAYLOAD, SETTINGS_FILES>;

/// Persistent controller state and its flash store.
///
/// The records are plain public fields; control loops mutate them freely
/// and call [save](Settings::save), which only raises a dirty flag.
/// [commit](Settings::commit) pushes every record through the store's
/// change-detecting update, so a commit of unchanged state costs reads
/// but no flash wear. The scheduler calls `commit` from its idle slot,
/// keeping flash write latency out of time-critical paths.
pub struct Settings<F> {
    /// Operator configuration.
    pub config: Config,
    /// Fuel-tray bookkeeping.
    pub tray: Tray,
    /// Running-time statistics, first group.
    pub runtime: Runtime,
    /// Event counters, first group.
    pub counters1: Counters1,
    /// Running-time statistics, second group.
    pub runtime2: Runtime2,
    /// Event counters, second group.
    pub counters2: Counters2,
    /// Temperature sensor addresses.
    pub sensors: SensorConfig,
    eeprom: StoveEeprom<F>,
    dirty: bool,
}

impl<F: NorFlash> Settings<F> {
    /// Wraps a flash device with default record values.
    ///
    /// Call [begin](Settings::begin) to load what the flash holds.
    pub fn new(flash: F) -> Self {
        Self {
            config: Config::default(),
            tray: Tray::default(),
            runtime: Runtime::default(),
            counters1: Counters1::default(),
            runtime2: Runtime2::default(),
            counters2: Counters2::default(),
            sensors: SensorConfig::default(),
            eeprom: StoveEeprom::new(flash),
            dirty: false,
        }
    }

    /// Scans the store and loads every stored record.
    ///
    /// Records missing on flash keep their defaults; first boot on an
    /// erased device simply comes up with factory settings.
    pub fn begin(&mut self) -> EepromResult<(), F::Error> {
        self.eeprom.begin()?;
        macro_rules! load {
            ($field:ident, $file:expr) => {
                if let Some(value) = self.eeprom.read_file($file)? {
                    self.$field = value;
                }
            };
        }
        load!(config, FILE_CONFIG);
        load!(tray, FILE_TRAY);
        load!(runtime, FILE_RUNTIME1);
        load!(counters1, FILE_COUNTERS1);
        load!(runtime2, FILE_RUNTIME2);
        load!(sensors, FILE_SENSORS);
        load!(counters2, FILE_COUNTERS2);
        self.dirty = false;
        Ok(())
    }

    /// Marks the records as changed; the flash is untouched until
    /// [commit](Settings::commit).
    pub fn save(&mut self) {
        self.dirty = true;
    }

    /// Whether a commit is pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes every changed record to flash.
    ///
    /// Does nothing unless [save](Settings::save) was called since the
    /// last commit. Returns whether any record actually hit the flash.
    pub fn commit(&mut self) -> EepromResult<bool, F::Error> {
        if !self.dirty {
            return Ok(false);
        }
        let mut written = false;
        written |= self.eeprom.update_file(FILE_CONFIG, &self.config)?;
        written |= self.eeprom.update_file(FILE_TRAY, &self.tray)?;
        written |= self.eeprom.update_file(FILE_RUNTIME1, &self.runtime)?;
        written |= self.eeprom.update_file(FILE_COUNTERS1, &self.counters1)?;
        written |= self.eeprom.update_file(FILE_RUNTIME2, &self.runtime2)?;
        written |= self.eeprom.update_file(FILE_SENSORS, &self.sensors)?;
        written |= self.eeprom.update_file(FILE_COUNTERS2, &self.counters2)?;
        self.dirty = false;
        Ok(written)
    }

    /// Borrows the underlying store, for health introspection.
    pub fn eeprom(&self) -> &StoveEeprom<F> {
        &self.eeprom
    }

    /// Borrows the underlying store mutably.
    pub fn eeprom_mut(&mut self) -> &mut StoveEeprom<F> {
        &mut self.eeprom
    }

    /// Consumes the façade and hands the store back.
    pub fn into_eeprom(self) -> StoveEeprom<F> {
        self.eeprom
    }
}
