//! Water temperature acquisition and trend estimation.

use ds18x20::{AsyncState, Status};
use onewire_core::{Address, OneWire};

use crate::records::SensorConfig;

/// Samples kept per sensor, one per measurement slot.
pub const HISTORY_LEN: usize = 100;

/// Milliseconds between measurement slots.
const MEASURE_INTERVAL_MS: u32 = 10_000;

/// Wait after the convert command before reading scratchpads. The
/// sensors convert on their own; the next slot reads the previous
/// conversion anyway, so a short wait suffices.
const CONVERSION_WAIT_MS: u32 = 200;

/// Whether `now` has reached `at` on a wrapping millisecond counter.
fn time_reached(now: u32, at: u32) -> bool {
    now.wrapping_sub(at) & (1 << 31) == 0
}

/// Least-squares line over equally spaced samples.
struct LinReg {
    slope: f32,
    intercept: f32,
}

impl LinReg {
    /// Fits samples at x = 0, 1, 2, … in iteration order.
    fn fit<I>(samples: I) -> Self
    where
        I: Iterator<Item = f32> + Clone,
    {
        let mut n = 0usize;
        let mut mean_y = 0.0f32;
        for y in samples.clone() {
            n += 1;
            mean_y += y;
        }
        if n == 0 {
            return Self { slope: 0.0, intercept: 0.0 };
        }
        if n == 1 {
            return Self { slope: 0.0, intercept: mean_y };
        }
        mean_y /= n as f32;
        let mean_x = (n - 1) as f32 / 2.0;

        let mut numerator = 0.0f32;
        let mut denominator = 0.0f32;
        for (i, y) in samples.enumerate() {
            let x = i as f32;
            numerator += (x - mean_x) * (y - mean_y);
            denominator += (x - mean_x) * (x - mean_x);
        }
        let slope = numerator / denominator;
        Self {
            slope,
            intercept: mean_y - slope * mean_x,
        }
    }

    fn at(&self, x: f32) -> f32 {
        self.slope * x + self.intercept
    }
}

/// Latest reading and history of one sensor.
///
/// The first successful sample floods the whole ring so the trend starts
/// flat instead of climbing out of zeros; a failed readout repeats the
/// previous sample, holding the trend, while the live value goes to
/// `None` so callers see the outage.
#[derive(Debug, Clone)]
pub struct SensorReading {
    value: Option<f32>,
    status: Status,
    wrpos: usize,
    history: [f32; HISTORY_LEN],
    first_value: bool,
}

impl SensorReading {
    /// An empty history with no reading yet.
    pub fn new() -> Self {
        Self {
            value: None,
            status: Status::Ok,
            wrpos: HISTORY_LEN - 1,
            history: [0.0; HISTORY_LEN],
            first_value: true,
        }
    }

    /// Stores the outcome of one measurement slot.
    pub fn record(&mut self, value: Option<f32>, status: Status) {
        self.value = value;
        self.status = status;
        let newpos = (self.wrpos + 1) % HISTORY_LEN;
        match value {
            Some(celsius) if self.first_value => {
                self.first_value = false;
                self.history = [celsius; HISTORY_LEN];
            }
            Some(celsius) => self.history[newpos] = celsius,
            None => self.history[newpos] = self.history[self.wrpos],
        }
        self.wrpos = newpos;
    }

    /// The last reading in degrees Celsius, `None` after a failed slot.
    pub fn value(&self) -> Option<f32> {
        self.value
    }

    /// Outcome of the last measurement slot.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Projects the trend of the newest `window` samples one window
    /// ahead.
    ///
    /// Fits a least-squares line through the newest `window` samples and
    /// evaluates it at twice the window, which amplifies a steady drift
    /// into a value the threshold comparisons react to early. A window
    /// below two returns the newest sample.
    pub fn extrapolate(&self, window: usize) -> f32 {
        let window = window.min(HISTORY_LEN);
        if window < 2 {
            return self.history[self.wrpos];
        }
        let beg = (self.wrpos + 1) % HISTORY_LEN;
        let chronological = self.history[beg..]
            .iter()
            .chain(self.history[..beg].iter())
            .copied()
            .skip(HISTORY_LEN - window);
        LinReg::fit(chronological).at(2.0 * window as f32)
    }
}

impl Default for SensorReading {
    fn default() -> Self {
        Self::new()
    }
}

/// Phases of one measurement slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    RequestConvert,
    ConvertCycle,
    ReadInput,
    ReadInputCycle,
    ReadOutput,
    ReadOutputCycle,
    Wait,
}

/// Millisecond-tick driver of the two water temperature sensors.
///
/// Every ten seconds the poller broadcasts a convert command, waits out
/// the conversion, and reads the input and output sensor scratchpads,
/// all through the [ds18x20] step interface so a single
/// [tick](SensorPoller::tick) never costs more than one bus operation.
/// Readings land in [input](SensorPoller::input) and
/// [output](SensorPoller::output).
///
/// A simulated mode replaces the bus entirely, used by the service
/// interface to exercise the control loops on a bench.
pub struct SensorPoller {
    phase: Phase,
    async_state: AsyncState,
    input: SensorReading,
    output: SensorReading,
    next_run_ms: u32,
    next_measure_ms: u32,
    simulated: bool,
}

impl SensorPoller {
    /// A poller that starts measuring on its first tick.
    pub fn new() -> Self {
        Self {
            phase: Phase::Start,
            async_state: AsyncState::new(),
            input: SensorReading::new(),
            output: SensorReading::new(),
            next_run_ms: 0,
            next_measure_ms: 0,
            simulated: false,
        }
    }

    /// Advances the measurement state machine by at most one bus
    /// operation.
    ///
    /// Call once per scheduler tick with the current millisecond clock;
    /// ticks before the next due time return immediately. `sensors`
    /// supplies the two ROM addresses and may change between slots.
    pub fn tick<O: OneWire>(&mut self, bus: &mut O, now_ms: u32, sensors: &SensorConfig) {
        if !time_reached(now_ms, self.next_run_ms) {
            return;
        }
        if self.simulated {
            self.input.record(self.input.value(), Status::Ok);
            self.output.record(self.output.value(), Status::Ok);
            self.next_run_ms = now_ms.wrapping_add(MEASURE_INTERVAL_MS);
            return;
        }
        match self.phase {
            Phase::Start => {
                self.next_measure_ms = now_ms.wrapping_add(MEASURE_INTERVAL_MS);
                self.phase = Phase::RequestConvert;
                self.next_run_ms = now_ms.wrapping_add(1);
            }
            Phase::RequestConvert => {
                self.async_state.start_convert_all(bus);
                self.phase = Phase::ConvertCycle;
                self.next_run_ms = now_ms;
            }
            Phase::ConvertCycle => {
                if self.async_state.cycle(bus) {
                    self.phase = Phase::ReadInput;
                    self.next_run_ms = now_ms.wrapping_add(CONVERSION_WAIT_MS);
                } else {
                    self.next_run_ms = now_ms;
                }
            }
            Phase::ReadInput => {
                self.async_state
                    .start_read(bus, Address::new(sensors.input_temp));
                self.phase = Phase::ReadInputCycle;
                self.next_run_ms = now_ms;
            }
            Phase::ReadInputCycle => {
                if self.async_state.cycle(bus) {
                    let value = self.async_state.result_celsius();
                    self.input.record(value, self.async_state.status());
                    self.phase = Phase::ReadOutput;
                    self.next_run_ms = now_ms.wrapping_add(1);
                } else {
                    self.next_run_ms = now_ms;
                }
            }
            Phase::ReadOutput => {
                self.async_state
                    .start_read(bus, Address::new(sensors.output_temp));
                self.phase = Phase::ReadOutputCycle;
                self.next_run_ms = now_ms;
            }
            Phase::ReadOutputCycle => {
                if self.async_state.cycle(bus) {
                    let value = self.async_state.result_celsius();
                    self.output.record(value, self.async_state.status());
                    self.phase = Phase::Wait;
                    self.next_run_ms = now_ms.wrapping_add(1);
                } else {
                    self.next_run_ms = now_ms;
                }
            }
            Phase::Wait => {
                self.next_run_ms = self.next_measure_ms;
                self.next_measure_ms = self.next_measure_ms.wrapping_add(MEASURE_INTERVAL_MS);
                self.phase = Phase::RequestConvert;
            }
        }
    }

    /// The input (return water) sensor.
    pub fn input(&self) -> &SensorReading {
        &self.input
    }

    /// The output (supply water) sensor.
    pub fn output(&self) -> &SensorReading {
        &self.output
    }

    /// Input trend projected one window ahead; the window comes from the
    /// configured sample count.
    pub fn input_trend(&self, samples: usize) -> f32 {
        self.input.extrapolate(samples)
    }

    /// Output trend projected one window ahead.
    pub fn output_trend(&self, samples: usize) -> f32 {
        self.output.extrapolate(samples)
    }

    /// Whether a measurement slot is mid-flight on the bus.
    pub fn is_reading(&self) -> bool {
        !matches!(self.phase, Phase::Start | Phase::RequestConvert | Phase::Wait)
    }

    /// Replaces measured values with fixed ones and stops touching the
    /// bus.
    pub fn simulate(&mut self, input_celsius: f32, output_celsius: f32) {
        self.simulated = true;
        self.input.record(Some(input_celsius), Status::Ok);
        self.output.record(Some(output_celsius), Status::Ok);
    }

    /// Returns to measuring real sensors on the next slot.
    pub fn end_simulation(&mut self) {
        self.simulated = false;
    }

    /// Whether readings are simulated.
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }
}

impl Default for SensorPoller {
    fn default() -> Self {
        Self::new()
    }
}
