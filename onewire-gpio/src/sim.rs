//! Discrete-event simulation of a 1-Wire line.
//!
//! Time advances only when the master queries the clock: each query moves
//! the simulation forward by 1/16 µs, so the busy-wait loops in the bus
//! driver progress deterministically and slot timing can be asserted to the
//! microsecond. The line level is the wired AND of the master side and a
//! scripted slave; the slave plays back a list of toggle times and its
//! pending toggles are applied lazily whenever the master samples the pin.
//!
//! Master transitions are recorded with microsecond timestamps. Tests
//! assert on [SimBus::master_edge_deltas] and on [SimBus::collision], which
//! latches when master and slave ever drive the line inconsistently.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::MicrosClock;

const TICKS_PER_MICRO: u64 = 16;

struct SimState {
    ticks: u64,
    master_high: bool,
    slave_high: bool,
    slave_events: VecDeque<u64>,
    master_edges: Vec<u64>,
    collision: bool,
}

impl SimState {
    fn time_us(&self) -> u64 {
        self.ticks / TICKS_PER_MICRO
    }

    fn advance(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks / TICKS_PER_MICRO
    }

    fn run_slave(&mut self) {
        let now = self.time_us();
        while let Some(&at) = self.slave_events.front() {
            if at > now {
                break;
            }
            self.slave_events.pop_front();
            if !self.master_high {
                // slave toggled while the master was driving the line
                self.collision = true;
            }
            self.slave_high = !self.slave_high;
        }
    }

    fn set_master(&mut self, high: bool) {
        if !high && !self.slave_high {
            // master starts driving while a slave still holds the line low
            self.collision = true;
        }
        if high != self.master_high {
            self.master_high = high;
            let at = self.time_us();
            self.master_edges.push(at);
        }
    }

    fn line_high(&mut self) -> bool {
        self.run_slave();
        self.master_high && self.slave_high
    }
}

/// Handle to a simulated 1-Wire line; clones share the same state.
#[derive(Clone)]
pub struct SimBus {
    inner: Rc<RefCell<SimState>>,
}

impl SimBus {
    /// Creates an idle line pulled high, at time zero.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SimState {
                ticks: 0,
                master_high: true,
                slave_high: true,
                slave_events: VecDeque::new(),
                master_edges: Vec::new(),
                collision: false,
            })),
        }
    }

    /// The master-side pin endpoint.
    pub fn pin(&self) -> SimPin {
        SimPin {
            inner: Rc::clone(&self.inner),
        }
    }

    /// The clock endpoint driving the simulation.
    pub fn clock(&self) -> SimClock {
        SimClock {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Scripts the slave side: starting from `initially_high`, the slave
    /// toggles the line after each of the given delays in microseconds,
    /// accumulated from the current simulation time. Replaces any pending
    /// script.
    pub fn script_slave(&self, initially_high: bool, delays: &[u64]) {
        let mut state = self.inner.borrow_mut();
        state.slave_high = initially_high;
        state.slave_events.clear();
        let mut at = state.time_us();
        for delay in delays {
            at += delay;
            state.slave_events.push_back(at);
        }
    }

    /// Microsecond deltas between consecutive master transitions, the
    /// first measured from time zero.
    pub fn master_edge_deltas(&self) -> Vec<u64> {
        let state = self.inner.borrow();
        let mut last = 0;
        state
            .master_edges
            .iter()
            .map(|&at| {
                let delta = at - last;
                last = at;
                delta
            })
            .collect()
    }

    /// Whether master and slave ever drove the line inconsistently.
    pub fn collision(&self) -> bool {
        self.inner.borrow().collision
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Master pin endpoint of a [SimBus].
pub struct SimPin {
    inner: Rc<RefCell<SimState>>,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.inner.borrow_mut().set_master(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.inner.borrow_mut().set_master(true);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.inner.borrow_mut().line_high())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.inner.borrow_mut().line_high())
    }
}

/// Clock endpoint of a [SimBus]; every query advances time by 1/16 µs.
pub struct SimClock {
    inner: Rc<RefCell<SimState>>,
}

impl MicrosClock for SimClock {
    fn now_us(&mut self) -> u32 {
        self.inner.borrow_mut().advance() as u32
    }
}
