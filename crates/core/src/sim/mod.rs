//! A deterministic stand-in for a real bendulum and its board.
//!
//! [`SimulatedResonator`] keeps a virtual "true" timeline. Every analog read
//! costs one sample period and every delay advances the timeline by its
//! length. The magnet passes the coil at alternating tick and tock intervals,
//! inducing a triangular spike in the sensed magnitude. The microcontroller
//! clock it exposes runs slow by a configurable number of tenths of a second
//! per day, which an engine bias of the same value cancels.

use crate::{
    config::SimulationConfig,
    hardware::{Actuator, Clock, PassageSensor},
    timing::DAY_TENTHS,
};

#[derive(Debug, Clone)]
pub struct SimulatedResonator {
    config: SimulationConfig,
    true_now_us: u64,
    previous_passage_us: Option<u64>,
    next_passage_us: u64,
    next_is_tick: bool,
    swinging: bool,
    output_enabled: bool,
    driving: bool,
    kicks: u64,
    passages: u64,
}

impl SimulatedResonator {
    pub fn new(config: SimulationConfig) -> Self {
        let first = config.first_passage_us;
        Self {
            config,
            true_now_us: 0,
            previous_passage_us: None,
            next_passage_us: first,
            next_is_tick: true,
            swinging: true,
            output_enabled: false,
            driving: false,
            kicks: 0,
            passages: 0,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Elapsed time on the undrifted timeline.
    pub fn true_now_us(&self) -> u64 {
        self.true_now_us
    }

    /// Passages that have fully swept past the coil so far.
    pub fn passages(&self) -> u64 {
        self.passages
    }

    /// Pulses delivered while the kick pin was in output mode.
    pub fn kicks(&self) -> u64 {
        self.kicks
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    pub fn is_driving(&self) -> bool {
        self.driving
    }

    /// Brings the resonator to rest. The coil goes quiet from now on.
    pub fn stop(&mut self) {
        self.swinging = false;
    }

    fn advance(&mut self, us: u64) {
        self.true_now_us = self.true_now_us.saturating_add(us);
        let width = self.config.spike_half_width_us;
        while self.swinging && self.true_now_us >= self.next_passage_us.saturating_add(width) {
            self.previous_passage_us = Some(self.next_passage_us);
            let gap = if self.next_is_tick {
                self.config.tick_us
            } else {
                self.config.tock_us
            };
            self.next_passage_us = self.next_passage_us.saturating_add(gap.max(1));
            self.next_is_tick = !self.next_is_tick;
            self.passages += 1;
        }
    }

    fn spike_at(&self, passage_us: u64) -> u32 {
        let width = self.config.spike_half_width_us.max(1);
        let distance = self.true_now_us.abs_diff(passage_us);
        if distance >= width {
            return 0;
        }
        let scaled = u64::from(self.config.peak_magnitude) * (width - distance) / width;
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}

impl Clock for SimulatedResonator {
    fn now_us(&mut self) -> u64 {
        let true_us = i128::from(self.true_now_us);
        let lag =
            (true_us * i128::from(self.config.clock_error)).div_euclid(i128::from(DAY_TENTHS));
        u64::try_from((true_us - lag).max(0)).unwrap_or(u64::MAX)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms) * 1_000);
    }
}

impl PassageSensor for SimulatedResonator {
    fn read_magnitude(&mut self) -> u32 {
        let magnitude = if self.swinging {
            let next = self.spike_at(self.next_passage_us);
            let previous = self
                .previous_passage_us
                .map(|p| self.spike_at(p))
                .unwrap_or(0);
            next.max(previous)
        } else {
            0
        };
        self.advance(self.config.sample_period_us);
        magnitude
    }
}

impl Actuator for SimulatedResonator {
    fn set_output(&mut self, enabled: bool) {
        self.output_enabled = enabled;
        if !enabled {
            self.driving = false;
        }
    }

    fn drive(&mut self, on: bool) {
        if on && self.output_enabled && !self.driving {
            self.kicks += 1;
        }
        self.driving = on && self.output_enabled;
    }
}
