//! The beat timing state machine.
//!
//! [`BeatEngine`] owns every piece of mutable timing state for one
//! resonator. It is fed one [`Passage`] per swing and answers with the
//! current best estimate of a beat's duration in microseconds. Which
//! estimate that is depends on the [`RunMode`]:
//!
//! | Mode          | Beat duration                                         |
//! |---------------|-------------------------------------------------------|
//! | `Settling`    | Last corrected interval                               |
//! | `Scaling`     | Last corrected interval, peak scale ratchets upward   |
//! | `Calibrating` | Running tick/tock average                             |
//! | `CalFinish`   | Calibrated average, unchanged                         |
//! | `Running`     | Calibrated average, unchanged                         |

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    calibration::{CalibrationAverager, HalfCycle},
    config::EngineConfig,
    detector::Passage,
    scaling::PeakScaler,
    timing::{self, beats_per_minute, MAX_PLAUSIBLE_INTERVAL_US},
    RunMode,
};

/// Snapshot of the engine for display and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub mode: RunMode,
    pub cycle_counter: Option<u32>,
    pub beat_duration_us: i64,
    pub tick_avg_us: i64,
    pub tock_avg_us: i64,
    pub last_tick_us: i64,
    pub last_tock_us: i64,
    pub bias: i32,
    pub peak_scale: u32,
    pub is_tick: bool,
    pub avg_bpm: f64,
    pub cur_bpm: f64,
    pub delta: f64,
}

/// Timing and calibration state for a single resonator.
#[derive(Debug, Clone)]
pub struct BeatEngine {
    mode: RunMode,
    cycle_counter: u32,
    target_settle: u32,
    target_scale: u32,
    averager: CalibrationAverager,
    scaler: PeakScaler,
    bias: i32,
    tick: bool,
    tick_period: i64,
    tock_period: i64,
    beat_duration: i64,
    last_time: Option<u64>,
    time_before_last: Option<u64>,
}

impl BeatEngine {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        let mut engine = Self {
            mode: config.initial_mode,
            cycle_counter: 1,
            target_settle: config.settle_cycles,
            target_scale: config.scale_cycles,
            averager: CalibrationAverager::new(config.smoothing_pairs),
            scaler: PeakScaler::new(config.peak_scale),
            bias: config.bias,
            tick: true,
            tick_period: 0,
            tock_period: 0,
            beat_duration: 0,
            last_time: None,
            time_before_last: None,
        };
        if let Some(beat_us) = config.beat_duration_us {
            engine.set_beat_duration(beat_us);
        }
        engine
    }

    /// Processes one passage and returns the current beat duration (µs).
    ///
    /// The very first passage only establishes the baseline timestamp and
    /// returns 0.
    pub fn on_passage(&mut self, passage: Passage) -> i64 {
        let now = passage.timestamp_us;
        let Some(last) = self.last_time else {
            debug!(timestamp_us = now, "baseline passage recorded");
            self.last_time = Some(now);
            return 0;
        };

        match self.mode {
            RunMode::Settling | RunMode::Scaling => {
                if self.mode == RunMode::Scaling && self.scaler.observe(passage.peak) {
                    debug!(
                        peak = passage.peak,
                        peak_scale = self.scaler.scale(),
                        "peak scale raised"
                    );
                }
                if let Some(interval) = self.measure(last, now) {
                    self.beat_duration = interval;
                    self.record_period(interval);
                }
                if !self.tick {
                    self.cycle_counter = self.cycle_counter.saturating_add(1);
                    let target = match self.mode {
                        RunMode::Settling => self.target_settle,
                        _ => self.target_scale,
                    };
                    if self.cycle_counter > target {
                        self.set_mode(self.mode.next());
                    }
                }
            }
            RunMode::Calibrating => {
                if self.averager.is_empty() && !self.tick {
                    // The averages assume a window that opens on a tick.
                    self.tick = true;
                }
                let half = self.half_cycle();
                let finished = match self.measure(last, now) {
                    Some(interval) => {
                        self.record_period(interval);
                        self.averager.update(half, interval)
                    }
                    None => half == HalfCycle::Tock && self.averager.advance(),
                };
                self.beat_duration = self.averager.beat_duration();
                if finished {
                    info!(
                        beat_duration_us = self.beat_duration,
                        tick_avg_us = self.averager.tick_avg(),
                        tock_avg_us = self.averager.tock_avg(),
                        "calibration complete"
                    );
                    self.set_mode(RunMode::CalFinish);
                }
            }
            RunMode::CalFinish => self.set_mode(RunMode::Running),
            RunMode::Running => {}
        }

        debug!(
            mode = %self.mode,
            interval_us = now.wrapping_sub(last),
            beat_duration_us = self.beat_duration,
            "beat"
        );

        self.tick = !self.tick;
        self.time_before_last = self.last_time;
        self.last_time = Some(now);
        self.beat_duration
    }

    fn measure(&self, earlier: u64, later: u64) -> Option<i64> {
        let interval = timing::measure_interval(earlier, later, i64::from(self.bias));
        if interval.is_none() {
            warn!(
                earlier_us = earlier,
                later_us = later,
                bias = self.bias,
                "implausible interval discarded"
            );
        }
        interval
    }

    fn half_cycle(&self) -> HalfCycle {
        if self.tick {
            HalfCycle::Tick
        } else {
            HalfCycle::Tock
        }
    }

    fn record_period(&mut self, interval: i64) {
        match self.half_cycle() {
            HalfCycle::Tick => self.tick_period = interval,
            HalfCycle::Tock => self.tock_period = interval,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Forces the engine into `mode`, resetting the state that mode owns.
    pub fn set_mode(&mut self, mode: RunMode) {
        match mode {
            RunMode::Settling => self.cycle_counter = 1,
            RunMode::Scaling => {
                self.cycle_counter = 1;
                self.scaler.reset();
            }
            RunMode::Calibrating => self.averager.reset(),
            RunMode::CalFinish | RunMode::Running => {}
        }
        if self.mode != mode {
            info!(from = %self.mode, to = %mode, "run mode changed");
        }
        self.mode = mode;
    }

    /// Progress through the current mode: cycles while settling or scaling,
    /// the smoothing pair while calibrating, `None` once running.
    pub fn cycle_counter(&self) -> Option<u32> {
        match self.mode {
            RunMode::Running => None,
            RunMode::Calibrating => Some(self.averager.smoothing()),
            _ => Some(self.cycle_counter),
        }
    }

    pub fn target_settle(&self) -> u32 {
        self.target_settle
    }

    pub fn set_target_settle(&mut self, cycles: u32) {
        self.target_settle = cycles;
    }

    pub fn target_scale(&self) -> u32 {
        self.target_scale
    }

    pub fn set_target_scale(&mut self, cycles: u32) {
        self.target_scale = cycles;
    }

    pub fn target_smoothing(&self) -> u32 {
        self.averager.target()
    }

    pub fn set_target_smoothing(&mut self, pairs: u32) {
        self.averager.set_target(pairs);
    }

    /// Clock correction in tenths of a second per day.
    pub fn bias(&self) -> i32 {
        self.bias
    }

    pub fn set_bias(&mut self, bias: i32) {
        self.bias = bias;
    }

    pub fn incr_bias(&mut self, delta: i32) -> i32 {
        self.bias = self.bias.saturating_add(delta);
        self.bias
    }

    pub fn peak_scale(&self) -> u32 {
        self.scaler.scale()
    }

    pub fn set_peak_scale(&mut self, scale: u32) {
        self.scaler.set_scale(scale);
    }

    pub fn peak_scaler(&self) -> &PeakScaler {
        &self.scaler
    }

    /// Whether the next passage will be timed as a tick.
    pub fn is_tick(&self) -> bool {
        self.tick
    }

    pub fn beat_duration(&self) -> i64 {
        self.beat_duration
    }

    /// Loads a known beat duration, bypassing calibration. Clamped to
    /// `0..=`[`MAX_PLAUSIBLE_INTERVAL_US`].
    pub fn set_beat_duration(&mut self, beat_us: i64) {
        self.beat_duration = beat_us.clamp(0, MAX_PLAUSIBLE_INTERVAL_US);
        self.averager.set_averages(self.beat_duration);
    }

    /// Adjusts the beat duration so a clock counting beats gains `incr`
    /// tenths of a second per day. Returns the new duration.
    pub fn incr_beat_duration(&mut self, incr: i64) -> i64 {
        self.beat_duration = timing::adjust_beat_duration(self.beat_duration, incr);
        self.averager.set_averages(self.beat_duration);
        self.beat_duration
    }

    pub fn tick_avg(&self) -> i64 {
        self.averager.tick_avg()
    }

    pub fn tock_avg(&self) -> i64 {
        self.averager.tock_avg()
    }

    pub fn last_tick_duration(&self) -> i64 {
        self.tick_period
    }

    pub fn last_tock_duration(&self) -> i64 {
        self.tock_period
    }

    pub fn last_passage_us(&self) -> Option<u64> {
        self.last_time
    }

    /// Average beats per minute from the calibrated tick and tock averages.
    pub fn avg_bpm(&self) -> f64 {
        let pair = self.averager.tick_avg().saturating_add(self.averager.tock_avg());
        if pair <= 0 {
            return 0.0;
        }
        120_000_000.0 / pair as f64
    }

    /// Beats per minute of the most recent corrected interval.
    pub fn cur_bpm(&self) -> f64 {
        match (self.time_before_last, self.last_time) {
            (Some(before), Some(last)) => {
                let raw = i64::try_from(last.wrapping_sub(before)).unwrap_or(0);
                beats_per_minute(timing::correct_interval(raw, i64::from(self.bias)))
            }
            _ => 0.0,
        }
    }

    /// Ratio of the last tick to the last tock; 0 until both are known.
    pub fn delta(&self) -> f64 {
        if self.tick_period == 0 || self.tock_period == 0 {
            return 0.0;
        }
        self.tick_period as f64 / self.tock_period as f64
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            mode: self.mode,
            cycle_counter: self.cycle_counter(),
            beat_duration_us: self.beat_duration,
            tick_avg_us: self.tick_avg(),
            tock_avg_us: self.tock_avg(),
            last_tick_us: self.tick_period,
            last_tock_us: self.tock_period,
            bias: self.bias,
            peak_scale: self.peak_scale(),
            is_tick: self.tick,
            avg_bpm: self.avg_bpm(),
            cur_bpm: self.cur_bpm(),
            delta: self.delta(),
        }
    }
}

impl Default for BeatEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    /// Feeds passages at the given gaps after `start` and returns each result.
    fn feed(engine: &mut BeatEngine, start: &mut u64, gaps: &[u64]) -> Vec<i64> {
        gaps.iter()
            .map(|gap| {
                *start += gap;
                engine.on_passage(Passage::new(*start, 0))
            })
            .collect()
    }

    fn small_config() -> EngineConfig {
        EngineConfig {
            settle_cycles: 2,
            scale_cycles: 2,
            smoothing_pairs: 3,
            ..Default::default()
        }
    }

    #[test]
    fn first_passage_only_sets_baseline() {
        let mut engine = BeatEngine::new();
        assert_eq!(engine.on_passage(Passage::new(123_456, 0)), 0);
        assert_eq!(engine.cycle_counter(), Some(1));
        assert_eq!(engine.last_passage_us(), Some(123_456));
        assert!(engine.is_tick());
        assert_eq!(engine.cur_bpm(), 0.0);
    }

    #[test]
    fn settles_for_exactly_target_cycles() {
        let mut engine = BeatEngine::new();
        engine.set_target_settle(3);
        let mut t = 0;
        feed(&mut engine, &mut t, &[0]);

        for beat in 1..=6 {
            assert_eq!(engine.mode(), RunMode::Settling, "beat {beat}");
            feed(&mut engine, &mut t, &[500_000]);
        }
        assert_eq!(engine.mode(), RunMode::Scaling);
        assert_eq!(engine.cycle_counter(), Some(1));
        assert_eq!(engine.beat_duration(), 500_000);
    }

    #[test]
    fn applies_bias_to_measured_interval() {
        let mut engine = BeatEngine::new();
        engine.set_bias(10);
        let mut t = 0;
        let out = feed(&mut engine, &mut t, &[1, 1_000_000]);
        assert_eq!(out, vec![0, 1_000_012]);
    }

    #[test]
    fn discards_implausible_interval() {
        let mut engine = BeatEngine::new();
        let mut t = 0;
        let out = feed(&mut engine, &mut t, &[1, 500_000, 6_000_000, 510_000]);
        assert_eq!(out, vec![0, 500_000, 500_000, 510_000]);
        assert_eq!(engine.mode(), RunMode::Settling);
    }

    #[test]
    fn peak_scale_only_moves_while_scaling() {
        let mut engine = BeatEngine::new();
        engine.set_peak_scale(20);
        engine.on_passage(Passage::new(1, 0));
        engine.on_passage(Passage::new(500_001, 9));
        assert_eq!(engine.peak_scale(), 20);

        engine.set_mode(RunMode::Scaling);
        assert_eq!(engine.peak_scale(), 10);
        let mut t = 500_001;
        let mut history = Vec::new();
        for peak in [3, 2, 1, 0, 5, 1] {
            t += 500_000;
            engine.on_passage(Passage::new(t, peak));
            history.push(engine.peak_scale());
        }
        assert_eq!(history, vec![11, 12, 12, 12, 13, 13]);

        engine.set_mode(RunMode::Running);
        engine.on_passage(Passage::new(t + 500_000, 50));
        assert_eq!(engine.peak_scale(), 13);
    }

    #[test]
    fn calibrates_over_target_pairs_then_runs() {
        let mut engine = BeatEngine::new();
        engine.set_target_smoothing(4);
        engine.set_mode(RunMode::Calibrating);
        let mut t = 0;
        feed(&mut engine, &mut t, &[1]);

        for pair in 0..4 {
            assert_eq!(engine.mode(), RunMode::Calibrating, "pair {pair}");
            assert_eq!(engine.cycle_counter(), Some(pair + 1));
            feed(&mut engine, &mut t, &[490_000, 510_000]);
        }
        assert_eq!(engine.mode(), RunMode::CalFinish);
        assert_eq!(engine.beat_duration(), 500_000);

        let out = feed(&mut engine, &mut t, &[700_000]);
        assert_eq!(out, vec![500_000]);
        assert_eq!(engine.mode(), RunMode::Running);
        assert_eq!(engine.cycle_counter(), None);
    }

    #[test]
    fn reports_tick_average_until_first_tock() {
        let mut engine = BeatEngine::new();
        engine.set_mode(RunMode::Calibrating);
        let mut t = 0;
        let out = feed(&mut engine, &mut t, &[1, 480_000, 520_000]);
        assert_eq!(out, vec![0, 480_000, 500_000]);
    }

    #[test]
    fn calibration_starting_on_tock_is_realigned() {
        let mut engine = BeatEngine::new();
        let mut t = 0;
        feed(&mut engine, &mut t, &[1, 500_000]);
        assert!(!engine.is_tick());

        engine.set_mode(RunMode::Calibrating);
        feed(&mut engine, &mut t, &[480_000]);
        assert_eq!(engine.tick_avg(), 480_000);
        assert_eq!(engine.tock_avg(), 0);
        assert!(!engine.is_tick());
    }

    #[test]
    fn rejected_tock_still_advances_window() {
        let mut engine = BeatEngine::new();
        engine.set_target_smoothing(1);
        engine.set_mode(RunMode::Calibrating);
        let mut t = 0;
        let out = feed(&mut engine, &mut t, &[1, 480_000, 7_000_000]);
        assert_eq!(out, vec![0, 480_000, 480_000]);
        assert_eq!(engine.mode(), RunMode::CalFinish);
    }

    #[test]
    fn entering_running_twice_changes_nothing() {
        let mut engine = BeatEngine::new();
        engine.set_mode(RunMode::Calibrating);
        let mut t = 0;
        feed(&mut engine, &mut t, &[1, 480_000, 520_000]);

        engine.set_mode(RunMode::Running);
        let before = engine.status();
        engine.set_mode(RunMode::Running);
        assert_eq!(engine.status(), before);
    }

    #[test]
    fn running_with_known_beat_reports_it_unchanged() {
        let mut engine = BeatEngine::new();
        engine.set_mode(RunMode::Running);
        engine.set_beat_duration(1_000_000);
        let mut t = 0;
        let out = feed(&mut engine, &mut t, &[1, 1_000_000, 1_000_000, 1_000_000]);
        assert_eq!(out, vec![0, 1_000_000, 1_000_000, 1_000_000]);
        assert_eq!(engine.mode(), RunMode::Running);
        assert_eq!(engine.tick_avg(), 1_000_000);
        assert_eq!(engine.tock_avg(), 1_000_000);
        assert_relative_eq!(engine.cur_bpm(), 60.0);
    }

    #[test]
    fn walks_through_every_mode_automatically() {
        let mut engine = BeatEngine::with_config(&small_config());
        let mut t = 0;
        feed(&mut engine, &mut t, &[1]);

        let mut modes = vec![engine.mode()];
        for beat in 0..16 {
            let gap = if beat % 2 == 0 { 480_000 } else { 520_000 };
            feed(&mut engine, &mut t, &[gap]);
            if modes.last() != Some(&engine.mode()) {
                modes.push(engine.mode());
            }
        }

        assert_eq!(modes, RunMode::ALL.to_vec());
        assert_eq!(engine.tick_avg(), 480_000);
        assert_eq!(engine.tock_avg(), 520_000);
        assert_eq!(engine.beat_duration(), 500_000);
        assert_relative_eq!(engine.avg_bpm(), 120.0);
        assert_relative_eq!(engine.delta(), 480.0 / 520.0);
    }

    #[test]
    fn scaling_resets_peak_scale_and_counter() {
        let mut engine = BeatEngine::new();
        engine.set_peak_scale(57);
        let mut t = 0;
        feed(&mut engine, &mut t, &[1, 500_000, 500_000]);
        assert_eq!(engine.cycle_counter(), Some(2));

        engine.set_mode(RunMode::Scaling);
        assert_eq!(engine.peak_scale(), 10);
        assert_eq!(engine.cycle_counter(), Some(1));
    }

    #[test]
    fn bias_survives_mode_changes() {
        let mut engine = BeatEngine::new();
        engine.set_bias(-30);
        assert_eq!(engine.incr_bias(5), -25);
        for mode in RunMode::ALL {
            engine.set_mode(mode);
            assert_eq!(engine.bias(), -25);
        }
    }

    #[test]
    fn incrementing_beat_duration_updates_averages() {
        let mut engine = BeatEngine::new();
        engine.set_beat_duration(1_000_000);
        assert_eq!(engine.incr_beat_duration(10), 1_000_012);
        assert_eq!(engine.tick_avg(), 1_000_012);
        assert_eq!(engine.tock_avg(), 1_000_012);

        engine.set_beat_duration(-5);
        assert_eq!(engine.beat_duration(), 0);
    }

    #[test]
    fn oversized_beat_durations_are_clamped() {
        let mut engine = BeatEngine::new();
        engine.set_mode(RunMode::Running);
        engine.set_beat_duration(i64::MAX);
        assert_eq!(engine.beat_duration(), MAX_PLAUSIBLE_INTERVAL_US);
        assert_relative_eq!(engine.status().avg_bpm, 12.0);

        engine.set_beat_duration(1_000_000);
        assert_eq!(engine.incr_beat_duration(100_000_000), MAX_PLAUSIBLE_INTERVAL_US);
        assert_eq!(engine.tick_avg(), MAX_PLAUSIBLE_INTERVAL_US);
        assert_relative_eq!(engine.avg_bpm(), 12.0);
    }

    #[test]
    fn scales_for_exactly_target_cycles() {
        let mut engine = BeatEngine::new();
        engine.set_target_scale(3);
        engine.set_mode(RunMode::Scaling);
        let mut t = 0;
        feed(&mut engine, &mut t, &[0]);

        for beat in 1..=6 {
            assert_eq!(engine.mode(), RunMode::Scaling, "beat {beat}");
            feed(&mut engine, &mut t, &[500_000]);
        }
        assert_eq!(engine.mode(), RunMode::Calibrating);
        assert_eq!(engine.cycle_counter(), Some(1));
    }

    #[test]
    fn config_can_skip_calibration() {
        let config = EngineConfig {
            initial_mode: RunMode::Running,
            beat_duration_us: Some(750_000),
            peak_scale: 33,
            ..Default::default()
        };
        let engine = BeatEngine::with_config(&config);
        let status = engine.status();
        assert_eq!(status.mode, RunMode::Running);
        assert_eq!(status.beat_duration_us, 750_000);
        assert_eq!(status.peak_scale, 33);
        assert_eq!(status.cycle_counter, None);
        assert_relative_eq!(status.avg_bpm, 80.0);
    }
}
