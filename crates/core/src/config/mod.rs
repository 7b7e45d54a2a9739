use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    scaling::DEFAULT_PEAK_SCALE, timing::MAX_PLAUSIBLE_INTERVAL_US, BendulumError, Result, RunMode,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub actuation: ActuationConfig,
    pub detector: DetectorConfig,
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections and fields fall
    /// back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.simulation.validate()
    }
}

/// Phase lengths and starting state of the beat engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cycles spent letting the motion settle.
    pub settle_cycles: u32,
    /// Cycles spent ratcheting the peak scale.
    pub scale_cycles: u32,
    /// Tick/tock pairs folded into the calibration averages.
    pub smoothing_pairs: u32,
    /// Clock correction in tenths of a second per day.
    pub bias: i32,
    pub peak_scale: u32,
    pub initial_mode: RunMode,
    /// Known beat duration to start from, e.g. when skipping calibration.
    pub beat_duration_us: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_cycles: 32,
            scale_cycles: 128,
            smoothing_pairs: 2048,
            bias: 0,
            peak_scale: DEFAULT_PEAK_SCALE,
            initial_mode: RunMode::Settling,
            beat_duration_us: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.peak_scale == 0 {
            return Err(BendulumError::InvalidInput("peak scale must be at least 1"));
        }
        if self.smoothing_pairs == 0 {
            return Err(BendulumError::InvalidInput(
                "smoothing window must cover at least one pair",
            ));
        }
        let plausible = 0..=MAX_PLAUSIBLE_INTERVAL_US;
        if matches!(self.beat_duration_us, Some(us) if !plausible.contains(&us)) {
            return Err(BendulumError::InvalidInput(
                "beat duration must be between 0 and 5 seconds",
            ));
        }
        Ok(())
    }
}

/// Shape of the sustaining pulse sent through the coil after each passage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuationConfig {
    /// Delay between the passage and the start of the pulse.
    pub pulse_delay_ms: u32,
    pub pulse_width_ms: u32,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            pulse_delay_ms: 5,
            pulse_width_ms: 50,
        }
    }
}

/// Passage detector settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Quiet time before the detector starts looking for the next spike, so
    /// the ringing left by the previous pulse dies away.
    pub settle_delay_ms: u32,
    /// Give up waiting for a passage after this long. `None` waits forever.
    pub timeout_ms: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 250,
            timeout_ms: None,
        }
    }
}

/// Parameters of the simulated resonator used by tests and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// True duration of the tick half-swing.
    pub tick_us: u64,
    /// True duration of the tock half-swing.
    pub tock_us: u64,
    /// Raw reading at the top of the induced spike.
    pub peak_magnitude: u32,
    /// Time for the spike to rise to its peak, and again to fall back.
    pub spike_half_width_us: u64,
    /// Time one analog read takes.
    pub sample_period_us: u64,
    /// How far the simulated microcontroller clock runs slow, in tenths of
    /// a second per day. Setting the engine bias to this value cancels it.
    pub clock_error: i64,
    /// Delay before the first passage.
    pub first_passage_us: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_us: 498_000,
            tock_us: 502_000,
            peak_magnitude: 300,
            spike_half_width_us: 2_000,
            sample_period_us: 100,
            clock_error: 0,
            first_passage_us: 400_000,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_us == 0 || self.tock_us == 0 {
            return Err(BendulumError::InvalidInput(
                "tick and tock durations must be positive",
            ));
        }
        if self.sample_period_us == 0 {
            return Err(BendulumError::InvalidInput(
                "sample period must be positive",
            ));
        }
        if self.spike_half_width_us == 0 {
            return Err(BendulumError::InvalidInput(
                "spike half width must be positive",
            ));
        }
        Ok(())
    }
}
