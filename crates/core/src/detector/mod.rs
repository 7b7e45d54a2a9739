use crate::{
    config::DetectorConfig,
    hardware::{Clock, PassageSensor},
    scaling::PeakScaler,
    BendulumError, Result,
};

/// A single detected swing of the magnet past the coil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passage {
    /// Clock time (µs) at which the induced spike began to fall.
    pub timestamp_us: u64,
    /// Highest scaled reading seen on the way up.
    pub peak: u32,
}

impl Passage {
    pub fn new(timestamp_us: u64, peak: u32) -> Self {
        Self { timestamp_us, peak }
    }
}

/// Polls the coil until the passing magnet's spike peaks and starts to fall.
///
/// The wait has three stages: a fixed quiet delay so the previous kick has
/// died away, a wait for the raw reading to drop to zero, then a climb over
/// the scaled readings. The first reading lower than its predecessor marks the
/// passage.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassageDetector {
    config: DetectorConfig,
}

impl PassageDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Blocks until a passage is seen.
    ///
    /// With a timeout configured, returns [`BendulumError::NoPassage`] once
    /// the time after the quiet delay runs past it.
    pub fn wait_for_passage<H>(&self, hw: &mut H, scaler: &PeakScaler) -> Result<Passage>
    where
        H: Clock + PassageSensor,
    {
        hw.delay_ms(self.config.settle_delay_ms);

        let deadline = self.config.timeout_ms.map(|ms| {
            let start = hw.now_us();
            start.saturating_add(ms.saturating_mul(1_000))
        });

        while hw.read_magnitude() > 0 {
            self.check_deadline(hw, deadline)?;
        }

        let mut past = 0;
        let mut current = 0;
        while current >= past {
            past = current;
            current = scaler.apply(hw.read_magnitude());
            self.check_deadline(hw, deadline)?;
        }

        Ok(Passage {
            timestamp_us: hw.now_us(),
            peak: past,
        })
    }

    fn check_deadline<C: Clock>(&self, clock: &mut C, deadline: Option<u64>) -> Result<()> {
        match deadline {
            Some(deadline) if clock.now_us() >= deadline => Err(BendulumError::NoPassage {
                waited_ms: self.config.timeout_ms.unwrap_or_default(),
            }),
            _ => Ok(()),
        }
    }
}
