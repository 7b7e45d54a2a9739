use tracing::warn;

use crate::{
    actuation::ActuationSequencer,
    config::AppConfig,
    detector::PassageDetector,
    hardware::{Actuator, Clock, PassageSensor},
    BeatEngine, Result,
};

/// A bendulum wired to a board: senses each passage, kicks it, and times it.
///
/// `beat()` is meant to be called in a loop. Each call blocks until the
/// magnet next passes the coil and returns the current beat duration in
/// microseconds, so a caller can add it to a time-of-day display.
#[derive(Debug)]
pub struct Bendulum<H> {
    hardware: H,
    engine: BeatEngine,
    detector: PassageDetector,
    sequencer: ActuationSequencer,
}

impl<H> Bendulum<H>
where
    H: Clock + PassageSensor + Actuator,
{
    pub fn new(hardware: H) -> Self {
        Self::with_config(hardware, &AppConfig::default())
    }

    pub fn with_config(mut hardware: H, config: &AppConfig) -> Self {
        // Keep the kick pin in high impedance so the induced current does
        // not flow to ground while sensing.
        hardware.set_output(false);
        Self {
            hardware,
            engine: BeatEngine::with_config(&config.engine),
            detector: PassageDetector::new(config.detector),
            sequencer: ActuationSequencer::new(config.actuation),
        }
    }

    /// Waits for one passage, kicks, and returns the beat duration.
    ///
    /// The first successful call returns 0: there is no interval yet. If the
    /// detector has a timeout and it runs out, the engine is left untouched
    /// and no kick is issued.
    pub fn beat(&mut self) -> Result<i64> {
        let passage = match self
            .detector
            .wait_for_passage(&mut self.hardware, self.engine.peak_scaler())
        {
            Ok(passage) => passage,
            Err(err) => {
                warn!(%err, mode = %self.engine.mode(), "passage wait abandoned");
                return Err(err);
            }
        };

        self.sequencer.kick(&mut self.hardware);
        Ok(self.engine.on_passage(passage))
    }

    /// Two beats: one full swing. Returns the sum of both durations.
    pub fn cycle(&mut self) -> Result<i64> {
        let first = self.beat()?;
        let second = self.beat()?;
        Ok(first.saturating_add(second))
    }

    pub fn engine(&self) -> &BeatEngine {
        &self.engine
    }

    /// Access to the getters and setters: bias, phase lengths, run mode.
    pub fn engine_mut(&mut self) -> &mut BeatEngine {
        &mut self.engine
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }
}
