//! Core library for driving a bendulum.
//!
//! A bendulum is a springy vertical reed whose free end carries a magnet
//! swinging over a coil. Each passage induces a spike that is detected and
//! timed, then answered with a short pulse that keeps the reed going. The
//! [`BeatEngine`] works out the reed's natural beat through an automatic
//! settle, scale and calibrate sequence and reports clock-corrected beat
//! durations. The [`Bendulum`] driver ties the engine to the
//! [`hardware`] traits.

pub mod actuation;
pub mod calibration;
pub mod config;
pub mod detector;
pub mod driver;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod mode;
pub mod scaling;
pub mod sim;
pub mod timing;

pub use actuation::ActuationSequencer;
pub use calibration::{CalibrationAverager, HalfCycle};
pub use config::{ActuationConfig, AppConfig, DetectorConfig, EngineConfig, SimulationConfig};
pub use detector::{Passage, PassageDetector};
pub use driver::Bendulum;
pub use engine::{BeatEngine, EngineStatus};
pub use error::{BendulumError, Result};
pub use hardware::{Actuator, Clock, PassageSensor};
pub use mode::RunMode;
pub use scaling::PeakScaler;
pub use sim::SimulatedResonator;
pub use timing::correct_interval;
