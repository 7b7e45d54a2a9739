use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::BendulumError;

/// Lifecycle phase of the beat engine.
///
/// The automatic progression is `Settling → Scaling → Calibrating →
/// CalFinish → Running`. Any mode can also be entered directly through
/// [`BeatEngine::set_mode`](crate::BeatEngine::set_mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Let the motion settle after the start-up push. Durations are measured.
    Settling,
    /// Ratchet the peak scale so sensed spikes land just above the ceiling.
    Scaling,
    /// Accumulate the tick and tock averages.
    Calibrating,
    /// One-beat notice that calibration has just completed.
    CalFinish,
    /// Report the calibrated beat duration. Nothing is measured.
    Running,
}

impl RunMode {
    pub const ALL: [RunMode; 5] = [
        RunMode::Settling,
        RunMode::Scaling,
        RunMode::Calibrating,
        RunMode::CalFinish,
        RunMode::Running,
    ];

    /// The mode the engine advances to on its own once this one is done.
    /// `Running` is terminal.
    pub fn next(self) -> RunMode {
        match self {
            RunMode::Settling => RunMode::Scaling,
            RunMode::Scaling => RunMode::Calibrating,
            RunMode::Calibrating => RunMode::CalFinish,
            RunMode::CalFinish | RunMode::Running => RunMode::Running,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Settling => "settling",
            RunMode::Scaling => "scaling",
            RunMode::Calibrating => "calibrating",
            RunMode::CalFinish => "calfinish",
            RunMode::Running => "running",
        }
    }
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Settling
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = BendulumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s
            .trim()
            .to_ascii_lowercase()
            .replace(|c: char| c == '-' || c == '_', "");
        RunMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| BendulumError::UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automatic_progression_ends_in_running() {
        let mut mode = RunMode::Settling;
        let mut seen = vec![mode];
        while mode != RunMode::Running {
            mode = mode.next();
            seen.push(mode);
        }

        assert_eq!(seen, RunMode::ALL.to_vec());
        assert_eq!(RunMode::Running.next(), RunMode::Running);
    }

    #[test]
    fn parses_names_loosely() {
        assert_eq!("Calibrating".parse::<RunMode>().unwrap(), RunMode::Calibrating);
        assert_eq!("cal-finish".parse::<RunMode>().unwrap(), RunMode::CalFinish);
        assert_eq!(" RUNNING ".parse::<RunMode>().unwrap(), RunMode::Running);

        let err = "sprinting".parse::<RunMode>().unwrap_err();
        assert!(format!("{err}").contains("sprinting"));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for mode in RunMode::ALL {
            assert_eq!(mode.to_string().parse::<RunMode>().unwrap(), mode);
        }
    }
}
