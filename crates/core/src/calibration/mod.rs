/// Which half of a swing a beat belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfCycle {
    Tick,
    Tock,
}

/// Finite-window running averages of tick and tock durations.
///
/// Each sample moves its average by `(sample - avg) / n` where `n` is the
/// number of pairs seen so far, starting at 1. The divisor grows by one each
/// time a tock is folded in, so the first pair sets the averages outright and
/// later pairs nudge them less and less. The window closes once `n` passes the
/// target.
#[derive(Debug, Clone)]
pub struct CalibrationAverager {
    tick_avg: i64,
    tock_avg: i64,
    smoothing: u32,
    target: u32,
}

impl CalibrationAverager {
    pub fn new(target: u32) -> Self {
        Self {
            tick_avg: 0,
            tock_avg: 0,
            smoothing: 1,
            target,
        }
    }

    /// Clears both averages and restarts the window.
    pub fn reset(&mut self) {
        self.tick_avg = 0;
        self.tock_avg = 0;
        self.smoothing = 1;
    }

    /// True while no tick has been folded in since the last reset.
    pub fn is_empty(&self) -> bool {
        self.tick_avg == 0
    }

    /// Folds one corrected half-cycle duration into its average.
    ///
    /// Returns `true` when this sample completed the smoothing window.
    pub fn update(&mut self, half: HalfCycle, sample_us: i64) -> bool {
        let n = i64::from(self.smoothing.max(1));
        match half {
            HalfCycle::Tick => {
                self.tick_avg += (sample_us - self.tick_avg) / n;
                false
            }
            HalfCycle::Tock => {
                self.tock_avg += (sample_us - self.tock_avg) / n;
                self.advance()
            }
        }
    }

    /// Moves the window forward by one pair without sampling.
    ///
    /// Used when the tock sample was rejected as noise; the beat still
    /// happened, so the window keeps its length in beats.
    pub fn advance(&mut self) -> bool {
        self.smoothing = self.smoothing.saturating_add(1);
        self.smoothing > self.target
    }

    /// Current beat estimate: the tick average alone until a tock has been
    /// seen, then the mean of the two.
    pub fn beat_duration(&self) -> i64 {
        if self.tock_avg == 0 {
            self.tick_avg
        } else {
            (self.tick_avg + self.tock_avg) / 2
        }
    }

    /// Overwrites both averages, e.g. when a known beat duration is loaded.
    pub fn set_averages(&mut self, beat_us: i64) {
        self.tick_avg = beat_us;
        self.tock_avg = beat_us;
    }

    pub fn tick_avg(&self) -> i64 {
        self.tick_avg
    }

    pub fn tock_avg(&self) -> i64 {
        self.tock_avg
    }

    /// Number of the pair currently being accumulated (1-based).
    pub fn smoothing(&self) -> u32 {
        self.smoothing
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn set_target(&mut self, target: u32) {
        self.target = target;
    }
}
