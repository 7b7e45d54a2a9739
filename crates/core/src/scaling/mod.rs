/// Peak scale every scaling run starts from.
pub const DEFAULT_PEAK_SCALE: u32 = 10;

/// Scaled peaks are pushed down until they no longer exceed this ceiling.
pub const MAX_SCALED_PEAK: u32 = 1;

/// Divisor applied to raw coil readings so the passage spike stays in a
/// narrow band regardless of magnet strength and coil gain.
///
/// While scaling, every beat whose scaled peak exceeds [`MAX_SCALED_PEAK`]
/// bumps the divisor by one. The ratchet never moves the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakScaler {
    scale: u32,
}

impl PeakScaler {
    pub fn new(scale: u32) -> Self {
        Self {
            scale: scale.max(1),
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Sets the divisor directly. Zero is clamped to one.
    pub fn set_scale(&mut self, scale: u32) {
        self.scale = scale.max(1);
    }

    /// Puts the divisor back to [`DEFAULT_PEAK_SCALE`].
    pub fn reset(&mut self) {
        self.scale = DEFAULT_PEAK_SCALE;
    }

    /// Records the scaled peak of one passage. Returns `true` if the divisor
    /// was raised.
    pub fn observe(&mut self, scaled_peak: u32) -> bool {
        if scaled_peak > MAX_SCALED_PEAK {
            self.scale = self.scale.saturating_add(1);
            true
        } else {
            false
        }
    }

    /// Divides a raw reading by the current scale.
    pub fn apply(&self, raw: u32) -> u32 {
        raw / self.scale
    }
}

impl Default for PeakScaler {
    fn default() -> Self {
        Self::new(DEFAULT_PEAK_SCALE)
    }
}
