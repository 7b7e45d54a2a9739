//! Boundary traits for the physical side of a bendulum.
//!
//! A board support layer implements these for its timer, ADC pin and kick
//! pin. [`crate::sim::SimulatedResonator`] implements all three over a
//! virtual timeline.

/// Monotonic microsecond clock with a blocking millisecond delay.
pub trait Clock {
    fn now_us(&mut self) -> u64;
    fn delay_ms(&mut self, ms: u32);
}

/// Analog reading of the voltage the passing magnet induces in the coil.
pub trait PassageSensor {
    fn read_magnitude(&mut self) -> u32;
}

/// The kick pin driving current through the coil.
pub trait Actuator {
    /// Switches between driving the coil (`true`) and high impedance
    /// (`false`). In high impedance the induced current cannot flow to
    /// ground, so sensing is undisturbed.
    fn set_output(&mut self, enabled: bool);
    fn drive(&mut self, on: bool);
}
