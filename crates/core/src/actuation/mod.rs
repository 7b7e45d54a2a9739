use crate::{
    config::ActuationConfig,
    hardware::{Actuator, Clock},
};

/// Issues the sustaining kick that follows every passage.
///
/// The pin is switched to output only for the duration of the pulse and
/// put back into high impedance afterwards, so the coil is free to sense the
/// next passage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActuationSequencer {
    config: ActuationConfig,
}

impl ActuationSequencer {
    pub fn new(config: ActuationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ActuationConfig {
        &self.config
    }

    pub fn kick<H>(&self, hw: &mut H)
    where
        H: Actuator + Clock,
    {
        hw.set_output(true);
        hw.delay_ms(self.config.pulse_delay_ms);
        hw.drive(true);
        hw.delay_ms(self.config.pulse_width_ms);
        hw.drive(false);
        hw.set_output(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        now_ms: u64,
        log: Vec<(u64, &'static str)>,
    }

    impl Clock for Recorder {
        fn now_us(&mut self) -> u64 {
            self.now_ms * 1_000
        }

        fn delay_ms(&mut self, ms: u32) {
            self.now_ms += u64::from(ms);
        }
    }

    impl Actuator for Recorder {
        fn set_output(&mut self, enabled: bool) {
            let event = if enabled { "output" } else { "high-z" };
            self.log.push((self.now_ms, event));
        }

        fn drive(&mut self, on: bool) {
            let event = if on { "on" } else { "off" };
            self.log.push((self.now_ms, event));
        }
    }

    #[test]
    fn pulse_follows_configured_shape() {
        let sequencer = ActuationSequencer::new(ActuationConfig {
            pulse_delay_ms: 5,
            pulse_width_ms: 50,
        });
        let mut hw = Recorder::default();
        sequencer.kick(&mut hw);

        assert_eq!(
            hw.log,
            vec![(0, "output"), (5, "on"), (55, "off"), (55, "high-z")]
        );
    }
}
