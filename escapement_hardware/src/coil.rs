use std::time::Duration;

use escapement_traits::{BoxError, Clock, Transducer};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use tracing::trace;

use crate::error::{HwError, Result};

/// Quiet time after a kick before the sense line is armed again.
pub const SETTLE_TIME: Duration = Duration::from_millis(250);
/// Delay between detection and the start of the kick pulse.
pub const KICK_DELAY: Duration = Duration::from_millis(5);
/// Length of the kick pulse.
pub const KICK_TIME: Duration = Duration::from_millis(20);

/// Coil front-end on Raspberry Pi GPIO: a comparator output on `sense` that
/// rises as the magnet passes, and a driver on `kick` that pulses the coil.
pub struct CoilTransducer<C: Clock> {
    sense: InputPin,
    kick: OutputPin,
    clock: C,
}

impl<C: Clock> CoilTransducer<C> {
    pub fn new(sense_pin: u8, kick_pin: u8, clock: C) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut sense = gpio
            .get(sense_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input();
        sense
            .set_interrupt(Trigger::RisingEdge)
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut kick = gpio
            .get(kick_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        kick.set_low();
        Ok(Self { sense, kick, clock })
    }
}

impl<C: Clock> Transducer for CoilTransducer<C> {
    fn await_passage(&mut self) -> std::result::Result<u64, BoxError> {
        self.clock.sleep(SETTLE_TIME);
        // Blocks until the edge arrives; a swinging magnet always produces one.
        match self.sense.poll_interrupt(true, None) {
            Ok(Some(_)) => {
                let ts = self.clock.now_us();
                trace!(ts, "coil passage");
                Ok(ts)
            }
            Ok(None) => Err(Box::new(HwError::Timeout)),
            Err(e) => Err(Box::new(HwError::Gpio(e.to_string()))),
        }
    }

    fn apply_kick(&mut self) -> std::result::Result<(), BoxError> {
        self.clock.sleep(KICK_DELAY);
        self.kick.set_high();
        self.clock.sleep(KICK_TIME);
        self.kick.set_low();
        Ok(())
    }
}
