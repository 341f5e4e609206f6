//! Stand-ins for the sorter's hardware when running on a workstation.

use std::convert::Infallible;
use std::io::{self, BufRead};

use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use smart_leds::{RGB8, SmartLedsWrite};
use tracing::{debug, warn};

use super::AnalogInput;
use super::actuator::SERVO_PERIOD_TICKS;

/// ADC readings from a text stream, one integer per line.
pub struct LineAdc<R> {
    lines: io::Lines<R>,
}

impl<R: BufRead> LineAdc<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead> AnalogInput for LineAdc<R> {
    type Error = io::Error;

    fn read(&mut self) -> Result<Option<u16>, Self::Error> {
        for line in self.lines.by_ref() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.parse::<u16>() {
                Ok(value) => return Ok(Some(value)),
                Err(e) => warn!("Skipping ADC line {:?}: {}", trimmed, e),
            }
        }
        Ok(None)
    }
}

/// PWM channel that logs duty changes. One duty unit is one timer tick.
#[derive(Debug, Default)]
pub struct LoggedPwm {
    duty: u16,
}

impl LoggedPwm {
    pub fn duty(&self) -> u16 {
        self.duty
    }
}

impl ErrorType for LoggedPwm {
    type Error = Infallible;
}

impl SetDutyCycle for LoggedPwm {
    fn max_duty_cycle(&self) -> u16 {
        SERVO_PERIOD_TICKS as u16
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        debug!("Servo pulse: {} ticks", duty);
        self.duty = duty;
        Ok(())
    }
}

/// LED strip that logs each frame it is given.
#[derive(Debug, Default)]
pub struct LoggedStrip {
    frames: u64,
}

impl LoggedStrip {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl SmartLedsWrite for LoggedStrip {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let pixels: Vec<RGB8> = iterator.into_iter().map(Into::into).collect();
        self.frames += 1;
        if let Some(first) = pixels.first() {
            debug!(
                "LED frame {}: {} pixels, first=({}, {}, {})",
                self.frames,
                pixels.len(),
                first.r,
                first.g,
                first.b
            );
        }
        Ok(())
    }
}
