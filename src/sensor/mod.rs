//! Color sorter: light sensor in, servo and LED matrix out.

pub mod actuator;
pub mod classifier;
pub mod host;
pub mod palette;

use std::fmt::Debug;

use embedded_hal::pwm::SetDutyCycle;
use smart_leds::{RGB8, SmartLedsWrite};
use thiserror::Error;
use tracing::{debug, info};

use actuator::{LedMatrix, Servo};
use classifier::{Debouncer, Observation};
use palette::{ClassId, Palette};

/// A source of raw ADC readings.
pub trait AnalogInput {
    type Error: Debug;

    /// One conversion. `None` means the input has nothing more to give.
    fn read(&mut self) -> Result<Option<u16>, Self::Error>;
}

/// Average of `samples` raw readings, or `None` once the input runs dry.
pub fn read_average<A: AnalogInput>(input: &mut A, samples: u8) -> Result<Option<u16>, A::Error> {
    let samples = samples.max(1);
    let mut sum = 0u32;
    for _ in 0..samples {
        match input.read()? {
            Some(value) => sum += u32::from(value),
            None => return Ok(None),
        }
    }
    Ok(Some((sum / u32::from(samples)) as u16))
}

#[derive(Debug, Error)]
pub enum SorterError {
    #[error("analog read failed: {0}")]
    Input(String),

    #[error("servo update failed: {0}")]
    Servo(String),

    #[error("LED update failed: {0}")]
    Leds(String),
}

/// What one loop iteration saw and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub value: u16,
    pub class: Option<ClassId>,
    pub observation: Observation,
}

pub struct ColorSorter<A, P, W> {
    input: A,
    servo: Servo<P>,
    leds: LedMatrix<W>,
    palette: Palette,
    debouncer: Debouncer,
    oversample: u8,
}

impl<A, P, W> ColorSorter<A, P, W>
where
    A: AnalogInput,
    P: SetDutyCycle,
    W: SmartLedsWrite,
    W::Color: From<RGB8>,
    W::Error: Debug,
{
    pub fn new(
        input: A,
        servo: Servo<P>,
        leds: LedMatrix<W>,
        palette: Palette,
        debounce: u8,
        oversample: u8,
    ) -> Self {
        Self {
            input,
            servo,
            leds,
            palette,
            debouncer: Debouncer::new(debounce),
            oversample,
        }
    }

    pub fn current(&self) -> Option<ClassId> {
        self.debouncer.current()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn servo(&self) -> &Servo<P> {
        &self.servo
    }

    pub fn leds(&self) -> &LedMatrix<W> {
        &self.leds
    }

    /// Take one averaged sample and act on it. Returns `None` once the
    /// input is exhausted.
    pub fn step(&mut self) -> Result<Option<Sample>, SorterError> {
        let Some(value) = read_average(&mut self.input, self.oversample)
            .map_err(|e| SorterError::Input(format!("{e:?}")))?
        else {
            return Ok(None);
        };

        let class = self.palette.classify(value);
        let observation = self.debouncer.observe(class);

        match observation {
            Observation::Confirmed(id) => self.apply(id, value)?,
            Observation::NoMatch => {
                debug!("No color detected, ADC {}; holding previous color", value)
            }
            Observation::Pending { class, count } => debug!(
                "ADC {} looks like {} ({} in a row)",
                value,
                self.palette.get(class).name,
                count
            ),
            Observation::Unchanged => {}
        }

        Ok(Some(Sample {
            value,
            class,
            observation,
        }))
    }

    /// Move the servo and repaint the matrix for a newly confirmed color.
    fn apply(&mut self, id: ClassId, value: u16) -> Result<(), SorterError> {
        let range = self.palette.get(id);

        self.servo
            .set_angle(range.angle)
            .map_err(|e| SorterError::Servo(format!("{e:?}")))?;
        info!("Color {} detected, servo at {}°", range.name, range.angle);

        self.leds.fill(range.rgb);
        self.leds
            .show()
            .map_err(|e| SorterError::Leds(format!("{e:?}")))?;

        let set_point = range.set_point();
        info!(
            "LDR={} | Color={} | SP={} | Dif={}",
            value,
            range.name,
            set_point,
            i32::from(set_point) - i32::from(value)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::pwm::ErrorType;
    use std::collections::VecDeque;

    struct Feed(VecDeque<u16>);

    impl AnalogInput for Feed {
        type Error = Infallible;

        fn read(&mut self) -> Result<Option<u16>, Self::Error> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Default)]
    struct Channel {
        duty: Vec<u16>,
    }

    impl ErrorType for Channel {
        type Error = Infallible;
    }

    impl SetDutyCycle for Channel {
        fn max_duty_cycle(&self) -> u16 {
            40_000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duty.push(duty);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Strip {
        frames: usize,
        last: Vec<RGB8>,
    }

    impl SmartLedsWrite for Strip {
        type Error = Infallible;
        type Color = RGB8;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            self.frames += 1;
            self.last = iterator.into_iter().map(Into::into).collect();
            Ok(())
        }
    }

    fn sorter(values: &[u16], oversample: u8) -> ColorSorter<Feed, Channel, Strip> {
        ColorSorter::new(
            Feed(values.iter().copied().collect()),
            Servo::new(Channel::default()).unwrap(),
            LedMatrix::new(Strip::default()).unwrap(),
            Palette::default(),
            3,
            oversample,
        )
    }

    fn run(sorter: &mut ColorSorter<Feed, Channel, Strip>) -> Vec<Sample> {
        let mut samples = Vec::new();
        while let Some(sample) = sorter.step().unwrap() {
            samples.push(sample);
        }
        samples
    }

    #[test]
    fn averages_raw_reads() {
        let mut feed = Feed([500, 510, 520, 530].into_iter().collect());
        assert_eq!(read_average(&mut feed, 4).unwrap(), Some(515));
        assert_eq!(read_average(&mut feed, 4).unwrap(), None);
    }

    #[test]
    fn three_pink_readings_confirm_rosa() {
        let mut sorter = sorter(&[515, 520, 518], 1);
        let samples = run(&mut sorter);

        let rosa = sorter.palette().find("ROSA").unwrap();
        assert!(matches!(samples[1].observation, Observation::Pending { .. }));
        assert_eq!(samples[2].observation, Observation::Confirmed(rosa));
        assert_eq!(sorter.current(), Some(rosa));
        assert_eq!(sorter.servo().angle(), 0);
        assert!(
            sorter
                .leds()
                .pixels()
                .iter()
                .all(|c| *c == RGB8::new(255, 0, 80))
        );
        // Initial blank frame plus the confirmation frame.
        assert_eq!(sorter.leds().strip().frames, 2);
        assert_eq!(sorter.leds().strip().last.len(), 64);
    }

    #[test]
    fn out_of_range_readings_hold_the_last_color() {
        let mut sorter = sorter(&[650, 655, 660, 100, 900, 2, 620, 625], 1);
        run(&mut sorter);

        let verde = sorter.palette().find("VERDE").unwrap();
        assert_eq!(sorter.current(), Some(verde));
        assert_eq!(sorter.servo().angle(), 180);
        assert!(
            sorter
                .leds()
                .pixels()
                .iter()
                .all(|c| *c == RGB8::new(0, 255, 0))
        );
    }

    #[test]
    fn transitions_between_colors_drive_actuators() {
        let mut sorter = sorter(&[575, 580, 585, 610, 615, 612], 1);
        let samples = run(&mut sorter);

        let confirmed: Vec<_> = samples
            .iter()
            .filter_map(|s| match s.observation {
                Observation::Confirmed(id) => Some(sorter.palette().get(id).name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(confirmed, vec!["ROJO", "AMARILLO"]);
        assert_eq!(sorter.servo().angle(), 120);
    }

    #[test]
    fn oversampling_smooths_noise_into_one_sample() {
        // Each group of four averages to 520, inside ROSA.
        let raw = [480, 560, 500, 540, 470, 570, 510, 530, 519, 521, 520, 520];
        let mut sorter = sorter(&raw, 4);
        let samples = run(&mut sorter);
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.value == 520));
        assert_eq!(sorter.current(), sorter.palette().find("ROSA"));
    }
}
