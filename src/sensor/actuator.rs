use embedded_hal::pwm::SetDutyCycle;
use smart_leds::{RGB8, SmartLedsWrite};

/// Servo frame length in timer ticks (20 ms at 0.5 µs per tick).
pub const SERVO_PERIOD_TICKS: u32 = 40_000;
/// Pulse width at 0° (0.5 ms).
pub const SERVO_MIN_PULSE_TICKS: u32 = 1_000;
/// Pulse width at 180° (2.5 ms).
pub const SERVO_MAX_PULSE_TICKS: u32 = 5_000;
pub const SERVO_MAX_ANGLE: u8 = 180;

pub const MATRIX_WIDTH: usize = 8;
pub const MATRIX_HEIGHT: usize = 8;
pub const MATRIX_LEDS: usize = MATRIX_WIDTH * MATRIX_HEIGHT;

/// Pulse width for `angle`, clamped to 180°.
pub fn pulse_ticks(angle: u8) -> u32 {
    let angle = u32::from(angle.min(SERVO_MAX_ANGLE));
    SERVO_MIN_PULSE_TICKS
        + (SERVO_MAX_PULSE_TICKS - SERVO_MIN_PULSE_TICKS) * angle / u32::from(SERVO_MAX_ANGLE)
}

/// Hobby servo on a 50 Hz PWM channel.
pub struct Servo<P> {
    channel: P,
    angle: u8,
}

impl<P: SetDutyCycle> Servo<P> {
    /// Take the channel and park the horn at 0°.
    pub fn new(channel: P) -> Result<Self, P::Error> {
        let mut servo = Self { channel, angle: 0 };
        servo.set_angle(0)?;
        Ok(servo)
    }

    pub fn angle(&self) -> u8 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: u8) -> Result<(), P::Error> {
        let angle = angle.min(SERVO_MAX_ANGLE);
        let max = u32::from(self.channel.max_duty_cycle());
        let duty = pulse_ticks(angle) * max / SERVO_PERIOD_TICKS;
        self.channel.set_duty_cycle(duty as u16)?;
        self.angle = angle;
        Ok(())
    }
}

/// 8x8 LED matrix behind a WS2812-style strip driver.
pub struct LedMatrix<W> {
    strip: W,
    pixels: [RGB8; MATRIX_LEDS],
}

impl<W> LedMatrix<W>
where
    W: SmartLedsWrite,
    W::Color: From<RGB8>,
{
    /// Take the strip and blank every LED.
    pub fn new(strip: W) -> Result<Self, W::Error> {
        let mut matrix = Self {
            strip,
            pixels: [RGB8::default(); MATRIX_LEDS],
        };
        matrix.show()?;
        Ok(matrix)
    }

    pub fn pixels(&self) -> &[RGB8; MATRIX_LEDS] {
        &self.pixels
    }

    pub fn set(&mut self, index: usize, color: RGB8) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    pub fn fill(&mut self, color: RGB8) {
        self.pixels = [color; MATRIX_LEDS];
    }

    /// Push the current frame to the strip.
    pub fn show(&mut self) -> Result<(), W::Error> {
        self.strip.write(self.pixels.iter().copied())
    }

    pub fn strip(&self) -> &W {
        &self.strip
    }
}
