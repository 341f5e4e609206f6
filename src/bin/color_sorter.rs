use std::io;

use nao_client::config::SorterConfig;
use nao_client::sensor::ColorSorter;
use nao_client::sensor::actuator::{LedMatrix, Servo};
use nao_client::sensor::host::{LineAdc, LoggedPwm, LoggedStrip};

use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match SorterConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Color sorter palette:");
    for range in config.palette.iter() {
        info!(
            "  {} [{}..={}] -> {}°, rgb({}, {}, {})",
            range.name, range.low, range.high, range.angle, range.rgb.r, range.rgb.g, range.rgb.b
        );
    }

    // The host stand-ins are infallible.
    let Ok(servo) = Servo::new(LoggedPwm::default());
    let Ok(leds) = LedMatrix::new(LoggedStrip::default());

    let mut sorter = ColorSorter::new(
        LineAdc::new(io::stdin().lock()),
        servo,
        leds,
        config.palette.clone(),
        config.debounce,
        config.oversample,
    );

    info!("System started, waiting for colors (one ADC reading per line on stdin)");

    loop {
        match sorter.step() {
            Ok(Some(_)) => std::thread::sleep(config.loop_delay),
            Ok(None) => break,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    info!("Input closed, color sorter stopped");
}
