use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use smart_leds::RGB8;

use crate::sensor::palette::{ColorRange, Palette};

const DEFAULT_BASE_URL: &str = "http://choreal-kalel-directed.ngrok-free.dev/esp32";

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: ClientMode,
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub playback: PlaybackConfig,
}

/// Which handler set the client runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// Streams and plays audio, confirms each resource back to the server.
    Streaming,
    /// Logs what it would do; no audio is fetched.
    Simulated,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Timeout for register/confirm requests, and connect timeout for streams.
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub gain: f32,
    /// Where DAC codes are written. `None` discards them.
    pub output: Option<PathBuf>,
    pub stream_open_attempts: u32,
    pub stream_retry_delay: Duration,
    /// Longest wait for the next chunk of an open audio stream.
    pub stream_idle_timeout: Duration,
}

/// Settings for the standalone color sorter.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub oversample: u8,
    pub debounce: u8,
    pub loop_delay: Duration,
    pub palette: Palette,
}

// Serde struct for palette files: a JSON array of ranges
#[derive(Deserialize)]
struct RawRange {
    name: String,
    low: u16,
    high: u16,
    angle: u8,
    rgb: [u8; 3],
}

impl ClientMode {
    fn parse(raw: &str) -> Result<Self, String> {
        match raw.to_ascii_lowercase().as_str() {
            "streaming" | "audio" => Ok(Self::Streaming),
            "simulated" | "stub" => Ok(Self::Simulated),
            other => Err(format!(
                "NAO_CLIENT_MODE must be 'streaming' or 'simulated', got '{other}'"
            )),
        }
    }

    fn default_poll_interval_ms(self) -> u64 {
        match self {
            Self::Streaming => 200,
            Self::Simulated => 2000,
        }
    }

    fn default_max_body_bytes(self) -> usize {
        match self {
            Self::Streaming => 2048,
            Self::Simulated => 4096,
        }
    }
}

fn var_optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.is_empty())
}

fn var_or_default<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mode = match var_optional(&lookup, "NAO_CLIENT_MODE") {
            Some(raw) => ClientMode::parse(&raw)?,
            None => ClientMode::Streaming,
        };

        let config = Self {
            mode,
            server: ServerConfig {
                base_url: var_or_default(&lookup, "NAO_BASE_URL", DEFAULT_BASE_URL.to_string()),
                poll_interval: Duration::from_millis(var_or_default(
                    &lookup,
                    "NAO_POLL_INTERVAL_MS",
                    mode.default_poll_interval_ms(),
                )),
                poll_timeout: Duration::from_millis(var_or_default(
                    &lookup,
                    "NAO_POLL_TIMEOUT_MS",
                    5000,
                )),
                request_timeout: Duration::from_millis(var_or_default(
                    &lookup,
                    "NAO_REQUEST_TIMEOUT_MS",
                    8000,
                )),
                max_body_bytes: var_or_default(
                    &lookup,
                    "NAO_MAX_BODY_BYTES",
                    mode.default_max_body_bytes(),
                ),
            },
            device: DeviceConfig {
                id: var_or_default(&lookup, "NAO_DEVICE_ID", "esp32_1".to_string()),
                name: var_or_default(&lookup, "NAO_DEVICE_NAME", "ESP32-Test".to_string()),
                location: var_or_default(&lookup, "NAO_DEVICE_LOCATION", "Lab".to_string()),
            },
            playback: PlaybackConfig {
                gain: var_or_default(&lookup, "NAO_AUDIO_GAIN", 0.6),
                output: var_optional(&lookup, "NAO_AUDIO_OUTPUT").map(PathBuf::from),
                stream_open_attempts: var_or_default(&lookup, "NAO_STREAM_OPEN_ATTEMPTS", 3),
                stream_retry_delay: Duration::from_millis(var_or_default(
                    &lookup,
                    "NAO_STREAM_RETRY_DELAY_MS",
                    200,
                )),
                stream_idle_timeout: Duration::from_millis(var_or_default(
                    &lookup,
                    "NAO_STREAM_IDLE_TIMEOUT_MS",
                    8000,
                )),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if !self.server.base_url.starts_with("http://")
            && !self.server.base_url.starts_with("https://")
        {
            return Err(format!(
                "NAO_BASE_URL must be an http(s) URL, got '{}'",
                self.server.base_url
            ));
        }
        if self.device.id.is_empty() {
            return Err("NAO_DEVICE_ID must not be empty".into());
        }
        if self.server.poll_interval.is_zero() {
            return Err("NAO_POLL_INTERVAL_MS must be > 0".into());
        }
        if self.server.max_body_bytes == 0 {
            return Err("NAO_MAX_BODY_BYTES must be > 0".into());
        }
        if self.playback.stream_idle_timeout.is_zero() {
            return Err("NAO_STREAM_IDLE_TIMEOUT_MS must be > 0".into());
        }
        if !(0.0..=4.0).contains(&self.playback.gain) {
            return Err(format!(
                "NAO_AUDIO_GAIN must be within 0.0..=4.0, got {}",
                self.playback.gain
            ));
        }
        Ok(())
    }
}

impl SorterConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let palette = match var_optional(&lookup, "SORTER_PALETTE_FILE") {
            Some(path) => load_palette(&path)?,
            None => Palette::default(),
        };

        let config = Self {
            oversample: var_or_default(&lookup, "SORTER_OVERSAMPLE", 32),
            debounce: var_or_default(&lookup, "SORTER_DEBOUNCE", 3),
            loop_delay: Duration::from_millis(var_or_default(&lookup, "SORTER_LOOP_DELAY_MS", 10)),
            palette,
        };
        if config.oversample == 0 {
            return Err("SORTER_OVERSAMPLE must be > 0".into());
        }
        if config.debounce == 0 {
            return Err("SORTER_DEBOUNCE must be > 0".into());
        }
        Ok(config)
    }
}

fn load_palette(path: &str) -> Result<Palette, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {path}: {e}"))?;
    parse_palette(&content).map_err(|e| format!("Invalid palette in {path}: {e}"))
}

fn parse_palette(content: &str) -> Result<Palette, String> {
    let raw_ranges: Vec<RawRange> = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let ranges = raw_ranges
        .into_iter()
        .map(|raw| ColorRange {
            name: raw.name,
            low: raw.low,
            high: raw.high,
            angle: raw.angle,
            rgb: RGB8::new(raw.rgb[0], raw.rgb[1], raw.rgb[2]),
        })
        .collect();

    Palette::new(ranges).map_err(|e| e.to_string())
}
