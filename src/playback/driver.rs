//! Decode/output loop for one playback invocation.
//!
//! A [`Pipeline`] owns the decoder (which owns the byte source) and the
//! sink. Every resource is built fresh per invocation and released when the
//! pipeline goes out of scope, whichever way `play` returns.

use std::io::Read;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use super::{AudioSink, PlaybackError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStats {
    pub format: StreamFormat,
    pub frames: u64,
}

/// Releases the wrapped sink exactly once, when dropped.
struct SinkGuard<S: AudioSink>(S);

impl<S: AudioSink> Drop for SinkGuard<S> {
    fn drop(&mut self) {
        self.0.release();
        debug!("Audio sink released");
    }
}

pub struct Pipeline<R: Read, S: AudioSink> {
    decoder: WavReader<R>,
    sink: SinkGuard<S>,
    format: StreamFormat,
    sample_format: SampleFormat,
}

impl<R: Read, S: AudioSink> Pipeline<R, S> {
    /// Attach a WAV decoder to `source` and announce its format to `sink`.
    pub fn open(source: R, sink: S) -> Result<Self, PlaybackError> {
        let mut sink = SinkGuard(sink);
        let decoder = WavReader::new(source).map_err(PlaybackError::Format)?;

        let spec = decoder.spec();
        let format = StreamFormat {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        };
        sink.0.begin(&format)?;

        Ok(Self {
            decoder,
            sink,
            format,
            sample_format: spec.sample_format,
        })
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Pull frames from the decoder into the sink until the stream ends.
    pub fn run(mut self) -> Result<PlaybackStats, PlaybackError> {
        let channels = usize::from(self.format.channels.max(1));
        let frames = match self.sample_format {
            SampleFormat::Float => {
                pump::<f32, _, _>(&mut self.decoder, &mut self.sink.0, channels, |s| s)?
            }
            SampleFormat::Int => {
                let full_scale = int_full_scale(self.format.bits_per_sample);
                pump::<i32, _, _>(&mut self.decoder, &mut self.sink.0, channels, |s| {
                    s as f32 / full_scale
                })?
            }
        };
        self.sink.0.finish()?;

        Ok(PlaybackStats {
            format: self.format,
            frames,
        })
    }
}

/// Decode `source` into `sink` to completion.
pub fn play<R: Read, S: AudioSink>(source: R, sink: S) -> Result<PlaybackStats, PlaybackError> {
    Pipeline::open(source, sink)?.run()
}

fn int_full_scale(bits_per_sample: u16) -> f32 {
    let bits = bits_per_sample.clamp(1, 32);
    2f32.powi(i32::from(bits) - 1)
}

fn pump<T, R, S>(
    decoder: &mut WavReader<R>,
    sink: &mut S,
    channels: usize,
    to_unit: impl Fn(T) -> f32,
) -> Result<u64, PlaybackError>
where
    T: hound::Sample,
    R: Read,
    S: AudioSink,
{
    let mut frame = Vec::with_capacity(channels);
    let mut frames = 0u64;

    for sample in decoder.samples::<T>() {
        let sample = sample.map_err(|source| PlaybackError::Decode { frames, source })?;
        frame.push(to_unit(sample));
        if frame.len() == channels {
            sink.write_frame(&frame)?;
            frame.clear();
            frames += 1;
        }
    }
    if !frame.is_empty() {
        return Err(PlaybackError::Decode {
            frames,
            source: hound::Error::FormatError("stream ended inside a frame"),
        });
    }
    Ok(frames)
}
