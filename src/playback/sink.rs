use std::io::{self, Write};

use tracing::debug;

use super::StreamFormat;

/// Output end of a playback pipeline.
pub trait AudioSink {
    /// Called once, before the first frame.
    fn begin(&mut self, format: &StreamFormat) -> io::Result<()>;

    /// One frame: one sample per channel, each in `-1.0..=1.0`.
    fn write_frame(&mut self, frame: &[f32]) -> io::Result<()>;

    /// Push everything written so far to the device. Called once after the
    /// last frame of a stream that ended normally.
    fn finish(&mut self) -> io::Result<()>;

    /// Give up the output. Called exactly once per pipeline, on every path.
    fn release(&mut self);
}

const FLUSH_THRESHOLD: usize = 512;
const DAC_MIDPOINT: f32 = 128.0;
const DAC_SWING: f32 = 127.0;

/// Mono 8-bit DAC output.
///
/// Each frame is mixed down to mono, scaled by the gain and written as an
/// unsigned code where 128 is silence. The hardware duplicates the mono
/// signal to both DAC pins.
pub struct DacSink<W: Write> {
    out: Option<W>,
    gain: f32,
    buffer: Vec<u8>,
    written: u64,
}

impl<W: Write> DacSink<W> {
    pub fn new(out: W, gain: f32) -> Self {
        Self {
            out: Some(out),
            gain,
            buffer: Vec::with_capacity(FLUSH_THRESHOLD),
            written: 0,
        }
    }

    /// Number of DAC codes produced so far.
    pub fn codes_written(&self) -> u64 {
        self.written
    }

    pub fn is_released(&self) -> bool {
        self.out.is_none()
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Err(released());
        };
        out.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

fn released() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "DAC output already released")
}

/// Convert a mono sample to a DAC code.
pub fn dac_code(sample: f32, gain: f32) -> u8 {
    let scaled = (sample * gain).clamp(-1.0, 1.0);
    (DAC_MIDPOINT + scaled * DAC_SWING).round() as u8
}

impl<W: Write> AudioSink for DacSink<W> {
    fn begin(&mut self, format: &StreamFormat) -> io::Result<()> {
        debug!(
            "DAC output: {} Hz, {} channel(s) mixed to mono, gain {:.2}",
            format.sample_rate, format.channels, self.gain
        );
        Ok(())
    }

    fn write_frame(&mut self, frame: &[f32]) -> io::Result<()> {
        if self.out.is_none() {
            return Err(released());
        }
        if frame.is_empty() {
            return Ok(());
        }
        let mono = frame.iter().sum::<f32>() / frame.len() as f32;
        self.buffer.push(dac_code(mono, self.gain));
        self.written += 1;
        if self.buffer.len() >= FLUSH_THRESHOLD {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.flush_buffer()?;
        }
        match self.out.as_mut() {
            Some(out) => out.flush(),
            None => Err(released()),
        }
    }

    fn release(&mut self) {
        if self.out.is_none() {
            return;
        }
        if !self.buffer.is_empty() {
            if let Err(e) = self.flush_buffer() {
                debug!("Dropping {} buffered DAC codes: {}", self.buffer.len(), e);
            }
        }
        if let Some(mut out) = self.out.take() {
            let _ = out.flush();
        }
        self.buffer.clear();
    }
}

impl<W: Write> Drop for DacSink<W> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn codes_center_on_128() {
        assert_eq!(dac_code(0.0, 1.0), 128);
        assert_eq!(dac_code(1.0, 1.0), 255);
        assert_eq!(dac_code(-1.0, 1.0), 1);
        assert_eq!(dac_code(0.5, 0.5), 160);
        // Clipped rather than wrapped.
        assert_eq!(dac_code(1.0, 3.0), 255);
        assert_eq!(dac_code(-1.0, 3.0), 1);
    }

    #[test]
    fn frames_are_mixed_to_mono() {
        let shared = Shared::default();
        let mut sink = DacSink::new(shared.clone(), 1.0);
        sink.write_frame(&[1.0, -1.0]).unwrap();
        sink.write_frame(&[1.0, 1.0]).unwrap();
        sink.release();
        assert_eq!(*shared.0.lock().unwrap(), vec![128, 255]);
        assert_eq!(sink.codes_written(), 2);
    }

    #[test]
    fn output_is_buffered_until_release() {
        let shared = Shared::default();
        let mut sink = DacSink::new(shared.clone(), 1.0);
        for _ in 0..10 {
            sink.write_frame(&[0.0]).unwrap();
        }
        assert!(shared.0.lock().unwrap().is_empty());

        sink.release();
        assert_eq!(shared.0.lock().unwrap().len(), 10);
        assert!(sink.is_released());
    }

    #[test]
    fn release_is_idempotent_and_blocks_further_output() {
        let shared = Shared::default();
        let mut sink = DacSink::new(shared.clone(), 1.0);
        sink.write_frame(&[0.25]).unwrap();
        sink.release();
        sink.release();
        assert_eq!(shared.0.lock().unwrap().len(), 1);

        let err = sink.write_frame(&[0.0]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(shared.0.lock().unwrap().len(), 1);
        assert_eq!(sink.codes_written(), 1);
    }

    struct Unplugged;

    impl Write for Unplugged {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("DAC unplugged"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("DAC unplugged"))
        }
    }

    #[test]
    fn finish_writes_the_buffered_tail() {
        let shared = Shared::default();
        let mut sink = DacSink::new(shared.clone(), 1.0);
        for _ in 0..3 {
            sink.write_frame(&[0.0]).unwrap();
        }
        sink.finish().unwrap();
        assert_eq!(*shared.0.lock().unwrap(), vec![128, 128, 128]);
        assert!(!sink.is_released());
    }

    #[test]
    fn finish_reports_a_failed_write() {
        let mut sink = DacSink::new(Unplugged, 1.0);
        sink.write_frame(&[0.5]).unwrap();
        assert!(sink.finish().is_err());
        sink.release();
        assert!(sink.finish().is_err());
    }

    #[test]
    fn drop_flushes_pending_codes() {
        let shared = Shared::default();
        {
            let mut sink = DacSink::new(shared.clone(), 1.0);
            sink.write_frame(&[0.0]).unwrap();
        }
        assert_eq!(*shared.0.lock().unwrap(), vec![128]);
    }
}
