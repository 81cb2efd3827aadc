//! Deterministic test-pattern camera.
//!
//! Produces a depth (Z16) + color (BGR8) pair per capture and hands back
//! the configured stream. The pattern scrolls one step per frame so
//! consecutive frames differ. Capture is paced to the configured frame rate,
//! the way a real device blocks until its next exposure.
//!
//! `drop_every = n` makes every n-th capture come back as
//! [`CaptureError::NotReady`], the same gap a real device reports when one
//! half of a depth/color pair is missing.

use std::thread;
use std::time::{Duration, Instant};

use super::{CaptureError, FrameSource};
use crate::config::CaptureConfig;
use crate::frame::{FramePair, PixelFormat, RawFrame, StreamKind};

/// Depth range covered by one sweep of the pattern, in sensor units (mm).
const DEPTH_SPAN: u32 = 4000;

pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_interval: Option<Duration>,
    stream: StreamKind,
    drop_every: u64,
    started: bool,
    captures: u64,
    next_due: Option<Instant>,
}

impl SyntheticSource {
    /// `fps == 0` disables pacing (captures return as fast as they are generated).
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: (fps > 0).then(|| Duration::from_secs(1) / fps),
            stream: StreamKind::Depth,
            drop_every: 0,
            started: false,
            captures: 0,
            next_due: None,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.width, config.height, config.fps)
            .with_stream(config.stream)
            .with_drop_every(config.drop_every)
    }

    pub fn with_stream(mut self, stream: StreamKind) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_drop_every(mut self, n: u64) -> Self {
        self.drop_every = n;
        self
    }

    /// Build the pair for frame number `t`.
    fn generate(&self, t: u64) -> Result<FramePair, CaptureError> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = t as usize;

        let mut depth = Vec::with_capacity(w * h * 2);
        let mut color = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let d = ((x + y + shift * 8) as u32 % DEPTH_SPAN) as u16;
                depth.extend_from_slice(&d.to_le_bytes());

                let b = ((x + shift) % 256) as u8;
                let g = ((y + shift) % 256) as u8;
                let r = ((x ^ y) % 256) as u8;
                color.extend_from_slice(&[b, g, r]);
            }
        }

        let fault = |e: crate::FramecastError| CaptureError::Fault(e.to_string());
        Ok(FramePair {
            depth: RawFrame::new(self.width, self.height, PixelFormat::Z16, depth)
                .map_err(fault)?,
            color: RawFrame::new(self.width, self.height, PixelFormat::Bgr8, color)
                .map_err(fault)?,
        })
    }

    fn pace(&mut self) {
        let Some(interval) = self.frame_interval else {
            return;
        };
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            thread::sleep(due - now);
        }
        // Fall behind rather than burst to catch up.
        self.next_due = Some(due.max(now) + interval);
    }
}

impl FrameSource for SyntheticSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::Fault(format!(
                "unsupported resolution {}x{}",
                self.width, self.height
            )));
        }
        self.started = true;
        self.next_due = None;
        tracing::info!(
            width = self.width,
            height = self.height,
            stream = ?self.stream,
            "synthetic source started"
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        if !self.started {
            return Err(CaptureError::Fault("stream not started".into()));
        }

        self.pace();
        let t = self.captures;
        self.captures += 1;

        if self.drop_every > 0 && self.captures % self.drop_every == 0 {
            return Err(CaptureError::NotReady);
        }

        Ok(self.generate(t)?.into_stream(self.stream))
    }

    fn stop(&mut self) {
        if self.started {
            self.started = false;
            tracing::info!(captures = self.captures, "synthetic source stopped");
        }
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_before_start_is_fault() {
        let mut src = SyntheticSource::new(4, 4, 0);
        assert!(matches!(src.capture(), Err(CaptureError::Fault(_))));
    }

    #[test]
    fn zero_resolution_fails_to_start() {
        let mut src = SyntheticSource::new(0, 4, 0);
        assert!(matches!(src.start(), Err(CaptureError::Fault(_))));
    }

    #[test]
    fn depth_stream_is_z16() {
        let mut src = SyntheticSource::new(8, 6, 0);
        src.start().unwrap();
        let frame = src.capture().unwrap();
        assert_eq!(frame.format(), PixelFormat::Z16);
        assert_eq!(frame.data().len(), 8 * 6 * 2);
    }

    #[test]
    fn color_stream_is_bgr8() {
        let mut src = SyntheticSource::new(8, 6, 0).with_stream(StreamKind::Color);
        src.start().unwrap();
        let frame = src.capture().unwrap();
        assert_eq!(frame.format(), PixelFormat::Bgr8);
        assert_eq!(frame.data().len(), 8 * 6 * 3);
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut src = SyntheticSource::new(8, 8, 0);
        src.start().unwrap();
        let a = src.capture().unwrap();
        let b = src.capture().unwrap();
        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn drop_every_reports_not_ready() {
        let mut src = SyntheticSource::new(2, 2, 0).with_drop_every(3);
        src.start().unwrap();
        let results: Vec<bool> = (0..6).map(|_| src.capture().is_ok()).collect();
        assert_eq!(results, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn stop_then_capture_is_fault() {
        let mut src = SyntheticSource::new(2, 2, 0);
        src.start().unwrap();
        src.stop();
        assert!(matches!(src.capture(), Err(CaptureError::Fault(_))));
    }

    #[test]
    fn paced_capture_respects_fps() {
        let mut src = SyntheticSource::new(2, 2, 50);
        src.start().unwrap();
        let start = Instant::now();
        for _ in 0..4 {
            src.capture().unwrap();
        }
        // First capture is immediate, the next three wait 20ms each.
        assert!(start.elapsed() >= Duration::from_millis(55));
    }
}
