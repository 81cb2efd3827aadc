//! The capture → encode → publish loop.
//!
//! One producer runs per process on its own thread. It never looks at
//! client activity: it captures as fast as the source delivers and
//! overwrites the [`FrameBuffer`] each time.
//!
//! ```text
//! capture ──NotReady──> skip, retry
//!    │ ──Fault──────> exit (buffer keeps the last frame)
//!    ▼
//! encode ──error────> skip, retry
//!    ▼
//! publish
//! ```
//!
//! The source is started before the first capture and stopped on every
//! way out of the loop, including start failure and panics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crate::buffer::{EncodedPayload, FrameBuffer};
use crate::error::CaptureError;
use crate::media::Encoder;
use crate::source::FrameSource;

/// Published frames between progress log lines.
pub const DEFAULT_LOG_EVERY: u64 = 300;

/// Why the loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerExit {
    /// [`Producer::stop`] was called.
    Stopped,
    /// The source reported a fatal error mid-stream.
    SourceFault(String),
    /// The source could not be started.
    StartFailed(String),
}

/// Running counters, readable from any thread.
#[derive(Debug, Default)]
pub struct ProducerStats {
    published: AtomicU64,
    not_ready: AtomicU64,
    encode_failures: AtomicU64,
}

/// Point-in-time copy of [`ProducerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub published: u64,
    pub not_ready: u64,
    pub encode_failures: u64,
}

impl ProducerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            not_ready: self.not_ready.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
        }
    }
}

/// Calls [`FrameSource::stop`] when dropped.
struct SourceGuard<'a, S: FrameSource> {
    source: &'a mut S,
}

impl<S: FrameSource> Drop for SourceGuard<'_, S> {
    fn drop(&mut self) {
        self.source.stop();
        tracing::debug!(source = self.source.name(), "source released");
    }
}

/// A configured but not yet running producer.
///
/// [`run`](Self::run) drives the loop on the calling thread;
/// [`spawn`](Self::spawn) moves it onto a dedicated thread.
pub struct ProducerLoop<S, E> {
    source: S,
    encoder: E,
    buffer: Arc<FrameBuffer>,
    running: Arc<AtomicBool>,
    stats: Arc<ProducerStats>,
    log_every: u64,
}

impl<S: FrameSource, E: Encoder> ProducerLoop<S, E> {
    pub fn new(source: S, encoder: E, buffer: Arc<FrameBuffer>) -> Self {
        Self {
            source,
            encoder,
            buffer,
            running: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(ProducerStats::default()),
            log_every: DEFAULT_LOG_EVERY,
        }
    }

    /// Log a progress line every `n` published frames. 0 disables.
    pub fn with_log_every(mut self, n: u64) -> Self {
        self.log_every = n;
        self
    }

    pub fn stats(&self) -> Arc<ProducerStats> {
        self.stats.clone()
    }

    /// Flag that keeps the loop going; storing `false` stops it after the
    /// current capture returns.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run until stopped or the source faults.
    pub fn run(&mut self) -> ProducerExit {
        let Self {
            source,
            encoder,
            buffer,
            running,
            stats,
            log_every,
        } = self;

        let source_name = source.name().to_string();
        let guard = SourceGuard { source };

        if let Err(e) = guard.source.start() {
            tracing::error!(source = %source_name, error = %e, "source failed to start");
            running.store(false, Ordering::SeqCst);
            return ProducerExit::StartFailed(e.to_string());
        }

        tracing::info!(
            source = %source_name,
            codec = encoder.codec_name(),
            "producer started"
        );

        let exit = loop {
            if !running.load(Ordering::SeqCst) {
                break ProducerExit::Stopped;
            }

            let frame = match guard.source.capture() {
                Ok(frame) => frame,
                Err(CaptureError::NotReady) => {
                    stats.not_ready.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("frame not ready, skipping");
                    continue;
                }
                Err(CaptureError::Fault(reason)) => {
                    tracing::error!(
                        source = %source_name,
                        %reason,
                        "source fault, producer stopping; clients will see the last frame"
                    );
                    break ProducerExit::SourceFault(reason);
                }
            };

            let data = match encoder.encode(&frame) {
                Ok(data) => data,
                Err(e) => {
                    stats.encode_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "encode failed, frame dropped");
                    continue;
                }
            };

            let seq = stats.published.fetch_add(1, Ordering::Relaxed) + 1;
            let bytes = data.len();
            buffer.publish(EncodedPayload::new(seq, data));
            tracing::trace!(seq, bytes, "frame published");

            if *log_every > 0 && seq % *log_every == 0 {
                let s = stats.snapshot();
                tracing::info!(
                    published = s.published,
                    not_ready = s.not_ready,
                    encode_failures = s.encode_failures,
                    last_bytes = bytes,
                    "producer progress"
                );
            }
        };

        running.store(false, Ordering::SeqCst);
        drop(guard);

        let s = stats.snapshot();
        tracing::info!(
            exit = ?exit,
            published = s.published,
            not_ready = s.not_ready,
            encode_failures = s.encode_failures,
            "producer exited"
        );
        exit
    }
}

impl<S, E> ProducerLoop<S, E>
where
    S: FrameSource + 'static,
    E: Encoder + 'static,
{
    /// Start the loop on a thread named `frame-producer`.
    pub fn spawn(mut self) -> std::io::Result<Producer> {
        let running = self.running.clone();
        let stats = self.stats.clone();

        let handle = thread::Builder::new()
            .name("frame-producer".to_string())
            .spawn(move || self.run())?;

        Ok(Producer {
            running,
            stats,
            handle: Some(handle),
        })
    }
}

/// Handle to a producer running on its own thread.
///
/// Dropping the handle stops the producer and waits for it to release
/// its source.
pub struct Producer {
    running: Arc<AtomicBool>,
    stats: Arc<ProducerStats>,
    handle: Option<JoinHandle<ProducerExit>>,
}

impl Producer {
    /// Ask the loop to exit after the capture in progress.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// `false` once the loop has exited for any reason, or a stop was requested.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait for the loop to finish. `None` if the producer thread panicked.
    pub fn join(mut self) -> Option<ProducerExit> {
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("producer thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodeError;
    use crate::frame::{PixelFormat, RawFrame};
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Replays a fixed script of capture results, then faults.
    struct ScriptedSource {
        script: VecDeque<Result<u8, CaptureError>>,
        started: bool,
        stops: Arc<AtomicUsize>,
        fail_start: bool,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<u8, CaptureError>>) -> (Self, Arc<AtomicUsize>) {
            let stops = Arc::new(AtomicUsize::new(0));
            let src = Self {
                script: script.into(),
                started: false,
                stops: stops.clone(),
                fail_start: false,
            };
            (src, stops)
        }
    }

    impl FrameSource for ScriptedSource {
        fn start(&mut self) -> Result<(), CaptureError> {
            if self.fail_start {
                return Err(CaptureError::Fault("no device".into()));
            }
            self.started = true;
            Ok(())
        }

        fn capture(&mut self) -> Result<RawFrame, CaptureError> {
            assert!(self.started);
            match self.script.pop_front() {
                Some(Ok(fill)) => {
                    Ok(RawFrame::new(1, 1, PixelFormat::Gray8, vec![fill]).unwrap())
                }
                Some(Err(e)) => Err(e),
                None => Err(CaptureError::Fault("script exhausted".into())),
            }
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Echoes the single pixel; fails on pixel value 0xEE.
    struct EchoEncoder;

    impl Encoder for EchoEncoder {
        fn encode(&mut self, frame: &RawFrame) -> Result<Bytes, EncodeError> {
            if frame.data() == [0xEE] {
                return Err(EncodeError::codec("bad frame"));
            }
            Ok(Bytes::copy_from_slice(frame.data()))
        }

        fn codec_name(&self) -> &'static str {
            "echo"
        }
    }

    #[test]
    fn survives_consecutive_not_ready() {
        let mut script = vec![Err(CaptureError::NotReady); 50];
        script.push(Ok(7));
        let (src, stops) = ScriptedSource::new(script);
        let buffer = Arc::new(FrameBuffer::new());

        let mut producer = ProducerLoop::new(src, EchoEncoder, buffer.clone());
        let exit = producer.run();

        assert_eq!(exit, ProducerExit::SourceFault("script exhausted".into()));
        assert_eq!(&buffer.fetch().unwrap().data()[..], &[7]);
        let s = producer.stats().snapshot();
        assert_eq!(s.not_ready, 50);
        assert_eq!(s.published, 1);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn encode_failure_skips_frame() {
        let (src, _) = ScriptedSource::new(vec![Ok(1), Ok(0xEE), Ok(3)]);
        let buffer = Arc::new(FrameBuffer::new());

        let mut producer = ProducerLoop::new(src, EchoEncoder, buffer.clone());
        producer.run();

        let s = producer.stats().snapshot();
        assert_eq!(s.published, 2);
        assert_eq!(s.encode_failures, 1);
        let last = buffer.fetch().unwrap();
        assert_eq!(&last.data()[..], &[3]);
        assert_eq!(last.seq(), 2);
    }

    #[test]
    fn fault_keeps_last_frame() {
        let (src, _) = ScriptedSource::new(vec![
            Ok(9),
            Err(CaptureError::Fault("unplugged".into())),
            Ok(10),
        ]);
        let buffer = Arc::new(FrameBuffer::new());

        let exit = ProducerLoop::new(src, EchoEncoder, buffer.clone()).run();

        assert_eq!(exit, ProducerExit::SourceFault("unplugged".into()));
        assert_eq!(&buffer.fetch().unwrap().data()[..], &[9]);
        assert_eq!(&buffer.fetch().unwrap().data()[..], &[9]);
    }

    #[test]
    fn start_failure_still_releases_source() {
        let (mut src, stops) = ScriptedSource::new(vec![Ok(1)]);
        src.fail_start = true;
        let buffer = Arc::new(FrameBuffer::new());

        let exit = ProducerLoop::new(src, EchoEncoder, buffer.clone()).run();

        assert!(matches!(exit, ProducerExit::StartFailed(_)));
        assert!(buffer.fetch().is_none());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn spawned_producer_stops_on_request() {
        let (src, stops) = ScriptedSource::new(Vec::new());
        let src = ForeverSource(src);
        let buffer = Arc::new(FrameBuffer::new());

        let producer = ProducerLoop::new(src, EchoEncoder, buffer.clone())
            .spawn()
            .unwrap();
        assert!(buffer.wait_for_frame(Duration::from_secs(2)).is_some());
        assert!(producer.is_running());

        producer.stop();
        assert_eq!(producer.join(), Some(ProducerExit::Stopped));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    /// Never faults; emits a frame every millisecond.
    struct ForeverSource(ScriptedSource);

    impl FrameSource for ForeverSource {
        fn start(&mut self) -> Result<(), CaptureError> {
            self.0.start()
        }

        fn capture(&mut self) -> Result<RawFrame, CaptureError> {
            std::thread::sleep(Duration::from_millis(1));
            Ok(RawFrame::new(1, 1, PixelFormat::Gray8, vec![1]).unwrap())
        }

        fn stop(&mut self) {
            self.0.stop()
        }
    }
}
