//! Frame acquisition.
//!
//! A [`FrameSource`] wraps a capture device. The producer calls
//! [`start`](FrameSource::start) once, then [`capture`](FrameSource::capture)
//! in a loop, and always calls [`stop`](FrameSource::stop) on the way out,
//! whether it exits on request or on a fault.
//!
//! ## Failure modes
//!
//! | Error | Meaning | Producer reaction |
//! |-------|---------|-------------------|
//! | [`CaptureError::NotReady`] | no coherent frame this round | skip, retry immediately |
//! | [`CaptureError::Fault`] | device gone / not started | stop producing |

pub mod synthetic;

pub use synthetic::SyntheticSource;

pub use crate::error::CaptureError;
use crate::frame::RawFrame;

/// A capture device producing raw frames on demand.
///
/// `capture` may block; the producer runs on its own thread and only ever
/// waits inside this call.
pub trait FrameSource: Send {
    /// Acquire the device. Called once before the first capture.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Block until the next frame is available.
    fn capture(&mut self) -> Result<RawFrame, CaptureError>;

    /// Release the device. Must be safe to call after a fault.
    fn stop(&mut self);

    /// Short human-readable name for logs.
    fn name(&self) -> &str {
        "source"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn start(&mut self) -> Result<(), CaptureError> {
        (**self).start()
    }

    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        (**self).capture()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
