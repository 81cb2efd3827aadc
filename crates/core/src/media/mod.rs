//! Frame encoding.
//!
//! This module provides the [`Encoder`] trait and the codecs that turn a
//! [`RawFrame`] into the bytes served to clients.
//!
//! ## Supported encoders
//!
//! | Encoder | Module | Input formats |
//! |---------|--------|---------------|
//! | JPEG | [`jpeg`] | Z16 (via [`colormap`]), BGR8, RGB8, Gray8 |
//!
//! Depth frames are not viewable as-is. They are scaled to 8 bits and run
//! through a colormap first (see [`colormap::depth_to_rgb`]).

pub mod colormap;
pub mod jpeg;

use bytes::Bytes;

pub use crate::error::EncodeError;
use crate::frame::RawFrame;
pub use jpeg::JpegEncoder;

/// Turns a raw frame into a transport-ready payload.
///
/// Errors are per-frame: the producer logs them, drops the frame and
/// carries on with the next capture.
///
/// ## Implementing a new codec
///
/// 1. Create a new module (e.g. `media/png.rs`)
/// 2. Implement `Encoder` for your type
/// 3. Hand it to [`crate::ProducerLoop::new`]
pub trait Encoder: Send {
    fn encode(&mut self, frame: &RawFrame) -> Result<Bytes, EncodeError>;

    /// Codec name for logs (e.g. `"jpeg"`).
    fn codec_name(&self) -> &'static str;
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode(&mut self, frame: &RawFrame) -> Result<Bytes, EncodeError> {
        (**self).encode(frame)
    }

    fn codec_name(&self) -> &'static str {
        (**self).codec_name()
    }
}
