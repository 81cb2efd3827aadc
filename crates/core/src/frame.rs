//! Raw sensor frames as handed from a [`FrameSource`](crate::source::FrameSource)
//! to an [`Encoder`](crate::media::Encoder).
//!
//! A raw frame never leaves the producer thread: it is captured, encoded
//! and dropped. Only the encoded bytes are shared with client sessions.

use serde::{Deserialize, Serialize};

use crate::error::{FramecastError, Result};

/// Pixel layout of a [`RawFrame`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 16-bit little-endian depth values.
    Z16,
    /// 8-bit blue, green, red.
    Bgr8,
    /// 8-bit red, green, blue.
    Rgb8,
    /// 8-bit luma.
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Z16 => 2,
            Self::Bgr8 | Self::Rgb8 => 3,
            Self::Gray8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Z16 => "z16",
            Self::Bgr8 => "bgr8",
            Self::Rgb8 => "rgb8",
            Self::Gray8 => "gray8",
        }
    }
}

/// Uncompressed sensor output for one capture instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl RawFrame {
    /// Wrap a pixel buffer, checking that its length matches the geometry.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(FramecastError::InvalidFrame {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Iterate depth samples of a [`PixelFormat::Z16`] frame.
    ///
    /// Returns `None` for any other format.
    pub fn depth_samples(&self) -> Option<impl Iterator<Item = u16> + '_> {
        (self.format == PixelFormat::Z16).then(|| {
            self.data
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
        })
    }
}

/// Which stream of a depth + color pair gets encoded and served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    #[default]
    Depth,
    Color,
}

/// A coherent depth + color pair captured at the same instant.
#[derive(Debug, Clone)]
pub struct FramePair {
    pub depth: RawFrame,
    pub color: RawFrame,
}

impl FramePair {
    /// Take the frame for the selected stream, dropping the other.
    pub fn into_stream(self, kind: StreamKind) -> RawFrame {
        match kind {
            StreamKind::Depth => self.depth,
            StreamKind::Color => self.color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_matching_length() {
        let frame = RawFrame::new(4, 2, PixelFormat::Bgr8, vec![0; 24]).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.data().len(), 24);
    }

    #[test]
    fn new_rejects_short_buffer() {
        let err = RawFrame::new(4, 2, PixelFormat::Z16, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            FramecastError::InvalidFrame {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn depth_samples_little_endian() {
        let frame = RawFrame::new(2, 1, PixelFormat::Z16, vec![0x34, 0x12, 0xFF, 0x00]).unwrap();
        let samples: Vec<u16> = frame.depth_samples().unwrap().collect();
        assert_eq!(samples, vec![0x1234, 0x00FF]);
    }

    #[test]
    fn depth_samples_none_for_color() {
        let frame = RawFrame::new(1, 1, PixelFormat::Rgb8, vec![1, 2, 3]).unwrap();
        assert!(frame.depth_samples().is_none());
    }

    #[test]
    fn pair_selects_stream() {
        let depth = RawFrame::new(1, 1, PixelFormat::Z16, vec![0, 0]).unwrap();
        let color = RawFrame::new(1, 1, PixelFormat::Bgr8, vec![0, 0, 0]).unwrap();
        let pair = FramePair { depth, color };
        assert_eq!(
            pair.clone().into_stream(StreamKind::Color).format(),
            PixelFormat::Bgr8
        );
        assert_eq!(pair.into_stream(StreamKind::Depth).format(), PixelFormat::Z16);
    }
}
