//! JPEG encoder backed by the `image` crate.
//!
//! Output is a complete baseline JFIF file per frame (SOI … EOI), so a
//! client can decode each response independently.

use bytes::Bytes;
use image::codecs::jpeg;
use image::{ExtendedColorType, ImageEncoder};

use super::Encoder;
use super::colormap::{self, DEFAULT_DEPTH_ALPHA};
use crate::config::EncodeConfig;
use crate::error::EncodeError;
use crate::frame::{PixelFormat, RawFrame};

pub const DEFAULT_QUALITY: u8 = 80;

#[derive(Debug, Clone)]
pub struct JpegEncoder {
    quality: u8,
    depth_alpha: f32,
}

impl JpegEncoder {
    /// `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            depth_alpha: DEFAULT_DEPTH_ALPHA,
        }
    }

    pub fn from_config(config: &EncodeConfig) -> Self {
        Self::new(config.quality).with_depth_alpha(config.depth_alpha)
    }

    pub fn with_depth_alpha(mut self, alpha: f32) -> Self {
        self.depth_alpha = alpha;
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn write(
        &self,
        pixels: &[u8],
        frame: &RawFrame,
        color: ExtendedColorType,
    ) -> Result<Bytes, EncodeError> {
        let mut out = Vec::with_capacity(pixels.len() / 8);
        jpeg::JpegEncoder::new_with_quality(&mut out, self.quality)
            .write_image(pixels, frame.width(), frame.height(), color)
            .map_err(|e| EncodeError::codec(e.to_string()))?;
        Ok(Bytes::from(out))
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl Encoder for JpegEncoder {
    fn encode(&mut self, frame: &RawFrame) -> Result<Bytes, EncodeError> {
        match frame.format() {
            PixelFormat::Z16 => {
                let rgb = colormap::depth_to_rgb(frame, self.depth_alpha)?;
                self.write(rgb.data(), &rgb, ExtendedColorType::Rgb8)
            }
            PixelFormat::Bgr8 => {
                let mut rgb = frame.data().to_vec();
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                self.write(&rgb, frame, ExtendedColorType::Rgb8)
            }
            PixelFormat::Rgb8 => self.write(frame.data(), frame, ExtendedColorType::Rgb8),
            PixelFormat::Gray8 => self.write(frame.data(), frame, ExtendedColorType::L8),
        }
    }

    fn codec_name(&self) -> &'static str {
        "jpeg"
    }
}
