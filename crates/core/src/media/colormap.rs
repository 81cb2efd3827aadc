//! Depth-to-color conversion.
//!
//! Two steps, applied per pixel:
//!
//! 1. **Scale**: `u8 = saturate(round(|depth * alpha|))`. With the default
//!    `alpha = 0.05`, 0..5100 mm maps onto the full 0..255 range and
//!    anything farther saturates to white.
//! 2. **Colormap**: the 8-bit value indexes a 256-entry "bone" table, a
//!    grayscale ramp with a blue tint in the shadows.
//!
//! ```text
//! bone(x) = (7·x + flip(hot(x))) / 8      x ∈ [0, 1]
//! hot(x)  = (clamp(8x/3), clamp(8x/3 - 1), clamp(4x - 3))
//! ```

use std::sync::LazyLock;

use crate::error::EncodeError;
use crate::frame::{PixelFormat, RawFrame};

/// Default depth scale factor.
pub const DEFAULT_DEPTH_ALPHA: f32 = 0.05;

static BONE: LazyLock<[[u8; 3]; 256]> = LazyLock::new(build_bone);

fn build_bone() -> [[u8; 3]; 256] {
    let clamp = |v: f32| v.clamp(0.0, 1.0);
    let mut lut = [[0u8; 3]; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let x = i as f32 / 255.0;
        let hot = [
            clamp(x * 8.0 / 3.0),
            clamp(x * 8.0 / 3.0 - 1.0),
            clamp(x * 4.0 - 3.0),
        ];
        // Reversed hot channels: blue leads, red trails.
        let rgb = [
            (7.0 * x + hot[2]) / 8.0,
            (7.0 * x + hot[1]) / 8.0,
            (7.0 * x + hot[0]) / 8.0,
        ];
        *entry = rgb.map(|c| (c * 255.0).round() as u8);
    }
    lut
}

/// Scale a depth sample to 8 bits, saturating.
pub fn scale_abs(depth: u16, alpha: f32) -> u8 {
    (f32::from(depth) * alpha).abs().round().min(255.0) as u8
}

/// Look up the bone colormap entry for an 8-bit value, as RGB.
pub fn bone(value: u8) -> [u8; 3] {
    BONE[value as usize]
}

/// Convert a [`PixelFormat::Z16`] frame into an [`PixelFormat::Rgb8`] colormapped frame.
pub fn depth_to_rgb(frame: &RawFrame, alpha: f32) -> Result<RawFrame, EncodeError> {
    let samples = frame
        .depth_samples()
        .ok_or_else(|| EncodeError::unsupported(frame.format().name()))?;

    let mut rgb = Vec::with_capacity(frame.data().len() / 2 * 3);
    for d in samples {
        rgb.extend_from_slice(&bone(scale_abs(d, alpha)));
    }

    RawFrame::new(frame.width(), frame.height(), PixelFormat::Rgb8, rgb)
        .map_err(|e| EncodeError::codec(e.to_string()))
}
