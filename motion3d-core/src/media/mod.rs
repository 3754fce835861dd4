//! Fixed-shape frame buffers exchanged at the model boundary.
//!
//! Every frame entering or leaving the pipeline shares one canonical shape:
//! [`FRAME_SIZE`]×[`FRAME_SIZE`], [`CHANNELS`] interleaved RGB channels,
//! `f32` samples normalized to `[-1, 1]`.  Centralizing the normalize /
//! denormalize pair here means model variants always see numbers in one
//! declared range regardless of the input container or codec.

mod codec;
pub mod probe;

pub use codec::{FfmpegCodec, MediaCodec, DEFAULT_FPS, DEFAULT_MAX_FRAMES};

use thiserror::Error;

/// Spatial resolution (width and height) of every pipeline frame.
pub const FRAME_SIZE: u32 = 256;

/// RGB.
pub const CHANNELS: usize = 3;

/// Errors produced by the media layer.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The payload is not a decodable image.
    #[error("failed to decode image: {0}")]
    DecodeImage(String),

    /// The video demuxer/decoder failed.
    #[error("failed to decode video: {0}")]
    DecodeVideo(String),

    /// Zero frames were extracted.  Always an error, never an empty result.
    #[error("no frames could be extracted from video")]
    EmptyVideo,

    /// The encoder failed to produce a playable container.
    #[error("failed to encode video: {0}")]
    Encode(String),

    /// Filesystem error while staging codec scratch files.
    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One RGB frame, normalized and resized to the pipeline shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    data: Vec<f32>,
}

/// Ordered frames sharing the pipeline shape.
pub type FrameSequence = Vec<Frame>;

impl Frame {
    /// Number of `f32` samples in a frame buffer.
    pub const LEN: usize = (FRAME_SIZE as usize) * (FRAME_SIZE as usize) * CHANNELS;

    /// Build a frame from interleaved RGB8 pixels at the pipeline resolution.
    ///
    /// # Panics
    ///
    /// Panics if `pixels.len() != Self::LEN`; callers resize first.
    pub fn from_rgb8(pixels: &[u8]) -> Self {
        assert_eq!(pixels.len(), Self::LEN, "frame buffer has wrong shape");
        Self {
            data: pixels.iter().map(|&b| normalize(b)).collect(),
        }
    }

    /// Build a frame directly from normalized samples.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != Self::LEN`.
    pub fn from_samples(data: Vec<f32>) -> Self {
        assert_eq!(data.len(), Self::LEN, "frame buffer has wrong shape");
        Self { data }
    }

    pub fn width(&self) -> u32 {
        FRAME_SIZE
    }

    pub fn height(&self) -> u32 {
        FRAME_SIZE
    }

    /// Normalized samples, interleaved RGB, row-major.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Denormalize back to display-range RGB8.
    ///
    /// Out-of-range samples are clamped and non-finite samples map to black;
    /// NaN or overflow never reaches pixel values.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.data.iter().map(|&s| denormalize(s)).collect()
    }
}

/// Map a display-range byte into the declared `[-1, 1]` model range.
#[inline]
pub(crate) fn normalize(byte: u8) -> f32 {
    f32::from(byte) / 255.0 * 2.0 - 1.0
}

/// Map a normalized sample back to a display-range byte, clamped.
#[inline]
pub(crate) fn denormalize(sample: f32) -> u8 {
    if !sample.is_finite() {
        return 0;
    }
    ((sample + 1.0) / 2.0 * 255.0).clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_covers_declared_range() {
        assert_eq!(normalize(0), -1.0);
        assert_eq!(normalize(255), 1.0);
        assert!(normalize(128).abs() < 0.01);
    }

    #[test]
    fn denormalize_roundtrips_every_byte() {
        for b in 0..=255u8 {
            assert_eq!(denormalize(normalize(b)), b);
        }
    }

    #[test]
    fn denormalize_clamps_out_of_range() {
        assert_eq!(denormalize(2.0), 255);
        assert_eq!(denormalize(-2.0), 0);
    }

    #[test]
    fn denormalize_scrubs_non_finite_samples() {
        assert_eq!(denormalize(f32::NAN), 0);
        assert_eq!(denormalize(f32::INFINITY), 0);
        assert_eq!(denormalize(f32::NEG_INFINITY), 0);
    }

    #[test]
    fn frame_roundtrip_preserves_pixels() {
        let pixels: Vec<u8> = (0..Frame::LEN).map(|i| (i % 251) as u8).collect();
        let frame = Frame::from_rgb8(&pixels);
        assert_eq!(frame.to_rgb8(), pixels);
    }

    #[test]
    #[should_panic(expected = "wrong shape")]
    fn frame_rejects_wrong_shape() {
        let _ = Frame::from_rgb8(&[0u8; 12]);
    }
}
