//! Stateless codec between raw media bytes and pipeline frames.
//!
//! Still images go through the `image` crate; video demux/mux goes through
//! an ffmpeg sidecar process speaking rawvideo rgb24 over pipes.  All
//! functions here are synchronous and CPU/IO bound; callers run them under
//! `tokio::task::spawn_blocking`.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use ffmpeg_sidecar::{command::FfmpegCommand, event::FfmpegEvent};
use image::imageops::FilterType;
use tracing::debug;

use super::{Frame, FrameSequence, MediaError, FRAME_SIZE};

/// Default output frame rate for encoded videos.
pub const DEFAULT_FPS: u32 = 25;

/// Default cap on extracted driving frames.
pub const DEFAULT_MAX_FRAMES: usize = 100;

/// Conversion between raw media bytes and pipeline frames.
///
/// The orchestrator only depends on this trait; [`FfmpegCodec`] is the
/// production implementation.
pub trait MediaCodec: Send + Sync + 'static {
    /// Decode a single still image, convert to RGB, resize to the pipeline
    /// resolution and normalize.
    fn decode_image(&self, bytes: &[u8]) -> Result<Frame, MediaError>;

    /// Decode up to `max_frames` frames in presentation order (truncation,
    /// never resampling), resized and normalized per frame.
    ///
    /// Zero extracted frames is always [`MediaError::EmptyVideo`].
    fn decode_video(&self, bytes: &[u8], max_frames: usize) -> Result<FrameSequence, MediaError>;

    /// Denormalize, clamp and mux frames into a playable MP4 at `fps`,
    /// preserving frame order exactly.
    fn encode_video(&self, frames: &[Frame], fps: u32) -> Result<Bytes, MediaError>;
}

/// Production codec: `image` for stills, ffmpeg sidecar for video.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegCodec;

impl MediaCodec for FfmpegCodec {
    fn decode_image(&self, bytes: &[u8]) -> Result<Frame, MediaError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| MediaError::DecodeImage(e.to_string()))?;
        let rgb = img
            .resize_exact(FRAME_SIZE, FRAME_SIZE, FilterType::Lanczos3)
            .to_rgb8();
        Ok(Frame::from_rgb8(rgb.as_raw()))
    }

    fn decode_video(&self, bytes: &[u8], max_frames: usize) -> Result<FrameSequence, MediaError> {
        // ffmpeg needs a seekable input for common containers (mp4 with a
        // trailing moov atom cannot be demuxed from a pipe).
        let scratch = scratch_path("driving");
        std::fs::write(&scratch, bytes)?;
        let result = decode_video_file(&scratch, max_frames);
        let _ = std::fs::remove_file(&scratch);
        result
    }

    fn encode_video(&self, frames: &[Frame], fps: u32) -> Result<Bytes, MediaError> {
        if frames.is_empty() {
            return Err(MediaError::Encode("no frames to encode".into()));
        }

        let out_path = scratch_path("encode.mp4");
        let mut command = FfmpegCommand::new();
        command
            .hide_banner()
            .overwrite()
            .format("rawvideo")
            .pix_fmt("rgb24")
            .size(FRAME_SIZE, FRAME_SIZE)
            .rate(fps as f32)
            .input("-")
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"])
            .output(out_path.to_string_lossy());

        let mut child = command
            .spawn()
            .map_err(|e| MediaError::Encode(e.to_string()))?;

        let mut stdin = child
            .take_stdin()
            .ok_or_else(|| MediaError::Encode("encoder stdin unavailable".into()))?;

        // Feed frames on a dedicated thread so the event pipe cannot deadlock
        // against a full stdin buffer.
        let pixels: Vec<Vec<u8>> = frames.iter().map(Frame::to_rgb8).collect();
        let feeder = std::thread::spawn(move || -> std::io::Result<()> {
            for buf in &pixels {
                if let Err(err) = stdin.write_all(buf) {
                    // Encoder died early; the exit status check reports it.
                    if err.kind() == std::io::ErrorKind::BrokenPipe {
                        return Ok(());
                    }
                    return Err(err);
                }
            }
            Ok(())
        });

        child
            .iter()
            .map_err(|e| MediaError::Encode(e.to_string()))?
            .for_each(|event| {
                if let FfmpegEvent::Log(level, msg) = event {
                    debug!("[ffmpeg {level:?}] {msg}");
                }
            });

        feeder
            .join()
            .map_err(|_| MediaError::Encode("encoder feed thread panicked".into()))?
            .map_err(|e| MediaError::Encode(e.to_string()))?;

        let status = child.wait()?;
        if !status.success() {
            let _ = std::fs::remove_file(&out_path);
            return Err(MediaError::Encode(format!(
                "encoder exited with status {status}"
            )));
        }

        let bytes = std::fs::read(&out_path)?;
        let _ = std::fs::remove_file(&out_path);
        Ok(Bytes::from(bytes))
    }
}

fn decode_video_file(path: &Path, max_frames: usize) -> Result<FrameSequence, MediaError> {
    let mut command = FfmpegCommand::new();
    command
        .hide_banner()
        .input(path.to_string_lossy())
        .args(["-vf", &format!("scale={FRAME_SIZE}:{FRAME_SIZE}")])
        .rawvideo();

    let mut child = command
        .spawn()
        .map_err(|e| MediaError::DecodeVideo(e.to_string()))?;

    let mut frames = Vec::new();
    let mut bad_shape = false;
    {
        let iter = child
            .iter()
            .map_err(|e| MediaError::DecodeVideo(e.to_string()))?;
        for raw in iter.filter_frames() {
            if raw.width != FRAME_SIZE || raw.height != FRAME_SIZE || raw.data.len() != Frame::LEN
            {
                bad_shape = true;
                break;
            }
            frames.push(Frame::from_rgb8(&raw.data));
            if frames.len() >= max_frames {
                break;
            }
        }
    }
    // Stop the decoder if we truncated; harmless if it already exited.
    let _ = child.kill();
    let _ = child.wait();

    if bad_shape {
        return Err(MediaError::DecodeVideo(
            "decoder produced a frame with an unexpected shape".into(),
        ));
    }
    if frames.is_empty() {
        return Err(MediaError::EmptyVideo);
    }
    Ok(frames)
}

fn scratch_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("motion3d-{}-{tag}", uuid::Uuid::new_v4()))
}
