//! Payload signature sniffing used by submission validation.
//!
//! Only decides whether a payload is *plausibly* an image or a video; the
//! codec remains the authority on whether it actually decodes.

use image::ImageFormat;

/// Sniff an image payload, returning a canonical file extension.
pub fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("png"),
        ImageFormat::Jpeg => Some("jpg"),
        _ => Some("img"),
    }
}

/// Sniff a video container signature, returning a canonical file extension.
///
/// Recognizes the containers the pipeline is expected to receive: ISO BMFF
/// (mp4/mov), RIFF AVI, EBML (webm/mkv) and MPEG program streams.
pub fn video_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some("mp4");
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"AVI " {
        return Some("avi");
    }
    if bytes.len() >= 4 && bytes[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return Some("webm");
    }
    if bytes.len() >= 4 && bytes[0..4] == [0x00, 0x00, 0x01, 0xBA] {
        return Some("mpg");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_png_signature() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(image_extension(&png), Some("png"));
    }

    #[test]
    fn recognizes_jpeg_signature() {
        let jpg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0];
        assert_eq!(image_extension(&jpg), Some("jpg"));
    }

    #[test]
    fn rejects_non_image_payload() {
        assert_eq!(image_extension(b"not an image at all"), None);
    }

    #[test]
    fn recognizes_mp4_signature() {
        let mut mp4 = vec![0x00, 0x00, 0x00, 0x18];
        mp4.extend_from_slice(b"ftypisom");
        assert_eq!(video_extension(&mp4), Some("mp4"));
    }

    #[test]
    fn recognizes_avi_signature() {
        let mut avi = b"RIFF".to_vec();
        avi.extend_from_slice(&[0, 0, 0, 0]);
        avi.extend_from_slice(b"AVI ");
        assert_eq!(video_extension(&avi), Some("avi"));
    }

    #[test]
    fn recognizes_ebml_signature() {
        assert_eq!(video_extension(&[0x1A, 0x45, 0xDF, 0xA3, 0, 0]), Some("webm"));
    }

    #[test]
    fn rejects_non_video_payload() {
        assert_eq!(video_extension(b"plain text payload"), None);
        // An image is not a video.
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(video_extension(&png), None);
    }
}
