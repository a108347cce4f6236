// services/safety-dash/src/frame.rs
//
// Live camera frame: decoding and the per-panel load state

use chrono::{DateTime, Local};
use image::RgbImage;

use svckit::FrameError;

/// Thumbnail bounds. Two pixel rows map onto one terminal row.
pub const THUMBNAIL_WIDTH: u32 = 96;
pub const THUMBNAIL_HEIGHT: u32 = 54;

#[derive(Debug, Clone)]
pub struct LiveFrame {
    pub token: u64,
    pub width: u32,
    pub height: u32,
    pub thumbnail: RgbImage,
    pub received_at: DateTime<Local>,
}

/// Decodes fetched image bytes and downsamples them for the terminal.
pub fn decode_frame(token: u64, bytes: &[u8]) -> Result<LiveFrame, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::Empty);
    }
    let image = image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;

    Ok(LiveFrame {
        token,
        width: image.width(),
        height: image.height(),
        thumbnail: image.thumbnail(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT).to_rgb8(),
        received_at: Local::now(),
    })
}

/// What the live panel currently has to show.
#[derive(Debug, Clone, Default)]
pub enum FrameState {
    #[default]
    Waiting,
    Showing(LiveFrame),
    Unavailable { reason: String },
}

impl FrameState {
    /// A failed load replaces whatever was on screen with the placeholder;
    /// a later successful load clears it.
    pub fn apply(&mut self, result: Result<LiveFrame, FrameError>) {
        *self = match result {
            Ok(frame) => FrameState::Showing(frame),
            Err(err) => FrameState::Unavailable {
                reason: err.to_string(),
            },
        };
    }

    pub fn frame(&self) -> Option<&LiveFrame> {
        match self {
            FrameState::Showing(frame) => Some(frame),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_downsamples() {
        let frame = decode_frame(7, &png(640, 360)).unwrap();

        assert_eq!(frame.token, 7);
        assert_eq!((frame.width, frame.height), (640, 360));
        assert!(frame.thumbnail.width() <= THUMBNAIL_WIDTH);
        assert!(frame.thumbnail.height() <= THUMBNAIL_HEIGHT);
        assert_eq!(frame.thumbnail.get_pixel(0, 0), &Rgb([200, 30, 30]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_frame(1, &[]), Err(FrameError::Empty)));
        assert!(matches!(decode_frame(1, b"No frame available"), Err(FrameError::Decode(_))));
    }

    #[test]
    fn test_failure_then_recovery() {
        let mut state = FrameState::default();
        assert!(state.frame().is_none());

        state.apply(Ok(decode_frame(1, &png(8, 8)).unwrap()));
        assert_eq!(state.frame().map(|f| f.token), Some(1));

        state.apply(Err(FrameError::Empty));
        assert!(matches!(state, FrameState::Unavailable { .. }));

        state.apply(Ok(decode_frame(3, &png(8, 8)).unwrap()));
        assert_eq!(state.frame().map(|f| f.token), Some(3));
    }
}
