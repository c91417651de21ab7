//! Frame sources and sinks.
//!
//! The passes in [`crate::pipeline`] only see [`FrameSource`] and
//! [`FrameSink`]; the `OpenCV` file adapters here are one implementation.

use crate::{utils::safe_cast::f64_to_i32, Error, Result};
use log::{debug, info, warn};
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::{Path, PathBuf};

/// Stream properties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// Frame width in pixels
    pub width: i32,
    /// Frame height in pixels
    pub height: i32,
    /// Frames per second
    pub fps: f64,
    /// Total frames, 0 when unknown
    pub frame_count: usize,
}

impl VideoInfo {
    /// Frame size
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Sequential reader of frames in file order
pub trait FrameSource {
    /// Stream properties
    fn info(&self) -> VideoInfo;

    /// Next frame, `None` at end of stream
    fn read_frame(&mut self) -> Result<Option<Mat>>;
}

/// Sequential writer of frames
pub trait FrameSink {
    /// Append one frame
    fn write_frame(&mut self, frame: &Mat) -> Result<()>;

    /// Flush and close the output
    fn finish(&mut self) -> Result<()>;

    /// Close the output and delete whatever was written
    fn discard(&mut self) -> Result<()>;
}

/// Video file read through `VideoCapture`
pub struct VideoFileSource {
    capture: VideoCapture,
    info: VideoInfo,
}

impl VideoFileSource {
    /// Open `path`, using `fps_fallback` when the container reports no frame rate
    ///
    /// # Errors
    ///
    /// Returns [`Error::VideoOpen`] if the file cannot be opened
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn open<P: AsRef<Path>>(path: P, fps_fallback: f64) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        info!("Opening video file: {}", name);
        let capture = VideoCapture::from_file(&name, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::VideoOpen(name));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        let info = VideoInfo {
            width: f64_to_i32(capture.get(videoio::CAP_PROP_FRAME_WIDTH)?)?,
            height: f64_to_i32(capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?)?,
            fps: if fps.is_finite() && fps > 0.0 { fps } else { fps_fallback },
            frame_count: if count.is_finite() && count > 0.0 { count as usize } else { 0 },
        };
        debug!("Video info: {:?}", info);
        Ok(Self { capture, info })
    }
}

impl FrameSource for VideoFileSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

/// Video file written through `VideoWriter`
pub struct VideoFileSink {
    writer: Option<VideoWriter>,
    path: PathBuf,
}

/// `OpenCV` four-character code for a codec name such as `mp4v`
///
/// # Errors
///
/// Returns [`Error::ConfigError`] unless `codec` is exactly four characters
pub fn fourcc(codec: &str) -> Result<i32> {
    let chars: Vec<char> = codec.chars().collect();
    match chars.as_slice() {
        [a, b, c, d] => Ok(VideoWriter::fourcc(*a, *b, *c, *d)?),
        _ => Err(Error::ConfigError(format!("Codec must be four characters, got '{codec}'"))),
    }
}

impl VideoFileSink {
    /// Create `path` for writing
    ///
    /// # Errors
    ///
    /// Returns an error for a bad codec or if the writer cannot be opened
    pub fn create<P: AsRef<Path>>(path: P, codec: &str, fps: f64, size: Size) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        let writer = VideoWriter::new(&name, fourcc(codec)?, fps, size, true)?;
        if !writer.is_opened()? {
            return Err(Error::IoError(format!("Could not open video writer for {name}")));
        }
        info!("Writing {}x{} video at {:.2} fps to {}", size.width, size.height, fps, name);
        Ok(Self {
            writer: Some(writer),
            path,
        })
    }
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &Mat) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer.write(frame)?),
            None => Err(Error::IoError("Video writer already closed".to_string())),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.release()?;
        }
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.release() {
                warn!("Failed to close video writer: {}", e);
            }
        }
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Removed partial output {}", self.path.display());
        }
        Ok(())
    }
}
