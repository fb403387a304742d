//! Still-image camera stand-in

use image::RgbaImage;
use std::path::{Path, PathBuf};
use tendrils_reactive::{spawn_acquisition, Acquisition, AcquisitionError, VideoFrame, VideoSource};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Image has no pixels")]
    Empty,
}

/// Video source that always shows the same frame
pub struct StillCamera {
    frame: VideoFrame,
}

impl StillCamera {
    /// Load any format `image` can decode
    pub fn open(path: &Path) -> Result<Self, CameraError> {
        let image = image::open(path)?.to_rgba8();
        let camera = Self::from_rgba(image)?;
        info!(
            path = %path.display(),
            width = camera.frame.width,
            height = camera.frame.height,
            "camera image loaded"
        );
        Ok(camera)
    }

    pub fn from_rgba(image: RgbaImage) -> Result<Self, CameraError> {
        let (width, height) = image.dimensions();
        let frame = VideoFrame::new(width, height, image.into_raw());
        if frame.is_empty() {
            return Err(CameraError::Empty);
        }
        Ok(Self { frame })
    }
}

impl VideoSource for StillCamera {
    fn latest_frame(&mut self) -> Option<&VideoFrame> {
        Some(&self.frame)
    }
}

/// Load the still image off the tick loop
pub fn acquire_camera(path: PathBuf) -> Acquisition<Box<dyn VideoSource>> {
    spawn_acquisition(move || {
        StillCamera::open(&path)
            .map(|camera| Box::new(camera) as Box<dyn VideoSource>)
            .map_err(|e| AcquisitionError::Load(e.to_string()))
    })
}
