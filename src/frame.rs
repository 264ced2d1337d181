use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Pixel layout of a camera frame or captured image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// JPEG compressed still
    Jpeg,
    /// YUV 4:2:0 semi-planar, the usual preview format on mobile sensors
    Nv21,
    /// Packed RGBA, 4 bytes per pixel
    Rgba8,
}

impl FrameFormat {
    /// Expected byte length for uncompressed formats
    pub fn expected_len(&self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            FrameFormat::Jpeg => None,
            FrameFormat::Nv21 => Some(pixels + pixels / 2),
            FrameFormat::Rgba8 => Some(pixels * 4),
        }
    }
}

/// A preview frame delivered by the camera collaborator
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Monotonic frame identifier assigned by the camera
    pub id: u64,
    /// When the frame was produced
    pub captured_at: Instant,
    /// Raw frame data (shared ownership, frames fan out cheaply)
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl CameraFrame {
    pub fn new(
        id: u64,
        captured_at: Instant,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            captured_at,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }
}

/// A still image handed to the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    /// Opaque reference to where the storage collaborator kept the capture
    pub storage_ref: Option<String>,
}

impl CapturedImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            data: Arc::new(data),
            width,
            height,
            format,
            storage_ref: None,
        }
    }

    /// Promote a preview frame to a capture without copying pixel data
    pub fn from_frame(frame: &CameraFrame) -> Self {
        Self {
            data: Arc::clone(&frame.data),
            width: frame.width,
            height: frame.height,
            format: frame.format,
            storage_ref: None,
        }
    }

    pub fn with_storage_ref(mut self, storage_ref: impl Into<String>) -> Self {
        self.storage_ref = Some(storage_ref.into());
        self
    }

    /// Check dimensions and data length against the declared format
    pub fn validate_size(&self) -> bool {
        if self.width == 0 || self.height == 0 || self.data.is_empty() {
            return false;
        }
        match self.format.expected_len(self.width, self.height) {
            Some(expected) => self.data.len() == expected,
            None => true,
        }
    }
}
