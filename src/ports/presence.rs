use crate::error::PresenceError;
use crate::frame::CameraFrame;

/// Face presence detector. Blocking, driven from a worker thread.
pub trait FacePresencePort: Send {
    fn has_face(&mut self, frame: &CameraFrame) -> Result<bool, PresenceError>;

    /// Release native resources; safe to call repeatedly
    fn close(&mut self);
}
