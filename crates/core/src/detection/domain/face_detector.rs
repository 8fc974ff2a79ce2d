use crate::shared::frame::Frame;
use crate::shared::region::DetectedRegion;

/// Locates faces in a single frame.
///
/// Results are independent per frame; nothing is tracked across calls.
/// `&mut self` leaves room for backends that reuse buffers between frames.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame)
        -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>>;
}
