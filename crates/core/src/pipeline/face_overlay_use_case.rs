use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::overlay::overlay_presenter::OverlayUpdate;
use crate::shared::frame::Frame;

/// Result of one detection pass over one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionOutcome {
    pub update: OverlayUpdate,
    /// The detector errored; `update` carries zero regions.
    pub failed: bool,
    pub elapsed_ms: f64,
}

/// Runs the detector over live frames, one at a time.
///
/// A failed pass is logged and reported as an empty result for that frame:
/// the frame is neither retried nor re-queued, and the next frame is
/// processed normally.
pub struct FaceOverlayUseCase {
    detector: Box<dyn FaceDetector>,
}

impl FaceOverlayUseCase {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    pub fn detect_frame(&mut self, frame: &Frame) -> DetectionOutcome {
        let start = Instant::now();
        let (regions, failed) = match self.detector.detect(frame) {
            Ok(regions) => (regions, false),
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                (Vec::new(), true)
            }
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        log::debug!(
            "Frame {}: {} face(s) in {elapsed_ms:.1}ms",
            frame.index(),
            regions.len()
        );

        DetectionOutcome {
            update: OverlayUpdate {
                frame_index: frame.index(),
                frame_width: frame.width(),
                frame_height: frame.height(),
                regions,
            },
            failed,
            elapsed_ms,
        }
    }
}
