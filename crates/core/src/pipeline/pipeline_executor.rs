use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::capture::domain::capture_session::CaptureSession;
use crate::detection::domain::face_detector::FaceDetector;
use crate::overlay::domain::display_surface::DisplaySurface;
use crate::overlay::domain::overlay_shape::OverlayStyle;
use crate::overlay::overlay_presenter::OverlayUpdate;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_state::{PipelineState, PipelineStateMachine};

/// Called on the UI thread after each update is drawn. Returning `false`
/// stops the run.
pub type DrawnCallback<'a> = Box<dyn FnMut(&OverlayUpdate, &dyn DisplaySurface) -> bool + 'a>;

/// Configuration for one capture → detect → draw run.
pub struct PipelineConfig<'a> {
    /// Stop after this many captured frames. `None` runs until the camera
    /// ends or the run is cancelled.
    pub max_frames: Option<usize>,
    pub style: OverlayStyle,
    pub on_drawn: Option<DrawnCallback<'a>>,
    pub cancelled: Arc<AtomicBool>,
}

impl Default for PipelineConfig<'_> {
    fn default() -> Self {
        Self {
            max_frames: None,
            style: OverlayStyle::default(),
            on_drawn: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    pub frames_captured: usize,
    /// Frames evicted by the late-frame policy before detection saw them.
    pub frames_dropped: usize,
    pub frames_detected: usize,
    pub detection_failures: usize,
    pub frames_drawn: usize,
    pub final_state: PipelineState,
}

/// Abstracts how the capture → detect → draw loop is executed.
///
/// The session must already be configured; the executor starts it, runs
/// until a stop condition and stops it again, leaving `state` in `Idle`.
pub trait PipelineExecutor: Send {
    fn execute(
        &self,
        session: &mut CaptureSession,
        state: &mut PipelineStateMachine,
        detector: Box<dyn FaceDetector>,
        logger: &mut dyn PipelineLogger,
        config: PipelineConfig<'_>,
    ) -> Result<PipelineReport, Box<dyn std::error::Error>>;
}
