use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_channel::{select, Receiver, Sender};

use crate::capture::domain::camera_device::{CameraDevice, CaptureError};
use crate::capture::domain::capture_session::CaptureSession;
use crate::capture::domain::frame_sink::{
    frame_channel, Delivery, FrameReceiver, FrameSink, LateFramePolicy,
};
use crate::detection::domain::face_detector::FaceDetector;
use crate::overlay::overlay_presenter::OverlayPresenter;
use crate::pipeline::face_overlay_use_case::{DetectionOutcome, FaceOverlayUseCase};
use crate::pipeline::pipeline_executor::{
    DrawnCallback, PipelineConfig, PipelineExecutor, PipelineReport,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_state::{PipelineState, PipelineStateMachine, StateTransitionError};
use crate::shared::frame::Frame;

const DEFAULT_EVENT_CAPACITY: usize = 8;

/// Messages from the detection thread to the UI thread.
enum UiEvent {
    DetectionStarted { frame_index: usize },
    DetectionCompleted(DetectionOutcome),
}

enum UiStep {
    Preview(Option<Frame>),
    Event(Option<UiEvent>),
}

struct CaptureSummary {
    captured: usize,
    dropped: usize,
    error: Option<CaptureError>,
}

/// Executes the overlay pipeline with dedicated capture and detection
/// threads.
///
/// Layout: `camera → [drop-late slot] → detect → main [state + overlay]`,
/// with a second drop-late slot feeding live frames to the preview.
///
/// The calling thread plays the UI role: it is the only writer of overlay
/// shapes and of the state machine. The camera delivers frames serially and
/// in order; detection handles one frame at a time.
pub struct ThreadedPipelineExecutor {
    event_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        session: &mut CaptureSession,
        state: &mut PipelineStateMachine,
        detector: Box<dyn FaceDetector>,
        logger: &mut dyn PipelineLogger,
        config: PipelineConfig<'_>,
    ) -> Result<PipelineReport, Box<dyn std::error::Error>> {
        if !state.can_transition(PipelineState::CaptureRunning) {
            return Err(StateTransitionError {
                from: state.state(),
                to: PipelineState::CaptureRunning,
            }
            .into());
        }
        if session.parts_mut().is_none() {
            return Err("capture session is not configured".into());
        }

        session.start_running()?;
        state.transition(PipelineState::CaptureRunning)?;
        logger.info("Capture started");

        let result = self.run(session, state, detector, logger, config);

        session.stop_running();
        if !matches!(state.state(), PipelineState::Idle | PipelineState::TornDown) {
            state.transition(PipelineState::Idle)?;
        }

        let mut report = result?;
        report.final_state = state.state();
        logger.metric("dropped_frames", report.frames_dropped as f64);
        logger.info(&format!(
            "Capture stopped: {} captured, {} dropped, {} drawn, {} detection failure(s)",
            report.frames_captured,
            report.frames_dropped,
            report.frames_drawn,
            report.detection_failures
        ));
        Ok(report)
    }
}

impl ThreadedPipelineExecutor {
    fn run(
        &self,
        session: &mut CaptureSession,
        state: &mut PipelineStateMachine,
        detector: Box<dyn FaceDetector>,
        logger: &mut dyn PipelineLogger,
        config: PipelineConfig<'_>,
    ) -> Result<PipelineReport, Box<dyn std::error::Error>> {
        let (camera, output, preview) = session
            .parts_mut()
            .ok_or("capture session is not configured")?;

        let (frame_sink, frames) = frame_channel(output.late_frame_policy());
        let (preview_sink, previews) = frame_channel(LateFramePolicy::Discard);
        let (event_tx, event_rx) = crossbeam_channel::bounded::<UiEvent>(self.event_capacity);

        let PipelineConfig {
            max_frames,
            style,
            on_drawn,
            cancelled,
        } = config;
        let cancelled: &AtomicBool = &cancelled;
        let use_case = FaceOverlayUseCase::new(detector);

        let mut ui = UiLoop {
            presenter: OverlayPresenter::new(preview, style),
            state,
            logger,
            on_drawn,
            cancelled,
            progress_total: max_frames.unwrap_or(0),
            stopping: false,
            frames_detected: 0,
            detection_failures: 0,
            frames_drawn: 0,
            first_error: None,
        };

        let (capture_result, detect_result) = std::thread::scope(|s| {
            let capture = s.spawn(move || {
                run_capture(camera, frame_sink, preview_sink, cancelled, max_frames)
            });
            let detect = s.spawn(move || run_detection(use_case, frames, event_tx, cancelled));

            ui.run(previews.receiver(), &event_rx);

            (capture.join(), detect.join())
        });

        let mut first_error = ui.first_error.take();
        fn set_if_none(
            slot: &mut Option<Box<dyn std::error::Error>>,
            err: Box<dyn std::error::Error>,
        ) {
            if slot.is_none() {
                *slot = Some(err);
            }
        }

        let summary = match capture_result {
            Ok(summary) => summary,
            Err(_) => {
                set_if_none(&mut first_error, "Capture thread panicked".into());
                CaptureSummary {
                    captured: 0,
                    dropped: 0,
                    error: None,
                }
            }
        };
        if detect_result.is_err() {
            set_if_none(&mut first_error, "Detect thread panicked".into());
        }
        if let Some(e) = summary.error {
            set_if_none(&mut first_error, Box::new(e));
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(PipelineReport {
            frames_captured: summary.captured,
            frames_dropped: summary.dropped,
            frames_detected: ui.frames_detected,
            detection_failures: ui.detection_failures,
            frames_drawn: ui.frames_drawn,
            final_state: ui.state.state(),
        })
    }
}

/// Pulls frames until a stop condition, fanning each one out to the
/// detection slot and the preview slot.
fn run_capture(
    camera: &mut dyn CameraDevice,
    frames: FrameSink,
    previews: FrameSink,
    cancelled: &AtomicBool,
    max_frames: Option<usize>,
) -> CaptureSummary {
    let mut captured = 0;
    let mut error = None;

    while !cancelled.load(Ordering::Relaxed) && max_frames.map_or(true, |max| captured < max) {
        match camera.next_frame() {
            Ok(frame) => {
                captured += 1;
                previews.deliver(frame.clone());
                if frames.deliver(frame) == Delivery::Closed {
                    break;
                }
            }
            Err(CaptureError::EndOfStream) => {
                log::info!("Camera stream ended after {captured} frames");
                break;
            }
            Err(e) => {
                log::error!("Capture failed: {e}");
                error = Some(e);
                break;
            }
        }
    }

    CaptureSummary {
        captured,
        dropped: frames.dropped_frames(),
        error,
    }
}

/// Keeps the frame slot drained until the producer hangs up. On a panic it
/// also cancels the run, otherwise capture would never see the slot close.
struct DetectionExit<'a> {
    frames: FrameReceiver,
    cancelled: &'a AtomicBool,
}

impl Drop for DetectionExit<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::error!("Detection thread panicked, stopping capture");
            self.cancelled.store(true, Ordering::Relaxed);
        }
        while self.frames.recv().is_some() {}
    }
}

/// Detects faces in one frame at a time. Once the run is stopping, frames
/// are still drained so a blocked producer can finish.
fn run_detection(
    mut use_case: FaceOverlayUseCase,
    frames: FrameReceiver,
    events: Sender<UiEvent>,
    cancelled: &AtomicBool,
) {
    let exit = DetectionExit { frames, cancelled };
    let mut ui_gone = false;
    while let Some(frame) = exit.frames.recv() {
        if ui_gone || cancelled.load(Ordering::Relaxed) {
            continue;
        }
        let started = UiEvent::DetectionStarted {
            frame_index: frame.index(),
        };
        if events.send(started).is_err() {
            ui_gone = true;
            continue;
        }
        let outcome = use_case.detect_frame(&frame);
        if events.send(UiEvent::DetectionCompleted(outcome)).is_err() {
            ui_gone = true;
        }
    }
}

/// State owned by the calling (UI) thread for the duration of a run.
struct UiLoop<'p, 'r> {
    presenter: OverlayPresenter<'p>,
    state: &'r mut PipelineStateMachine,
    logger: &'r mut dyn PipelineLogger,
    on_drawn: Option<DrawnCallback<'r>>,
    cancelled: &'r AtomicBool,
    progress_total: usize,
    stopping: bool,
    frames_detected: usize,
    detection_failures: usize,
    frames_drawn: usize,
    first_error: Option<Box<dyn std::error::Error>>,
}

impl UiLoop<'_, '_> {
    /// Runs until the detection thread hangs up. After a stop request
    /// events are drained without being applied.
    fn run(&mut self, previews: &Receiver<Frame>, events: &Receiver<UiEvent>) {
        let never = crossbeam_channel::never::<Frame>();
        let mut previews_open = true;

        loop {
            let preview_rx = if previews_open { previews } else { &never };
            let step = select! {
                recv(preview_rx) -> msg => UiStep::Preview(msg.ok()),
                recv(events) -> msg => UiStep::Event(msg.ok()),
            };

            match step {
                UiStep::Preview(Some(frame)) => {
                    if !self.stopping {
                        self.presenter.present_frame(&frame);
                    }
                }
                UiStep::Preview(None) => previews_open = false,
                UiStep::Event(Some(event)) => {
                    if self.stopping {
                        continue;
                    }
                    if let Err(e) = self.handle(event) {
                        log::error!("Pipeline stopped: {e}");
                        self.first_error = Some(e);
                        self.request_stop();
                    }
                    if self.cancelled.load(Ordering::Relaxed) {
                        self.stopping = true;
                    }
                }
                UiStep::Event(None) => {
                    self.cancelled.store(true, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    fn handle(&mut self, event: UiEvent) -> Result<(), Box<dyn std::error::Error>> {
        match event {
            UiEvent::DetectionStarted { frame_index } => {
                log::trace!("Detecting frame {frame_index}");
                self.state.transition(PipelineState::Detecting)?;
            }
            UiEvent::DetectionCompleted(outcome) => {
                self.state.transition(PipelineState::Drawing)?;
                self.frames_detected += 1;
                if outcome.failed {
                    self.detection_failures += 1;
                }
                self.logger.timing("detect", outcome.elapsed_ms);

                let start = Instant::now();
                let shapes = self.presenter.apply(&outcome.update);
                self.logger
                    .timing("draw", start.elapsed().as_secs_f64() * 1000.0);
                self.logger.metric("faces", shapes as f64);

                self.frames_drawn += 1;
                self.logger.progress(self.frames_drawn, self.progress_total);
                self.state.transition(PipelineState::CaptureRunning)?;

                if let Some(callback) = self.on_drawn.as_mut() {
                    if !callback(&outcome.update, self.presenter.surface()) {
                        log::info!("Run stopped after frame {}", outcome.update.frame_index);
                        self.request_stop();
                    }
                }
            }
        }
        Ok(())
    }

    fn request_stop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.stopping = true;
    }
}
