use thiserror::Error;

use crate::capture::domain::camera_device::{
    CameraPosition, CameraProvider, CaptureError, CaptureFormat, DeviceSelector,
};
use crate::capture::domain::capture_session::{CaptureSession, PreviewLayer, VideoDataOutput};
use crate::overlay::domain::coordinate_mapper::{SurfaceSize, VideoGravity};
use crate::overlay::domain::display_surface::SurfaceFactory;
use crate::pipeline::pipeline_state::{PipelineState, PipelineStateMachine};
use crate::shared::constants::{
    DEFAULT_CAPTURE_FPS, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH, DEFAULT_SURFACE_HEIGHT,
    DEFAULT_SURFACE_WIDTH, PREVIEW_LAYER_NAME,
};
use crate::shared::settings::Settings;

/// Fatal to the capture pipeline: the feature stays disabled.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("no front video camera available")]
    NoFrontCamera,
    #[error("camera discovery failed: {0}")]
    Discovery(#[source] CaptureError),
    #[error("camera input unavailable: {0}")]
    InputUnavailable(#[source] CaptureError),
    #[error("session rejected camera input {0}")]
    InputRejected(String),
    #[error("session rejected video data output")]
    OutputRejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub selector: DeviceSelector,
    pub format: CaptureFormat,
    pub always_discard_late_frames: bool,
    /// Size of the container the preview surface fills.
    pub container: SurfaceSize,
    pub gravity: VideoGravity,
    /// `None` mirrors front cameras only.
    pub mirror: Option<bool>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            selector: DeviceSelector::default(),
            format: CaptureFormat {
                width: DEFAULT_CAPTURE_WIDTH,
                height: DEFAULT_CAPTURE_HEIGHT,
                fps: DEFAULT_CAPTURE_FPS,
            },
            always_discard_late_frames: true,
            container: SurfaceSize::new(DEFAULT_SURFACE_WIDTH, DEFAULT_SURFACE_HEIGHT),
            gravity: VideoGravity::ResizeAspectFill,
            mirror: None,
        }
    }
}

impl CaptureConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            selector: DeviceSelector::default(),
            format: CaptureFormat {
                width: settings.capture_width,
                height: settings.capture_height,
                fps: settings.capture_fps,
            },
            always_discard_late_frames: settings.always_discard_late_frames,
            container: SurfaceSize::new(settings.surface_width, settings.surface_height),
            gravity: settings.gravity,
            mirror: settings.mirror_preview,
        }
    }
}

/// Builds and owns the capture session.
///
/// An absent session means "capture unavailable"; callers check
/// [`CaptureSessionManager::session`] rather than handling errors.
pub struct CaptureSessionManager {
    provider: Box<dyn CameraProvider>,
    surfaces: Box<dyn SurfaceFactory>,
    config: CaptureConfig,
    session: Option<CaptureSession>,
    state: PipelineStateMachine,
}

impl CaptureSessionManager {
    pub fn new(
        provider: Box<dyn CameraProvider>,
        surfaces: Box<dyn SurfaceFactory>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            provider,
            surfaces,
            config,
            session: None,
            state: PipelineStateMachine::new(),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut CaptureSession> {
        self.session.as_mut()
    }

    pub fn state(&self) -> PipelineState {
        self.state.state()
    }

    /// Session and state machine together, for the pipeline executor.
    pub fn run_parts(&mut self) -> Option<(&mut CaptureSession, &mut PipelineStateMachine)> {
        match self.session.as_mut() {
            Some(session) => Some((session, &mut self.state)),
            None => None,
        }
    }

    /// Configures the session, logging and swallowing any failure. Returns
    /// `None` when capture is unavailable.
    pub fn start(&mut self) -> Option<&mut CaptureSession> {
        if let Err(e) = self.configure() {
            log::error!("Capture unavailable: {e}");
            return None;
        }
        self.session.as_mut()
    }

    /// Acquires the front camera and wires input, output and preview.
    ///
    /// Calling this on a configured manager does nothing. On failure every
    /// partially built component is released and the manager is left
    /// without a session in the `TornDown` state.
    pub fn configure(&mut self) -> Result<(), ConfigurationError> {
        if self.session.is_some() {
            log::debug!("Capture session already configured");
            return Ok(());
        }

        let mut session = CaptureSession::new();
        match self.build(&mut session) {
            Ok(()) => {
                self.session = Some(session);
                self.state = PipelineStateMachine::new();
                log::info!("Capture session configured");
                Ok(())
            }
            Err(e) => {
                session.teardown();
                self.state.tear_down();
                Err(e)
            }
        }
    }

    fn build(&mut self, session: &mut CaptureSession) -> Result<(), ConfigurationError> {
        let surface = self
            .surfaces
            .create(PREVIEW_LAYER_NAME, self.config.container);
        let mut preview = Some(surface);

        let result = self.attach_camera(session);
        if let Err(e) = result {
            if let Some(mut surface) = preview.take() {
                surface.release();
            }
            return Err(e);
        }

        let device = session
            .input()
            .map(|d| d.descriptor().clone())
            .ok_or(ConfigurationError::NoFrontCamera)?;
        let mirrored = self
            .config
            .mirror
            .unwrap_or(device.position == CameraPosition::Front);

        if let Some(surface) = preview.take() {
            session.attach_preview(PreviewLayer::new(surface, self.config.gravity, mirrored));
        }
        Ok(())
    }

    fn attach_camera(&mut self, session: &mut CaptureSession) -> Result<(), ConfigurationError> {
        let devices = self
            .provider
            .devices()
            .map_err(ConfigurationError::Discovery)?;
        let descriptor = self
            .config
            .selector
            .select(&devices)
            .cloned()
            .ok_or(ConfigurationError::NoFrontCamera)?;

        let camera = self
            .provider
            .open(&descriptor, self.config.format)
            .map_err(ConfigurationError::InputUnavailable)?;

        if session.add_input(camera).is_err() {
            log::warn!("Session rejected input {}", descriptor.name);
            return Err(ConfigurationError::InputRejected(descriptor.name));
        }

        let mut output = VideoDataOutput::new(self.config.always_discard_late_frames);
        output.intrinsic_matrix_delivery_enabled = descriptor.supports_intrinsic_matrix_delivery;
        if session.add_output(output).is_err() {
            log::warn!("Session rejected video data output");
            return Err(ConfigurationError::OutputRejected);
        }

        log::debug!(
            "Attached {} (discard late frames: {})",
            descriptor.name,
            self.config.always_discard_late_frames
        );
        Ok(())
    }

    /// Stops capture and releases the preview surface. A later
    /// [`configure`](Self::configure) builds everything afresh.
    pub fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.teardown();
            log::info!("Capture session torn down");
        }
        self.state.tear_down();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::capture::domain::camera_device::{
        CameraDescriptor, CameraDevice, CameraKind, CaptureFormat,
    };
    use crate::capture::domain::capture_session::test_support::FakeCamera;
    use crate::overlay::domain::display_surface::DisplaySurface;
    use crate::overlay::domain::overlay_shape::OverlayShape;
    use crate::shared::frame::Frame;

    // --- Stubs ---

    struct StubProvider {
        devices: Vec<CameraDescriptor>,
        fail_open: bool,
    }

    impl CameraProvider for StubProvider {
        fn devices(&self) -> Result<Vec<CameraDescriptor>, CaptureError> {
            Ok(self.devices.clone())
        }

        fn open(
            &self,
            device: &CameraDescriptor,
            _format: CaptureFormat,
        ) -> Result<Box<dyn CameraDevice>, CaptureError> {
            if self.fail_open {
                return Err(CaptureError::Open {
                    name: device.name.clone(),
                    reason: "busy".into(),
                });
            }
            let mut camera = FakeCamera::new(0);
            camera.descriptor = device.clone();
            Ok(Box::new(camera))
        }
    }

    /// Records every surface it hands out so tests can check releases.
    #[derive(Default, Clone)]
    struct SurfaceLedger {
        released: Rc<RefCell<Vec<bool>>>,
    }

    impl SurfaceLedger {
        fn created(&self) -> usize {
            self.released.borrow().len()
        }

        fn live(&self) -> usize {
            self.released.borrow().iter().filter(|r| !**r).count()
        }
    }

    struct LedgerSurface {
        id: usize,
        ledger: SurfaceLedger,
        size: SurfaceSize,
        shapes: Vec<OverlayShape>,
    }

    impl DisplaySurface for LedgerSurface {
        fn name(&self) -> &str {
            PREVIEW_LAYER_NAME
        }
        fn size(&self) -> SurfaceSize {
            self.size
        }
        fn present_frame(&mut self, _frame: &Frame, _gravity: VideoGravity, _mirrored: bool) {}
        fn clear_shapes(&mut self) {
            self.shapes.clear();
        }
        fn add_shape(&mut self, shape: OverlayShape) {
            self.shapes.push(shape);
        }
        fn shapes(&self) -> &[OverlayShape] {
            &self.shapes
        }
        fn release(&mut self) {
            self.ledger.released.borrow_mut()[self.id] = true;
        }
        fn is_released(&self) -> bool {
            self.ledger.released.borrow()[self.id]
        }
    }

    impl SurfaceFactory for SurfaceLedger {
        fn create(&mut self, _name: &str, size: SurfaceSize) -> Box<dyn DisplaySurface> {
            let id = {
                let mut released = self.released.borrow_mut();
                released.push(false);
                released.len() - 1
            };
            Box::new(LedgerSurface {
                id,
                ledger: self.clone(),
                size,
                shapes: Vec::new(),
            })
        }
    }

    // --- Helpers ---

    fn descriptor(index: u32, position: CameraPosition) -> CameraDescriptor {
        CameraDescriptor {
            index,
            name: format!("cam{index}"),
            position,
            kind: CameraKind::WideAngle,
            supports_intrinsic_matrix_delivery: index == 7,
        }
    }

    fn manager(devices: Vec<CameraDescriptor>, fail_open: bool) -> (CaptureSessionManager, SurfaceLedger) {
        let ledger = SurfaceLedger::default();
        let manager = CaptureSessionManager::new(
            Box::new(StubProvider { devices, fail_open }),
            Box::new(ledger.clone()),
            CaptureConfig::default(),
        );
        (manager, ledger)
    }

    // --- Tests ---

    #[test]
    fn test_no_front_camera_leaves_session_absent_and_torn_down() {
        let (mut m, ledger) = manager(vec![descriptor(0, CameraPosition::Back)], false);

        let err = m.configure().unwrap_err();
        assert!(matches!(err, ConfigurationError::NoFrontCamera));
        assert!(m.session().is_none());
        assert_eq!(m.state(), PipelineState::TornDown);
        assert_eq!(ledger.created(), 1);
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_open_failure_is_input_unavailable() {
        let (mut m, ledger) = manager(vec![descriptor(0, CameraPosition::Front)], true);
        assert!(matches!(
            m.configure(),
            Err(ConfigurationError::InputUnavailable(_))
        ));
        assert!(m.session().is_none());
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_start_returns_none_when_unavailable() {
        let (mut m, _) = manager(vec![], false);
        assert!(m.start().is_none());
        assert_eq!(m.state(), PipelineState::TornDown);
    }

    #[test]
    fn test_configures_one_input_output_and_preview() {
        let (mut m, ledger) = manager(vec![descriptor(3, CameraPosition::Front)], false);
        m.configure().unwrap();

        let session = m.session().unwrap();
        assert_eq!(session.input_count(), 1);
        assert_eq!(session.output_count(), 1);
        assert_eq!(session.input().unwrap().descriptor().index, 3);
        assert!(session.output().unwrap().always_discard_late_frames);

        let preview = session.preview().unwrap();
        assert_eq!(preview.surface().name(), PREVIEW_LAYER_NAME);
        assert_eq!(preview.surface().size(), CaptureConfig::default().container);
        assert_eq!(preview.gravity(), VideoGravity::ResizeAspectFill);
        assert!(preview.is_mirrored());
        assert_eq!(ledger.live(), 1);
        assert_eq!(m.state(), PipelineState::Idle);
    }

    #[test]
    fn test_configure_is_idempotent() {
        let (mut m, ledger) = manager(vec![descriptor(0, CameraPosition::Front)], false);
        m.configure().unwrap();
        m.configure().unwrap();
        assert!(m.start().is_some());

        let session = m.session().unwrap();
        assert_eq!(session.input_count(), 1);
        assert_eq!(session.output_count(), 1);
        assert_eq!(ledger.created(), 1);
    }

    #[test]
    fn test_intrinsics_enabled_only_when_supported() {
        let (mut m, _) = manager(vec![descriptor(7, CameraPosition::Front)], false);
        m.configure().unwrap();
        assert!(m.session().unwrap().output().unwrap().intrinsic_matrix_delivery_enabled);

        let (mut m, _) = manager(vec![descriptor(1, CameraPosition::Front)], false);
        m.configure().unwrap();
        assert!(!m.session().unwrap().output().unwrap().intrinsic_matrix_delivery_enabled);
    }

    #[test]
    fn test_teardown_then_reconfigure_attaches_fresh_surface() {
        let (mut m, ledger) = manager(vec![descriptor(0, CameraPosition::Front)], false);
        m.configure().unwrap();
        m.teardown();

        assert!(m.session().is_none());
        assert_eq!(m.state(), PipelineState::TornDown);
        assert_eq!(ledger.live(), 0);

        m.configure().unwrap();
        assert_eq!(ledger.created(), 2);
        assert_eq!(ledger.live(), 1);
        assert!(!m.session().unwrap().preview().unwrap().surface().is_released());
        assert_eq!(m.state(), PipelineState::Idle);
    }

    #[test]
    fn test_unspecified_camera_accepted_when_allowed() {
        let ledger = SurfaceLedger::default();
        let config = CaptureConfig {
            selector: DeviceSelector {
                allow_unspecified_position: true,
                ..DeviceSelector::default()
            },
            ..CaptureConfig::default()
        };
        let mut m = CaptureSessionManager::new(
            Box::new(StubProvider {
                devices: vec![descriptor(0, CameraPosition::Unspecified)],
                fail_open: false,
            }),
            Box::new(ledger),
            config,
        );
        m.configure().unwrap();
        // Not a front camera, so no implicit mirroring
        assert!(!m.session().unwrap().preview().unwrap().is_mirrored());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Settings {
            capture_fps: 15,
            mirror_preview: Some(false),
            always_discard_late_frames: false,
            ..Settings::default()
        };
        let config = CaptureConfig::from_settings(&settings);
        assert_eq!(config.format.fps, 15);
        assert_eq!(config.mirror, Some(false));
        assert!(!config.always_discard_late_frames);
    }

    #[test]
    fn test_default_settings_mirror_front_cameras_only() {
        let config = CaptureConfig::from_settings(&Settings::default());
        assert_eq!(config.mirror, None);

        let ledger = SurfaceLedger::default();
        let mut m = CaptureSessionManager::new(
            Box::new(StubProvider {
                devices: vec![descriptor(0, CameraPosition::Unspecified)],
                fail_open: false,
            }),
            Box::new(ledger),
            CaptureConfig {
                selector: DeviceSelector {
                    allow_unspecified_position: true,
                    ..DeviceSelector::default()
                },
                ..config
            },
        );
        m.configure().unwrap();
        assert!(!m.session().unwrap().preview().unwrap().is_mirrored());
    }
}
