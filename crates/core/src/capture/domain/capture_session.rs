use crate::capture::domain::camera_device::{CameraDevice, CaptureError};
use crate::capture::domain::frame_sink::LateFramePolicy;
use crate::overlay::domain::coordinate_mapper::VideoGravity;
use crate::overlay::domain::display_surface::DisplaySurface;

/// Frame output attached to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDataOutput {
    pub always_discard_late_frames: bool,
    pub connection_enabled: bool,
    pub intrinsic_matrix_delivery_enabled: bool,
}

impl VideoDataOutput {
    pub fn new(always_discard_late_frames: bool) -> Self {
        Self {
            always_discard_late_frames,
            connection_enabled: true,
            intrinsic_matrix_delivery_enabled: false,
        }
    }

    pub fn late_frame_policy(&self) -> LateFramePolicy {
        LateFramePolicy::from_discard_flag(self.always_discard_late_frames)
    }
}

impl Default for VideoDataOutput {
    fn default() -> Self {
        Self::new(true)
    }
}

/// The live preview bound to a session.
pub struct PreviewLayer {
    surface: Box<dyn DisplaySurface>,
    gravity: VideoGravity,
    mirrored: bool,
}

impl PreviewLayer {
    pub fn new(surface: Box<dyn DisplaySurface>, gravity: VideoGravity, mirrored: bool) -> Self {
        Self {
            surface,
            gravity,
            mirrored,
        }
    }

    pub fn gravity(&self) -> VideoGravity {
        self.gravity
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn surface(&self) -> &dyn DisplaySurface {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> &mut dyn DisplaySurface {
        self.surface.as_mut()
    }

    fn release(mut self) {
        log::debug!("Releasing preview surface {}", self.surface.name());
        self.surface.release();
    }
}

/// Coordinates one camera input, one frame output and one preview.
///
/// A session accepts at most one of each; later attempts are refused, which
/// keeps configuration idempotent.
#[derive(Default)]
pub struct CaptureSession {
    input: Option<Box<dyn CameraDevice>>,
    output: Option<VideoDataOutput>,
    preview: Option<PreviewLayer>,
    running: bool,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_add_input(&self) -> bool {
        self.input.is_none()
    }

    /// Attaches `device`, handing it back if the session refuses it.
    pub fn add_input(
        &mut self,
        device: Box<dyn CameraDevice>,
    ) -> Result<(), Box<dyn CameraDevice>> {
        if !self.can_add_input() {
            return Err(device);
        }
        self.input = Some(device);
        Ok(())
    }

    pub fn can_add_output(&self) -> bool {
        self.output.is_none()
    }

    pub fn add_output(&mut self, output: VideoDataOutput) -> Result<(), VideoDataOutput> {
        if !self.can_add_output() {
            return Err(output);
        }
        self.output = Some(output);
        Ok(())
    }

    /// Binds a preview, replacing (and releasing) any previous one.
    pub fn attach_preview(&mut self, preview: PreviewLayer) {
        self.release_preview();
        self.preview = Some(preview);
    }

    pub fn release_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            preview.release();
        }
    }

    pub fn input(&self) -> Option<&dyn CameraDevice> {
        self.input.as_deref()
    }

    pub fn output(&self) -> Option<&VideoDataOutput> {
        self.output.as_ref()
    }

    pub fn output_mut(&mut self) -> Option<&mut VideoDataOutput> {
        self.output.as_mut()
    }

    pub fn preview(&self) -> Option<&PreviewLayer> {
        self.preview.as_ref()
    }

    pub fn preview_mut(&mut self) -> Option<&mut PreviewLayer> {
        self.preview.as_mut()
    }

    pub fn input_count(&self) -> usize {
        usize::from(self.input.is_some())
    }

    pub fn output_count(&self) -> usize {
        usize::from(self.output.is_some())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts the camera stream. No-op when already running.
    pub fn start_running(&mut self) -> Result<(), CaptureError> {
        if self.running {
            return Ok(());
        }
        let device = self
            .input
            .as_mut()
            .ok_or_else(|| CaptureError::Stream("session has no input".into()))?;
        device.start_stream()?;
        self.running = true;
        Ok(())
    }

    pub fn stop_running(&mut self) {
        if !self.running {
            return;
        }
        if let Some(device) = self.input.as_mut() {
            device.stop_stream();
        }
        self.running = false;
    }

    /// Splits the session into the parts the capture and UI threads need.
    pub fn parts_mut(
        &mut self,
    ) -> Option<(&mut dyn CameraDevice, &VideoDataOutput, &mut PreviewLayer)> {
        match (&mut self.input, &self.output, &mut self.preview) {
            (Some(input), Some(output), Some(preview)) => {
                Some((input.as_mut(), output, preview))
            }
            _ => None,
        }
    }

    /// Stops the stream and releases every attached component.
    pub fn teardown(&mut self) {
        self.stop_running();
        self.release_preview();
        self.output = None;
        self.input = None;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::test_support::FakeCamera;
    use super::*;
    use crate::overlay::domain::coordinate_mapper::SurfaceSize;
    use crate::overlay::infrastructure::image_surface::ImageSurface;

    fn preview() -> PreviewLayer {
        PreviewLayer::new(
            Box::new(ImageSurface::new("CameraPreview", SurfaceSize::new(4, 4))),
            VideoGravity::ResizeAspectFill,
            true,
        )
    }

    #[test]
    fn test_second_input_is_refused() {
        let mut session = CaptureSession::new();
        assert!(session.add_input(Box::new(FakeCamera::new(0))).is_ok());
        assert!(!session.can_add_input());
        assert!(session.add_input(Box::new(FakeCamera::new(0))).is_err());
        assert_eq!(session.input_count(), 1);
    }

    #[test]
    fn test_second_output_is_refused() {
        let mut session = CaptureSession::new();
        assert!(session.add_output(VideoDataOutput::default()).is_ok());
        assert!(session.add_output(VideoDataOutput::new(false)).is_err());
        assert_eq!(session.output_count(), 1);
        assert!(session.output().unwrap().always_discard_late_frames);
    }

    #[test]
    fn test_default_output_discards_late_frames() {
        let output = VideoDataOutput::default();
        assert_eq!(output.late_frame_policy(), LateFramePolicy::Discard);
        assert!(output.connection_enabled);
        assert!(!output.intrinsic_matrix_delivery_enabled);
    }

    #[test]
    fn test_start_without_input_fails() {
        let mut session = CaptureSession::new();
        assert!(session.start_running().is_err());
        assert!(!session.is_running());
    }

    #[test]
    fn test_start_and_stop_drive_the_camera_stream() {
        let camera = FakeCamera::new(0);
        let streaming = camera.streaming.clone();
        let mut session = CaptureSession::new();
        session.add_input(Box::new(camera)).ok().unwrap();

        session.start_running().unwrap();
        session.start_running().unwrap();
        assert_eq!(streaming.load(Ordering::SeqCst), 1);

        session.stop_running();
        assert_eq!(streaming.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parts_require_all_components() {
        let mut session = CaptureSession::new();
        session.add_input(Box::new(FakeCamera::new(0))).ok().unwrap();
        session.add_output(VideoDataOutput::default()).unwrap();
        assert!(session.parts_mut().is_none());

        session.attach_preview(preview());
        let (camera, output, layer) = session.parts_mut().unwrap();
        assert_eq!(camera.resolution(), (8, 4));
        assert!(output.always_discard_late_frames);
        assert!(layer.is_mirrored());
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut session = CaptureSession::new();
        session.add_input(Box::new(FakeCamera::new(0))).ok().unwrap();
        session.add_output(VideoDataOutput::default()).unwrap();
        session.attach_preview(preview());

        session.teardown();
        assert!(session.input().is_none());
        assert!(session.output().is_none());
        assert!(session.preview().is_none());
        assert!(session.can_add_input());
    }
}
