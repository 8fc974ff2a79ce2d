use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to enumerate cameras: {0}")]
    Enumerate(String),
    #[error("failed to open camera {name}: {reason}")]
    Open { name: String, reason: String },
    #[error("camera stream error: {0}")]
    Stream(String),
    #[error("camera stream ended")]
    EndOfStream,
}

/// Which way a camera faces relative to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPosition {
    Front,
    Back,
    /// The platform does not report a position (typical for USB webcams).
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKind {
    WideAngle,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDescriptor {
    pub index: u32,
    pub name: String,
    pub position: CameraPosition,
    pub kind: CameraKind,
    pub supports_intrinsic_matrix_delivery: bool,
}

/// Requested capture format. Drivers may pick the nearest supported one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Chooses the capture device: front-facing and wide-angle by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelector {
    pub position: CameraPosition,
    pub kind: CameraKind,
    /// Pin a specific device; its position must still be acceptable.
    pub index: Option<u32>,
    /// Accept devices that do not report a position.
    pub allow_unspecified_position: bool,
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self {
            position: CameraPosition::Front,
            kind: CameraKind::WideAngle,
            index: None,
            allow_unspecified_position: false,
        }
    }
}

impl DeviceSelector {
    pub fn matches(&self, device: &CameraDescriptor) -> bool {
        if self.index.is_some_and(|i| i != device.index) {
            return false;
        }
        let position_ok = device.position == self.position
            || (self.allow_unspecified_position
                && device.position == CameraPosition::Unspecified);
        position_ok && device.kind == self.kind
    }

    /// First matching device, preferring an exact position match over an
    /// unspecified one.
    pub fn select<'d>(&self, devices: &'d [CameraDescriptor]) -> Option<&'d CameraDescriptor> {
        devices
            .iter()
            .filter(|d| self.matches(d))
            .min_by_key(|d| d.position != self.position)
    }
}

/// Enumerates and opens cameras.
pub trait CameraProvider {
    fn devices(&self) -> Result<Vec<CameraDescriptor>, CaptureError>;

    fn open(
        &self,
        device: &CameraDescriptor,
        format: CaptureFormat,
    ) -> Result<Box<dyn CameraDevice>, CaptureError>;
}

/// An opened camera producing frames in capture order.
pub trait CameraDevice: Send {
    fn descriptor(&self) -> &CameraDescriptor;

    /// Actual resolution negotiated with the driver.
    fn resolution(&self) -> (u32, u32);

    fn start_stream(&mut self) -> Result<(), CaptureError>;

    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    fn stop_stream(&mut self);
}
