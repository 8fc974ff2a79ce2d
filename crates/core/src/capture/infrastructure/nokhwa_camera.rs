/// Native webcams via `nokhwa`.
///
/// Desktop backends do not report which way a camera faces, so the
/// position is inferred from the device name.
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;

use crate::capture::domain::camera_device::{
    CameraDescriptor, CameraDevice, CameraKind, CameraPosition, CameraProvider, CaptureError,
    CaptureFormat,
};
use crate::shared::frame::Frame;

const FRONT_HINTS: &[&str] = &["front", "facetime", "integrated", "built-in", "user"];
const BACK_HINTS: &[&str] = &["back", "rear", "environment", "world"];
const NON_WIDE_HINTS: &[&str] = &["ultra wide", "ultrawide", "telephoto", "depth", "infrared", " ir "];

#[derive(Default)]
pub struct NokhwaCameraProvider;

impl NokhwaCameraProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CameraProvider for NokhwaCameraProvider {
    fn devices(&self) -> Result<Vec<CameraDescriptor>, CaptureError> {
        let infos = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| CaptureError::Enumerate(e.to_string()))?;

        Ok(infos
            .iter()
            .enumerate()
            .map(|(i, info)| {
                let name = info.human_name();
                let index = match info.index() {
                    CameraIndex::Index(idx) => *idx,
                    CameraIndex::String(_) => i as u32,
                };
                CameraDescriptor {
                    index,
                    position: infer_position(&name),
                    kind: infer_kind(&name),
                    supports_intrinsic_matrix_delivery: false,
                    name,
                }
            })
            .collect())
    }

    fn open(
        &self,
        device: &CameraDescriptor,
        format: CaptureFormat,
    ) -> Result<Box<dyn CameraDevice>, CaptureError> {
        let open_err = |e: nokhwa::NokhwaError| CaptureError::Open {
            name: device.name.clone(),
            reason: e.to_string(),
        };

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(format.width, format.height),
                FrameFormat::MJPEG,
                format.fps,
            ),
        ));
        let camera = Camera::new(CameraIndex::Index(device.index), requested).map_err(open_err)?;

        let resolution = camera.resolution();
        log::info!(
            "Opened camera {} ({}): {}x{} @ {} fps",
            device.index,
            device.name,
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );

        Ok(Box::new(NokhwaCamera {
            camera,
            descriptor: device.clone(),
            next_index: 0,
        }))
    }
}

pub struct NokhwaCamera {
    camera: Camera,
    descriptor: CameraDescriptor,
    next_index: usize,
}

// Safety: a NokhwaCamera is only ever driven from one thread at a time (the
// capture thread); the backend handles inside are never shared.
unsafe impl Send for NokhwaCamera {}

impl CameraDevice for NokhwaCamera {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    fn resolution(&self) -> (u32, u32) {
        let r = self.camera.resolution();
        (r.width(), r.height())
    }

    fn start_stream(&mut self) -> Result<(), CaptureError> {
        self.camera
            .open_stream()
            .map_err(|e| CaptureError::Stream(e.to_string()))
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let frame = Frame::new(decoded.to_vec(), width, height, 3, self.next_index);
        self.next_index += 1;
        Ok(frame)
    }

    fn stop_stream(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera {}: {e}", self.descriptor.index);
        }
    }
}

fn infer_position(name: &str) -> CameraPosition {
    let lower = name.to_lowercase();
    if BACK_HINTS.iter().any(|h| lower.contains(h)) {
        CameraPosition::Back
    } else if FRONT_HINTS.iter().any(|h| lower.contains(h)) {
        CameraPosition::Front
    } else {
        CameraPosition::Unspecified
    }
}

fn infer_kind(name: &str) -> CameraKind {
    let padded = format!(" {} ", name.to_lowercase());
    if NON_WIDE_HINTS.iter().any(|h| padded.contains(h)) {
        CameraKind::Other
    } else {
        CameraKind::WideAngle
    }
}
