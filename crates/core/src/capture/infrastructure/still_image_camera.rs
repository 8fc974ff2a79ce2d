use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::domain::camera_device::{
    CameraDescriptor, CameraDevice, CameraKind, CameraPosition, CameraProvider, CaptureError,
    CaptureFormat,
};
use crate::shared::frame::Frame;

/// Presents a single still image as a front-facing camera.
///
/// Useful for running the full pipeline without camera hardware: the image
/// is decoded once and replayed at the requested frame rate.
pub struct StillImageCameraProvider {
    source: StillImageSource,
}

enum StillImageSource {
    File(PathBuf),
    Frame(Frame),
}

impl StillImageCameraProvider {
    pub fn from_path(path: &Path) -> Self {
        Self {
            source: StillImageSource::File(path.to_path_buf()),
        }
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self {
            source: StillImageSource::Frame(frame),
        }
    }

    fn descriptor(&self) -> CameraDescriptor {
        let name = match &self.source {
            StillImageSource::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            StillImageSource::Frame(_) => "in-memory frame".to_string(),
        };
        CameraDescriptor {
            index: 0,
            name,
            position: CameraPosition::Front,
            kind: CameraKind::WideAngle,
            supports_intrinsic_matrix_delivery: false,
        }
    }

    fn load(&self, descriptor: &CameraDescriptor) -> Result<Frame, CaptureError> {
        match &self.source {
            StillImageSource::Frame(frame) => Ok(frame.with_index(0)),
            StillImageSource::File(path) => {
                let img = image::open(path).map_err(|e| CaptureError::Open {
                    name: descriptor.name.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Frame::from_rgb_image(img.to_rgb8(), 0))
            }
        }
    }
}

impl CameraProvider for StillImageCameraProvider {
    fn devices(&self) -> Result<Vec<CameraDescriptor>, CaptureError> {
        Ok(vec![self.descriptor()])
    }

    fn open(
        &self,
        device: &CameraDescriptor,
        format: CaptureFormat,
    ) -> Result<Box<dyn CameraDevice>, CaptureError> {
        let frame = self.load(device)?;
        log::info!(
            "Opened still image camera {} ({}x{} @ {} fps)",
            device.name,
            frame.width(),
            frame.height(),
            format.fps
        );
        Ok(Box::new(StillImageCamera::new(device.clone(), frame, format.fps)))
    }
}

pub struct StillImageCamera {
    descriptor: CameraDescriptor,
    frame: Frame,
    interval: Option<Duration>,
    next_index: usize,
    last_emit: Option<Instant>,
    streaming: bool,
}

impl StillImageCamera {
    /// `fps == 0` emits frames as fast as they are pulled.
    pub fn new(descriptor: CameraDescriptor, frame: Frame, fps: u32) -> Self {
        Self {
            descriptor,
            frame,
            interval: (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64)),
            next_index: 0,
            last_emit: None,
            streaming: false,
        }
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last_emit) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl CameraDevice for StillImageCamera {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    fn resolution(&self) -> (u32, u32) {
        (self.frame.width(), self.frame.height())
    }

    fn start_stream(&mut self) -> Result<(), CaptureError> {
        self.streaming = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.streaming {
            return Err(CaptureError::Stream("stream not started".into()));
        }
        self.pace();
        let frame = self.frame.with_index(self.next_index);
        self.next_index += 1;
        Ok(frame)
    }

    fn stop_stream(&mut self) {
        self.streaming = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(fps: u32) -> CaptureFormat {
        CaptureFormat {
            width: 640,
            height: 480,
            fps,
        }
    }

    #[test]
    fn test_reports_single_front_wide_angle_device() {
        let provider = StillImageCameraProvider::from_frame(Frame::new(vec![0; 12], 2, 2, 3, 0));
        let devices = provider.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].position, CameraPosition::Front);
        assert_eq!(devices[0].kind, CameraKind::WideAngle);
    }

    #[test]
    fn test_frames_are_numbered_in_capture_order() {
        let provider = StillImageCameraProvider::from_frame(Frame::new(vec![5; 12], 2, 2, 3, 9));
        let device = provider.devices().unwrap().remove(0);
        let mut camera = provider.open(&device, format(0)).unwrap();
        camera.start_stream().unwrap();

        let indices: Vec<usize> = (0..3).map(|_| camera.next_frame().unwrap().index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(camera.resolution(), (2, 2));
    }

    #[test]
    fn test_next_frame_requires_started_stream() {
        let provider = StillImageCameraProvider::from_frame(Frame::new(vec![0; 3], 1, 1, 3, 0));
        let device = provider.devices().unwrap().remove(0);
        let mut camera = provider.open(&device, format(0)).unwrap();
        assert!(camera.next_frame().is_err());
    }

    #[test]
    fn test_loads_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        image::RgbImage::from_pixel(6, 4, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let provider = StillImageCameraProvider::from_path(&path);
        let device = provider.devices().unwrap().remove(0);
        assert_eq!(device.name, "face.png");

        let mut camera = provider.open(&device, format(0)).unwrap();
        camera.start_stream().unwrap();
        let frame = camera.next_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (6, 4));
        assert_eq!(&frame.data()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let provider = StillImageCameraProvider::from_path(Path::new("/nonexistent/face.png"));
        let device = provider.devices().unwrap().remove(0);
        assert!(matches!(
            provider.open(&device, format(30)),
            Err(CaptureError::Open { .. })
        ));
    }

    #[test]
    fn test_paces_frames_at_requested_rate() {
        let mut camera = StillImageCamera::new(
            StillImageCameraProvider::from_frame(Frame::new(vec![0; 3], 1, 1, 3, 0)).descriptor(),
            Frame::new(vec![0; 3], 1, 1, 3, 0),
            50,
        );
        camera.start_stream().unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            camera.next_frame().unwrap();
        }
        // Two intervals of 20ms between three frames
        assert!(start.elapsed() >= Duration::from_millis(38));
    }
}
