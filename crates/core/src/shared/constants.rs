pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Name given to the live preview surface.
pub const PREVIEW_LAYER_NAME: &str = "CameraPreview";

pub const DEFAULT_CAPTURE_WIDTH: u32 = 1280;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 720;
pub const DEFAULT_CAPTURE_FPS: u32 = 30;

pub const DEFAULT_SURFACE_WIDTH: u32 = 390;
pub const DEFAULT_SURFACE_HEIGHT: u32 = 844;

/// Overlay stroke color (RGBA).
pub const DEFAULT_STROKE_COLOR: [u8; 4] = [255, 214, 10, 255];
pub const DEFAULT_LINE_WIDTH: f64 = 2.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
