/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Letterboxes the frame, runs inference, applies NMS and reports each face
/// as a normalized rect in frame space.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::region::{DetectedRegion, NormalizedRect};

use super::execution_provider::preferred_execution_providers;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (NCHW),
    /// falling back to 640 when the shape is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face model {} ({input_size}x{input_size}, confidence >= {confidence})",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>> {
        if frame.channels() < 3 || frame.width() == 0 || frame.height() == 0 {
            return Err(format!(
                "unsupported frame {}x{}x{}",
                frame.width(),
                frame.height(),
                frame.channels()
            )
            .into());
        }

        let (input_tensor, letterbox) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let candidates = parse_detections(data, &shape, self.confidence, &letterbox, frame)?;
        Ok(nms(candidates, NMS_IOU_THRESH))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Placement of the frame inside the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    /// Maps a model-space box `(cx, cy, w, h)` back to frame pixel corners.
    fn to_frame_corners(&self, cx: f64, cy: f64, w: f64, h: f64) -> (f64, f64, f64, f64) {
        let px = self.pad_x as f64;
        let py = self.pad_y as f64;
        (
            ((cx - w / 2.0) - px) / self.scale,
            ((cy - h / 2.0) - py) / self.scale,
            ((cx + w / 2.0) - px) / self.scale,
            ((cy + h / 2.0) - py) / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size` as an NCHW
/// float32 tensor.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114/255 gray padding, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Decodes raw YOLO rows `[cx, cy, w, h, conf, ...]` above `confidence`.
///
/// The output is either `[1, features, detections]` (transposed) or
/// `[1, detections, features]`; the smaller axis is taken as features.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    letterbox: &Letterbox,
    frame: &Frame,
) -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(format!("YOLO output too small for shape {shape:?}").into());
    }

    let value = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data[idx] as f64
    };

    let mut regions = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (x1, y1, x2, y2) =
            letterbox.to_frame_corners(value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let bounds =
            NormalizedRect::from_pixel_corners(x1, y1, x2, y2, frame.width(), frame.height());
        if bounds.area() > 0.0 {
            regions.push(DetectedRegion::new(bounds, conf));
        }
    }
    Ok(regions)
}

/// Greedy NMS: highest confidence first, suppress overlapping boxes.
fn nms(mut dets: Vec<DetectedRegion>, iou_thresh: f64) -> Vec<DetectedRegion> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<DetectedRegion> = Vec::with_capacity(dets.len());
    for det in dets {
        if keep
            .iter()
            .all(|kept| kept.bounds.iou(&det.bounds) <= iou_thresh)
        {
            keep.push(det);
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn region(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> DetectedRegion {
        DetectedRegion::new(NormalizedRect::new(x, y, w, h), confidence)
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // scale = min(640/200, 640/100) = 3.2 → 640x320, pad_y = 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, lb) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2, epsilon = 1e-9);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, lb) = letterbox(&frame, 640);

        let y = lb.pad_y as usize + 1;
        let x = lb.pad_x as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, x]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 0.01);
    }

    #[test]
    fn test_letterbox_maps_back_to_frame() {
        let lb = Letterbox {
            scale: 3.2,
            pad_x: 0,
            pad_y: 160,
        };
        // Centre of the model input is the centre of a 200x100 frame
        let (x1, y1, x2, y2) = lb.to_frame_corners(320.0, 320.0, 64.0, 32.0);
        assert_relative_eq!(x1, 90.0, epsilon = 1e-9);
        assert_relative_eq!(y1, 45.0, epsilon = 1e-9);
        assert_relative_eq!(x2, 110.0, epsilon = 1e-9);
        assert_relative_eq!(y2, 55.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_row_major_output() {
        let frame = Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, 0);
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        };
        // Six rows of five features; only the first clears the threshold
        let mut data = vec![0.0f32; 30];
        data[..5].copy_from_slice(&[50.0, 50.0, 20.0, 40.0, 0.9]);
        data[5..10].copy_from_slice(&[10.0, 10.0, 4.0, 4.0, 0.1]);
        let regions = parse_detections(&data, &[1, 6, 5], 0.5, &lb, &frame).unwrap();

        assert_eq!(regions.len(), 1);
        let b = regions[0].bounds;
        assert_relative_eq!(b.x, 0.4, epsilon = 1e-6);
        assert_relative_eq!(b.y, 0.3, epsilon = 1e-6);
        assert_relative_eq!(b.width, 0.2, epsilon = 1e-6);
        assert_relative_eq!(b.height, 0.4, epsilon = 1e-6);
        assert_relative_eq!(regions[0].confidence, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_parse_transposed_output() {
        let frame = Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, 0);
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        };
        // [1, 5 features, 6 detections]; only detection 2 is confident
        let mut data = vec![0.0f32; 30];
        for (feat, v) in [50.0, 50.0, 10.0, 10.0, 0.8].into_iter().enumerate() {
            data[feat * 6 + 2] = v;
        }
        let regions = parse_detections(&data, &[1, 5, 6], 0.5, &lb, &frame).unwrap();
        assert_eq!(regions.len(), 1);
        assert_relative_eq!(regions[0].bounds.x, 0.45, epsilon = 1e-6);
    }

    #[test]
    fn test_parse_clamps_boxes_to_frame() {
        let frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3, 0);
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        };
        let mut data = vec![0.0f32; 30];
        data[..5].copy_from_slice(&[0.0, 0.0, 8.0, 8.0, 0.9]);
        let regions = parse_detections(&data, &[1, 6, 5], 0.5, &lb, &frame).unwrap();
        assert_eq!(regions.len(), 1);
        let b = regions[0].bounds;
        assert_relative_eq!(b.x, 0.0);
        assert_relative_eq!(b.width, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, 0);
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        };
        assert!(parse_detections(&[0.0; 4], &[1, 4], 0.5, &lb, &frame).is_err());
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let kept = nms(
            vec![
                region(0.0, 0.0, 0.5, 0.5, 0.8),
                region(0.02, 0.02, 0.5, 0.5, 0.9),
            ],
            0.3,
        );
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_non_overlapping() {
        let kept = nms(
            vec![
                region(0.0, 0.0, 0.2, 0.2, 0.9),
                region(0.6, 0.6, 0.2, 0.2, 0.8),
            ],
            0.3,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(nms(Vec::new(), 0.3).is_empty());
    }
}
