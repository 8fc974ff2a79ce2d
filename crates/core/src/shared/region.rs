/// A rectangle in normalized frame space: origin and size in `[0, 1]`,
/// top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    /// The rect covering the whole frame.
    pub const FULL: NormalizedRect = NormalizedRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a normalized rect from pixel corners, clamped to the frame.
    pub fn from_pixel_corners(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let fw = frame_width.max(1) as f64;
        let fh = frame_height.max(1) as f64;
        let nx1 = (x1 / fw).clamp(0.0, 1.0);
        let ny1 = (y1 / fh).clamp(0.0, 1.0);
        let nx2 = (x2 / fw).clamp(0.0, 1.0);
        let ny2 = (y2 / fh).clamp(0.0, 1.0);
        Self {
            x: nx1,
            y: ny1,
            width: (nx2 - nx1).max(0.0),
            height: (ny2 - ny1).max(0.0),
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &NormalizedRect) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.max_x().min(other.max_x());
        let iy2 = self.max_y().min(other.max_y());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

/// A face located in one frame. Transient: recomputed every frame and never
/// tracked across frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectedRegion {
    pub bounds: NormalizedRect,
    pub confidence: f64,
}

impl DetectedRegion {
    pub fn new(bounds: NormalizedRect, confidence: f64) -> Self {
        Self { bounds, confidence }
    }
}

/// A rectangle in display surface pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Intersection with `other`; an empty rect when they do not overlap.
    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.max_x().min(other.max_x());
        let y2 = self.max_y().min(other.max_y());
        PixelRect {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0.0),
            height: (y2 - y1).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical() {
        let a = NormalizedRect::new(0.1, 0.1, 0.5, 0.5);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 0.25 * 0.5, union 0.25 + 0.25 - 0.125
        let a = NormalizedRect::new(0.0, 0.0, 0.5, 0.5);
        let b = NormalizedRect::new(0.25, 0.0, 0.5, 0.5);
        assert_relative_eq!(a.iou(&b), 0.125 / 0.375);
    }

    #[rstest]
    #[case::disjoint(NormalizedRect::new(0.0, 0.0, 0.2, 0.2), NormalizedRect::new(0.5, 0.5, 0.2, 0.2))]
    #[case::touching(NormalizedRect::new(0.0, 0.0, 0.5, 0.5), NormalizedRect::new(0.5, 0.0, 0.5, 0.5))]
    #[case::zero_width(NormalizedRect::new(0.0, 0.0, 0.0, 0.5), NormalizedRect::new(0.0, 0.0, 0.5, 0.5))]
    fn test_iou_zero(#[case] a: NormalizedRect, #[case] b: NormalizedRect) {
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    // ── Pixel → normalized ───────────────────────────────────────────

    #[test]
    fn test_from_pixel_corners_full_frame() {
        let r = NormalizedRect::from_pixel_corners(0.0, 0.0, 640.0, 480.0, 640, 480);
        assert_eq!(r, NormalizedRect::FULL);
    }

    #[test]
    fn test_from_pixel_corners_clamps_outside_frame() {
        let r = NormalizedRect::from_pixel_corners(-64.0, 240.0, 320.0, 960.0, 640, 480);
        assert_relative_eq!(r.x, 0.0);
        assert_relative_eq!(r.y, 0.5);
        assert_relative_eq!(r.width, 0.5);
        assert_relative_eq!(r.height, 0.5);
    }

    #[test]
    fn test_from_pixel_corners_inverted_is_empty() {
        let r = NormalizedRect::from_pixel_corners(100.0, 100.0, 50.0, 50.0, 200, 200);
        assert_relative_eq!(r.area(), 0.0);
    }

    // ── PixelRect ────────────────────────────────────────────────────

    #[test]
    fn test_intersect_overlapping() {
        let a = PixelRect::new(0.0, 0.0, 100.0, 100.0);
        let b = PixelRect::new(50.0, -20.0, 100.0, 60.0);
        assert_eq!(a.intersect(&b), PixelRect::new(50.0, 0.0, 50.0, 40.0));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = PixelRect::new(0.0, 0.0, 10.0, 10.0);
        let b = PixelRect::new(20.0, 20.0, 10.0, 10.0);
        assert!(a.intersect(&b).is_empty());
    }
}
