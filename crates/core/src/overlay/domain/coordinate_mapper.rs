use serde::{Deserialize, Serialize};

use crate::shared::region::{NormalizedRect, PixelRect};

/// How video content is laid out inside the preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoGravity {
    /// Stretch to the surface bounds.
    Resize,
    /// Scale to fit inside the bounds, letterboxing the remainder.
    ResizeAspect,
    /// Scale to cover the bounds, cropping the overflow.
    ResizeAspectFill,
}

/// Size of a display surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }
}

/// Converts normalized frame coordinates into surface pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    surface: SurfaceSize,
    content: PixelRect,
    mirrored: bool,
}

impl CoordinateMapper {
    pub fn new(
        frame_width: u32,
        frame_height: u32,
        surface: SurfaceSize,
        gravity: VideoGravity,
        mirrored: bool,
    ) -> Self {
        Self {
            surface,
            content: content_rect(frame_width, frame_height, surface, gravity),
            mirrored,
        }
    }

    /// Where the full video frame lands on the surface (may overflow it).
    pub fn content_rect(&self) -> PixelRect {
        self.content
    }

    /// Maps `rect` into surface pixels, clipped to the surface bounds.
    pub fn to_surface(&self, rect: &NormalizedRect) -> PixelRect {
        let nx = if self.mirrored {
            1.0 - rect.max_x()
        } else {
            rect.x
        };
        let mapped = PixelRect::new(
            self.content.x + nx * self.content.width,
            self.content.y + rect.y * self.content.height,
            rect.width * self.content.width,
            rect.height * self.content.height,
        );
        mapped.intersect(&self.surface.bounds())
    }
}

fn content_rect(
    frame_width: u32,
    frame_height: u32,
    surface: SurfaceSize,
    gravity: VideoGravity,
) -> PixelRect {
    let sw = surface.width as f64;
    let sh = surface.height as f64;
    if frame_width == 0 || frame_height == 0 {
        return surface.bounds();
    }
    let fw = frame_width as f64;
    let fh = frame_height as f64;

    let scale = match gravity {
        VideoGravity::Resize => return surface.bounds(),
        VideoGravity::ResizeAspect => (sw / fw).min(sh / fh),
        VideoGravity::ResizeAspectFill => (sw / fw).max(sh / fh),
    };
    let w = fw * scale;
    let h = fh * scale;
    PixelRect::new((sw - w) / 2.0, (sh - h) / 2.0, w, h)
}
