/// Off-screen display surface rendered with the `image` and `imageproc`
/// crates.
///
/// Keeps the latest preview image on a black canvas and composes overlay
/// rectangles on demand, so a headless run can still show what the live
/// preview would look like.
use image::{imageops, DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, Blend};
use imageproc::rect::Rect;

use crate::overlay::domain::coordinate_mapper::{CoordinateMapper, SurfaceSize, VideoGravity};
use crate::overlay::domain::display_surface::{DisplaySurface, SurfaceFactory};
use crate::overlay::domain::overlay_shape::OverlayShape;
use crate::shared::frame::Frame;
use crate::shared::region::PixelRect;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

pub struct ImageSurface {
    name: String,
    size: SurfaceSize,
    canvas: RgbImage,
    shapes: Vec<OverlayShape>,
    frames_presented: usize,
    released: bool,
}

impl ImageSurface {
    pub fn new(name: &str, size: SurfaceSize) -> Self {
        Self {
            name: name.to_string(),
            size,
            canvas: RgbImage::from_pixel(size.width, size.height, BACKGROUND),
            shapes: Vec::new(),
            frames_presented: 0,
            released: false,
        }
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented
    }

    fn compose(&self) -> RgbImage {
        let mut composed = Blend(DynamicImage::ImageRgb8(self.canvas.clone()).to_rgba8());
        for shape in &self.shapes {
            draw_shape(&mut composed, shape);
        }
        DynamicImage::ImageRgba8(composed.0).to_rgb8()
    }
}

impl DisplaySurface for ImageSurface {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn present_frame(&mut self, frame: &Frame, gravity: VideoGravity, mirrored: bool) {
        if self.released {
            return;
        }
        let Some(source) = frame.to_rgb_image() else {
            log::warn!(
                "Surface {} cannot present a {}-channel frame",
                self.name,
                frame.channels()
            );
            return;
        };

        let mapper = CoordinateMapper::new(frame.width(), frame.height(), self.size, gravity, mirrored);
        let content = mapper.content_rect();
        let w = content.width.round().max(1.0) as u32;
        let h = content.height.round().max(1.0) as u32;

        let mut scaled = imageops::resize(&source, w, h, imageops::FilterType::Triangle);
        if mirrored {
            imageops::flip_horizontal_in_place(&mut scaled);
        }

        self.canvas = RgbImage::from_pixel(self.size.width, self.size.height, BACKGROUND);
        imageops::overlay(
            &mut self.canvas,
            &scaled,
            content.x.round() as i64,
            content.y.round() as i64,
        );
        self.frames_presented += 1;
    }

    fn clear_shapes(&mut self) {
        self.shapes.clear();
    }

    fn add_shape(&mut self, shape: OverlayShape) {
        if !self.released {
            self.shapes.push(shape);
        }
    }

    fn shapes(&self) -> &[OverlayShape] {
        &self.shapes
    }

    fn release(&mut self) {
        self.shapes = Vec::new();
        self.canvas = RgbImage::new(0, 0);
        self.released = true;
    }

    fn is_released(&self) -> bool {
        self.released
    }

    fn snapshot(&self) -> Option<Frame> {
        if self.released {
            return None;
        }
        Some(Frame::from_rgb_image(self.compose(), self.frames_presented))
    }
}

/// Creates [`ImageSurface`]s.
#[derive(Default)]
pub struct ImageSurfaceFactory;

impl SurfaceFactory for ImageSurfaceFactory {
    fn create(&mut self, name: &str, size: SurfaceSize) -> Box<dyn DisplaySurface> {
        Box::new(ImageSurface::new(name, size))
    }
}

fn draw_shape(canvas: &mut Blend<RgbaImage>, shape: &OverlayShape) {
    let Some(rect) = to_imageproc_rect(&shape.rect) else {
        return;
    };

    if let Some(fill) = shape.style.fill_color {
        draw_filled_rect_mut(canvas, rect, Rgba(fill));
    }

    // Stroke grows inward so clipped boxes at the surface edge stay visible
    let stroke = Rgba(shape.style.stroke_color);
    let thickness = shape.style.line_width.round().max(1.0) as u32;
    for inset in 0..thickness {
        let w = rect.width().saturating_sub(2 * inset);
        let h = rect.height().saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let ring = Rect::at(rect.left() + inset as i32, rect.top() + inset as i32).of_size(w, h);
        draw_hollow_rect_mut(canvas, ring, stroke);
    }
}

fn to_imageproc_rect(rect: &PixelRect) -> Option<Rect> {
    let w = rect.width.round();
    let h = rect.height.round();
    if w < 1.0 || h < 1.0 {
        return None;
    }
    Some(Rect::at(rect.x.round() as i32, rect.y.round() as i32).of_size(w as u32, h as u32))
}
