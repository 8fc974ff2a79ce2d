use crate::capture::domain::capture_session::PreviewLayer;
use crate::overlay::domain::coordinate_mapper::CoordinateMapper;
use crate::overlay::domain::display_surface::DisplaySurface;
use crate::overlay::domain::overlay_shape::{OverlayShape, OverlayStyle};
use crate::shared::frame::Frame;
use crate::shared::region::DetectedRegion;

/// Result of one completed detection pass, ready to be drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayUpdate {
    pub frame_index: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    pub regions: Vec<DetectedRegion>,
}

/// Sole writer of the overlay shapes on a preview layer.
///
/// Every update replaces the previous set wholesale: shapes are never
/// diffed or carried across frames.
pub struct OverlayPresenter<'a> {
    preview: &'a mut PreviewLayer,
    style: OverlayStyle,
    last_frame_index: Option<usize>,
}

impl<'a> OverlayPresenter<'a> {
    pub fn new(preview: &'a mut PreviewLayer, style: OverlayStyle) -> Self {
        Self {
            preview,
            style,
            last_frame_index: None,
        }
    }

    /// Shows a live frame under the current overlay.
    pub fn present_frame(&mut self, frame: &Frame) {
        let gravity = self.preview.gravity();
        let mirrored = self.preview.is_mirrored();
        self.preview
            .surface_mut()
            .present_frame(frame, gravity, mirrored);
    }

    /// Clears every shape and adds exactly one per region. Returns the
    /// number of shapes added. A region cropped out of view keeps an empty
    /// rect, which the surface renders as nothing.
    pub fn apply(&mut self, update: &OverlayUpdate) -> usize {
        let mapper = CoordinateMapper::new(
            update.frame_width,
            update.frame_height,
            self.preview.surface().size(),
            self.preview.gravity(),
            self.preview.is_mirrored(),
        );

        let surface = self.preview.surface_mut();
        surface.clear_shapes();

        for region in &update.regions {
            let rect = mapper.to_surface(&region.bounds);
            if rect.is_empty() {
                log::debug!(
                    "Frame {}: region {:?} is outside the visible area",
                    update.frame_index,
                    region.bounds
                );
            }
            surface.add_shape(OverlayShape::new(rect, self.style));
        }

        self.last_frame_index = Some(update.frame_index);
        update.regions.len()
    }

    /// Index of the frame whose shapes are currently visible.
    pub fn last_frame_index(&self) -> Option<usize> {
        self.last_frame_index
    }

    pub fn surface(&self) -> &dyn DisplaySurface {
        self.preview.surface()
    }

    pub fn visible_shapes(&self) -> &[OverlayShape] {
        self.preview.surface().shapes()
    }

    pub fn snapshot(&self) -> Option<Frame> {
        self.preview.surface().snapshot()
    }
}
