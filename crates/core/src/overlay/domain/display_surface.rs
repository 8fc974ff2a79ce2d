use crate::overlay::domain::coordinate_mapper::{SurfaceSize, VideoGravity};
use crate::overlay::domain::overlay_shape::OverlayShape;
use crate::shared::frame::Frame;

/// A region of the screen showing the live preview with overlay shapes on
/// top.
///
/// Owned and mutated by the UI thread only, so no `Send` bound.
pub trait DisplaySurface {
    fn name(&self) -> &str;

    fn size(&self) -> SurfaceSize;

    /// Shows `frame` as the current preview image.
    fn present_frame(&mut self, frame: &Frame, gravity: VideoGravity, mirrored: bool);

    /// Removes every overlay shape.
    fn clear_shapes(&mut self);

    fn add_shape(&mut self, shape: OverlayShape);

    fn shapes(&self) -> &[OverlayShape];

    /// Detaches the surface from its container and frees its resources.
    /// Further draw calls are ignored.
    fn release(&mut self);

    fn is_released(&self) -> bool;

    /// The composed preview plus overlays, when the surface can render
    /// off-screen.
    fn snapshot(&self) -> Option<Frame> {
        None
    }
}

/// Creates display surfaces sized to their container.
pub trait SurfaceFactory {
    fn create(&mut self, name: &str, size: SurfaceSize) -> Box<dyn DisplaySurface>;
}
