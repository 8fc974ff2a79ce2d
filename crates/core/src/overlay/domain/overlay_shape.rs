use crate::shared::constants::{DEFAULT_LINE_WIDTH, DEFAULT_STROKE_COLOR};
use crate::shared::region::PixelRect;

/// Stroke and fill used to draw an overlay rectangle. Colors are RGBA.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub stroke_color: [u8; 4],
    pub line_width: f64,
    pub fill_color: Option<[u8; 4]>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_color: DEFAULT_STROKE_COLOR,
            line_width: DEFAULT_LINE_WIDTH,
            fill_color: None,
        }
    }
}

/// One drawable rectangle over the live preview, in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayShape {
    pub rect: PixelRect,
    pub style: OverlayStyle,
}

impl OverlayShape {
    pub fn new(rect: PixelRect, style: OverlayStyle) -> Self {
        Self { rect, style }
    }
}
