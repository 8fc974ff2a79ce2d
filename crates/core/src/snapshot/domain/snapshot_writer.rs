use std::path::Path;

use crate::shared::frame::Frame;

/// Persists a composed preview (frame plus overlay) as an image file.
pub trait SnapshotWriter: Send {
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
