use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::shared::frame::Frame;
use crate::snapshot::domain::snapshot_writer::SnapshotWriter;

/// Writes snapshots with the `image` crate; the format follows the file
/// extension.
#[derive(Default)]
pub struct PngSnapshotWriter;

impl PngSnapshotWriter {
    pub fn new() -> Self {
        Self
    }

    /// `<dir>/snapshot_000042.png`
    pub fn path_for(dir: &Path, frame_index: usize) -> PathBuf {
        dir.join(format!("snapshot_{frame_index:06}.png"))
    }
}

impl SnapshotWriter for PngSnapshotWriter {
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (w, h, data) = (frame.width(), frame.height(), frame.data().to_vec());
        let img = match frame.channels() {
            3 => DynamicImage::ImageRgb8(
                RgbImage::from_raw(w, h, data).ok_or("Failed to create image from frame data")?,
            ),
            4 => DynamicImage::ImageRgba8(
                RgbaImage::from_raw(w, h, data).ok_or("Failed to create image from frame data")?,
            ),
            n => return Err(format!("Unsupported channel count {n}").into()),
        };

        let img = match size {
            Some((w, h)) => img.resize_exact(w, h, image::imageops::FilterType::Triangle),
            None => img,
        };

        img.save(path)?;
        log::debug!("Wrote snapshot {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        PngSnapshotWriter::new()
            .write(&path, &make_frame(20, 10, [1, 2, 3]), None)
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_roundtrip_preserves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        PngSnapshotWriter::new()
            .write(&path, &make_frame(5, 5, [50, 100, 200]), None)
            .unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (5, 5));
        assert_eq!(img.get_pixel(4, 4).0, [50, 100, 200]);
    }

    #[test]
    fn test_write_with_resize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thumb.png");
        PngSnapshotWriter::new()
            .write(&path, &make_frame(200, 100, [9, 9, 9]), Some((64, 32)))
            .unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 64);
    }

    #[test]
    fn test_rejects_unsupported_channels() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::new(vec![0; 4], 2, 2, 1, 0);
        assert!(PngSnapshotWriter::new()
            .write(&dir.path().join("gray.png"), &frame, None)
            .is_err());
    }

    #[test]
    fn test_path_for_pads_index() {
        assert_eq!(
            PngSnapshotWriter::path_for(Path::new("/tmp/s"), 42),
            PathBuf::from("/tmp/s/snapshot_000042.png")
        );
    }
}
