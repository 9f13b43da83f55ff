// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns an image file into the pixel layout the model expects.
//
// Steps (applied in order):
//   1. Decode the file (jpg, png, bmp, gif)
//   2. Convert to 3-channel RGB (NEU-DET images are grayscale)
//   3. Resize to exactly `size` x `size` with bilinear filtering
//   4. Rescale: every channel value v becomes v / 255
//   5. Reorder from HWC (how `image` stores pixels) to CHW
//      (how convolution layers read them)
//
// Steps 1-3 run once when the dataset is built and produce u8
// pixels; steps 4-5 run in the batcher so a decoded dataset stays
// four times smaller than its f32 form.
//
// Reference: image crate documentation

use anyhow::{Context, Result};
use image::imageops::FilterType;
use std::path::Path;

/// Linear pixel rescaling applied to both splits
pub const RESCALE: f32 = 1.0 / 255.0;

/// Number of colour channels fed to the backbone
pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    /// Output height and width in pixels
    size: u32,
}

impl ImagePreprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Number of u8 values in one decoded image
    pub fn pixel_count(&self) -> usize {
        self.size() * self.size() * CHANNELS
    }

    /// Decode and resize an image file into HWC RGB bytes.
    pub fn load(&self, path: &Path) -> Result<Vec<u8>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?;

        let img = if img.width() == self.size && img.height() == self.size {
            img
        } else {
            img.resize_exact(self.size, self.size, FilterType::Triangle)
        };

        Ok(img.to_rgb8().into_raw())
    }

    /// Rescale HWC u8 pixels into CHW f32 values in [0, 1].
    pub fn rescale(&self, pixels: &[u8]) -> Vec<f32> {
        let plane = self.size() * self.size();
        let mut out = vec![0.0f32; plane * CHANNELS];

        for (i, px) in pixels.chunks_exact(CHANNELS).enumerate() {
            for (c, &v) in px.iter().enumerate() {
                out[c * plane + i] = v as f32 * RESCALE;
            }
        }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_load_resizes_and_expands_to_rgb() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gray.png");
        GrayImage::from_pixel(10, 6, Luma([128u8])).save(&path).unwrap();

        let pre    = ImagePreprocessor::new(4);
        let pixels = pre.load(&path).unwrap();
        assert_eq!(pixels.len(), pre.pixel_count());
        assert_eq!(pixels.len(), 4 * 4 * 3);
        // Gray stays gray across all three channels
        assert!(pixels.chunks_exact(3).all(|p| p[0] == p[1] && p[1] == p[2]));
    }

    #[test]
    fn test_rescale_range_and_layout() {
        let pre = ImagePreprocessor::new(1);
        // One pixel, HWC: r=0, g=255, b=51
        let out = pre.rescale(&[0, 255, 51]);
        let expected = [0.0f32, 1.0, 0.2];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} != {want}");
        }
    }

    #[test]
    fn test_rescale_is_channel_major() {
        let pre = ImagePreprocessor::new(2);
        let pixels: Vec<u8> = [[255, 0, 0]; 4].concat();
        let out = pre.rescale(&pixels);
        // First plane is red, the other two are empty
        assert!(out[..4].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(out[4..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_undecodable_file_fails() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(ImagePreprocessor::new(4).load(&path).is_err());
    }
}
