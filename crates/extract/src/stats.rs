use image::DynamicImage;
use thiserror::Error;

use crate::hash;

/// Longest pixel-buffer prefix any synthetic profile hashes.
pub const MAX_HASH_PREFIX: usize = 10_000;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// The handful of image properties the synthetic generator works from.
#[derive(Debug, Clone)]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    /// Length of the decoded pixel buffer in bytes.
    pub pixel_bytes: usize,
    /// Mean over every byte of the pixel buffer, all channels included.
    pub brightness: f64,
    /// Mean red, green and blue for colour images; `None` for grayscale.
    pub channel_means: Option<[f64; 3]>,
    prefix: Vec<u8>,
}

impl ImageStats {
    /// Decode raw image bytes (JPEG / PNG / WEBP / …) and measure them.
    pub fn from_bytes(data: &[u8]) -> Result<Self, StatsError> {
        let img = image::load_from_memory(data)?;
        Ok(Self::from_image(&img))
    }

    pub fn from_image(img: &DynamicImage) -> Self {
        let raw = img.as_bytes();
        let brightness = mean(raw.iter().map(|&b| u64::from(b)), raw.len());

        let channel_means = img.color().has_color().then(|| {
            let rgb = img.to_rgb8();
            let n = (rgb.width() as usize) * (rgb.height() as usize);
            let mut sums = [0u64; 3];
            for p in rgb.pixels() {
                sums[0] += u64::from(p[0]);
                sums[1] += u64::from(p[1]);
                sums[2] += u64::from(p[2]);
            }
            sums.map(|s| if n == 0 { 0.0 } else { s as f64 / n as f64 })
        });

        ImageStats {
            width: img.width(),
            height: img.height(),
            pixel_bytes: raw.len(),
            brightness,
            channel_means,
            prefix: raw[..raw.len().min(MAX_HASH_PREFIX)].to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Hash tag of the first `len` pixel bytes (capped at [`MAX_HASH_PREFIX`]).
    pub fn prefix_tag(&self, len: usize) -> String {
        hash::short_tag(&self.prefix[..len.min(self.prefix.len())])
    }
}

fn mean(values: impl Iterator<Item = u64>, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    values.sum::<u64>() as f64 / count as f64
}

/// Best-effort MIME type for the upload; the hosted model is told JPEG when unsure.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    image::guess_format(data)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/jpeg")
}
