use std::io::Cursor;

use image::{DynamicImage, Rgba, RgbaImage};
use invex_core::BoundingBox;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode annotated image: {0}")]
    Encode(String),
}

const PALETTE: [Rgba<u8>; 5] = [
    Rgba([220, 38, 38, 255]),
    Rgba([37, 99, 235, 255]),
    Rgba([22, 163, 74, 255]),
    Rgba([217, 119, 6, 255]),
    Rgba([147, 51, 234, 255]),
];

/// Outline thickness scales with the image so boxes stay visible on large scans.
fn stroke_for(width: u32, height: u32) -> u32 {
    (width.min(height) / 300).clamp(1, 6)
}

/// Draw each box as a coloured outline over the image.
pub fn draw_boxes(img: &DynamicImage, boxes: &[BoundingBox]) -> RgbaImage {
    let mut canvas = img.to_rgba8();
    let (w, h) = canvas.dimensions();
    let stroke = stroke_for(w, h);

    for (i, b) in boxes.iter().enumerate() {
        let colour = PALETTE[i % PALETTE.len()];
        let x1 = b.xmax.min(w);
        let y1 = b.ymax.min(h);
        for y in b.ymin.min(y1)..y1 {
            for x in b.xmin.min(x1)..x1 {
                let on_edge = x < b.xmin + stroke
                    || x + stroke >= x1
                    || y < b.ymin + stroke
                    || y + stroke >= y1;
                if on_edge {
                    canvas.put_pixel(x, y, colour);
                }
            }
        }
    }
    canvas
}

/// Decode `data`, draw the boxes and return PNG bytes.
pub fn annotate_png(data: &[u8], boxes: &[BoundingBox]) -> Result<Vec<u8>, AnnotateError> {
    let img = image::load_from_memory(data)?;
    let annotated = DynamicImage::ImageRgba8(draw_boxes(&img, boxes));
    let mut buf = Vec::new();
    annotated
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| AnnotateError::Encode(e.to_string()))?;
    Ok(buf)
}
