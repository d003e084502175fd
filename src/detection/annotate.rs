use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::models::BoxPrediction;

const BOX_COLOR: Rgb<u8> = Rgb([255, 56, 56]);
const LINE_WIDTH: i32 = 2;

/// Draws every box onto a copy of `image`.
pub fn draw_boxes(image: &RgbImage, boxes: &[BoxPrediction]) -> RgbImage {
    let mut canvas = image.clone();
    let (w, h) = canvas.dimensions();
    for b in boxes {
        let x0 = b.xmin.clamp(0.0, w as f32) as i32;
        let y0 = b.ymin.clamp(0.0, h as f32) as i32;
        let x1 = b.xmax.clamp(0.0, w as f32) as i32;
        let y1 = b.ymax.clamp(0.0, h as f32) as i32;
        for inset in 0..LINE_WIDTH {
            let bw = x1 - x0 - 2 * inset;
            let bh = y1 - y0 - 2 * inset;
            if bw <= 0 || bh <= 0 {
                break;
            }
            let rect = Rect::at(x0 + inset, y0 + inset).of_size(bw as u32, bh as u32);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }
    }
    canvas
}

/// Saves the annotated image, creating parent directories. Format follows the extension.
pub fn save_annotated(
    image: &RgbImage,
    boxes: &[BoxPrediction],
    path: &Path,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    draw_boxes(image, boxes)
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to save annotated image {:?}: {}", path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_outline_is_drawn() {
        let img = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let boxes = vec![BoxPrediction {
            label: "cup".into(),
            confidence: 0.8,
            xmin: 2.0,
            ymin: 2.0,
            xmax: 12.0,
            ymax: 12.0,
        }];
        let out = draw_boxes(&img, &boxes);
        assert_eq!(*out.get_pixel(2, 2), BOX_COLOR);
        assert_eq!(*out.get_pixel(3, 3), BOX_COLOR);
        assert_eq!(*out.get_pixel(7, 7), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(2, 2), Rgb([0, 0, 0]));
    }
}
