//! 重心によるセンタリング
//!
//! 重みは `255 - 輝度`（暗い画素ほど重い）。重心が画像の幾何中心
//! `(width / 2, height / 2)` に来るよう、バイキュービック補間で平行移動します。

use image::{GrayImage, Luma};

/// 輝度重み付きの重心 `(x, y)`。総重量が0（白紙）なら `None`
pub fn intensity_centroid(image: &GrayImage) -> Option<(f64, f64)> {
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    let mut sum = 0.0f64;

    for (x, y, pixel) in image.enumerate_pixels() {
        let weight = (255 - pixel[0]) as f64;
        sum_x += x as f64 * weight;
        sum_y += y as f64 * weight;
        sum += weight;
    }

    if sum == 0.0 {
        return None;
    }
    Some((sum_x / sum, sum_y / sum))
}

/// 重心が中心に来るよう平行移動した画像を返す。白紙ならそのまま複製
pub fn center_by_centroid(image: &GrayImage) -> GrayImage {
    let Some((cx, cy)) = intensity_centroid(image) else {
        return image.clone();
    };

    let dx = image.width() as f64 / 2.0 - cx;
    let dy = image.height() as f64 / 2.0 - cy;
    translate_bicubic(image, dx, dy)
}

/// `(dx, dy)` だけ平行移動（小数移動はバイキュービック補間、画像外は端の画素を延長）
pub fn translate_bicubic(image: &GrayImage, dx: f64, dy: f64) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = sample_bicubic(image, x as f64 - dx, y as f64 - dy);
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Keys の3次畳み込みカーネル（a = -0.5、Catmull-Rom と同じ）
fn cubic_weight(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (A + 2.0) * t.powi(3) - (A + 3.0) * t.powi(2) + 1.0
    } else if t < 2.0 {
        A * t.powi(3) - 5.0 * A * t.powi(2) + 8.0 * A * t - 4.0 * A
    } else {
        0.0
    }
}

fn sample_bicubic(image: &GrayImage, x: f64, y: f64) -> f64 {
    let max_x = image.width() as i64 - 1;
    let max_y = image.height() as i64 - 1;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let mut acc = 0.0;
    for j in -1..=2i64 {
        let wy = cubic_weight(fy - j as f64);
        if wy == 0.0 {
            continue;
        }
        let sy = (y0 as i64 + j).clamp(0, max_y) as u32;
        for i in -1..=2i64 {
            let wx = cubic_weight(fx - i as f64);
            if wx == 0.0 {
                continue;
            }
            let sx = (x0 as i64 + i).clamp(0, max_x) as u32;
            acc += wx * wy * image.get_pixel(sx, sy)[0] as f64;
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_image_is_returned_unchanged() {
        let image = GrayImage::from_pixel(28, 28, Luma([255]));
        assert_eq!(intensity_centroid(&image), None);
        assert_eq!(center_by_centroid(&image), image);
    }

    #[test]
    fn test_off_center_blob_moves_to_center() {
        let mut image = GrayImage::from_pixel(28, 28, Luma([255]));
        for y in 3..7 {
            for x in 4..8 {
                image.put_pixel(x, y, Luma([0]));
            }
        }
        let (cx, cy) = intensity_centroid(&image).unwrap();
        assert!((cx - 5.5).abs() < 1e-9 && (cy - 4.5).abs() < 1e-9);

        let centered = center_by_centroid(&image);
        let (cx, cy) = intensity_centroid(&centered).unwrap();
        assert!((cx - 14.0).abs() <= 1.0, "cx = {cx}");
        assert!((cy - 14.0).abs() <= 1.0, "cy = {cy}");
    }

    #[test]
    fn test_integer_translation_is_exact() {
        let mut image = GrayImage::from_pixel(10, 10, Luma([255]));
        image.put_pixel(2, 3, Luma([0]));

        let moved = translate_bicubic(&image, 4.0, 1.0);
        assert_eq!(moved.get_pixel(6, 4)[0], 0);
        assert_eq!(moved.get_pixel(2, 3)[0], 255);
    }

    #[test]
    fn test_cubic_weights_partition_unity() {
        for step in 0..10 {
            let f = step as f64 / 10.0;
            let total: f64 = (-1..=2).map(|i| cubic_weight(f - i as f64)).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }
}
