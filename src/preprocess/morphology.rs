//! 十字型構造要素によるモルフォロジー演算
//!
//! 前景は白紙上の黒インク（暗い画素）です。外周1画素は近傍が揃わないため、
//! 入力をそのまま写します。

use image::{GrayImage, Luma};

/// 十字型（4近傍 + 中心）の構造要素 `(dx, dy)`
pub const PLUS_KERNEL: [(i32, i32); 5] = [(0, -1), (0, 1), (-1, 0), (1, 0), (0, 0)];

fn apply_plus(image: &GrayImage, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut out = image.clone();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let value = PLUS_KERNEL
                .iter()
                .map(|(dx, dy)| {
                    let sx = (x as i32 + dx) as u32;
                    let sy = (y as i32 + dy) as u32;
                    image.get_pixel(sx, sy)[0]
                })
                .reduce(pick)
                .unwrap_or(0);
            out.put_pixel(x, y, Luma([value]));
        }
    }

    out
}

/// インクを1画素広げる（近傍の最小値）
pub fn dilate(image: &GrayImage) -> GrayImage {
    apply_plus(image, u8::min)
}

/// インクを1画素削る（近傍の最大値）
pub fn erode(image: &GrayImage) -> GrayImage {
    apply_plus(image, u8::max)
}

/// クロージング（膨張 → 収縮）を `iterations` 回繰り返す
pub fn close(image: &GrayImage, iterations: u32) -> GrayImage {
    let mut result = image.clone();
    for _ in 0..iterations {
        result = erode(&dilate(&result));
    }
    result
}
