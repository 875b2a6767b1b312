//! ガウシアンぼかし
//!
//! カーネルサイズは `2r+1`、σ = r/3。カーネルが画像内に収まらない外周の画素は
//! 入力をそのまま写します（端でカーネルの再正規化はしない）。

use image::{GrayImage, Luma};

/// 正規化済みの2次元ガウシアンカーネル（行優先、`(2r+1)^2` 要素、総和1）
pub fn gaussian_kernel(radius: u32) -> Vec<f32> {
    let size = (2 * radius + 1) as usize;
    if radius == 0 {
        return vec![1.0];
    }

    let sigma = radius as f32 / 3.0;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let scale = (two_sigma_sq * std::f32::consts::PI).sqrt();
    let r = radius as i32;

    let mut kernel = Vec::with_capacity(size * size);
    for y in -r..=r {
        for x in -r..=r {
            let distance = (x * x + y * y) as f32;
            kernel.push((-distance / two_sigma_sq).exp() / scale);
        }
    }

    let total: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= total;
    }
    kernel
}

/// 半径 `radius` のガウシアンぼかしを適用した新しい画像を返す
pub fn gaussian_blur(image: &GrayImage, radius: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if radius == 0 || width <= 2 * radius || height <= 2 * radius {
        return image.clone();
    }

    let kernel = gaussian_kernel(radius);
    let size = (2 * radius + 1) as usize;
    let mut out = image.clone();

    for y in radius..height - radius {
        for x in radius..width - radius {
            let mut acc = 0.0f32;
            for ky in 0..size {
                let sy = y + ky as u32 - radius;
                for kx in 0..size {
                    let sx = x + kx as u32 - radius;
                    acc += kernel[ky * size + kx] * image.get_pixel(sx, sy)[0] as f32;
                }
            }
            out.put_pixel(x, y, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}
