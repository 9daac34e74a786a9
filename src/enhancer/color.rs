//! # 颜色增强
//!
//! 亮度、对比度、饱和度逐像素在 f32 上计算，最后做一次反锐化掩模（unsharp mask）。
//! alpha 通道原样保留。

use image::imageops;
use image::RgbaImage;

use super::config::EnhancementConfig;

const SHARPEN_SIGMA: f32 = 1.0;
const SHARPEN_AMOUNT_PER_STEP: f32 = 0.25;

pub(crate) fn enhance(image: &RgbaImage, config: &EnhancementConfig) -> RgbaImage {
    let brightness = 1.0 + config.brightness as f32 / 100.0;
    let contrast = 1.0 + config.contrast as f32 / 100.0;
    let saturation = 1.0 + config.saturation as f32 / 100.0;

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let mut rgb = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];

        for value in rgb.iter_mut() {
            *value = (*value * brightness - 128.0) * contrast + 128.0;
        }

        // Rec. 601 luma
        let gray = 0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2];
        for (c, value) in rgb.iter().enumerate() {
            pixel[c] = (gray + (value - gray) * saturation).round().clamp(0.0, 255.0) as u8;
        }
    }

    if config.sharpness > 0 {
        output = unsharp_mask(&output, config.sharpness as f32 * SHARPEN_AMOUNT_PER_STEP);
    }

    output
}

fn unsharp_mask(image: &RgbaImage, amount: f32) -> RgbaImage {
    let blurred = imageops::fast_blur(image, SHARPEN_SIGMA);
    let mut output = image.clone();

    for (pixel, soft) in output.pixels_mut().zip(blurred.pixels()) {
        for c in 0..3 {
            let sharp = pixel[c] as f32;
            pixel[c] = (sharp + amount * (sharp - soft[c] as f32)).round().clamp(0.0, 255.0) as u8;
        }
    }

    output
}
