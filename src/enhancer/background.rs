//! # 背景处理
//!
//! ## 设计思路
//!
//! 背景移除与背景虚化都依赖一张“主体权重图”。这里没有真正的主体分割，
//! 而是用径向渐变近似：中心视为主体，越靠边越像背景。
//! `BackgroundMatte` 把权重图的来源做成可替换的实现，流水线只消费灰度遮罩。
//!
//! ## 实现思路
//!
//! - 移除：遮罩值直接乘到 alpha 上。
//! - 虚化：缩小 → `fast_blur` → 放大得到模糊副本，再按焦点遮罩与原图逐像素插值。

use image::imageops;
use image::{GrayImage, Luma, RgbaImage};

use super::error::{ImageError, PipelineStage};
use super::resize::resize_rgba;

const STAGE: PipelineStage = PipelineStage::Background;
const BLUR_DOWNSCALE: u32 = 4;
const BLUR_SIGMA: f32 = 4.0;
const FOCUS_INNER: f32 = 0.45;
const FOCUS_OUTER: f32 = 0.95;

/// 主体遮罩生成器：255 表示主体，0 表示背景。
pub trait BackgroundMatte: Send + Sync {
    fn name(&self) -> &'static str;

    fn alpha_mask(&self, image: &RgbaImage) -> GrayImage;
}

/// 径向渐变遮罩：归一化半径 `inner` 以内完全保留，`outer` 处降为 0，之间 smoothstep 过渡。
#[derive(Debug, Clone, Copy)]
pub struct RadialMatte {
    pub inner: f32,
    pub outer: f32,
}

impl Default for RadialMatte {
    fn default() -> Self {
        Self {
            inner: 0.55,
            outer: 1.0,
        }
    }
}

impl BackgroundMatte for RadialMatte {
    fn name(&self) -> &'static str {
        "radial"
    }

    fn alpha_mask(&self, image: &RgbaImage) -> GrayImage {
        radial_mask(image.width(), image.height(), self.inner, self.outer)
    }
}

pub(crate) fn radial_mask(width: u32, height: u32, inner: f32, outer: f32) -> GrayImage {
    let half_w = width as f32 / 2.0;
    let half_h = height as f32 / 2.0;

    GrayImage::from_fn(width, height, |x, y| {
        let dx = (x as f32 + 0.5 - half_w) / half_w;
        let dy = (y as f32 + 0.5 - half_h) / half_h;
        let distance = (dx * dx + dy * dy).sqrt();
        Luma([(radial_weight(distance, inner, outer) * 255.0).round() as u8])
    })
}

fn radial_weight(distance: f32, inner: f32, outer: f32) -> f32 {
    if distance <= inner {
        return 1.0;
    }
    if distance >= outer {
        return 0.0;
    }
    let t = (distance - inner) / (outer - inner);
    1.0 - t * t * (3.0 - 2.0 * t)
}

/// 按遮罩衰减 alpha。
pub(crate) fn remove_background(image: &RgbaImage, matte: &dyn BackgroundMatte) -> RgbaImage {
    let mask = matte.alpha_mask(image);
    let mut output = image.clone();

    for (pixel, weight) in output.pixels_mut().zip(mask.pixels()) {
        pixel[3] = ((pixel[3] as u16 * weight[0] as u16 + 127) / 255) as u8;
    }

    output
}

/// 焦点虚化：中心保持清晰，外围逐渐过渡到模糊副本。
pub(crate) fn blur_background(image: &RgbaImage) -> Result<RgbaImage, ImageError> {
    let (width, height) = image.dimensions();
    let small = resize_rgba(
        image,
        (width / BLUR_DOWNSCALE).max(1),
        (height / BLUR_DOWNSCALE).max(1),
        STAGE,
    )?;
    let blurred = resize_rgba(&imageops::fast_blur(&small, BLUR_SIGMA), width, height, STAGE)?;
    let focus = radial_mask(width, height, FOCUS_INNER, FOCUS_OUTER);

    let mut output = image.clone();
    for ((pixel, soft), weight) in output
        .pixels_mut()
        .zip(blurred.pixels())
        .zip(focus.pixels())
    {
        let w = weight[0] as f32 / 255.0;
        for c in 0..4 {
            let sharp = pixel[c] as f32;
            pixel[c] = (sharp * w + soft[c] as f32 * (1.0 - w)).round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(output)
}
