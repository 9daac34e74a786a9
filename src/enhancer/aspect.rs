//! # 宽高比归一化
//!
//! ## 设计思路
//!
//! 目标框固定为 `targetWidth × round(targetWidth / ratio)`，四种策略都精确输出这个尺寸：
//! - `center` / `smart`：cover 缩放后裁剪，区别只在锚点
//! - `fill`：fit-inside 缩放，剩余画布用模糊去饱和的背景扩展或透明边
//! - `fit`：fit-inside 缩放，透明信箱边
//!
//! ## 实现思路
//!
//! `normalize` 返回 `None` 表示本阶段无需改动（`auto`，或比例已在 1% 以内且未被放大），
//! 由编排层决定是否记录 `aspect-adjusted`。

use image::imageops;
use image::{Rgba, RgbaImage};

use super::config::{CropStrategy, EnhancementConfig};
use super::error::{ImageError, PipelineStage};
use super::resize::{cover, fit_inside, resize_rgba};
use super::saliency::SaliencyDetector;

const STAGE: PipelineStage = PipelineStage::AspectRatio;
const RATIO_TOLERANCE: f64 = 0.01;
/// 背景扩展：先缩小到 1/8 再模糊，模糊半径与缩小后的尺寸挂钩。
const EXTENSION_DOWNSCALE: u32 = 8;
const EXTENSION_BLUR_SIGMA: f32 = 6.0;
const EXTENSION_SATURATION: f32 = 0.4;

/// 当前比例是否在目标比例的 1% 以内。
pub(crate) fn within_tolerance(width: u32, height: u32, target_ratio: f64) -> bool {
    let current = width as f64 / height as f64;
    ((current - target_ratio) / target_ratio).abs() <= RATIO_TOLERANCE
}

pub(crate) fn normalize(
    image: &RgbaImage,
    config: &EnhancementConfig,
    upscaled: bool,
    saliency: &dyn SaliencyDetector,
) -> Result<Option<RgbaImage>, ImageError> {
    let Some(target_ratio) = config.aspect_ratio.ratio() else {
        return Ok(None);
    };
    let Some((box_w, box_h)) = config.target_box() else {
        return Ok(None);
    };

    let (width, height) = image.dimensions();
    if !upscaled && within_tolerance(width, height, target_ratio) {
        log::debug!(
            "📐 宽高比已匹配 {}（{}x{}），跳过归一化",
            config.aspect_ratio,
            width,
            height
        );
        return Ok(None);
    }

    log::debug!(
        "📐 宽高比归一化 - {}x{} -> {}x{} strategy={}",
        width,
        height,
        box_w,
        box_h,
        config.crop_strategy.as_str()
    );

    let output = match config.crop_strategy {
        CropStrategy::Center => cover_crop(image, box_w, box_h, None)?,
        CropStrategy::Smart => cover_crop(image, box_w, box_h, Some(saliency))?,
        CropStrategy::Fill if config.background_extension => {
            let backdrop = extended_backdrop(image, box_w, box_h)?;
            letterbox(image, box_w, box_h, backdrop)?
        }
        CropStrategy::Fill | CropStrategy::Fit => {
            letterbox(image, box_w, box_h, RgbaImage::new(box_w, box_h))?
        }
    };

    Ok(Some(output))
}

/// cover 缩放后裁剪出 `box_w × box_h`；无显著性定位器时以几何中心为锚点。
fn cover_crop(
    image: &RgbaImage,
    box_w: u32,
    box_h: u32,
    saliency: Option<&dyn SaliencyDetector>,
) -> Result<RgbaImage, ImageError> {
    let (width, height) = image.dimensions();
    let (cover_w, cover_h) = cover(width, height, box_w, box_h);
    let resized = resize_rgba(image, cover_w, cover_h, STAGE)?;

    let (x, y) = match saliency {
        Some(detector) => {
            let (x, y) = detector.locate(&resized, box_w, box_h);
            (x.min(cover_w - box_w), y.min(cover_h - box_h))
        }
        None => ((cover_w - box_w) / 2, (cover_h - box_h) / 2),
    };

    Ok(imageops::crop_imm(&resized, x, y, box_w, box_h).to_image())
}

/// fit-inside 缩放后居中叠加到 `canvas` 上。
fn letterbox(
    image: &RgbaImage,
    box_w: u32,
    box_h: u32,
    mut canvas: RgbaImage,
) -> Result<RgbaImage, ImageError> {
    let (width, height) = image.dimensions();
    let (fit_w, fit_h) = fit_inside(width, height, box_w, box_h);
    let fitted = resize_rgba(image, fit_w, fit_h, STAGE)?;

    let x = (box_w - fit_w) / 2;
    let y = (box_h - fit_h) / 2;
    imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));

    Ok(canvas)
}

/// 背景扩展画布：整图 cover 到目标框，再缩小、模糊、放大并去饱和。
fn extended_backdrop(image: &RgbaImage, box_w: u32, box_h: u32) -> Result<RgbaImage, ImageError> {
    let covered = cover_crop(image, box_w, box_h, None)?;

    let small_w = (box_w / EXTENSION_DOWNSCALE).max(1);
    let small_h = (box_h / EXTENSION_DOWNSCALE).max(1);
    let small = resize_rgba(&covered, small_w, small_h, STAGE)?;
    let blurred = imageops::fast_blur(&small, EXTENSION_BLUR_SIGMA);
    let mut backdrop = resize_rgba(&blurred, box_w, box_h, STAGE)?;

    for pixel in backdrop.pixels_mut() {
        *pixel = desaturate(*pixel, EXTENSION_SATURATION);
        pixel[3] = 255;
    }

    Ok(backdrop)
}

fn desaturate(pixel: Rgba<u8>, saturation: f32) -> Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    let gray = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    let mix = |c: u8| (gray * (1.0 - saturation) + c as f32 * saturation).round().clamp(0.0, 255.0) as u8;
    Rgba([mix(r), mix(g), mix(b), a])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhancer::config::AspectRatio;
    use crate::enhancer::saliency::EntropySaliency;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    fn small_config(strategy: CropStrategy) -> EnhancementConfig {
        EnhancementConfig {
            target_width: 160,
            target_height: 90,
            crop_strategy: strategy,
            ..Default::default()
        }
    }

    #[test]
    fn auto_ratio_skips_stage() {
        let config = EnhancementConfig {
            aspect_ratio: AspectRatio::Auto,
            ..small_config(CropStrategy::Center)
        };

        let result = normalize(&gradient(100, 100), &config, false, &EntropySaliency)
            .expect("normalize failed");

        assert!(result.is_none());
    }

    #[test]
    fn matching_ratio_is_noop_unless_upscaled() {
        let config = small_config(CropStrategy::Center);
        let image = gradient(320, 180);

        let untouched = normalize(&image, &config, false, &EntropySaliency).expect("normalize failed");
        assert!(untouched.is_none());

        let refitted = normalize(&image, &config, true, &EntropySaliency)
            .expect("normalize failed")
            .expect("upscaled input must be refitted");
        assert_eq!(refitted.dimensions(), (160, 90));
    }

    #[test]
    fn every_strategy_outputs_the_exact_box() {
        let image = gradient(120, 120);

        for strategy in [
            CropStrategy::Center,
            CropStrategy::Smart,
            CropStrategy::Fill,
            CropStrategy::Fit,
        ] {
            let output = normalize(&image, &small_config(strategy), false, &EntropySaliency)
                .expect("normalize failed")
                .expect("square input must be adjusted to 16:9");
            assert_eq!(output.dimensions(), (160, 90), "strategy {:?}", strategy);
        }
    }

    #[test]
    fn fit_pads_with_transparent_margins() {
        let output = normalize(
            &gradient(120, 120),
            &small_config(CropStrategy::Fit),
            false,
            &EntropySaliency,
        )
        .expect("normalize failed")
        .expect("square input must be adjusted");

        assert_eq!(output.get_pixel(0, 45)[3], 0);
        assert_eq!(output.get_pixel(159, 45)[3], 0);
        assert_eq!(output.get_pixel(80, 45)[3], 255);
    }

    #[test]
    fn fill_with_extension_leaves_no_transparent_pixels() {
        let output = normalize(
            &gradient(120, 120),
            &small_config(CropStrategy::Fill),
            false,
            &EntropySaliency,
        )
        .expect("normalize failed")
        .expect("square input must be adjusted");

        assert!(output.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn fill_without_extension_behaves_like_fit() {
        let config = EnhancementConfig {
            background_extension: false,
            ..small_config(CropStrategy::Fill)
        };

        let output = normalize(&gradient(120, 120), &config, false, &EntropySaliency)
            .expect("normalize failed")
            .expect("square input must be adjusted");

        assert_eq!(output.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn center_crop_keeps_middle_of_tall_image() {
        let image = RgbaImage::from_fn(90, 360, |_, y| {
            if (150..210).contains(&y) {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });

        let output = normalize(&image, &small_config(CropStrategy::Center), false, &EntropySaliency)
            .expect("normalize failed")
            .expect("tall input must be adjusted");

        let middle = output.get_pixel(80, 45);
        assert!(middle[0] > 200 && middle[2] < 60, "center should stay red: {:?}", middle);
    }

    #[test]
    fn tolerance_is_one_percent() {
        let ratio = 16.0 / 9.0;
        assert!(within_tolerance(1920, 1080, ratio));
        assert!(within_tolerance(1910, 1080, ratio));
        assert!(!within_tolerance(1850, 1080, ratio));
    }
}
