//! # 重采样辅助
//!
//! 所有缩放都走 `fast_image_resize`（Lanczos3 卷积），并提供 fit-inside / cover 的尺寸计算。

use fast_image_resize as fr;
use image::RgbaImage;

use super::error::{ImageError, PipelineStage};

/// 将 RGBA 图像精确缩放到 `width × height`。
pub(crate) fn resize_rgba(
    image: &RgbaImage,
    width: u32,
    height: u32,
    stage: PipelineStage,
) -> Result<RgbaImage, ImageError> {
    let (src_width, src_height) = image.dimensions();
    if (src_width, src_height) == (width, height) {
        return Ok(image.clone());
    }
    if width == 0 || height == 0 || src_width == 0 || src_height == 0 {
        return Err(ImageError::stage(
            stage,
            format!("非法缩放尺寸：{}x{} -> {}x{}", src_width, src_height, width, height),
        ));
    }

    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        image.as_raw().clone(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| ImageError::stage(stage, format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ImageError::stage(stage, format!("fast_image_resize 执行失败：{}", e)))?;

    RgbaImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| ImageError::stage(stage, "fast_image_resize 输出缓冲长度异常"))
}

/// 等比缩放后完整放入 `box_w × box_h` 的尺寸（每边至少 1 像素，不超过框）。
pub(crate) fn fit_inside(width: u32, height: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    let scale = (box_w as f64 / width as f64).min(box_h as f64 / height as f64);
    (
        scaled(width, scale).min(box_w),
        scaled(height, scale).min(box_h),
    )
}

/// 等比缩放后完全覆盖 `box_w × box_h` 的尺寸（每边不小于框）。
pub(crate) fn cover(width: u32, height: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    let scale = (box_w as f64 / width as f64).max(box_h as f64 / height as f64);
    (
        scaled(width, scale).max(box_w),
        scaled(height, scale).max(box_h),
    )
}

fn scaled(value: u32, scale: f64) -> u32 {
    ((value as f64 * scale).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn fit_inside_keeps_aspect_and_stays_in_box() {
        assert_eq!(fit_inside(800, 600, 1920, 1080), (1440, 1080));
        assert_eq!(fit_inside(1000, 100, 1920, 1080), (1920, 192));
        assert_eq!(fit_inside(1600, 900, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn cover_fills_box_on_both_axes() {
        assert_eq!(cover(800, 600, 1920, 1080), (1920, 1440));
        assert_eq!(cover(100, 1000, 160, 90), (160, 1600));
        let (w, h) = cover(333, 777, 1920, 1080);
        assert!(w >= 1920 && h >= 1080);
    }

    #[test]
    fn resize_rgba_produces_requested_dimensions() {
        let image = RgbaImage::from_fn(40, 20, |x, y| Rgba([(x * 6) as u8, (y * 12) as u8, 90, 255]));

        let resized = resize_rgba(&image, 80, 45, PipelineStage::Upscale).expect("resize failed");

        assert_eq!(resized.dimensions(), (80, 45));
        assert!(resized.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn resize_rgba_rejects_zero_target() {
        let image = RgbaImage::new(4, 4);
        let result = resize_rgba(&image, 0, 4, PipelineStage::AspectRatio);
        assert_eq!(
            result.expect_err("zero width must fail").failed_stage(),
            Some(PipelineStage::AspectRatio)
        );
    }
}
