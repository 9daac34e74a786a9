//! # 显著性定位
//!
//! ## 设计思路
//!
//! smart 裁剪只需要回答一个问题：在已铺满目标框的图像上，裁剪窗口放在哪里。
//! 这里用 trait 把“怎么判断显著”隔离出来，流水线编排不关心背后是启发式还是模型。
//!
//! ## 实现思路
//!
//! 默认实现 `EntropySaliency`：
//! 1. 缩成最长边不超过 256 的灰度缩略图
//! 2. 沿可滑动方向均匀取最多 64 个候选位置
//! 3. 计算每个窗口的灰度直方图熵，取最大者；并列时取离中心最近的位置
//! 4. 映射回原图坐标

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};

const THUMBNAIL_MAX_SIDE: u32 = 256;
const MAX_CANDIDATES_PER_AXIS: u32 = 64;

/// 显著区域定位器。
pub trait SaliencyDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// 返回 `crop_w × crop_h` 裁剪窗口的左上角坐标。
    ///
    /// 调用方保证 `crop_w <= image.width()` 且 `crop_h <= image.height()`。
    fn locate(&self, image: &RgbaImage, crop_w: u32, crop_h: u32) -> (u32, u32);
}

/// 基于灰度熵的显著性启发式。
#[derive(Debug, Clone, Copy, Default)]
pub struct EntropySaliency;

impl SaliencyDetector for EntropySaliency {
    fn name(&self) -> &'static str {
        "entropy"
    }

    fn locate(&self, image: &RgbaImage, crop_w: u32, crop_h: u32) -> (u32, u32) {
        let (width, height) = image.dimensions();
        let slack_x = width.saturating_sub(crop_w);
        let slack_y = height.saturating_sub(crop_h);
        if slack_x == 0 && slack_y == 0 {
            return (0, 0);
        }

        let scale = (THUMBNAIL_MAX_SIDE as f64 / width.max(height) as f64).min(1.0);
        let thumb_w = ((width as f64 * scale).round() as u32).max(1);
        let thumb_h = ((height as f64 * scale).round() as u32).max(1);
        let gray = imageops::grayscale(image);
        let thumb = if scale < 1.0 {
            imageops::resize(&gray, thumb_w, thumb_h, FilterType::Triangle)
        } else {
            gray
        };

        let win_w = ((crop_w as f64 * scale).round() as u32).clamp(1, thumb_w);
        let win_h = ((crop_h as f64 * scale).round() as u32).clamp(1, thumb_h);

        let xs = candidates(thumb_w - win_w);
        let ys = candidates(thumb_h - win_h);
        let center = (
            (thumb_w - win_w) as f64 / 2.0,
            (thumb_h - win_h) as f64 / 2.0,
        );

        let mut best = (xs[0], ys[0]);
        let mut best_entropy = f64::NEG_INFINITY;
        let mut best_distance = f64::INFINITY;

        for &y in &ys {
            for &x in &xs {
                let entropy = window_entropy(&thumb, x, y, win_w, win_h);
                let distance = (x as f64 - center.0).abs() + (y as f64 - center.1).abs();
                let better = entropy > best_entropy + 1e-9
                    || ((entropy - best_entropy).abs() <= 1e-9 && distance < best_distance);
                if better {
                    best = (x, y);
                    best_entropy = entropy;
                    best_distance = distance;
                }
            }
        }

        let map_back = |thumb_offset: u32, slack: u32| -> u32 {
            ((thumb_offset as f64 / scale).round() as u32).min(slack)
        };

        log::debug!(
            "🎯 熵显著性窗口 - thumb={}x{} window={}x{} best=({}, {}) entropy={:.3}",
            thumb_w,
            thumb_h,
            win_w,
            win_h,
            best.0,
            best.1,
            best_entropy
        );

        (map_back(best.0, slack_x), map_back(best.1, slack_y))
    }
}

/// 在 `0..=slack` 上均匀取不超过上限个候选位置。
fn candidates(slack: u32) -> Vec<u32> {
    if slack == 0 {
        return vec![0];
    }

    let count = (slack + 1).min(MAX_CANDIDATES_PER_AXIS);
    (0..count)
        .map(|i| ((i as f64 * slack as f64) / (count - 1) as f64).round() as u32)
        .collect()
}

fn window_entropy(image: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> f64 {
    let mut histogram = [0u32; 256];
    for row in y..y + h {
        for col in x..x + w {
            histogram[image.get_pixel(col, row)[0] as usize] += 1;
        }
    }

    let total = (w as f64) * (h as f64);
    histogram
        .iter()
        .filter(|count| **count > 0)
        .map(|count| {
            let p = *count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn flat_image_prefers_center() {
        let image = RgbaImage::from_pixel(400, 100, Rgba([120, 120, 120, 255]));

        let (x, y) = EntropySaliency.locate(&image, 100, 100);

        assert_eq!(y, 0);
        assert!((140..=160).contains(&x), "expected near center, got {}", x);
    }

    #[test]
    fn textured_region_attracts_window() {
        let image = RgbaImage::from_fn(400, 100, |x, y| {
            if x >= 300 {
                let v = ((x * 37 + y * 91) % 251) as u8;
                Rgba([v, v.wrapping_mul(3), v.wrapping_add(40), 255])
            } else {
                Rgba([30, 30, 30, 255])
            }
        });

        let (x, _) = EntropySaliency.locate(&image, 100, 100);

        assert!(x >= 280, "window should move toward the textured right edge, got {}", x);
    }

    #[test]
    fn exact_fit_returns_origin() {
        let image = RgbaImage::new(64, 36);
        assert_eq!(EntropySaliency.locate(&image, 64, 36), (0, 0));
    }

    #[test]
    fn candidates_cover_both_ends() {
        let list = candidates(1000);
        assert_eq!(list.len(), MAX_CANDIDATES_PER_AXIS as usize);
        assert_eq!(list.first(), Some(&0));
        assert_eq!(list.last(), Some(&1000));
        assert_eq!(candidates(3), vec![0, 1, 2, 3]);
    }
}
