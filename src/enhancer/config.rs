//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `EnhancementConfig`，保证运行时行为可观测、可调整、可测试。
//! 配置在构造时一次性合并与校验，之后不可变：同一个增强器实例的所有请求共享同一份快照。
//!
//! ## 实现思路
//!
//! - `Default` 给出穷举的默认值（1920×1080、16:9、smart 裁剪……）。
//! - `EnhancementOverrides` 为“松散选项包”的强类型版本：所有字段可选，未知字段直接拒绝。
//! - `EnhancementConfig::resolve` 将覆盖项合并到默认值并夹紧（clamp）所有有界字段。
//! - 配置整体可序列化，缓存指纹直接基于其 JSON 形式计算。

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ImageError;

/// 固定宽高比下目标框的最小高度。
const MIN_BOX_HEIGHT: u32 = 50;

/// 目标宽高比。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "auto")]
    Auto,
}

impl AspectRatio {
    /// 宽/高比值；`Auto` 不做归一化。
    pub fn ratio(self) -> Option<f64> {
        match self {
            Self::Widescreen => Some(16.0 / 9.0),
            Self::Standard => Some(4.0 / 3.0),
            Self::Square => Some(1.0),
            Self::Auto => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Widescreen => "16:9",
            Self::Standard => "4:3",
            Self::Square => "1:1",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 宽高比归一化时的裁剪/填充策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropStrategy {
    /// 铺满目标框，以几何中心为锚点裁剪。
    Center,
    /// 铺满目标框，以显著性（熵）最高的子区域为锚点裁剪。
    Smart,
    /// 完整放入目标框，剩余画布用模糊扩展或透明边填充。
    Fill,
    /// 完整放入目标框，透明信箱边，不裁剪也不合成。
    Fit,
}

impl CropStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Smart => "smart",
            Self::Fill => "fill",
            Self::Fit => "fit",
        }
    }
}

/// 图片增强配置。
///
/// 字段覆盖了下载、解码、五个变换阶段与缓存。构造后不可变。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementConfig {
    /// 目标宽度（像素），同时决定宽高比目标框的宽。
    pub target_width: u32,
    /// 目标高度（像素），仅用于放大阶段的门限。
    pub target_height: u32,
    pub upscale_enabled: bool,
    /// 放大倍率，夹紧到 1~8。
    pub upscale_factor: f64,
    pub aspect_ratio: AspectRatio,
    pub crop_strategy: CropStrategy,
    /// `fill` 策略下用模糊去饱和的副本填充画布，而不是透明边。
    pub background_extension: bool,
    pub remove_background: bool,
    pub background_blur: bool,
    /// 输出保留透明通道（PNG），否则压平为 JPEG。
    pub transparent_background: bool,
    /// 亮度，-100~100。
    pub brightness: i32,
    /// 对比度，-100~100。
    pub contrast: i32,
    /// 饱和度，-100~100。
    pub saturation: i32,
    /// 锐化强度，0~10。
    pub sharpness: u32,
    pub enable_caching: bool,
    pub cache_directory: PathBuf,
    /// 内存缓存的最大条目数（LRU 淘汰）。
    pub cache_max_entries: usize,
    /// 编码质量，1~100。
    pub quality: u8,
    /// 下载总超时（毫秒）。
    pub fetch_timeout_ms: u64,
    /// 下载/读取原始字节时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            target_width: 1920,
            target_height: 1080,
            upscale_enabled: true,
            upscale_factor: 2.0,
            aspect_ratio: AspectRatio::Widescreen,
            crop_strategy: CropStrategy::Smart,
            background_extension: true,
            remove_background: false,
            background_blur: false,
            transparent_background: false,
            brightness: 0,
            contrast: 10,
            saturation: 5,
            sharpness: 1,
            enable_caching: true,
            cache_directory: PathBuf::from("./cache/images"),
            cache_max_entries: 128,
            quality: 90,
            fetch_timeout_ms: 30_000,
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
        }
    }
}

/// 用户侧覆盖项。所有字段可选，缺省即沿用默认值。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EnhancementOverrides {
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    pub upscale_enabled: Option<bool>,
    pub upscale_factor: Option<f64>,
    pub aspect_ratio: Option<AspectRatio>,
    pub crop_strategy: Option<CropStrategy>,
    pub background_extension: Option<bool>,
    pub remove_background: Option<bool>,
    pub background_blur: Option<bool>,
    pub transparent_background: Option<bool>,
    pub brightness: Option<i32>,
    pub contrast: Option<i32>,
    pub saturation: Option<i32>,
    pub sharpness: Option<u32>,
    pub enable_caching: Option<bool>,
    pub cache_directory: Option<PathBuf>,
    pub cache_max_entries: Option<usize>,
    pub quality: Option<u8>,
    pub fetch_timeout_ms: Option<u64>,
    pub max_file_size: Option<u64>,
    pub max_decoded_pixels: Option<u64>,
}

impl EnhancementOverrides {
    /// 从 JSON 字符串解析覆盖项。
    pub fn from_json(content: &str) -> Result<Self, ImageError> {
        serde_json::from_str(content)
            .map_err(|e| ImageError::FileSystem(format!("解析增强配置失败：{}", e)))
    }

    /// 从 JSON 文件读取覆盖项。
    pub fn from_json_file(path: &Path) -> Result<Self, ImageError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ImageError::FileSystem(format!("无法读取配置文件 {}：{}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}

impl EnhancementConfig {
    /// 将覆盖项合并到默认值，并夹紧所有有界字段。
    ///
    /// # 示例
    /// ```rust
    /// use slide_image_enhancer::enhancer::{AspectRatio, EnhancementConfig, EnhancementOverrides};
    ///
    /// let overrides = EnhancementOverrides {
    ///     aspect_ratio: Some(AspectRatio::Square),
    ///     quality: Some(0),
    ///     ..Default::default()
    /// };
    /// let config = EnhancementConfig::resolve(&overrides);
    /// assert_eq!(config.aspect_ratio, AspectRatio::Square);
    /// assert_eq!(config.quality, 1);
    /// ```
    pub fn resolve(overrides: &EnhancementOverrides) -> Self {
        let defaults = Self::default();
        let o = overrides.clone();

        Self {
            target_width: o.target_width.unwrap_or(defaults.target_width),
            target_height: o.target_height.unwrap_or(defaults.target_height),
            upscale_enabled: o.upscale_enabled.unwrap_or(defaults.upscale_enabled),
            upscale_factor: o.upscale_factor.unwrap_or(defaults.upscale_factor),
            aspect_ratio: o.aspect_ratio.unwrap_or(defaults.aspect_ratio),
            crop_strategy: o.crop_strategy.unwrap_or(defaults.crop_strategy),
            background_extension: o
                .background_extension
                .unwrap_or(defaults.background_extension),
            remove_background: o.remove_background.unwrap_or(defaults.remove_background),
            background_blur: o.background_blur.unwrap_or(defaults.background_blur),
            transparent_background: o
                .transparent_background
                .unwrap_or(defaults.transparent_background),
            brightness: o.brightness.unwrap_or(defaults.brightness),
            contrast: o.contrast.unwrap_or(defaults.contrast),
            saturation: o.saturation.unwrap_or(defaults.saturation),
            sharpness: o.sharpness.unwrap_or(defaults.sharpness),
            enable_caching: o.enable_caching.unwrap_or(defaults.enable_caching),
            cache_directory: o.cache_directory.unwrap_or(defaults.cache_directory),
            cache_max_entries: o.cache_max_entries.unwrap_or(defaults.cache_max_entries),
            quality: o.quality.unwrap_or(defaults.quality),
            fetch_timeout_ms: o.fetch_timeout_ms.unwrap_or(defaults.fetch_timeout_ms),
            max_file_size: o.max_file_size.unwrap_or(defaults.max_file_size),
            max_decoded_pixels: o.max_decoded_pixels.unwrap_or(defaults.max_decoded_pixels),
        }
        .clamped()
    }

    /// 夹紧所有有界字段；每次修正都会记录一条 warn 日志。
    pub fn clamped(mut self) -> Self {
        self.target_width = clamp_logged("targetWidth", self.target_width, 1, 16_384);
        self.target_height = clamp_logged("targetHeight", self.target_height, 1, 16_384);
        self.brightness = clamp_logged("brightness", self.brightness, -100, 100);
        self.contrast = clamp_logged("contrast", self.contrast, -100, 100);
        self.saturation = clamp_logged("saturation", self.saturation, -100, 100);
        self.sharpness = clamp_logged("sharpness", self.sharpness, 0, 10);
        self.quality = clamp_logged("quality", self.quality, 1, 100);
        self.cache_max_entries = clamp_logged("cacheMaxEntries", self.cache_max_entries, 1, 65_536);
        self.fetch_timeout_ms = clamp_logged("fetchTimeoutMs", self.fetch_timeout_ms, 1, 600_000);
        self.max_file_size = clamp_logged("maxFileSize", self.max_file_size, 1, u64::MAX);
        self.max_decoded_pixels =
            clamp_logged("maxDecodedPixels", self.max_decoded_pixels, 1, u64::MAX);

        if !self.upscale_factor.is_finite() {
            log::warn!("⚙️ upscaleFactor 非法（{}），回退为 2", self.upscale_factor);
            self.upscale_factor = 2.0;
        }
        self.upscale_factor = clamp_logged("upscaleFactor", self.upscale_factor, 1.0, 8.0);

        // 目标框高度取整误差不超过 0.5 像素，高度 ≥ 50 时比例误差才落在 1% 以内
        if let Some(ratio) = self.aspect_ratio.ratio() {
            let min_width = (MIN_BOX_HEIGHT as f64 * ratio).ceil() as u32;
            self.target_width = clamp_logged("targetWidth", self.target_width, min_width, 16_384);
        }

        self
    }

    /// 宽高比归一化的目标框：`targetWidth × round(targetWidth / ratio)`。
    pub fn target_box(&self) -> Option<(u32, u32)> {
        let ratio = self.aspect_ratio.ratio()?;
        let height = (self.target_width as f64 / ratio).round().max(1.0) as u32;
        Some((self.target_width, height))
    }

    /// 颜色阶段是否有任何实际调整。
    pub fn has_color_adjustments(&self) -> bool {
        self.brightness != 0 || self.saturation != 0 || self.contrast != 0 || self.sharpness > 0
    }
}

fn clamp_logged<T>(name: &str, value: T, min: T, max: T) -> T
where
    T: PartialOrd + Copy + fmt::Display,
{
    let clamped = if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    };

    if clamped != value {
        log::warn!("⚙️ 配置项 {} 超出范围：{} -> {}", name, value, clamped);
    }

    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EnhancementConfig::default();

        assert_eq!((config.target_width, config.target_height), (1920, 1080));
        assert!(config.upscale_enabled);
        assert_eq!(config.upscale_factor, 2.0);
        assert_eq!(config.aspect_ratio, AspectRatio::Widescreen);
        assert_eq!(config.crop_strategy, CropStrategy::Smart);
        assert!(config.background_extension);
        assert!(!config.remove_background && !config.background_blur);
        assert!(!config.transparent_background);
        assert_eq!(
            (config.brightness, config.contrast, config.saturation, config.sharpness),
            (0, 10, 5, 1)
        );
        assert!(config.enable_caching);
        assert_eq!(config.cache_directory, PathBuf::from("./cache/images"));
        assert_eq!(config.quality, 90);
        assert_eq!(config.fetch_timeout_ms, 30_000);
    }

    #[test]
    fn resolve_without_overrides_is_default() {
        let config = EnhancementConfig::resolve(&EnhancementOverrides::default());
        assert_eq!(config, EnhancementConfig::default());
    }

    #[test]
    fn resolve_merges_only_provided_fields() {
        let overrides = EnhancementOverrides {
            target_width: Some(1280),
            crop_strategy: Some(CropStrategy::Fit),
            remove_background: Some(true),
            ..Default::default()
        };

        let config = EnhancementConfig::resolve(&overrides);

        assert_eq!(config.target_width, 1280);
        assert_eq!(config.target_height, 1080);
        assert_eq!(config.crop_strategy, CropStrategy::Fit);
        assert!(config.remove_background);
        assert_eq!(config.quality, 90);
    }

    #[test]
    fn resolve_clamps_bounded_fields() {
        let overrides = EnhancementOverrides {
            brightness: Some(250),
            contrast: Some(-400),
            saturation: Some(101),
            sharpness: Some(99),
            quality: Some(0),
            upscale_factor: Some(0.25),
            target_width: Some(0),
            cache_max_entries: Some(0),
            ..Default::default()
        };

        let config = EnhancementConfig::resolve(&overrides);

        assert_eq!(config.brightness, 100);
        assert_eq!(config.contrast, -100);
        assert_eq!(config.saturation, 100);
        assert_eq!(config.sharpness, 10);
        assert_eq!(config.quality, 1);
        assert_eq!(config.upscale_factor, 1.0);
        assert_eq!(config.target_width, 89);
        assert_eq!(config.cache_max_entries, 1);
    }

    #[test]
    fn narrow_target_width_keeps_box_within_one_percent() {
        for (aspect, min_width) in [
            (AspectRatio::Widescreen, 89),
            (AspectRatio::Standard, 67),
            (AspectRatio::Square, 50),
        ] {
            let config = EnhancementConfig {
                target_width: 65,
                aspect_ratio: aspect,
                ..Default::default()
            }
            .clamped();
            let expected = aspect.ratio().expect("fixed ratio");

            assert_eq!(config.target_width, min_width.max(65));
            for width in config.target_width..config.target_width + 200 {
                let (w, h) = EnhancementConfig { target_width: width, ..config.clone() }
                    .target_box()
                    .expect("fixed ratio has a box");
                let error = (w as f64 / h as f64 - expected).abs() / expected;
                assert!(error <= 0.01, "{}x{} off by {:.4}", w, h, error);
            }
        }
    }

    #[test]
    fn auto_ratio_keeps_narrow_target_width() {
        let config = EnhancementConfig {
            target_width: 8,
            aspect_ratio: AspectRatio::Auto,
            ..Default::default()
        }
        .clamped();

        assert_eq!(config.target_width, 8);
    }

    #[test]
    fn non_finite_upscale_factor_falls_back() {
        let config = EnhancementConfig {
            upscale_factor: f64::NAN,
            ..Default::default()
        }
        .clamped();

        assert_eq!(config.upscale_factor, 2.0);
    }

    #[test]
    fn overrides_parse_camel_case_json() {
        let overrides = EnhancementOverrides::from_json(
            r#"{"targetWidth": 1024, "aspectRatio": "4:3", "cropStrategy": "center", "backgroundBlur": true}"#,
        )
        .expect("overrides should parse");

        assert_eq!(overrides.target_width, Some(1024));
        assert_eq!(overrides.aspect_ratio, Some(AspectRatio::Standard));
        assert_eq!(overrides.crop_strategy, Some(CropStrategy::Center));
        assert_eq!(overrides.background_blur, Some(true));
        assert_eq!(overrides.quality, None);
    }

    #[test]
    fn overrides_reject_unknown_fields() {
        let result = EnhancementOverrides::from_json(r#"{"targetWidht": 1024}"#);
        assert!(matches!(result, Err(ImageError::FileSystem(_))));
    }

    #[test]
    fn target_box_follows_ratio_and_width() {
        let mut config = EnhancementConfig::default();
        assert_eq!(config.target_box(), Some((1920, 1080)));

        config.aspect_ratio = AspectRatio::Standard;
        assert_eq!(config.target_box(), Some((1920, 1440)));

        config.aspect_ratio = AspectRatio::Square;
        assert_eq!(config.target_box(), Some((1920, 1920)));

        config.aspect_ratio = AspectRatio::Auto;
        assert_eq!(config.target_box(), None);
    }

    #[test]
    fn color_adjustment_detection() {
        let neutral = EnhancementConfig {
            brightness: 0,
            contrast: 0,
            saturation: 0,
            sharpness: 0,
            ..Default::default()
        };
        assert!(!neutral.has_color_adjustments());
        assert!(EnhancementConfig::default().has_color_adjustments());
    }
}
