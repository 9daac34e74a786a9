//! # 风格设置模块
//!
//! ## 设计思路
//!
//! 演示文稿的视觉风格是纯声明式的：风格设置只映射为一段提示词后缀，没有运行时状态。
//! 查表即可，无副作用、无失败分支。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationType {
    #[default]
    Business,
    Educational,
    Creative,
    Technical,
    Pitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    #[default]
    Modern,
    Classic,
    Minimal,
    Bold,
    Corporate,
    Playful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Vibrant,
    Muted,
    Monochrome,
    Warm,
    Cool,
    Brand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundPreference {
    #[default]
    Light,
    Dark,
    Gradient,
    Transparent,
}

/// 演示文稿级别的风格设置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleSettings {
    pub presentation_type: PresentationType,
    pub visual_style: VisualStyle,
    pub color_scheme: ColorScheme,
    pub background: BackgroundPreference,
}

impl VisualStyle {
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Modern => "modern, clean design with contemporary aesthetics",
            Self::Classic => "classic, timeless style with elegant composition",
            Self::Minimal => "minimalist design with generous negative space",
            Self::Bold => "bold, high-impact visuals with strong shapes",
            Self::Corporate => "professional corporate style, polished and trustworthy",
            Self::Playful => "playful, friendly illustration style",
        }
    }
}

impl ColorScheme {
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Vibrant => "vibrant, saturated colors",
            Self::Muted => "muted, soft color palette",
            Self::Monochrome => "monochrome palette",
            Self::Warm => "warm tones",
            Self::Cool => "cool tones",
            Self::Brand => "consistent brand colors",
        }
    }
}

impl BackgroundPreference {
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Light => "light, airy background",
            Self::Dark => "dark, moody background",
            Self::Gradient => "smooth gradient background",
            Self::Transparent => "isolated subject on a plain background",
        }
    }
}

impl PresentationType {
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Business => "suitable for a business presentation",
            Self::Educational => "clear and explanatory, suitable for teaching",
            Self::Creative => "expressive and imaginative",
            Self::Technical => "precise, diagram-friendly imagery",
            Self::Pitch => "aspirational imagery for an investor pitch",
        }
    }
}

/// 由风格设置推导提示词后缀：视觉风格短语 + 配色短语，以逗号连接。
///
/// # 示例
/// ```rust
/// use slide_image_enhancer::enhancer::{derive_style_prompt_suffix, ColorScheme, StyleSettings, VisualStyle};
///
/// let style = StyleSettings {
///     visual_style: VisualStyle::Minimal,
///     color_scheme: ColorScheme::Cool,
///     ..Default::default()
/// };
/// assert_eq!(
///     derive_style_prompt_suffix(&style),
///     "minimalist design with generous negative space, cool tones"
/// );
/// ```
pub fn derive_style_prompt_suffix(style: &StyleSettings) -> String {
    [style.visual_style.phrase(), style.color_scheme.phrase()].join(", ")
}
