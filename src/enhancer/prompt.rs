//! # 提示词优化（边界辅助）
//!
//! 与配置解析共享 `StyleSettings` / `EnhancementConfig`，仅做纯字符串拼接：
//! 基础提示词 + 风格后缀 + 背景 / 画质 / 构图方向修饰，以及固定的反向提示词。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::config::{AspectRatio, EnhancementConfig};
use super::style::{derive_style_prompt_suffix, StyleSettings};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static TRAILING_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,.;:]+$").expect("valid regex"));

const QUALITY_PHRASE: &str = "high resolution, sharp focus, professional quality";
const NEGATIVE_PROMPT: &str =
    "text, letters, watermark, logo, signature, blurry, low quality, distorted, cropped subject";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedPrompt {
    pub prompt: String,
    pub negative_prompt: String,
}

fn orientation_phrase(aspect_ratio: AspectRatio) -> &'static str {
    match aspect_ratio {
        AspectRatio::Widescreen => "wide 16:9 landscape composition",
        AspectRatio::Standard => "4:3 landscape composition",
        AspectRatio::Square => "square 1:1 composition",
        AspectRatio::Auto => "balanced composition",
    }
}

/// 在基础提示词后追加风格与修饰短语。
pub fn optimize_prompt(
    base: &str,
    style: &StyleSettings,
    config: &EnhancementConfig,
) -> OptimizedPrompt {
    let normalized = WHITESPACE.replace_all(base.trim(), " ");
    let normalized = TRAILING_PUNCTUATION.replace(&normalized, "").into_owned();

    let background = if config.transparent_background || config.remove_background {
        "isolated subject on a plain background"
    } else {
        style.background.phrase()
    };

    let parts = [
        normalized.as_str(),
        &derive_style_prompt_suffix(style),
        style.presentation_type.phrase(),
        background,
        QUALITY_PHRASE,
        orientation_phrase(config.aspect_ratio),
    ];

    let prompt = parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ");

    OptimizedPrompt {
        prompt,
        negative_prompt: NEGATIVE_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhancer::style::{BackgroundPreference, VisualStyle};

    #[test]
    fn appends_style_and_modifiers_in_order() {
        let style = StyleSettings {
            visual_style: VisualStyle::Minimal,
            background: BackgroundPreference::Dark,
            ..Default::default()
        };

        let result = optimize_prompt("  A  lighthouse at dusk. ", &style, &EnhancementConfig::default());

        assert!(result.prompt.starts_with("A lighthouse at dusk, minimalist design"));
        assert!(result.prompt.contains("dark, moody background"));
        assert!(result.prompt.contains(QUALITY_PHRASE));
        assert!(result.prompt.ends_with("wide 16:9 landscape composition"));
        assert!(result.negative_prompt.contains("watermark"));
    }

    #[test]
    fn transparent_output_overrides_background_phrase() {
        let config = EnhancementConfig {
            transparent_background: true,
            aspect_ratio: AspectRatio::Square,
            ..Default::default()
        };

        let result = optimize_prompt("product shot", &StyleSettings::default(), &config);

        assert!(result.prompt.contains("isolated subject on a plain background"));
        assert!(!result.prompt.contains("light, airy background"));
        assert!(result.prompt.ends_with("square 1:1 composition"));
    }

    #[test]
    fn empty_base_prompt_has_no_leading_separator() {
        let result = optimize_prompt("   ", &StyleSettings::default(), &EnhancementConfig::default());
        assert!(!result.prompt.starts_with(", "));
    }
}
