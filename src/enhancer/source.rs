//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义（URL / Data URL / 本地文件）
//! - `RawImage` 表示已加载但未解码的字节，只活在一次流水线运行内
//! - `EnhancedImage` 表示最终产物，可进入缓存并交给调用方

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 图片输入来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// 网络地址来源（http / https）。
    Url(String),
    /// `data:image/...;base64,` 形式的内联图片。
    DataUrl(String),
    /// 本地文件路径来源。
    FilePath(PathBuf),
}

impl ImageSource {
    /// 按标识符前缀识别来源类型。
    pub fn parse(identifier: &str) -> Self {
        let trimmed = identifier.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else if lower.starts_with("data:") {
            Self::DataUrl(trimmed.to_string())
        } else {
            Self::FilePath(PathBuf::from(trimmed))
        }
    }

    /// 来源提示，仅用于日志。
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::DataUrl(_) => "data-url",
            Self::FilePath(_) => "file",
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImage {
    pub(crate) bytes: Vec<u8>,
    pub(crate) source_hint: &'static str,
}

/// 流水线中真正改动了缓冲区的阶段标签，按执行顺序记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Enhancement {
    Upscaled,
    AspectAdjusted,
    BackgroundRemoved,
    BackgroundBlurred,
    ColorEnhanced,
}

impl Enhancement {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upscaled => "upscaled",
            Self::AspectAdjusted => "aspect-adjusted",
            Self::BackgroundRemoved => "background-removed",
            Self::BackgroundBlurred => "background-blurred",
            Self::ColorEnhanced => "color-enhanced",
        }
    }
}

impl fmt::Display for Enhancement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 编码输出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// 磁盘缓存文件扩展名。
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// 结果元数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    /// 编码后字节数，恒等于 `EnhancedImage::buffer.len()`。
    pub size: usize,
    /// 原始输入字节数。
    pub original_size: usize,
    #[serde(rename = "processingTime")]
    pub processing_time_ms: u64,
    pub enhancements: Vec<Enhancement>,
}

/// 增强结果。
///
/// `buffer` 使用 `Bytes`，从缓存返回时只增加引用计数，调用方拿到的仍是不可变的独立值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedImage {
    pub buffer: Bytes,
    pub metadata: ImageMetadata,
    pub cache_key: String,
}

/// 调用方附带的幻灯片上下文，只用于日志，不参与缓存指纹。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlideContext {
    pub title: Option<String>,
    pub slide_index: Option<usize>,
    pub layout: Option<String>,
}

impl fmt::Display for SlideContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.title, self.slide_index) {
            (Some(title), Some(index)) => write!(f, "#{} {}", index, title)?,
            (Some(title), None) => f.write_str(title)?,
            (None, Some(index)) => write!(f, "#{}", index)?,
            (None, None) => f.write_str("-")?,
        }
        match &self.layout {
            Some(layout) => write!(f, " [{}]", layout),
            None => Ok(()),
        }
    }
}
