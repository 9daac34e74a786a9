//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载增强链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! ## 实现思路
//!
//! - `FetchError`：下载阶段（超时 / 非 2xx / 传输层）。
//! - `PipelineStage` + `ImageError::Stage`：变换阶段失败时携带阶段标签。
//! - 所有错误均实现 `Clone`，以便通过单飞（single-flight）共享 future 分发给多个等待者。

use std::fmt;

/// 下载阶段错误。单次请求，不做自动重试。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("下载超时（{timeout_ms}ms）")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: &'static str },

    #[error("传输失败：{0}")]
    Transport(String),

    #[error("URL 格式错误：{0}")]
    InvalidUrl(String),

    #[error("文件过大：{size} 字节（限制：{limit} 字节）")]
    TooLarge { size: u64, limit: u64 },
}

/// 变换流水线的阶段标签，用于 `ImageError::Stage`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Upscale,
    AspectRatio,
    Background,
    ColorEnhance,
    Encode,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upscale => "upscale",
            Self::AspectRatio => "aspect-ratio",
            Self::Background => "background",
            Self::ColorEnhance => "color-enhance",
            Self::Encode => "encode",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 图片增强统一错误类型。
///
/// 该类型会在服务层被上转为 `EnhancementError`，最终透传给调用方。
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("下载错误：{0}")]
    Fetch(#[from] FetchError),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("{stage} 阶段失败：{cause}")]
    Stage { stage: PipelineStage, cause: String },

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("已取消：{0}")]
    Cancelled(String),

    #[error("内部错误：{0}")]
    Internal(String),
}

impl ImageError {
    pub(crate) fn stage(stage: PipelineStage, cause: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            cause: cause.into(),
        }
    }

    /// 稳定的机器可读错误码，供日志与上层分支使用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::Timeout { .. }) => "fetch_timeout",
            Self::Fetch(FetchError::Status { .. }) => "fetch_status",
            Self::Fetch(_) => "fetch_failed",
            Self::Decode(_) => "decode_failed",
            Self::Stage { .. } => "stage_failed",
            Self::ResourceLimit(_) => "resource_limit",
            Self::FileSystem(_) => "file_system",
            Self::Cancelled(_) => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    /// 出错阶段；非变换阶段的错误返回 `None`。
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_carries_stage_tag() {
        let err = ImageError::stage(PipelineStage::AspectRatio, "boom");

        assert_eq!(err.failed_stage(), Some(PipelineStage::AspectRatio));
        assert_eq!(err.code(), "stage_failed");
        assert!(err.to_string().contains("aspect-ratio"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn fetch_errors_map_to_distinct_codes() {
        let timeout: ImageError = FetchError::Timeout { timeout_ms: 10 }.into();
        let status: ImageError = FetchError::Status {
            status: 404,
            reason: "未找到",
        }
        .into();
        let transport: ImageError = FetchError::Transport("refused".into()).into();

        assert_eq!(timeout.code(), "fetch_timeout");
        assert_eq!(status.code(), "fetch_status");
        assert_eq!(transport.code(), "fetch_failed");
        assert_eq!(status.failed_stage(), None);
    }
}
