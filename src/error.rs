//! 顶层错误类型模块
//!
//! # 设计思路
//!
//! 调用方只需要面对一种错误：`EnhancementError`。
//! 它包装内部的 `ImageError`，对外统一呈现为 `Image enhancement failed: <原因>`，
//! 同时保留原因本身，调用方仍可按分支匹配（下载 / 解码 / 阶段 / 取消）。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息，`#[from]` 让 `?` 自动上转。
//! - 实现 `Serialize` 将错误序列化为字符串，便于 CLI 以 JSON 输出。

use serde::Serialize;

use crate::enhancer::{ImageError, PipelineStage};

/// 增强入口的统一错误类型。
#[derive(Debug, Clone, thiserror::Error)]
#[error("Image enhancement failed: {cause}")]
pub struct EnhancementError {
    #[from]
    cause: ImageError,
}

impl EnhancementError {
    pub fn cause(&self) -> &ImageError {
        &self.cause
    }

    /// 稳定错误码，透传自 `ImageError::code`。
    pub fn code(&self) -> &'static str {
        self.cause.code()
    }

    pub fn failed_stage(&self) -> Option<PipelineStage> {
        self.cause.failed_stage()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cause.is_cancelled()
    }
}

impl Serialize for EnhancementError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
