//! # 图片增强模块（enhancer）
//!
//! ## 设计思路
//!
//! 该模块将“来源识别 → 缓存查询 → 加载 → 解码 → 五阶段变换 → 编码 → 缓存写入”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：显式构造的服务实例（请求取消、失败回退）
//! - `handler`：编排整条处理链路（缓存、单飞合并、阶段耗时日志）
//! - `fetcher`：负责 URL / Data URL / 文件加载与体积校验
//! - `pipeline`：负责解码、像素限制与阶段调度，`resize` 提供重采样
//! - `aspect` / `saliency` / `background` / `color`：各变换阶段的具体实现
//! - `cache`：内存 LRU + 磁盘镜像
//! - `config` / `error` / `source`：配置、错误、数据模型
//! - `style` / `prompt`：风格设置与提示词拼接（纯函数，和配置共享类型）
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 调用方 enhance_image(url, prompt, ctx)
//!    ↓
//! service.rs（请求 ID / 取消标志 / 错误包装）
//!    ↓
//! handler.rs（指纹 → 缓存 → 在途表）
//!    ├─ cache.rs（内存命中 / 磁盘读穿）
//!    ├─ fetcher.rs（单次下载，不重试）
//!    └─ pipeline.rs（spawn_blocking）
//!          Upscale → AspectRatio → Background → ColorEnhance → Encode
//!    ↓
//! EnhancedImage / EnhancementError
//! ```
//!
//! ## 分层职责建议
//!
//! - 默认值与取值范围变更优先改 `config.rs`
//! - 阶段顺序与打标签规则变更优先改 `pipeline.rs`
//! - 单阶段算法优化分别改 `aspect/background/color`
//! - 真正的主体分割或显著性模型：实现 `BackgroundMatte` / `SaliencyDetector` 后注入 `TransformPipeline`

mod aspect;
mod background;
mod cache;
mod color;
mod config;
mod error;
mod fetcher;
mod handler;
mod pipeline;
mod prompt;
mod resize;
mod saliency;
mod service;
mod source;
mod style;

pub use background::{BackgroundMatte, RadialMatte};
pub use cache::CacheManager;
pub use config::{AspectRatio, CropStrategy, EnhancementConfig, EnhancementOverrides};
pub use error::{FetchError, ImageError, PipelineStage};
pub use fetcher::Fetcher;
pub use handler::ImageEnhancer;
pub use pipeline::TransformPipeline;
pub use prompt::{optimize_prompt, OptimizedPrompt};
pub use saliency::{EntropySaliency, SaliencyDetector};
pub use service::{EnhancementService, SlideVisual};
pub use source::{EnhancedImage, Enhancement, ImageMetadata, ImageSource, OutputFormat, SlideContext};
pub use style::{
    derive_style_prompt_suffix, BackgroundPreference, ColorScheme, PresentationType, StyleSettings,
    VisualStyle,
};
