//! # 幻灯片图片增强 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            调用方（幻灯片生成 / CLI）                     │
//! │   enhance_image(url, prompt?, slideContext?)             │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<EnhancedImage, EnhancementError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            enhancer                              │
//! │                                                          │
//! │  ┌─ service ──── 服务实例 / 请求取消 / 失败回退           │
//! │  ├─ handler ──── 指纹 + 单飞合并 + 阶段耗时              │
//! │  ├─ cache ────── 内存 LRU + 磁盘镜像（读穿）             │
//! │  ├─ fetcher ──── URL / Data URL / 文件                   │
//! │  └─ pipeline ─── 解码 → 五阶段变换 → 编码                │
//! │       ├─ aspect + saliency   宽高比归一化 / smart 裁剪   │
//! │       ├─ background          背景移除 / 虚化             │
//! │       └─ color               亮度·对比度·饱和度·锐化     │
//! │                                                          │
//! │  config · style · prompt     配置与提示词辅助            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 顶层错误类型 `EnhancementError` |
//! | [`enhancer`] | 图片增强流水线、缓存、服务入口 |

pub mod enhancer;
pub mod error;

pub use enhancer::{EnhancedImage, EnhancementConfig, EnhancementService, ImageMetadata};
pub use error::EnhancementError;
