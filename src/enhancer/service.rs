//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `EnhancementService` 作为显式构造、按引用传递的服务实例，替代模块级单例。
//! 好处：
//! 1. 生命周期清晰（由调用方统一管理）
//! 2. 测试可创建独立实例，减少共享状态副作用
//! 3. 可按场景注入不同配置或流水线
//!
//! ## 实现思路
//!
//! 对外仅暴露少量稳定 API：
//! - `enhance_image`：执行完整增强链路，错误统一包装为 `EnhancementError`
//! - `enhance_image_for_request` / `cancel_request`：按请求 ID 取消
//! - `enhance_for_slide`：失败时记录日志并回退到原图

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::config::{EnhancementConfig, EnhancementOverrides};
use super::error::ImageError;
use super::handler::{describe_source, ImageEnhancer};
use super::source::{EnhancedImage, ImageSource, SlideContext};
use crate::error::EnhancementError;

/// 幻灯片上最终使用的图片。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideVisual {
    Enhanced(EnhancedImage),
    /// 增强失败，回退到原始地址。
    Original { url: String, reason: String },
}

/// 图片增强服务状态。
pub struct EnhancementService {
    enhancer: ImageEnhancer,
    /// 同一请求 ID 可能同时有多个调用，逐个保留其标志。
    cancel_flags: Mutex<HashMap<String, Vec<Arc<AtomicBool>>>>,
}

impl EnhancementService {
    /// 使用给定配置创建服务。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use slide_image_enhancer::enhancer::{EnhancementConfig, EnhancementService};
    ///
    /// let service = EnhancementService::new(EnhancementConfig::default())?;
    /// # Ok::<(), slide_image_enhancer::error::EnhancementError>(())
    /// ```
    pub fn new(config: EnhancementConfig) -> Result<Self, EnhancementError> {
        Ok(Self::with_enhancer(ImageEnhancer::new(config)?))
    }

    /// 将覆盖项合并到默认配置后创建服务。
    pub fn from_overrides(overrides: &EnhancementOverrides) -> Result<Self, EnhancementError> {
        Self::new(EnhancementConfig::resolve(overrides))
    }

    /// 包装一个已构造的增强器（例如替换了流水线策略）。
    pub fn with_enhancer(enhancer: ImageEnhancer) -> Self {
        Self {
            enhancer,
            cancel_flags: Mutex::new(HashMap::new()),
        }
    }

    pub fn enhancer(&self) -> &ImageEnhancer {
        &self.enhancer
    }

    pub fn config(&self) -> &EnhancementConfig {
        self.enhancer.config()
    }

    /// 增强入口：`prompt` 与 `context` 只用于日志，不影响结果与缓存指纹。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use slide_image_enhancer::enhancer::{EnhancementConfig, EnhancementService, SlideContext};
    ///
    /// # async fn demo() -> Result<(), slide_image_enhancer::error::EnhancementError> {
    /// let service = EnhancementService::new(EnhancementConfig::default())?;
    /// let context = SlideContext {
    ///     title: Some("Quarterly results".into()),
    ///     ..Default::default()
    /// };
    /// let image = service
    ///     .enhance_image("https://example.com/chart-hero.png", Some("bar chart hero"), Some(&context))
    ///     .await?;
    /// assert_eq!(image.metadata.size, image.buffer.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn enhance_image(
        &self,
        image_url: &str,
        prompt: Option<&str>,
        context: Option<&SlideContext>,
    ) -> Result<EnhancedImage, EnhancementError> {
        self.run(image_url, prompt, context, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// 带请求 ID 的增强入口，可通过 `cancel_request` 取消。
    pub async fn enhance_image_for_request(
        &self,
        request_id: &str,
        image_url: &str,
        prompt: Option<&str>,
        context: Option<&SlideContext>,
    ) -> Result<EnhancedImage, EnhancementError> {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        {
            let mut guard = self
                .cancel_flags
                .lock()
                .map_err(|_| ImageError::Internal("取消标志锁已中毒".to_string()))?;
            guard
                .entry(request_id.to_string())
                .or_default()
                .push(Arc::clone(&cancel_flag));
        }

        let result = self
            .run(image_url, prompt, context, Arc::clone(&cancel_flag))
            .await;

        if let Ok(mut guard) = self.cancel_flags.lock() {
            if let Some(flags) = guard.get_mut(request_id) {
                flags.retain(|flag| !Arc::ptr_eq(flag, &cancel_flag));
                if flags.is_empty() {
                    guard.remove(request_id);
                }
            }
        }

        result
    }

    /// 取消在途请求；请求不存在时返回 `false`。
    pub fn cancel_request(&self, request_id: &str) -> bool {
        let Ok(guard) = self.cancel_flags.lock() else {
            return false;
        };

        match guard.get(request_id) {
            Some(flags) => {
                for flag in flags {
                    flag.store(true, Ordering::SeqCst);
                }
                log::info!("🛑 已请求取消图片增强 - request_id={}", request_id);
                true
            }
            None => false,
        }
    }

    /// 面向幻灯片的入口：增强失败时记录 warn 并回退到原图。
    pub async fn enhance_for_slide(
        &self,
        image_url: &str,
        prompt: Option<&str>,
        context: Option<&SlideContext>,
    ) -> SlideVisual {
        match self.enhance_image(image_url, prompt, context).await {
            Ok(image) => SlideVisual::Enhanced(image),
            Err(err) => {
                log::warn!(
                    "⚠️ 图片增强失败，回退到原图 - 幻灯片: {} 错误码: {} 原因: {}",
                    context.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
                    err.code(),
                    err
                );
                SlideVisual::Original {
                    url: image_url.to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    /// 等待所有后台磁盘缓存写入完成。
    pub async fn flush_cache_writes(&self) {
        self.enhancer.cache().flush().await;
    }

    async fn run(
        &self,
        image_url: &str,
        prompt: Option<&str>,
        context: Option<&SlideContext>,
        cancel: Arc<AtomicBool>,
    ) -> Result<EnhancedImage, EnhancementError> {
        log::info!(
            "🖼️ 开始增强图片 - 来源: {} 幻灯片: {} 提示词: {}",
            describe_source(&ImageSource::parse(image_url)),
            context.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            prompt.unwrap_or("-")
        );

        self.enhancer
            .enhance_with_cancel(image_url, cancel)
            .await
            .map_err(|err| {
                log::error!("❌ 图片增强失败 - 错误码: {} 原因: {}", err.code(), err);
                EnhancementError::from(err)
            })
    }
}
