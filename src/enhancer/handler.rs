//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageEnhancer` 只负责流程编排，不持有任何全局状态，由调用方显式构造并共享。
//! 处理链路固定为：
//! 1. 计算缓存指纹并查询缓存
//! 2. 同一指纹的并发请求合并为一次计算（single-flight）
//! 3. 加载原始字节 → 在阻塞线程池中跑变换流水线 → 组装结果
//! 4. 写入缓存并唤醒所有等待者
//!
//! ## 实现思路
//!
//! - 在途表 `HashMap<指纹, Inflight>`：计算结束时由计算自身移除条目，
//!   失败不会被记忆，下一次请求会重新计算。
//! - 每个等待者一边等共享结果一边轮询自己的取消标志，取消只影响它自己。
//! - 共享计算在下载前、下载后以及每个阶段之间检查“是否所有关注者都已取消”。
//! - 记录 `load/transform/total` 阶段耗时，便于性能诊断。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt, Shared};

use super::cache::CacheManager;
use super::config::EnhancementConfig;
use super::error::ImageError;
use super::fetcher::{redact_url_for_log, Fetcher};
use super::pipeline::TransformPipeline;
use super::source::{EnhancedImage, ImageMetadata, ImageSource};

type SharedEnhancement = Shared<BoxFuture<'static, Result<EnhancedImage, ImageError>>>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 一次共享计算的关注者标志。
#[derive(Default)]
struct Interest {
    flags: Mutex<Vec<Arc<AtomicBool>>>,
}

impl Interest {
    fn register(&self, flag: &Arc<AtomicBool>) {
        if let Ok(mut flags) = self.flags.lock() {
            flags.push(Arc::clone(flag));
        }
    }

    fn all_cancelled(&self) -> bool {
        self.flags
            .lock()
            .map(|flags| !flags.is_empty() && flags.iter().all(|f| f.load(Ordering::SeqCst)))
            .unwrap_or(false)
    }
}

#[derive(Clone)]
struct Inflight {
    future: SharedEnhancement,
    interest: Arc<Interest>,
}

enum Joined {
    Cached(EnhancedImage),
    Flight(Inflight),
}

/// 图片增强器。
///
/// 克隆开销很小，所有克隆共享同一份配置、缓存与在途表。
#[derive(Clone)]
pub struct ImageEnhancer {
    config: Arc<EnhancementConfig>,
    fetcher: Arc<Fetcher>,
    cache: Arc<CacheManager>,
    pipeline: Arc<TransformPipeline>,
    inflight: Arc<Mutex<HashMap<String, Inflight>>>,
}

impl ImageEnhancer {
    /// 根据配置创建增强器，配置会先被夹紧。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use slide_image_enhancer::enhancer::{EnhancementConfig, ImageEnhancer};
    ///
    /// # async fn demo() -> Result<(), slide_image_enhancer::enhancer::ImageError> {
    /// let enhancer = ImageEnhancer::new(EnhancementConfig::default())?;
    /// let image = enhancer.enhance("https://example.com/hero.png").await?;
    /// println!("{}x{}", image.metadata.width, image.metadata.height);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: EnhancementConfig) -> Result<Self, ImageError> {
        Self::with_pipeline(config, TransformPipeline::default())
    }

    /// 使用自定义流水线（例如替换显著性定位或背景遮罩）创建增强器。
    pub fn with_pipeline(
        config: EnhancementConfig,
        pipeline: TransformPipeline,
    ) -> Result<Self, ImageError> {
        let config = config.clamped();
        let fetcher = Fetcher::new(&config)?;
        let cache = CacheManager::new(&config);

        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            cache: Arc::new(cache),
            pipeline: Arc::new(pipeline),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &EnhancementConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// 某个来源在当前配置下的缓存指纹。
    pub fn cache_key(&self, source_id: &str) -> Result<String, ImageError> {
        CacheManager::key(source_id.trim(), &self.config)
    }

    pub async fn enhance(&self, source_id: &str) -> Result<EnhancedImage, ImageError> {
        self.enhance_with_cancel(source_id, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// 处理主入口：缓存 → 单飞合并 → 计算。
    ///
    /// 每个调用方只受自己的取消标志约束；共享计算在所有关注者都取消后才停止。
    pub async fn enhance_with_cancel(
        &self,
        source_id: &str,
        cancel: Arc<AtomicBool>,
    ) -> Result<EnhancedImage, ImageError> {
        check_cancelled(cancel.load(Ordering::SeqCst), "开始")?;
        let key = self.cache_key(source_id)?;

        loop {
            if self.config.enable_caching {
                if let Some(hit) = self.cache.get(&key).await {
                    return Ok(hit);
                }
            }

            let flight = match self.join_or_start(&key, source_id, &cancel)? {
                Joined::Cached(hit) => return Ok(hit),
                Joined::Flight(flight) => flight,
            };

            match await_or_cancel(flight.future.clone(), &cancel).await {
                Err(err) if err.is_cancelled() && cancel.load(Ordering::SeqCst) => {
                    self.abandon_if_unwanted(&key, &flight.interest);
                    return Err(err);
                }
                Err(err) if err.is_cancelled() => {
                    log::info!("🔁 共享计算已被其他请求取消，重新发起 - key={}", &key[..12]);
                }
                result => return result,
            }
        }
    }

    /// 当前在途计算数量。
    pub fn inflight_len(&self) -> usize {
        self.inflight.lock().map(|inflight| inflight.len()).unwrap_or(0)
    }

    fn join_or_start(
        &self,
        key: &str,
        source_id: &str,
        cancel: &Arc<AtomicBool>,
    ) -> Result<Joined, ImageError> {
        let mut inflight = self
            .inflight
            .lock()
            .map_err(|_| ImageError::Internal("在途表锁已中毒".to_string()))?;

        if let Some(existing) = inflight.get(key) {
            log::debug!("⏳ 合并到在途计算 - key={}", &key[..12]);
            existing.interest.register(cancel);
            return Ok(Joined::Flight(existing.clone()));
        }

        // 上一轮计算可能在本次缓存查询之后才写入并离开在途表
        if self.config.enable_caching {
            if let Some(hit) = self.cache.get_from_memory(key) {
                return Ok(Joined::Cached(hit));
            }
        }

        let interest = Arc::new(Interest::default());
        interest.register(cancel);

        let this = self.clone();
        let owned_key = key.to_string();
        let source = source_id.trim().to_string();
        let watched = Arc::clone(&interest);

        let future = async move {
            let result = this.compute(&source, &owned_key, &watched).await;
            if let Ok(image) = &result {
                if this.config.enable_caching {
                    this.cache.put(image.clone());
                }
            }
            this.forget_inflight(&owned_key, &watched);
            result
        }
        .boxed()
        .shared();

        let flight = Inflight { future, interest };
        inflight.insert(key.to_string(), flight.clone());
        Ok(Joined::Flight(flight))
    }

    /// 只移除仍属于同一次计算的条目。
    fn forget_inflight(&self, key: &str, interest: &Arc<Interest>) {
        if let Ok(mut inflight) = self.inflight.lock() {
            if inflight
                .get(key)
                .is_some_and(|flight| Arc::ptr_eq(&flight.interest, interest))
            {
                inflight.remove(key);
            }
        }
    }

    /// 所有关注者都已取消时丢弃在途计算，未被轮询的计算随之释放。
    fn abandon_if_unwanted(&self, key: &str, interest: &Arc<Interest>) {
        if interest.all_cancelled() {
            log::debug!("🛑 在途计算已无关注者，丢弃 - key={}", &key[..12]);
            self.forget_inflight(key, interest);
        }
    }

    async fn compute(
        &self,
        source_id: &str,
        key: &str,
        interest: &Arc<Interest>,
    ) -> Result<EnhancedImage, ImageError> {
        let total_start = Instant::now();
        let source = ImageSource::parse(source_id);

        check_cancelled(interest.all_cancelled(), "下载前")?;
        let load_start = Instant::now();
        let raw = self.fetcher.load(&source).await?;
        let load_elapsed = load_start.elapsed();
        check_cancelled(interest.all_cancelled(), "下载后")?;

        let transform_start = Instant::now();
        let pipeline = Arc::clone(&self.pipeline);
        let config = Arc::clone(&self.config);
        let watched = Arc::clone(interest);
        let output = tokio::task::spawn_blocking(move || {
            pipeline.run(raw, &config, || watched.all_cancelled())
        })
        .await
        .map_err(|e| ImageError::Internal(format!("变换任务异常退出：{}", e)))??;
        let transform_elapsed = transform_start.elapsed();

        let processing_time_ms = total_start.elapsed().as_millis() as u64;
        let buffer = Bytes::from(output.buffer);
        let metadata = ImageMetadata {
            width: output.width,
            height: output.height,
            format: output.format,
            size: buffer.len(),
            original_size: output.original_size,
            processing_time_ms,
            enhancements: output.enhancements,
        };

        log::info!(
            "✅ 图片增强完成 - 来源: {} load={}ms transform={}ms total={}ms 增强: [{}]",
            describe_source(&source),
            load_elapsed.as_millis(),
            transform_elapsed.as_millis(),
            processing_time_ms,
            metadata
                .enhancements
                .iter()
                .map(|tag| tag.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(EnhancedImage {
            buffer,
            metadata,
            cache_key: key.to_string(),
        })
    }
}

fn check_cancelled(cancelled: bool, at: &str) -> Result<(), ImageError> {
    if cancelled {
        return Err(ImageError::Cancelled(format!("{}取消", at)));
    }
    Ok(())
}

/// 等待共享结果，同时定期检查调用方自己的取消标志。
async fn await_or_cancel(
    mut future: SharedEnhancement,
    cancel: &AtomicBool,
) -> Result<EnhancedImage, ImageError> {
    loop {
        tokio::select! {
            result = &mut future => return result,
            _ = tokio::time::sleep(CANCEL_POLL_INTERVAL) => {
                check_cancelled(cancel.load(Ordering::SeqCst), "等待结果时")?;
            }
        }
    }
}

/// 日志用来源描述：URL 脱敏，Data URL 只记录长度。
pub(crate) fn describe_source(source: &ImageSource) -> String {
    match source {
        ImageSource::Url(url) => redact_url_for_log(url),
        ImageSource::DataUrl(data) => format!("data-url({} chars)", data.len()),
        ImageSource::FilePath(path) => path.display().to_string(),
    }
}
