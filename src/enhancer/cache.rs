//! # 结果缓存模块
//!
//! ## 设计思路
//!
//! 两级缓存：进程内 LRU + 磁盘镜像。
//! - 键是 `(来源标识, 完整配置)` 的 SHA-256 指纹，任意配置字段变化都会换键。
//! - 内存未命中时读穿磁盘：`<key>.json` 与字节文件大小一致才视为有效，并提升回内存。
//! - 写入先进内存，磁盘写入在后台执行，失败只记日志，不影响已返回的结果。
//!
//! ## 实现思路
//!
//! 每个文件先写 `.tmp` 再 rename，且先写字节文件、最后写 JSON，
//! 因此 JSON 存在时它指向的字节文件一定是完整的。磁盘镜像不做淘汰。

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use super::config::EnhancementConfig;
use super::error::ImageError;
use super::source::{EnhancedImage, ImageMetadata};

/// 指纹版本盐：输出语义变化时递增，使旧的磁盘条目自然失效。
const CACHE_KEY_VERSION: &str = "slide-image-enhancer/v1";

/// `<key>.json` 的内容。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskEntry {
    cache_key: String,
    metadata: ImageMetadata,
    cached_at: String,
}

pub struct CacheManager {
    memory: Mutex<LruCache<String, EnhancedImage>>,
    directory: PathBuf,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheManager {
    pub fn new(config: &EnhancementConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            directory: config.cache_directory.clone(),
            pending_writes: Mutex::new(Vec::new()),
        }
    }

    /// 计算缓存指纹（小写十六进制）。
    pub fn key(source_id: &str, config: &EnhancementConfig) -> Result<String, ImageError> {
        let config_json = serde_json::to_string(config)
            .map_err(|e| ImageError::Internal(format!("序列化配置失败：{}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(CACHE_KEY_VERSION.as_bytes());
        hasher.update([0u8]);
        hasher.update(source_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(config_json.as_bytes());

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// 查询缓存：先内存，未命中时读穿磁盘。
    pub async fn get(&self, key: &str) -> Option<EnhancedImage> {
        if let Some(hit) = self.get_from_memory(key) {
            log::debug!("♻️ 命中内存缓存 - key={}", short_key(key));
            return Some(hit);
        }

        let directory = self.directory.clone();
        let owned_key = key.to_string();
        let loaded = tokio::task::spawn_blocking(move || read_disk_entry(&directory, &owned_key))
            .await
            .map_err(|e| ImageError::Internal(format!("磁盘缓存读取任务异常：{}", e)));

        match loaded {
            Ok(Ok(Some(image))) => {
                log::info!("💾 命中磁盘缓存 - key={}", short_key(key));
                self.insert_memory(image.clone());
                Some(image)
            }
            Ok(Ok(None)) => None,
            Ok(Err(err)) | Err(err) => {
                log::warn!("⚠️ 磁盘缓存条目无效，按未命中处理 - key={} 原因: {}", short_key(key), err);
                None
            }
        }
    }

    /// 写入缓存：同步进内存，磁盘镜像在后台写入。
    pub fn put(&self, image: EnhancedImage) {
        self.insert_memory(image.clone());

        let directory = self.directory.clone();
        let write = move || {
            let key = image.cache_key.clone();
            if let Err(err) = write_disk_entry(&directory, &image) {
                log::warn!("⚠️ 磁盘缓存写入失败（已忽略）- key={} 原因: {}", short_key(&key), err);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn_blocking(write);
                if let Ok(mut pending) = self.pending_writes.lock() {
                    pending.retain(|pending_task| !pending_task.is_finished());
                    pending.push(task);
                }
            }
            Err(_) => write(),
        }
    }

    /// 等待所有后台磁盘写入完成。
    pub async fn flush(&self) {
        let tasks: Vec<JoinHandle<()>> = match self.pending_writes.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };

        for task in tasks {
            if let Err(err) = task.await {
                log::warn!("⚠️ 磁盘缓存写入任务异常：{}", err);
            }
        }
    }

    /// 内存中的条目数。
    pub fn memory_len(&self) -> usize {
        self.memory.lock().map(|memory| memory.len()).unwrap_or(0)
    }

    /// 仅查询内存层，不触发磁盘读取。
    pub fn contains_in_memory(&self, key: &str) -> bool {
        self.memory
            .lock()
            .map(|memory| memory.contains(key))
            .unwrap_or(false)
    }

    /// 条目对应的 `(字节文件, 元数据文件)` 路径。
    pub fn disk_paths(&self, image: &EnhancedImage) -> (PathBuf, PathBuf) {
        bytes_and_metadata_paths(&self.directory, &image.cache_key, image.metadata.format.extension())
    }

    pub(crate) fn get_from_memory(&self, key: &str) -> Option<EnhancedImage> {
        let mut memory = match self.memory.lock() {
            Ok(guard) => guard,
            Err(_) => return None,
        };
        memory.get(key).cloned()
    }

    fn insert_memory(&self, image: EnhancedImage) {
        let key = image.cache_key.clone();
        if let Ok(mut memory) = self.memory.lock() {
            if let Some((evicted, _)) = memory.push(key.clone(), image) {
                if evicted != key {
                    log::debug!("🧹 LRU 淘汰 - key={}", short_key(&evicted));
                }
            }
        }
    }
}

fn short_key(key: &str) -> &str {
    &key[..key.len().min(12)]
}

fn bytes_and_metadata_paths(directory: &Path, key: &str, extension: &str) -> (PathBuf, PathBuf) {
    (
        directory.join(format!("{}.{}", key, extension)),
        directory.join(format!("{}.json", key)),
    )
}

fn read_disk_entry(directory: &Path, key: &str) -> Result<Option<EnhancedImage>, ImageError> {
    let metadata_path = directory.join(format!("{}.json", key));
    let content = match std::fs::read_to_string(&metadata_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ImageError::FileSystem(format!(
                "无法读取 {}：{}",
                metadata_path.display(),
                e
            )));
        }
    };

    let entry: DiskEntry = serde_json::from_str(&content)
        .map_err(|e| ImageError::FileSystem(format!("元数据解析失败：{}", e)))?;
    if entry.cache_key != key {
        return Err(ImageError::FileSystem(format!(
            "元数据中的 key 不一致：{}",
            short_key(&entry.cache_key)
        )));
    }

    let (bytes_path, _) =
        bytes_and_metadata_paths(directory, key, entry.metadata.format.extension());
    let buffer = std::fs::read(&bytes_path).map_err(|e| {
        ImageError::FileSystem(format!("无法读取 {}：{}", bytes_path.display(), e))
    })?;

    if buffer.len() != entry.metadata.size {
        return Err(ImageError::FileSystem(format!(
            "字节文件大小不一致：{}（元数据：{}）",
            buffer.len(),
            entry.metadata.size
        )));
    }

    Ok(Some(EnhancedImage {
        buffer: Bytes::from(buffer),
        metadata: entry.metadata,
        cache_key: entry.cache_key,
    }))
}

fn write_disk_entry(directory: &Path, image: &EnhancedImage) -> Result<(), ImageError> {
    std::fs::create_dir_all(directory).map_err(|e| {
        ImageError::FileSystem(format!("无法创建缓存目录 {}：{}", directory.display(), e))
    })?;

    let (bytes_path, metadata_path) =
        bytes_and_metadata_paths(directory, &image.cache_key, image.metadata.format.extension());

    let entry = DiskEntry {
        cache_key: image.cache_key.clone(),
        metadata: image.metadata.clone(),
        cached_at: chrono::Utc::now().to_rfc3339(),
    };
    let json = serde_json::to_vec_pretty(&entry)
        .map_err(|e| ImageError::FileSystem(format!("元数据序列化失败：{}", e)))?;

    write_atomically(&bytes_path, &image.buffer)?;
    write_atomically(&metadata_path, &json)?;

    log::debug!("💾 磁盘缓存已写入 - {}", bytes_path.display());
    Ok(())
}

fn write_atomically(path: &Path, content: &[u8]) -> Result<(), ImageError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, content)
        .map_err(|e| ImageError::FileSystem(format!("无法写入 {}：{}", tmp_path.display(), e)))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| ImageError::FileSystem(format!("无法重命名 {}：{}", path.display(), e)))
}
