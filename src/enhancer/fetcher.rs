//! # 加载模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（URL / Data URL / 本地文件）的原始字节加载，并尽早做体积校验。
//! 网络下载是单次请求：不重试、不跟随回源，超时由客户端整体超时兜底。
//!
//! ## 实现思路
//!
//! - URL：协议校验 + 状态码校验 + Content-Length 预检 + 分块读取并累计体积。
//! - Data URL：先按长度估算解码体积，超限直接拒绝，再做 Base64 解码。
//! - 文件：metadata 体积预检 + 读取。
//! - reqwest 错误统一映射到 `FetchError`，URL 在日志中脱敏。

use std::path::Path;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};

use super::config::EnhancementConfig;
use super::error::{FetchError, ImageError};
use super::source::{ImageSource, RawImage};

const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;

/// 原始字节加载器，内部复用一个 HTTP 客户端。
pub struct Fetcher {
    client: reqwest::Client,
    timeout_ms: u64,
    max_file_size: u64,
}

impl Fetcher {
    pub fn new(config: &EnhancementConfig) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .build()
            .map_err(|e| FetchError::Transport(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            client,
            timeout_ms: config.fetch_timeout_ms,
            max_file_size: config.max_file_size,
        })
    }

    /// 按来源加载原始字节。
    pub(crate) async fn load(&self, source: &ImageSource) -> Result<RawImage, ImageError> {
        let bytes = match source {
            ImageSource::Url(url) => self.fetch(url).await?,
            ImageSource::DataUrl(data) => self.decode_data_url(data)?,
            ImageSource::FilePath(path) => self.read_file(path)?,
        };

        Ok(RawImage {
            bytes,
            source_hint: source.hint(),
        })
    }

    /// 单次 HTTP GET，带整体超时。
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(FetchError::InvalidUrl("仅支持 HTTP/HTTPS".to_string()));
        }

        log::info!("🌐 开始下载图片 - URL: {}", redact_url_for_log(url));

        let mut response = self
            .client
            .get(parsed)
            .header(reqwest::header::ACCEPT, "image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, url))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status,
                reason: status_message(status),
            });
        }

        if let Some(size) = response.content_length() {
            if size > self.max_file_size {
                return Err(FetchError::TooLarge {
                    size,
                    limit: self.max_file_size,
                });
            }
        }

        let initial_capacity = response
            .content_length()
            .map(|len| len.min(self.max_file_size) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BUFFER_INITIAL_CAPACITY);
        let mut buffer = Vec::with_capacity(initial_capacity);

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_reqwest_error(e, url))?
        {
            let total = buffer.len() as u64 + chunk.len() as u64;
            if total > self.max_file_size {
                return Err(FetchError::TooLarge {
                    size: total,
                    limit: self.max_file_size,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        log::debug!("✅ 下载完成 - {} bytes", buffer.len());
        Ok(buffer)
    }

    fn decode_data_url(&self, data: &str) -> Result<Vec<u8>, ImageError> {
        let normalized = data.trim();
        if !normalized.starts_with("data:image/") {
            return Err(ImageError::Decode("Data URL 不是图片类型".to_string()));
        }

        let base64_start = normalized
            .find(";base64,")
            .ok_or_else(|| ImageError::Decode("缺少 base64 标记".to_string()))?;
        let payload = &normalized[base64_start + 8..];

        let estimated = estimate_base64_decoded_len(payload);
        if estimated > self.max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                self.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ImageError::Decode(format!("Base64 解码失败：{}", e)))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, ImageError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let metadata = std::fs::metadata(path).map_err(|e| {
            ImageError::FileSystem(format!("无法读取文件信息 {}：{}", path.display(), e))
        })?;

        if metadata.len() > self.max_file_size {
            return Err(ImageError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                self.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        std::fs::read(path)
            .map_err(|e| ImageError::FileSystem(format!("无法读取图片文件：{}", e)))
    }

    fn map_reqwest_error(&self, e: reqwest::Error, url: &str) -> FetchError {
        let message = e.to_string().replace(url, &redact_url_for_log(url));

        if e.is_timeout() {
            FetchError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else if e.is_connect() {
            FetchError::Transport(format!("无法连接：{}", message))
        } else {
            FetchError::Transport(format!("请求失败：{}", message))
        }
    }
}

fn estimate_base64_decoded_len(payload: &str) -> u64 {
    let len = payload.trim().len() as u64;
    len.saturating_add(3) / 4 * 3
}

/// 常见 HTTP 状态码本地化文案。
fn status_message(code: u16) -> &'static str {
    match code {
        404 => "未找到",
        403 => "访问被拒绝",
        500..=599 => "服务器错误",
        _ => "请求失败",
    }
}

/// 日志用 URL：去掉 query 与 fragment。
pub(crate) fn redact_url_for_log(url: &str) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
}
