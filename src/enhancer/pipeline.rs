//! # 解码与变换流水线模块
//!
//! ## 设计思路
//!
//! 五个阶段严格串行：Upscale → AspectRatio → Background → ColorEnhance → Encode。
//! 每个阶段消费上一阶段的 RGBA 缓冲；只有真正改动了缓冲的阶段才追加标签。
//! 任一阶段失败立即中止整条流水线，不返回半成品。
//!
//! ## 实现思路
//!
//! 1. 文件签名校验（`infer`）+ 猜测格式并读取 header 尺寸
//! 2. 按像素上限快速拒绝，再完整解码为 RGBA8
//! 3. 依次执行各阶段，阶段之间检查取消标志
//! 4. 编码：默认渐进式 JPEG（`jpeg-encoder`）；要求透明且确有透明像素时输出 PNG

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage, RgbaImage};
use jpeg_encoder::{ColorType, Encoder as JpegEncoder};

use super::aspect;
use super::background::{self, BackgroundMatte, RadialMatte};
use super::color;
use super::config::EnhancementConfig;
use super::error::{ImageError, PipelineStage};
use super::resize::{fit_inside, resize_rgba};
use super::saliency::{EntropySaliency, SaliencyDetector};
use super::source::{Enhancement, OutputFormat, RawImage};

/// 变换流水线。显著性定位与背景遮罩可替换。
pub struct TransformPipeline {
    saliency: Arc<dyn SaliencyDetector>,
    matte: Arc<dyn BackgroundMatte>,
}

/// 流水线产物，由编排层组装为 `EnhancedImage`。
pub(crate) struct PipelineOutput {
    pub(crate) buffer: Vec<u8>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: OutputFormat,
    pub(crate) original_size: usize,
    pub(crate) enhancements: Vec<Enhancement>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new(Arc::new(EntropySaliency), Arc::new(RadialMatte::default()))
    }
}

impl TransformPipeline {
    pub fn new(saliency: Arc<dyn SaliencyDetector>, matte: Arc<dyn BackgroundMatte>) -> Self {
        Self { saliency, matte }
    }

    pub fn with_saliency(mut self, saliency: Arc<dyn SaliencyDetector>) -> Self {
        self.saliency = saliency;
        self
    }

    pub fn with_matte(mut self, matte: Arc<dyn BackgroundMatte>) -> Self {
        self.matte = matte;
        self
    }

    /// 执行完整流水线。`is_cancelled` 在解码后与每个阶段之间被检查。
    pub(crate) fn run<C>(
        &self,
        raw: RawImage,
        config: &EnhancementConfig,
        is_cancelled: C,
    ) -> Result<PipelineOutput, ImageError>
    where
        C: Fn() -> bool,
    {
        let checkpoint = |after: &str| -> Result<(), ImageError> {
            if is_cancelled() {
                return Err(ImageError::Cancelled(format!("{} 之后取消", after)));
            }
            Ok(())
        };

        let original_size = raw.bytes.len();

        let decode_start = Instant::now();
        let (mut image, input_format) = decode(&raw.bytes, config)?;
        drop(raw.bytes);
        let decode_elapsed = decode_start.elapsed();
        log::debug!(
            "🧩 解码完成 - 来源: {} 格式: {:?} 尺寸: {}x{}",
            raw.source_hint,
            input_format,
            image.width(),
            image.height()
        );
        checkpoint("decode")?;

        let mut enhancements = Vec::new();

        let stage_start = Instant::now();
        let upscaled = match upscale(&image, config)? {
            Some(next) => {
                image = next;
                enhancements.push(Enhancement::Upscaled);
                true
            }
            None => false,
        };
        let upscale_elapsed = stage_start.elapsed();
        checkpoint(PipelineStage::Upscale.as_str())?;

        let stage_start = Instant::now();
        if let Some(next) = aspect::normalize(&image, config, upscaled, self.saliency.as_ref())? {
            ensure_pixel_budget(next.width(), next.height(), config, PipelineStage::AspectRatio)?;
            image = next;
            enhancements.push(Enhancement::AspectAdjusted);
        }
        let aspect_elapsed = stage_start.elapsed();
        checkpoint(PipelineStage::AspectRatio.as_str())?;

        let stage_start = Instant::now();
        if config.remove_background {
            log::debug!("✂️ 背景移除 - matte={}", self.matte.name());
            image = background::remove_background(&image, self.matte.as_ref());
            enhancements.push(Enhancement::BackgroundRemoved);
        } else if config.background_blur {
            image = background::blur_background(&image)?;
            enhancements.push(Enhancement::BackgroundBlurred);
        }
        let background_elapsed = stage_start.elapsed();
        checkpoint(PipelineStage::Background.as_str())?;

        let stage_start = Instant::now();
        if config.has_color_adjustments() {
            image = color::enhance(&image, config);
            enhancements.push(Enhancement::ColorEnhanced);
        }
        let color_elapsed = stage_start.elapsed();
        checkpoint(PipelineStage::ColorEnhance.as_str())?;

        let stage_start = Instant::now();
        let (width, height) = image.dimensions();
        let (buffer, format) = encode(&image, config)?;
        let encode_elapsed = stage_start.elapsed();

        log::info!(
            "🧪 变换完成 - decode={}ms upscale={}ms aspect={}ms background={}ms color={}ms encode={}ms 输出: {}x{} {:?}",
            decode_elapsed.as_millis(),
            upscale_elapsed.as_millis(),
            aspect_elapsed.as_millis(),
            background_elapsed.as_millis(),
            color_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            width,
            height,
            format
        );

        Ok(PipelineOutput {
            buffer,
            width,
            height,
            format,
            original_size,
            enhancements,
        })
    }
}

/// 签名校验 + header 尺寸预检 + 完整解码。
fn decode(bytes: &[u8], config: &EnhancementConfig) -> Result<(RgbaImage, ImageFormat), ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Decode("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| ImageError::Decode("无法识别图片类型".to_string()))?;
    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(ImageError::Decode(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| ImageError::Decode(format!("不支持的图片格式：{}", e)))?;

    let (header_width, header_height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(format!("无法识别图片格式：{}", e)))?
        .into_dimensions()
        .map_err(|e| ImageError::Decode(format!("无法读取图片尺寸：{}", e)))?;
    validate_pixel_limits(header_width, header_height, config)?;

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;
    let rgba = decoded.to_rgba8();
    validate_pixel_limits(rgba.width(), rgba.height(), config)?;

    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(ImageError::Decode("图片尺寸为 0".to_string()));
    }

    Ok((rgba, format))
}

fn validate_pixel_limits(width: u32, height: u32, config: &EnhancementConfig) -> Result<(), ImageError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ImageError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

/// 变换阶段产生的新缓冲同样受像素上限约束，超限作为阶段错误上报。
fn ensure_pixel_budget(
    width: u32,
    height: u32,
    config: &EnhancementConfig,
    stage: PipelineStage,
) -> Result<(), ImageError> {
    validate_pixel_limits(width, height, config)
        .map_err(|e| ImageError::stage(stage, e.to_string()))
}

/// 小于目标尺寸时放大：目标为 `max(当前 * 倍率, 目标)` 的 fit-inside。
fn upscale(image: &RgbaImage, config: &EnhancementConfig) -> Result<Option<RgbaImage>, ImageError> {
    let (width, height) = image.dimensions();
    if !config.upscale_enabled
        || (width >= config.target_width && height >= config.target_height)
    {
        return Ok(None);
    }

    let box_w = (width as f64 * config.upscale_factor)
        .max(config.target_width as f64)
        .min(u32::MAX as f64)
        .round() as u32;
    let box_h = (height as f64 * config.upscale_factor)
        .max(config.target_height as f64)
        .min(u32::MAX as f64)
        .round() as u32;
    let (next_w, next_h) = fit_inside(width, height, box_w, box_h);

    if (next_w, next_h) == (width, height) {
        return Ok(None);
    }
    ensure_pixel_budget(next_w, next_h, config, PipelineStage::Upscale)?;

    log::debug!("🔍 放大 - {}x{} -> {}x{}", width, height, next_w, next_h);
    resize_rgba(image, next_w, next_h, PipelineStage::Upscale).map(Some)
}

fn encode(image: &RgbaImage, config: &EnhancementConfig) -> Result<(Vec<u8>, OutputFormat), ImageError> {
    let (width, height) = image.dimensions();
    let has_transparency = image.pixels().any(|p| p[3] < 255);
    let mut buffer = Vec::new();

    if config.transparent_background && has_transparency {
        PngEncoder::new(&mut buffer)
            .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| ImageError::stage(PipelineStage::Encode, format!("PNG 编码失败：{}", e)))?;
        return Ok((buffer, OutputFormat::Png));
    }

    let flattened = RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let premultiply = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        image::Rgb([premultiply(r), premultiply(g), premultiply(b)])
    });

    let (jpeg_width, jpeg_height) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(ImageError::stage(
                PipelineStage::Encode,
                format!("JPEG 尺寸超出 65535：{}x{}", width, height),
            ));
        }
    };

    let mut encoder = JpegEncoder::new(&mut buffer, config.quality);
    encoder.set_progressive(true);
    encoder
        .encode(flattened.as_raw(), jpeg_width, jpeg_height, ColorType::Rgb)
        .map_err(|e| ImageError::stage(PipelineStage::Encode, format!("JPEG 编码失败：{}", e)))?;

    Ok((buffer, OutputFormat::Jpeg))
}
