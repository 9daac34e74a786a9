//! # 幻灯片图片增强 — 命令行入口
//!
//! 本文件仅负责日志初始化、参数解析与结果落盘。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use slide_image_enhancer::enhancer::{
    EnhancementOverrides, EnhancementService, ImageMetadata, SlideContext,
};

/// 增强一张幻灯片配图并写出结果。
#[derive(Debug, Parser)]
#[command(name = "slide-image-enhancer", version, about)]
struct Cli {
    /// 图片来源：http(s) URL、data:image/...;base64 或本地文件路径
    source: String,

    /// 输出文件路径
    #[arg(short, long)]
    out: PathBuf,

    /// JSON 格式的增强配置覆盖项（camelCase 字段）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 生成该图片时使用的提示词（仅用于日志）
    #[arg(long)]
    prompt: Option<String>,

    /// 所在幻灯片标题（仅用于日志）
    #[arg(long)]
    title: Option<String>,

    /// 所在幻灯片版式（仅用于日志）
    #[arg(long)]
    layout: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    output: &'a std::path::Path,
    cache_key: &'a str,
    mime_type: &'static str,
    metadata: &'a ImageMetadata,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ {}", err);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let overrides = match &cli.config {
        Some(path) => EnhancementOverrides::from_json_file(path)?,
        None => EnhancementOverrides::default(),
    };
    let service = EnhancementService::from_overrides(&overrides)?;

    let context = SlideContext {
        title: cli.title.clone(),
        layout: cli.layout.clone(),
        ..Default::default()
    };
    let result = service
        .enhance_image(&cli.source, cli.prompt.as_deref(), Some(&context))
        .await;
    service.flush_cache_writes().await;
    let image = result?;

    std::fs::write(&cli.out, &image.buffer)
        .map_err(|e| format!("无法写入输出文件 {}：{}", cli.out.display(), e))?;

    let report = Report {
        output: &cli.out,
        cache_key: &image.cache_key,
        mime_type: image.metadata.format.mime_type(),
        metadata: &image.metadata,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
