#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use slide_image_enhancer::enhancer::EnhancementConfig;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let r = (x % 255) as u8;
        let g = (y % 255) as u8;
        let b = ((x + y) % 255) as u8;
        Rgba([r, g, b, 255])
    });

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> String {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(width, height)).expect("write test image failed");
    path.display().to_string()
}

/// 颜色阶段不做任何调整的配置。
pub fn neutral_config(cache_dir: &Path) -> EnhancementConfig {
    EnhancementConfig {
        brightness: 0,
        contrast: 0,
        saturation: 0,
        sharpness: 0,
        cache_directory: cache_dir.to_path_buf(),
        ..Default::default()
    }
}

/// 本地 HTTP 图片服务：每个请求返回同一张图片，并统计请求次数。
pub struct ImageServer {
    pub port: u16,
    hits: Arc<AtomicUsize>,
}

impl ImageServer {
    pub fn start(body: Vec<u8>, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let port = listener.local_addr().expect("read local addr failed").port();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut req_buf = [0u8; 2048];
                let _ = stream.read(&mut req_buf);
                thread::sleep(delay);

                let headers = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(headers.as_bytes());
                let _ = stream.write_all(&body);
                let _ = stream.flush();
            }
        });

        Self { port, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}/{}", self.port, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// 一个确定没有服务在监听的本地地址。
pub fn unreachable_url() -> String {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        listener.local_addr().expect("read local addr failed").port()
    };
    format!("http://127.0.0.1:{}/gone.png", port)
}
