// kinect/examples/kinect_view.rs
//
// 用法: cargo run --example kinect_view -- [device_index] [resolution] [depth_mode]
// 例如: cargo run --example kinect_view -- 0 1080P NFOV_2X2BINNED

use anyhow::{anyhow, Result};
use kinect::prelude::*;
use minifb::{Key, Window, WindowOptions};
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 1. 解析参数
    let args: Vec<String> = std::env::args().skip(1).collect();
    let index: u32 = args.first().map(|s| s.parse()).transpose()?.unwrap_or(0);
    let resolution = args.get(1).map(String::as_str).unwrap_or("1080P");
    let depth_mode = args.get(2).map(String::as_str).unwrap_or("NFOV_2X2BINNED");

    let driver = kinect::backend::create_driver()?;
    for dev in kinect::list_devices(driver.as_ref())? {
        println!("Found device #{} serial={}", dev.index, dev.serial_number);
    }

    let config = DeviceConfig::new()
        .device_index(index)
        .with_names(resolution, depth_mode)?
        .acquisition(AcquisitionMode::Latest)
        .capture_timeout(Duration::from_millis(500));

    // 2. 打开设备 (Drop 时自动释放)
    let mut session = KinectSession::start(driver, config)?;

    let calibration = session.calibration()?;
    println!("Color intrinsics: {:?}", calibration.matrix(CalibrationType::Color));
    println!("Color distortion: {:?}", calibration.distortion(CalibrationType::Color));

    let (w, h) = session.config().color_resolution.dimensions();
    let (w, h) = (w as usize, h as usize);
    let options = || WindowOptions {
        resize: true, // 允许调整大小
        ..WindowOptions::default()
    };
    let mut color_win = Window::new("Color Image", w, h, options())
        .map_err(|e| anyhow!("Failed to create window: {}", e))?;
    let mut depth_win = Window::new("Depth Image", w, h, options())
        .map_err(|e| anyhow!("Failed to create window: {}", e))?;
    color_win.limit_update_rate(Some(Duration::from_millis(16)));

    let mut color_buf = vec![0u32; w * h];
    let mut depth_buf = vec![0u32; w * h];

    let mut last_time = Instant::now();
    let mut frame_count = 0;

    println!("Start capturing... Press ESC or Q to exit.");

    // 3. 主循环
    while color_win.is_open() && depth_win.is_open() {
        if color_win.is_key_down(Key::Escape) || color_win.is_key_down(Key::Q) {
            break;
        }

        let pair = match session.capture() {
            Ok(pair) => pair,
            Err(KinectError::CaptureTimeout { .. }) => {
                // 设备卡住时窗口仍需处理事件，否则无法退出
                color_win.update();
                depth_win.update();
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        // BGR u8 -> 0RGB u32
        for (dst, px) in color_buf.iter_mut().zip(pair.color().data.chunks_exact(3)) {
            *dst = (px[2] as u32) << 16 | (px[1] as u32) << 8 | px[0] as u32;
        }
        // 深度 min-max 归一化为灰度
        for (dst, v) in depth_buf.iter_mut().zip(pair.depth().normalize_to_u8()) {
            let v = v as u32;
            *dst = v << 16 | v << 8 | v;
        }

        color_win
            .update_with_buffer(&color_buf, w, h)
            .map_err(|e| anyhow!("Window update failed: {}", e))?;
        depth_win
            .update_with_buffer(&depth_buf, w, h)
            .map_err(|e| anyhow!("Window update failed: {}", e))?;

        frame_count += 1;
        if frame_count % 30 == 0 {
            let fps = 30.0 / last_time.elapsed().as_secs_f64();
            println!("FPS: {:.1}", fps);
            last_time = Instant::now();
        }
    }

    // 4. 清理 (Drop 会自动处理，但显式调用更规范)
    session.close()?;
    Ok(())
}
