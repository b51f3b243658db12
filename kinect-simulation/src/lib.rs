//! 仿真驱动
//!
//! 不依赖任何硬件，用于测试会话层的生命周期：
//! - `ResourceCounters` 记录 acquire / release 次数，用来证明没有句柄泄漏
//! - 可以模拟 SDK 未安装、硬件拒绝某种配置、取帧超时、标定读取失败
//! - 帧数据通过和真实后端相同的 core 构造函数生成

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use kinect_core::builder::{ColorResolution, DepthMode, DeviceConfig};
use kinect_core::calibration::{
    Calibration, CameraCalibration, Distortion, Extrinsics, Intrinsics,
};
use kinect_core::error::{KinectError, Result};
use kinect_core::frame::{ColorImage, DepthImage, FramePair};
use kinect_core::traits::{Device, DeviceInfo, Driver};

const BACKEND_NAME: &str = "Simulation";

/// 硬件资源计数
#[derive(Debug, Default)]
pub struct ResourceCounters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    captures: AtomicUsize,
}

impl ResourceCounters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// 尚未释放的句柄数
    pub fn open_handles(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }

    /// get_capture 被调用的次数 (包括超时)
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

/// 预先编排的一次 get_capture 结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedCapture {
    Frame,
    Timeout,
    Failure,
}

#[derive(Debug, Default)]
struct SimShared {
    counters: Arc<ResourceCounters>,
    open_indices: Mutex<HashSet<u32>>,
    script: Mutex<VecDeque<ScriptedCapture>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // 测试里 panic 后的锁仍然可以继续使用
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct SimulatedDriver {
    device_count: u32,
    sdk_installed: bool,
    rejected: Vec<(ColorResolution, DepthMode)>,
    backlog: usize,
    fail_calibration: bool,
    shared: Arc<SimShared>,
}

impl SimulatedDriver {
    pub fn new(device_count: u32) -> Self {
        Self {
            device_count,
            sdk_installed: true,
            rejected: Vec::new(),
            backlog: 0,
            fail_calibration: false,
            shared: Arc::new(SimShared::default()),
        }
    }

    /// 模拟机器上没有安装 SDK
    pub fn without_sdk(mut self) -> Self {
        self.sdk_installed = false;
        self
    }

    /// 让硬件拒绝某个分辨率 / 深度模式组合
    pub fn reject(mut self, resolution: ColorResolution, mode: DepthMode) -> Self {
        self.rejected.push((resolution, mode));
        self
    }

    /// 打开时 SDK 队列里已经积压的帧数
    pub fn with_backlog(mut self, frames: usize) -> Self {
        self.backlog = frames;
        self
    }

    pub fn fail_calibration(mut self) -> Self {
        self.fail_calibration = true;
        self
    }

    /// 追加编排结果，按顺序在后续 get_capture 中消费
    pub fn push_captures<I: IntoIterator<Item = ScriptedCapture>>(&self, script: I) {
        lock(&self.shared.script).extend(script);
    }

    pub fn counters(&self) -> Arc<ResourceCounters> {
        self.shared.counters.clone()
    }

    fn ensure_sdk(&self) -> Result<()> {
        if self.sdk_installed {
            Ok(())
        } else {
            Err(KinectError::DeviceUnavailable(
                "Azure Kinect SDK not installed (simulated)".into(),
            ))
        }
    }
}

impl Driver for SimulatedDriver {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn installed_count(&self) -> Result<u32> {
        self.ensure_sdk()?;
        Ok(self.device_count)
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        self.ensure_sdk()?;
        Ok((0..self.device_count).map(device_info).collect())
    }

    fn open(&self, index: u32, config: &DeviceConfig) -> Result<Box<dyn Device>> {
        self.ensure_sdk()?;

        if index >= self.device_count {
            return Err(KinectError::DeviceUnavailable(format!(
                "device index {index} out of range ({} attached)",
                self.device_count
            )));
        }

        if self
            .rejected
            .contains(&(config.color_resolution, config.depth_mode))
        {
            return Err(KinectError::Configuration(format!(
                "simulated device {index} rejected {} / {}",
                config.color_resolution, config.depth_mode
            )));
        }

        // 同一台设备同一时刻只能被一个句柄独占
        if !lock(&self.shared.open_indices).insert(index) {
            return Err(KinectError::DeviceUnavailable(format!(
                "simulated device {index} is already in use"
            )));
        }

        self.shared.counters.acquired.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            target: "kinect::simulation",
            "Simulated device {} opened: {} / {}",
            index,
            config.color_resolution,
            config.depth_mode
        );

        Ok(Box::new(SimulatedDevice {
            info: device_info(index),
            config: config.clone(),
            shared: self.shared.clone(),
            fail_calibration: self.fail_calibration,
            backlog: self.backlog,
            sequence: 0,
            open: true,
        }))
    }
}

fn device_info(index: u32) -> DeviceInfo {
    DeviceInfo {
        index,
        serial_number: format!("SIM{index:09}"),
        backend: BACKEND_NAME.to_string(),
    }
}

#[derive(Debug)]
pub struct SimulatedDevice {
    info: DeviceInfo,
    config: DeviceConfig,
    shared: Arc<SimShared>,
    fail_calibration: bool,
    backlog: usize,
    sequence: u64,
    open: bool,
}

impl SimulatedDevice {
    fn next_frame(&mut self) -> Result<FramePair> {
        self.sequence += 1;
        synthetic_frame(&self.config, self.sequence)
    }
}

impl Device for SimulatedDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn calibration(&self) -> Result<Calibration> {
        if !self.open {
            return Err(KinectError::DeviceNotOpen);
        }
        if self.fail_calibration {
            return Err(KinectError::Simulation("injected calibration failure".into()));
        }
        Ok(synthetic_calibration(
            self.config.color_resolution,
            self.config.depth_mode,
        ))
    }

    fn get_capture(&mut self, timeout: Duration) -> Result<Option<FramePair>> {
        if !self.open {
            return Err(KinectError::DeviceNotOpen);
        }
        self.shared.counters.captures.fetch_add(1, Ordering::SeqCst);

        let scripted = lock(&self.shared.script).pop_front();
        match scripted {
            Some(ScriptedCapture::Frame) => return self.next_frame().map(Some),
            Some(ScriptedCapture::Timeout) => return Ok(None),
            Some(ScriptedCapture::Failure) => {
                return Err(KinectError::Simulation("injected capture failure".into()))
            }
            None => {}
        }

        // 先消费积压帧；队列为空时，零等待的轮询拿不到新帧
        if self.backlog > 0 {
            self.backlog -= 1;
            return self.next_frame().map(Some);
        }
        if timeout.is_zero() {
            return Ok(None);
        }
        self.next_frame().map(Some)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            lock(&self.shared.open_indices).remove(&self.info.index);
            self.shared.counters.released.fetch_add(1, Ordering::SeqCst);
            tracing::info!(target: "kinect::simulation", "Simulated device {} closed", self.info.index);
        }
        Ok(())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// 生成一组同步帧：彩色为坐标渐变，深度为斜坡
///
/// 设备时间戳 = sequence * 帧周期，便于测试判断是哪一帧。
pub fn synthetic_frame(config: &DeviceConfig, sequence: u64) -> Result<FramePair> {
    let (w, h) = config.color_resolution.dimensions();
    let timestamp = Duration::from_micros(sequence * config.fps.period_usec() as u64);

    let mut bgra = Vec::with_capacity(w as usize * h as usize * 4);
    for y in 0..h {
        for x in 0..w {
            bgra.extend_from_slice(&[x as u8, y as u8, sequence as u8, 255]);
        }
    }
    let color = ColorImage::from_bgra(w, h, w as usize * 4, &bgra, timestamp)?;

    // DEPTH16: 每像素两个字节，本机字节序
    let mut depth16 = Vec::with_capacity(w as usize * h as usize * 2);
    for y in 0..h {
        for x in 0..w {
            depth16.extend_from_slice(&(500 + ((x + y) % 4000) as u16).to_ne_bytes());
        }
    }
    let depth = DepthImage::from_depth16(w, h, w as usize * 2, &depth16, timestamp)?;

    FramePair::new(color, depth)
}

/// 根据分辨率生成近似真实的标定参数
pub fn synthetic_calibration(resolution: ColorResolution, mode: DepthMode) -> Calibration {
    let camera = |(w, h): (u32, u32), focal_scale: f32| CameraCalibration {
        intrinsics: Intrinsics {
            fx: w as f32 * focal_scale,
            fy: w as f32 * focal_scale,
            cx: w as f32 / 2.0 - 0.5,
            cy: h as f32 / 2.0 - 0.5,
        },
        distortion: Distortion {
            k1: 0.45,
            k2: -2.6,
            k3: 1.5,
            k4: 0.33,
            k5: -2.4,
            k6: 1.4,
            p1: 0.0007,
            p2: -0.0003,
            ..Default::default()
        },
        resolution_width: w,
        resolution_height: h,
        metric_radius: 1.7,
    };

    Calibration {
        depth: camera(mode.dimensions(), 0.79),
        color: camera(resolution.dimensions(), 0.48),
        depth_to_color: Extrinsics {
            translation: [-32.0, -2.0, 4.0],
            ..Default::default()
        },
        depth_mode: mode,
        color_resolution: resolution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_close_balance_counters() {
        let driver = SimulatedDriver::new(1);
        let counters = driver.counters();

        let mut dev = driver.open(0, &DeviceConfig::new()).unwrap();
        assert_eq!(counters.open_handles(), 1);
        dev.close().unwrap();
        dev.close().unwrap();
        assert_eq!(counters.acquired(), 1);
        assert_eq!(counters.released(), 1);
    }

    #[test]
    fn enumeration_follows_sdk_presence() {
        let driver = SimulatedDriver::new(2);
        let devices = driver.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].index, 1);
        assert_eq!(devices[1].backend, BACKEND_NAME);

        let missing = SimulatedDriver::new(2).without_sdk();
        assert!(matches!(
            missing.list_devices(),
            Err(KinectError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn device_is_exclusive_until_released() {
        let driver = SimulatedDriver::new(1);
        let first = driver.open(0, &DeviceConfig::new()).unwrap();
        assert!(matches!(
            driver.open(0, &DeviceConfig::new()),
            Err(KinectError::DeviceUnavailable(_))
        ));
        drop(first);
        assert!(driver.open(0, &DeviceConfig::new()).is_ok());
        assert_eq!(driver.counters().open_handles(), 0);
    }

    #[test]
    fn scripted_results_come_first() {
        let driver = SimulatedDriver::new(1);
        driver.push_captures([ScriptedCapture::Timeout, ScriptedCapture::Failure]);
        let mut dev = driver.open(0, &DeviceConfig::new()).unwrap();

        let t = Duration::from_millis(10);
        assert!(dev.get_capture(t).unwrap().is_none());
        assert!(matches!(dev.get_capture(t), Err(KinectError::Simulation(_))));
        assert!(dev.get_capture(t).unwrap().is_some());
        assert_eq!(driver.counters().captures(), 3);
    }

    #[test]
    fn polling_only_drains_backlog() {
        let driver = SimulatedDriver::new(1).with_backlog(2);
        let mut dev = driver.open(0, &DeviceConfig::new()).unwrap();
        assert!(dev.get_capture(Duration::ZERO).unwrap().is_some());
        assert!(dev.get_capture(Duration::ZERO).unwrap().is_some());
        assert!(dev.get_capture(Duration::ZERO).unwrap().is_none());
    }

    #[test]
    fn synthetic_depth_goes_through_depth16_decoding() {
        let cfg = DeviceConfig::new().color_resolution(ColorResolution::R1536p);
        let pair = synthetic_frame(&cfg, 1).unwrap();
        let depth = pair.depth();
        assert_eq!(depth.data.len(), 2048 * 1536);
        assert_eq!(depth.depth_mm(0, 0), Some(500));
        assert_eq!(depth.depth_mm(2047, 1535), Some(500 + (2047 + 1535) % 4000));
        assert_eq!(depth.device_timestamp, pair.color().device_timestamp);
    }

    #[test]
    fn synthetic_frame_matches_color_resolution() {
        let cfg = DeviceConfig::new().color_resolution(ColorResolution::R720p);
        let pair = synthetic_frame(&cfg, 3).unwrap();
        assert_eq!(pair.dimensions(), (1280, 720));
        assert_eq!(pair.color().pixel(5, 7), Some([5, 7, 3]));
        assert_eq!(pair.depth().depth_mm(5, 7), Some(512));
        assert_eq!(pair.color().device_timestamp, Duration::from_micros(3 * 33_333));
    }
}
