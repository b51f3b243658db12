use std::fmt;
use std::sync::Arc;

use kinect_core::builder::{AcquisitionMode, DeviceConfig};
use kinect_core::calibration::Calibration;
use kinect_core::error::{KinectError, Result};
use kinect_core::frame::FramePair;
use kinect_core::traits::{Device, DeviceInfo, Driver};

use crate::backend;

/// 会话状态: Idle -> Open -> Closed (终态)
enum SessionState {
    Idle,
    Open {
        device: Box<dyn Device>,
        /// 打开后读取一次，会话期间不变
        calibration: Calibration,
    },
    Closed,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Open { .. } => "open",
            Self::Closed => "closed",
        }
    }
}

/// 一台 Azure Kinect 的采集会话
///
/// 会话独占设备句柄。`close()` 可以显式调用，也会在 Drop 时自动执行，
/// 所以任何提前返回 (包括取帧出错) 都不会泄漏硬件资源。
///
/// ```no_run
/// use kinect::prelude::*;
///
/// # fn main() -> kinect::error::Result<()> {
/// let config = DeviceConfig::new()
///     .color_resolution(ColorResolution::R720p)
///     .depth_mode(DepthMode::NfovUnbinned);
/// let mut session = KinectSession::with_default_driver(config)?;
///
/// let pair = session.capture()?;
/// let k = session.calibration()?.matrix(CalibrationType::Color);
/// println!("{:?} fx={}", pair.dimensions(), k[0][0]);
///
/// session.close()?;
/// # Ok(())
/// # }
/// ```
pub struct KinectSession {
    driver: Arc<dyn Driver>,
    config: DeviceConfig,
    state: SessionState,
}

impl KinectSession {
    /// 创建会话但不接触硬件
    pub fn new(driver: Arc<dyn Driver>, config: DeviceConfig) -> Self {
        Self {
            driver,
            config,
            state: SessionState::Idle,
        }
    }

    /// 创建并立即打开
    pub fn start(driver: Arc<dyn Driver>, config: DeviceConfig) -> Result<Self> {
        let mut session = Self::new(driver, config);
        session.open()?;
        Ok(session)
    }

    /// 使用默认后端 (libk4a) 打开
    pub fn with_default_driver(config: DeviceConfig) -> Result<Self> {
        Self::start(backend::create_driver()?, config)
    }

    /// 打开设备并启动采集
    ///
    /// 配置会先做校验，不合法的组合不会接触硬件。
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Open { .. } => return Err(KinectError::AlreadyOpen),
            SessionState::Closed => return Err(KinectError::SessionClosed),
        }

        // 1. 校验配置
        self.config.validate()?;

        // 2. 检查设备是否存在
        let index = self.config.device_index;
        let count = self.driver.installed_count()?;
        if index >= count {
            return Err(KinectError::DeviceUnavailable(format!(
                "device index {index} out of range ({count} attached)"
            )));
        }

        // 3. 打开并启动相机
        let mut device = self.driver.open(index, &self.config)?;

        // 4. 读取标定；失败时立即释放刚拿到的句柄
        let calibration = match device.calibration() {
            Ok(calibration) => calibration,
            Err(e) => {
                if let Err(close_err) = device.close() {
                    tracing::warn!("Failed to release device {} after error: {}", index, close_err);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Kinect session opened via {}: device {} ({}), {} / {} @ {} fps",
            self.driver.name(),
            index,
            device.info().serial_number,
            self.config.color_resolution,
            self.config.depth_mode,
            self.config.fps.hz()
        );

        self.state = SessionState::Open {
            device,
            calibration,
        };
        Ok(())
    }

    /// 获取一组同步的彩色 + 深度帧
    ///
    /// * `WaitNext` - 最多等待 `capture_timeout`
    /// * `Latest` - 丢弃积压的旧帧，返回最新一组；没有积压时等待新帧。
    ///   清空队列同样计入 `capture_timeout`
    pub fn capture(&mut self) -> Result<FramePair> {
        let timeout = self.config.capture_timeout;
        let acquisition = self.config.acquisition;

        let SessionState::Open { device, .. } = &mut self.state else {
            return Err(KinectError::DeviceNotOpen);
        };

        let pair = match acquisition {
            AcquisitionMode::WaitNext => device.get_capture(timeout)?,
            AcquisitionMode::Latest => device.latest_capture(timeout)?,
        };

        pair.ok_or(KinectError::CaptureTimeout { timeout })
    }

    /// 打开时读取的标定参数
    pub fn calibration(&self) -> Result<&Calibration> {
        match &self.state {
            SessionState::Open { calibration, .. } => Ok(calibration),
            _ => Err(KinectError::DeviceNotOpen),
        }
    }

    /// 释放设备。重复调用是无操作。
    ///
    /// 即使 SDK 在释放时报错，会话也会进入 Closed 状态。
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Open { mut device, .. } => {
                let index = device.info().index;
                let res = device.close();
                tracing::info!("Kinect session closed: device {}", index);
                res
            }
            SessionState::Idle | SessionState::Closed => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Open { .. })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        match &self.state {
            SessionState::Open { device, .. } => Some(device.info()),
            _ => None,
        }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// 导出当前会话快照 (用于日志或持久化)
    #[cfg(feature = "serialize")]
    pub fn export_state(&self) -> Result<serde_json::Value> {
        use serde_json::json;

        let calibration = match &self.state {
            SessionState::Open { calibration, .. } => Some(serde_json::to_value(calibration)?),
            _ => None,
        };

        Ok(json!({
            "backend": self.driver.name(),
            "state": self.state.name(),
            "device": self.device_info().map(serde_json::to_value).transpose()?,
            "config": serde_json::to_value(&self.config)?,
            "calibration": calibration,
        }))
    }
}

impl fmt::Debug for KinectSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KinectSession")
            .field("backend", &self.driver.name())
            .field("state", &self.state.name())
            .field("config", &self.config)
            .finish()
    }
}

// 析构：保证硬件一定被释放
impl Drop for KinectSession {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                tracing::warn!("Failed to release Kinect on drop: {}", e);
            }
        }
    }
}
