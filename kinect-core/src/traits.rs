use std::time::{Duration, Instant};

use crate::builder::DeviceConfig;
use crate::calibration::Calibration;
use crate::error::Result;
use crate::frame::FramePair;

/// 设备基本信息
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// 打开设备时使用的索引
    pub index: u32,

    /// 设备序列号 (e.g. "000123501312")
    pub serial_number: String,

    /// 后端类型标识 (e.g. "K4A", "Simulation")
    pub backend: String,
}

/// 1. 驱动入口：设备枚举与打开
///
/// 这是对厂商 SDK 的唯一接缝。会话层只通过这里接触硬件。
pub trait Driver: Send + Sync {
    /// 后端名称，用于日志
    fn name(&self) -> &str;

    /// 当前连接的设备数量
    /// SDK 未安装时返回 DeviceUnavailable
    fn installed_count(&self) -> Result<u32>;

    /// 扫描总线，返回可打开的设备列表
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// 打开设备并按配置启动彩色/深度流
    ///
    /// 返回的句柄独占硬件资源 (USB 带宽、传感器流)，
    /// 直到调用 [`Device::close`] 或被 Drop。
    fn open(&self, index: u32, config: &DeviceConfig) -> Result<Box<dyn Device>>;
}

/// 2. 已打开的设备句柄
///
/// 必须是 Send，会话可以在线程间移动；但同一时刻只能有一个使用者。
pub trait Device: Send {
    fn info(&self) -> &DeviceInfo;

    /// 从设备读取出厂标定
    fn calibration(&self) -> Result<Calibration>;

    /// 等待一组同步帧
    ///
    /// * `Ok(Some(pair))` - 成功
    /// * `Ok(None)` - 在 `timeout` 内没有新帧 (`Duration::ZERO` 表示只轮询)
    fn get_capture(&mut self, timeout: Duration) -> Result<Option<FramePair>>;

    /// 丢弃积压的旧帧，返回最新一组
    ///
    /// 队列为空时等待新帧。整个调用 (包括清空队列) 不超过 `timeout`：
    /// 到期时直接返回已拿到的最新一组。
    ///
    /// 默认实现逐个转换积压帧；能直接释放原始 capture 的后端应当覆盖它，
    /// 只转换最后一组。
    fn latest_capture(&mut self, timeout: Duration) -> Result<Option<FramePair>> {
        let start = Instant::now();
        let mut latest = None;
        let mut skipped = 0usize;

        while let Some(pair) = self.get_capture(Duration::ZERO)? {
            if latest.replace(pair).is_some() {
                skipped += 1;
            }
            if start.elapsed() >= timeout {
                break;
            }
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} stale frame pairs", skipped);
        }

        match latest {
            Some(pair) => Ok(Some(pair)),
            None => self.get_capture(timeout.saturating_sub(start.elapsed())),
        }
    }

    /// 停止采集并释放句柄，重复调用必须是无操作
    fn close(&mut self) -> Result<()>;
}
