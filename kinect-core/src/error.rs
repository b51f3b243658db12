use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KinectError {
    /// 没有找到设备，索引越界，或者 SDK/驱动未安装
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// 分辨率 / 深度模式 / 帧率组合不被硬件支持
    #[error("Unsupported configuration: {0}")]
    Configuration(String),

    #[error("Device is not open")]
    DeviceNotOpen,

    #[error("No synchronized frame pair within {} ms", timeout.as_millis())]
    CaptureTimeout { timeout: Duration },

    #[error("Session already holds an open device")]
    AlreadyOpen,

    #[error("Session has been closed and cannot be reopened")]
    SessionClosed,

    /// SDK 原语返回了 FAILED
    #[error("SDK call `{call}` failed")]
    Sdk { call: &'static str },

    #[error(
        "Frame pair mismatch: color {color_width}x{color_height}, depth {depth_width}x{depth_height}"
    )]
    FrameMismatch {
        color_width: u32,
        color_height: u32,
        depth_width: u32,
        depth_height: u32,
    },

    /// 缓冲区大小与声明的尺寸/跨距不符
    #[error("Invalid image buffer: {0}")]
    InvalidImage(String),

    #[error("Simulation backend error: {0}")]
    Simulation(String),

    #[cfg(feature = "serialize")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KinectError>;
