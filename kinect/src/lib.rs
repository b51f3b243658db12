pub mod backend;
pub mod session;

// Re-export 核心类型
pub use kinect_core::{builder, calibration, error, frame, pixel_format, traits};
pub use session::KinectSession;

use kinect_core::error::Result;
use kinect_core::traits::{DeviceInfo, Driver};

/// 预置模块，用户可以通过 `use kinect::prelude::*;` 导入常用项
pub mod prelude {
    pub use crate::session::KinectSession;
    pub use kinect_core::prelude::*;
}

/// 枚举驱动能看到的 Kinect
///
/// 硬件后端用 [`backend::create_driver`] 获取。
pub fn list_devices(driver: &dyn Driver) -> Result<Vec<DeviceInfo>> {
    let devices = driver.list_devices()?;
    tracing::debug!("{} backend found {} device(s)", driver.name(), devices.len());
    Ok(devices)
}
