use std::sync::Arc;

use kinect_core::error::Result;
use kinect_core::traits::Driver;

/// 创建默认驱动实例
///
/// 开启 `k4a` 特性时加载 libk4a；SDK 未安装则返回 DeviceUnavailable。
#[cfg(feature = "k4a")]
pub fn create_driver() -> Result<Arc<dyn Driver>> {
    kinect_backend_k4a::default_driver()
}

#[cfg(not(feature = "k4a"))]
pub fn create_driver() -> Result<Arc<dyn Driver>> {
    Err(kinect_core::error::KinectError::DeviceUnavailable(
        "built without the `k4a` feature; no hardware backend available".into(),
    ))
}

/// 无硬件时使用的仿真驱动
#[cfg(feature = "simulation")]
pub fn create_simulated_driver(device_count: u32) -> Arc<dyn Driver> {
    Arc::new(kinect_simulation::SimulatedDriver::new(device_count))
}
