mod capture;
mod device;
mod enum_map;
mod ffi;

use std::ffi::OsStr;
use std::sync::Arc;

use kinect_core::builder::DeviceConfig;
use kinect_core::error::{KinectError, Result};
use kinect_core::traits::{Device, DeviceInfo, Driver};

pub use device::K4aDevice;
pub use ffi::LIBRARY_PATH_ENV;

/// Azure Kinect Sensor SDK 驱动
///
/// 持有已加载的 libk4a 函数表；打开的每个设备共享同一份。
#[derive(Debug, Clone)]
pub struct K4aDriver {
    api: Arc<ffi::K4aApi>,
}

impl K4aDriver {
    /// 按平台默认名称 (或 `K4A_LIBRARY_PATH`) 加载 SDK
    pub fn new() -> Result<Self> {
        Ok(Self {
            api: Arc::new(ffi::K4aApi::load()?),
        })
    }

    /// 从指定路径加载 SDK
    pub fn with_library<P: AsRef<OsStr>>(path: P) -> Result<Self> {
        Ok(Self {
            api: Arc::new(ffi::K4aApi::load_from(path.as_ref())?),
        })
    }
}

// 实现 Driver Trait
impl Driver for K4aDriver {
    fn name(&self) -> &str {
        device::BACKEND_NAME
    }

    fn installed_count(&self) -> Result<u32> {
        Ok(device::installed_count(&self.api))
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        device::list_devices(&self.api)
    }

    fn open(&self, index: u32, config: &DeviceConfig) -> Result<Box<dyn Device>> {
        let count = self.installed_count()?;
        if index >= count {
            return Err(KinectError::DeviceUnavailable(format!(
                "device index {index} out of range ({count} attached)"
            )));
        }
        Ok(Box::new(device::open(self.api.clone(), index, config)?))
    }
}

/// 加载 SDK 并返回共享的驱动实例
pub fn default_driver() -> Result<Arc<dyn Driver>> {
    Ok(Arc::new(K4aDriver::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sdk_surfaces_as_device_unavailable() {
        let err = K4aDriver::with_library("/nonexistent/k4a/libk4a.so").unwrap_err();
        assert!(matches!(err, KinectError::DeviceUnavailable(_)));
    }
}
