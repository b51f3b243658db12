// 开启一些 Clippy 检查，保证代码质量
#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

// 模块定义
pub mod builder;
pub mod calibration;
pub mod error;
pub mod frame;
pub mod pixel_format;
pub mod traits;

// 方便用户使用的 Prelude
pub mod prelude {
    pub use crate::builder::{AcquisitionMode, ColorResolution, DepthMode, DeviceConfig, FrameRate};
    pub use crate::calibration::{Calibration, CalibrationType};
    pub use crate::error::{KinectError, Result};
    pub use crate::frame::{ColorImage, DepthImage, FramePair};
    pub use crate::traits::{Device, DeviceInfo, Driver};
}

// 版本与构建信息常量
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
