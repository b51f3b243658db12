//! libk4a 的 C ABI
//!
//! 手动定义结构体与常量 (来源: k4a/k4atypes.h, SDK 1.4)，
//! 函数指针在运行时从动态库中解析。

#![allow(dead_code)]

use std::ffi::OsStr;
use std::fmt;

use libc::{c_char, c_int, c_void, size_t};
use libloading::Library;

use kinect_core::error::{KinectError, Result};

pub(crate) type RawDevice = *mut c_void;
pub(crate) type RawCapture = *mut c_void;
pub(crate) type RawImage = *mut c_void;
pub(crate) type RawTransformation = *mut c_void;

// --- k4a_result_t / k4a_wait_result_t / k4a_buffer_result_t ---
pub(crate) const RESULT_SUCCEEDED: c_int = 0;
pub(crate) const RESULT_FAILED: c_int = 1;

pub(crate) const WAIT_SUCCEEDED: c_int = 0;
pub(crate) const WAIT_FAILED: c_int = 1;
pub(crate) const WAIT_TIMEOUT: c_int = 2;

pub(crate) const BUFFER_SUCCEEDED: c_int = 0;
pub(crate) const BUFFER_FAILED: c_int = 1;
pub(crate) const BUFFER_TOO_SMALL: c_int = 2;

// --- k4a_image_format_t ---
pub(crate) const IMAGE_FORMAT_COLOR_MJPG: c_int = 0;
pub(crate) const IMAGE_FORMAT_COLOR_NV12: c_int = 1;
pub(crate) const IMAGE_FORMAT_COLOR_YUY2: c_int = 2;
pub(crate) const IMAGE_FORMAT_COLOR_BGRA32: c_int = 3;
pub(crate) const IMAGE_FORMAT_DEPTH16: c_int = 4;
pub(crate) const IMAGE_FORMAT_IR16: c_int = 5;

// --- k4a_wired_sync_mode_t ---
pub(crate) const WIRED_SYNC_MODE_STANDALONE: c_int = 0;

// --- k4a_calibration_type_t ---
pub(crate) const CALIBRATION_TYPE_DEPTH: usize = 0;
pub(crate) const CALIBRATION_TYPE_COLOR: usize = 1;
pub(crate) const CALIBRATION_TYPE_NUM: usize = 4;

// k4a_calibration_intrinsic_parameters_t 中各参数的下标
pub(crate) mod param {
    pub(crate) const CX: usize = 0;
    pub(crate) const CY: usize = 1;
    pub(crate) const FX: usize = 2;
    pub(crate) const FY: usize = 3;
    pub(crate) const K1: usize = 4;
    pub(crate) const K2: usize = 5;
    pub(crate) const K3: usize = 6;
    pub(crate) const K4: usize = 7;
    pub(crate) const K5: usize = 8;
    pub(crate) const K6: usize = 9;
    pub(crate) const CODX: usize = 10;
    pub(crate) const CODY: usize = 11;
    // 注意：头文件中 p2 在 p1 之前
    pub(crate) const P2: usize = 12;
    pub(crate) const P1: usize = 13;
    pub(crate) const METRIC_RADIUS: usize = 14;
    pub(crate) const COUNT: usize = 15;
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeviceConfiguration {
    pub(crate) color_format: c_int,
    pub(crate) color_resolution: c_int,
    pub(crate) depth_mode: c_int,
    pub(crate) camera_fps: c_int,
    pub(crate) synchronized_images_only: bool,
    pub(crate) depth_delay_off_color_usec: i32,
    pub(crate) wired_sync_mode: c_int,
    pub(crate) subordinate_delay_off_master_usec: u32,
    pub(crate) disable_streaming_indicator: bool,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CalibrationExtrinsics {
    pub(crate) rotation: [f32; 9],
    pub(crate) translation: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CalibrationIntrinsics {
    pub(crate) model_type: c_int,
    pub(crate) parameter_count: u32,
    pub(crate) parameters: [f32; param::COUNT],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CalibrationCamera {
    pub(crate) extrinsics: CalibrationExtrinsics,
    pub(crate) intrinsics: CalibrationIntrinsics,
    pub(crate) resolution_width: c_int,
    pub(crate) resolution_height: c_int,
    pub(crate) metric_radius: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RawCalibration {
    pub(crate) depth_camera_calibration: CalibrationCamera,
    pub(crate) color_camera_calibration: CalibrationCamera,
    pub(crate) extrinsics: [[CalibrationExtrinsics; CALIBRATION_TYPE_NUM]; CALIBRATION_TYPE_NUM],
    pub(crate) depth_mode: c_int,
    pub(crate) color_resolution: c_int,
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "windows")] {
        const LIBRARY_NAMES: &[&str] = &["k4a.dll"];
    } else if #[cfg(target_os = "macos")] {
        const LIBRARY_NAMES: &[&str] = &["libk4a.dylib"];
    } else {
        const LIBRARY_NAMES: &[&str] = &["libk4a.so.1.4", "libk4a.so"];
    }
}

/// 覆盖默认搜索路径的环境变量
pub const LIBRARY_PATH_ENV: &str = "K4A_LIBRARY_PATH";

/// 从 libk4a 解析出的函数表
///
/// `_lib` 必须和函数指针一起存活，因此整个表通过 Arc 共享。
pub(crate) struct K4aApi {
    pub(crate) device_get_installed_count: unsafe extern "C" fn() -> u32,
    pub(crate) device_open: unsafe extern "C" fn(u32, *mut RawDevice) -> c_int,
    pub(crate) device_close: unsafe extern "C" fn(RawDevice),
    pub(crate) device_get_serialnum:
        unsafe extern "C" fn(RawDevice, *mut c_char, *mut size_t) -> c_int,
    pub(crate) device_start_cameras:
        unsafe extern "C" fn(RawDevice, *const DeviceConfiguration) -> c_int,
    pub(crate) device_stop_cameras: unsafe extern "C" fn(RawDevice),
    pub(crate) device_get_capture: unsafe extern "C" fn(RawDevice, *mut RawCapture, i32) -> c_int,
    pub(crate) device_get_calibration:
        unsafe extern "C" fn(RawDevice, c_int, c_int, *mut RawCalibration) -> c_int,

    pub(crate) capture_get_color_image: unsafe extern "C" fn(RawCapture) -> RawImage,
    pub(crate) capture_get_depth_image: unsafe extern "C" fn(RawCapture) -> RawImage,
    pub(crate) capture_release: unsafe extern "C" fn(RawCapture),

    pub(crate) image_create: unsafe extern "C" fn(c_int, c_int, c_int, c_int, *mut RawImage) -> c_int,
    pub(crate) image_get_buffer: unsafe extern "C" fn(RawImage) -> *mut u8,
    pub(crate) image_get_size: unsafe extern "C" fn(RawImage) -> size_t,
    pub(crate) image_get_format: unsafe extern "C" fn(RawImage) -> c_int,
    pub(crate) image_get_width_pixels: unsafe extern "C" fn(RawImage) -> c_int,
    pub(crate) image_get_height_pixels: unsafe extern "C" fn(RawImage) -> c_int,
    pub(crate) image_get_stride_bytes: unsafe extern "C" fn(RawImage) -> c_int,
    pub(crate) image_get_device_timestamp_usec: unsafe extern "C" fn(RawImage) -> u64,
    pub(crate) image_release: unsafe extern "C" fn(RawImage),

    pub(crate) transformation_create: unsafe extern "C" fn(*const RawCalibration) -> RawTransformation,
    pub(crate) transformation_depth_image_to_color_camera:
        unsafe extern "C" fn(RawTransformation, RawImage, RawImage) -> c_int,
    pub(crate) transformation_destroy: unsafe extern "C" fn(RawTransformation),

    _lib: Library,
}

impl fmt::Debug for K4aApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("K4aApi").field("lib", &self._lib).finish_non_exhaustive()
    }
}

impl K4aApi {
    /// 按 `K4A_LIBRARY_PATH` 或平台默认文件名加载 SDK
    pub(crate) fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(LIBRARY_PATH_ENV) {
            return Self::load_from(&path);
        }

        let mut last_err = None;
        for name in LIBRARY_NAMES {
            match Self::load_from(OsStr::new(name)) {
                Ok(api) => return Ok(api),
                Err(e) => {
                    tracing::debug!(target: "kinect::k4a", "{}", e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            KinectError::DeviceUnavailable("no Azure Kinect SDK library name for this platform".into())
        }))
    }

    pub(crate) fn load_from(path: &OsStr) -> Result<Self> {
        // SAFETY: libk4a 的初始化例程没有额外前置条件
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            KinectError::DeviceUnavailable(format!(
                "Azure Kinect SDK not installed ({}): {}",
                path.to_string_lossy(),
                e
            ))
        })?;

        // SAFETY: 以下签名与 k4a.h 保持一致
        unsafe {
            Ok(Self {
                device_get_installed_count: symbol(&lib, b"k4a_device_get_installed_count\0")?,
                device_open: symbol(&lib, b"k4a_device_open\0")?,
                device_close: symbol(&lib, b"k4a_device_close\0")?,
                device_get_serialnum: symbol(&lib, b"k4a_device_get_serialnum\0")?,
                device_start_cameras: symbol(&lib, b"k4a_device_start_cameras\0")?,
                device_stop_cameras: symbol(&lib, b"k4a_device_stop_cameras\0")?,
                device_get_capture: symbol(&lib, b"k4a_device_get_capture\0")?,
                device_get_calibration: symbol(&lib, b"k4a_device_get_calibration\0")?,
                capture_get_color_image: symbol(&lib, b"k4a_capture_get_color_image\0")?,
                capture_get_depth_image: symbol(&lib, b"k4a_capture_get_depth_image\0")?,
                capture_release: symbol(&lib, b"k4a_capture_release\0")?,
                image_create: symbol(&lib, b"k4a_image_create\0")?,
                image_get_buffer: symbol(&lib, b"k4a_image_get_buffer\0")?,
                image_get_size: symbol(&lib, b"k4a_image_get_size\0")?,
                image_get_format: symbol(&lib, b"k4a_image_get_format\0")?,
                image_get_width_pixels: symbol(&lib, b"k4a_image_get_width_pixels\0")?,
                image_get_height_pixels: symbol(&lib, b"k4a_image_get_height_pixels\0")?,
                image_get_stride_bytes: symbol(&lib, b"k4a_image_get_stride_bytes\0")?,
                image_get_device_timestamp_usec: symbol(
                    &lib,
                    b"k4a_image_get_device_timestamp_usec\0",
                )?,
                image_release: symbol(&lib, b"k4a_image_release\0")?,
                transformation_create: symbol(&lib, b"k4a_transformation_create\0")?,
                transformation_depth_image_to_color_camera: symbol(
                    &lib,
                    b"k4a_transformation_depth_image_to_color_camera\0",
                )?,
                transformation_destroy: symbol(&lib, b"k4a_transformation_destroy\0")?,
                _lib: lib,
            })
        }
    }
}

unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T> {
    lib.get::<T>(name).map(|s| *s).map_err(|e| {
        let printable = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name));
        KinectError::DeviceUnavailable(format!("Azure Kinect SDK is missing `{printable}`: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_device_unavailable() {
        let err = K4aApi::load_from(OsStr::new("/nonexistent/libk4a.so.0")).unwrap_err();
        assert!(matches!(err, KinectError::DeviceUnavailable(_)));
    }

    #[test]
    fn calibration_layout_matches_header() {
        // extrinsics: 12 floats; intrinsics: type + count + 15 floats; 2 ints + radius
        assert_eq!(std::mem::size_of::<CalibrationExtrinsics>(), 48);
        assert_eq!(std::mem::size_of::<CalibrationIntrinsics>(), 68);
        assert_eq!(std::mem::size_of::<CalibrationCamera>(), 48 + 68 + 12);
        assert_eq!(
            std::mem::size_of::<RawCalibration>(),
            2 * (48 + 68 + 12) + 16 * 48 + 8
        );
    }
}
