use std::ffi::CStr;
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use libc::c_char;

use kinect_core::builder::{ColorResolution, DepthMode, DeviceConfig};
use kinect_core::calibration::Calibration;
use kinect_core::error::{KinectError, Result};
use kinect_core::frame::FramePair;
use kinect_core::traits::{Device, DeviceInfo};

use crate::enum_map;
use crate::ffi::{self, K4aApi, RawCalibration, RawDevice, RawTransformation};

pub(crate) const BACKEND_NAME: &str = "K4A";

pub(crate) fn installed_count(api: &K4aApi) -> u32 {
    // SAFETY: 无参数，SDK 自行枚举 USB
    unsafe { (api.device_get_installed_count)() }
}

/// 枚举系统中的 Kinect 设备
pub(crate) fn list_devices(api: &K4aApi) -> Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();

    for index in 0..installed_count(api) {
        // 需要短暂打开设备才能读取序列号；被其他进程占用的设备直接跳过
        let mut handle: RawDevice = ptr::null_mut();
        // SAFETY: handle 是有效的输出指针
        if unsafe { (api.device_open)(index, &mut handle) } != ffi::RESULT_SUCCEEDED {
            tracing::debug!(target: "kinect::k4a", "Skipping device {}: open failed", index);
            continue;
        }

        // SAFETY: handle 刚刚成功打开
        let serial_number = unsafe { read_serial(api, handle) };
        unsafe { (api.device_close)(handle) };

        devices.push(DeviceInfo {
            index,
            serial_number,
            backend: BACKEND_NAME.to_string(),
        });
    }

    Ok(devices)
}

/// 两段式读取: 先查询长度，再读取内容
unsafe fn read_serial(api: &K4aApi, handle: RawDevice) -> String {
    let mut size: libc::size_t = 0;
    if (api.device_get_serialnum)(handle, ptr::null_mut(), &mut size) != ffi::BUFFER_TOO_SMALL
        || size == 0
    {
        return String::new();
    }

    let mut buf = vec![0u8; size];
    if (api.device_get_serialnum)(handle, buf.as_mut_ptr() as *mut c_char, &mut size)
        != ffi::BUFFER_SUCCEEDED
    {
        return String::new();
    }

    CStr::from_bytes_until_nul(&buf)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 已打开并正在采集的 Kinect
///
/// 任何一步初始化失败时，Drop 会释放已经拿到的资源。
pub struct K4aDevice {
    pub(crate) api: Arc<K4aApi>,
    pub(crate) handle: RawDevice,
    pub(crate) transformation: RawTransformation,
    streaming: bool,
    info: DeviceInfo,
    depth_mode: DepthMode,
    color_resolution: ColorResolution,
}

// k4a 句柄可以在线程间移动，但不能并发使用；Device trait 只要求 Send
unsafe impl Send for K4aDevice {}

impl std::fmt::Debug for K4aDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K4aDevice")
            .field("info", &self.info)
            .field("streaming", &self.streaming)
            .field("depth_mode", &self.depth_mode)
            .field("color_resolution", &self.color_resolution)
            .finish()
    }
}

/// 打开设备并启动相机
pub(crate) fn open(api: Arc<K4aApi>, index: u32, config: &DeviceConfig) -> Result<K4aDevice> {
    // 1. 打开设备句柄
    let mut handle: RawDevice = ptr::null_mut();
    // SAFETY: handle 是有效的输出指针
    if unsafe { (api.device_open)(index, &mut handle) } != ffi::RESULT_SUCCEEDED {
        return Err(KinectError::DeviceUnavailable(format!(
            "failed to open Azure Kinect {index} (disconnected or in use by another process)"
        )));
    }

    // SAFETY: handle 有效
    let serial_number = unsafe { read_serial(&api, handle) };

    // 从这里开始由 Drop 负责回收
    let mut device = K4aDevice {
        api,
        handle,
        transformation: ptr::null_mut(),
        streaming: false,
        info: DeviceInfo {
            index,
            serial_number,
            backend: BACKEND_NAME.to_string(),
        },
        depth_mode: config.depth_mode,
        color_resolution: config.color_resolution,
    };

    // 2. 启动彩色 + 深度流
    let raw_config = enum_map::device_configuration(config);
    // SAFETY: raw_config 在调用期间有效
    if unsafe { (device.api.device_start_cameras)(device.handle, &raw_config) }
        != ffi::RESULT_SUCCEEDED
    {
        return Err(KinectError::Configuration(format!(
            "device {index} rejected {} / {} @ {} fps",
            config.color_resolution,
            config.depth_mode,
            config.fps.hz()
        )));
    }
    device.streaming = true;

    // 3. 深度 -> 彩色重投影需要 transformation 句柄
    let raw_calibration = device.raw_calibration()?;
    // SAFETY: SDK 内部会拷贝标定数据
    device.transformation = unsafe { (device.api.transformation_create)(&raw_calibration) };
    if device.transformation.is_null() {
        return Err(KinectError::Sdk {
            call: "k4a_transformation_create",
        });
    }

    tracing::info!(
        target: "kinect::k4a",
        "Azure Kinect {} (serial {}) started: {} / {} @ {} fps",
        index,
        device.info.serial_number,
        config.color_resolution,
        config.depth_mode,
        config.fps.hz()
    );

    Ok(device)
}

impl K4aDevice {
    fn raw_calibration(&self) -> Result<RawCalibration> {
        if self.handle.is_null() {
            return Err(KinectError::DeviceNotOpen);
        }

        let mut raw = RawCalibration::default();
        // SAFETY: raw 是有效的输出缓冲区
        let res = unsafe {
            (self.api.device_get_calibration)(
                self.handle,
                enum_map::depth_mode_code(self.depth_mode),
                enum_map::color_resolution_code(self.color_resolution),
                &mut raw,
            )
        };
        if res != ffi::RESULT_SUCCEEDED {
            return Err(KinectError::Sdk {
                call: "k4a_device_get_calibration",
            });
        }
        Ok(raw)
    }

    fn release(&mut self) {
        // 顺序: transformation -> stop -> close
        unsafe {
            if !self.transformation.is_null() {
                (self.api.transformation_destroy)(self.transformation);
                self.transformation = ptr::null_mut();
            }
            if self.streaming {
                (self.api.device_stop_cameras)(self.handle);
                self.streaming = false;
            }
            if !self.handle.is_null() {
                (self.api.device_close)(self.handle);
                self.handle = ptr::null_mut();
                tracing::info!(target: "kinect::k4a", "Azure Kinect {} closed", self.info.index);
            }
        }
    }
}

impl Device for K4aDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn calibration(&self) -> Result<Calibration> {
        let raw = self.raw_calibration()?;
        Ok(enum_map::calibration_from_raw(
            &raw,
            self.depth_mode,
            self.color_resolution,
        ))
    }

    fn get_capture(&mut self, timeout: Duration) -> Result<Option<FramePair>> {
        self.read_capture(timeout)
    }

    fn latest_capture(&mut self, timeout: Duration) -> Result<Option<FramePair>> {
        self.read_latest_capture(timeout)
    }

    fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for K4aDevice {
    fn drop(&mut self) {
        self.release();
    }
}
