use std::ptr;
use std::time::{Duration, Instant};

use kinect_core::error::{KinectError, Result};
use kinect_core::frame::{ColorImage, DepthImage, FramePair};
use kinect_core::pixel_format::ImageFormat;

use crate::device::K4aDevice;
use crate::enum_map;
use crate::ffi::{self, K4aApi, RawCapture, RawImage};

// 本地 RAII 包装：任何返回路径上都释放 SDK 引用计数
struct CaptureGuard<'a> {
    api: &'a K4aApi,
    raw: RawCapture,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        unsafe { (self.api.capture_release)(self.raw) };
    }
}

struct ImageGuard<'a> {
    api: &'a K4aApi,
    raw: RawImage,
}

impl<'a> ImageGuard<'a> {
    fn new(api: &'a K4aApi, raw: RawImage, call: &'static str) -> Result<Self> {
        if raw.is_null() {
            return Err(KinectError::Sdk { call });
        }
        Ok(Self { api, raw })
    }

    fn width(&self) -> u32 {
        unsafe { (self.api.image_get_width_pixels)(self.raw) }.max(0) as u32
    }

    fn height(&self) -> u32 {
        unsafe { (self.api.image_get_height_pixels)(self.raw) }.max(0) as u32
    }

    fn stride(&self) -> usize {
        unsafe { (self.api.image_get_stride_bytes)(self.raw) }.max(0) as usize
    }

    fn format(&self) -> ImageFormat {
        enum_map::image_format_from_code(unsafe { (self.api.image_get_format)(self.raw) })
    }

    fn timestamp(&self) -> Duration {
        Duration::from_micros(unsafe { (self.api.image_get_device_timestamp_usec)(self.raw) })
    }

    /// 缓冲区借用自 SDK，生命周期绑定到 guard
    fn bytes(&self) -> &[u8] {
        unsafe {
            let ptr = (self.api.image_get_buffer)(self.raw);
            let len = (self.api.image_get_size)(self.raw);
            if ptr.is_null() || len == 0 {
                &[]
            } else {
                std::slice::from_raw_parts(ptr, len)
            }
        }
    }

    fn expect_format(&self, expected: ImageFormat) -> Result<()> {
        let actual = self.format();
        if actual != expected {
            return Err(KinectError::InvalidImage(format!(
                "expected {expected} image, SDK delivered {actual}"
            )));
        }
        Ok(())
    }
}

impl Drop for ImageGuard<'_> {
    fn drop(&mut self) {
        unsafe { (self.api.image_release)(self.raw) };
    }
}

impl K4aDevice {
    /// 取一组同步帧，深度重投影到彩色相机
    pub(crate) fn read_capture(&self, timeout: Duration) -> Result<Option<FramePair>> {
        match self.wait_capture(timeout)? {
            Some(capture) => self.convert(&capture).map(Some),
            None => Ok(None),
        }
    }

    /// 释放积压的 capture，只转换最新的一组
    ///
    /// 清空队列受 `timeout` 限制，帧源持续产出时也会按时返回。
    pub(crate) fn read_latest_capture(&self, timeout: Duration) -> Result<Option<FramePair>> {
        let start = Instant::now();
        let mut latest = None;
        let mut skipped = 0usize;

        while let Some(capture) = self.wait_capture(Duration::ZERO)? {
            // 被替换的 guard 在这里 Drop，SDK 引用随之释放
            if latest.replace(capture).is_some() {
                skipped += 1;
            }
            if start.elapsed() >= timeout {
                break;
            }
        }
        if skipped > 0 {
            tracing::debug!(target: "kinect::k4a", "Released {} stale captures", skipped);
        }

        let capture = match latest {
            Some(capture) => capture,
            None => match self.wait_capture(timeout.saturating_sub(start.elapsed()))? {
                Some(capture) => capture,
                None => return Ok(None),
            },
        };
        self.convert(&capture).map(Some)
    }

    /// 等待一个原始 capture，不做任何转换
    fn wait_capture(&self, timeout: Duration) -> Result<Option<CaptureGuard<'_>>> {
        if self.handle.is_null() {
            return Err(KinectError::DeviceNotOpen);
        }

        let api: &K4aApi = &self.api;
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

        let mut raw_capture: RawCapture = ptr::null_mut();
        // SAFETY: raw_capture 是有效的输出指针
        match unsafe { (api.device_get_capture)(self.handle, &mut raw_capture, timeout_ms) } {
            ffi::WAIT_SUCCEEDED => Ok(Some(CaptureGuard {
                api,
                raw: raw_capture,
            })),
            ffi::WAIT_TIMEOUT => {
                if timeout_ms > 0 {
                    tracing::debug!(target: "kinect::k4a", "No capture within {} ms", timeout_ms);
                }
                Ok(None)
            }
            _ => Err(KinectError::Sdk {
                call: "k4a_device_get_capture",
            }),
        }
    }

    fn convert(&self, capture: &CaptureGuard<'_>) -> Result<FramePair> {
        let api: &K4aApi = &self.api;

        // 1. 彩色图 (BGRA32 -> BGR)
        let color = ImageGuard::new(
            api,
            unsafe { (api.capture_get_color_image)(capture.raw) },
            "k4a_capture_get_color_image",
        )?;
        color.expect_format(ImageFormat::Bgra32)?;
        let color_image = ColorImage::from_bgra(
            color.width(),
            color.height(),
            color.stride(),
            color.bytes(),
            color.timestamp(),
        )?;

        // 2. 深度图，重投影到彩色相机的尺寸
        let depth = ImageGuard::new(
            api,
            unsafe { (api.capture_get_depth_image)(capture.raw) },
            "k4a_capture_get_depth_image",
        )?;
        depth.expect_format(ImageFormat::Depth16)?;

        let (w, h) = (color_image.width, color_image.height);
        let mut raw_transformed: RawImage = ptr::null_mut();
        // SAFETY: 尺寸与跨距匹配 DEPTH16，输出指针有效
        let res = unsafe {
            (api.image_create)(
                ffi::IMAGE_FORMAT_DEPTH16,
                w as i32,
                h as i32,
                (w * 2) as i32,
                &mut raw_transformed,
            )
        };
        if res != ffi::RESULT_SUCCEEDED {
            return Err(KinectError::Sdk {
                call: "k4a_image_create",
            });
        }
        let transformed = ImageGuard::new(api, raw_transformed, "k4a_image_create")?;

        // SAFETY: 三个句柄都有效，transformation 由 open 创建
        let res = unsafe {
            (api.transformation_depth_image_to_color_camera)(
                self.transformation,
                depth.raw,
                transformed.raw,
            )
        };
        if res != ffi::RESULT_SUCCEEDED {
            return Err(KinectError::Sdk {
                call: "k4a_transformation_depth_image_to_color_camera",
            });
        }

        let depth_image = DepthImage::from_depth16(
            transformed.width(),
            transformed.height(),
            transformed.stride(),
            transformed.bytes(),
            depth.timestamp(),
        )?;

        FramePair::new(color_image, depth_image)
    }
}
