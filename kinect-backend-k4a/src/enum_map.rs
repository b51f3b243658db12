//! kinect-core 类型 <-> libk4a 枚举值 / 结构体

use libc::c_int;

use kinect_core::builder::{ColorResolution, DepthMode, DeviceConfig, FrameRate};
use kinect_core::calibration::{
    Calibration, CameraCalibration, Distortion, Extrinsics, Intrinsics,
};
use kinect_core::pixel_format::ImageFormat;

use crate::ffi::{self, param, CalibrationCamera, DeviceConfiguration, RawCalibration};

/// k4a_color_resolution_t (0 = OFF，不使用)
pub(crate) fn color_resolution_code(res: ColorResolution) -> c_int {
    match res {
        ColorResolution::R720p => 1,
        ColorResolution::R1080p => 2,
        ColorResolution::R1440p => 3,
        ColorResolution::R1536p => 4,
        ColorResolution::R2160p => 5,
        ColorResolution::R3072p => 6,
    }
}

/// k4a_depth_mode_t (0 = OFF，不使用)
pub(crate) fn depth_mode_code(mode: DepthMode) -> c_int {
    match mode {
        DepthMode::NfovBinned => 1,
        DepthMode::NfovUnbinned => 2,
        DepthMode::WfovBinned => 3,
        DepthMode::WfovUnbinned => 4,
        DepthMode::PassiveIr => 5,
    }
}

/// k4a_fps_t
pub(crate) fn fps_code(fps: FrameRate) -> c_int {
    match fps {
        FrameRate::Fps5 => 0,
        FrameRate::Fps15 => 1,
        FrameRate::Fps30 => 2,
    }
}

pub(crate) fn image_format_from_code(code: c_int) -> ImageFormat {
    match code {
        ffi::IMAGE_FORMAT_COLOR_MJPG => ImageFormat::Mjpg,
        ffi::IMAGE_FORMAT_COLOR_NV12 => ImageFormat::Nv12,
        ffi::IMAGE_FORMAT_COLOR_YUY2 => ImageFormat::Yuy2,
        ffi::IMAGE_FORMAT_COLOR_BGRA32 => ImageFormat::Bgra32,
        ffi::IMAGE_FORMAT_DEPTH16 => ImageFormat::Depth16,
        ffi::IMAGE_FORMAT_IR16 => ImageFormat::Ir16,
        other => {
            tracing::warn!(target: "kinect::k4a", "Unknown K4A image format: {}", other);
            ImageFormat::Unknown(other as u32)
        }
    }
}

/// 构造 k4a_device_configuration_t
///
/// 彩色固定为 BGRA32 (深度重投影要求)，并且只接收完整的同步帧。
pub(crate) fn device_configuration(config: &DeviceConfig) -> DeviceConfiguration {
    DeviceConfiguration {
        color_format: ffi::IMAGE_FORMAT_COLOR_BGRA32,
        color_resolution: color_resolution_code(config.color_resolution),
        depth_mode: depth_mode_code(config.depth_mode),
        camera_fps: fps_code(config.fps),
        synchronized_images_only: true,
        depth_delay_off_color_usec: config.depth_delay_off_color_usec,
        wired_sync_mode: ffi::WIRED_SYNC_MODE_STANDALONE,
        subordinate_delay_off_master_usec: 0,
        disable_streaming_indicator: config.disable_streaming_indicator,
    }
}

fn camera_from_raw(raw: &CalibrationCamera) -> CameraCalibration {
    let p = &raw.intrinsics.parameters;
    CameraCalibration {
        intrinsics: Intrinsics {
            fx: p[param::FX],
            fy: p[param::FY],
            cx: p[param::CX],
            cy: p[param::CY],
        },
        distortion: Distortion {
            k1: p[param::K1],
            k2: p[param::K2],
            k3: p[param::K3],
            k4: p[param::K4],
            k5: p[param::K5],
            k6: p[param::K6],
            p1: p[param::P1],
            p2: p[param::P2],
            codx: p[param::CODX],
            cody: p[param::CODY],
        },
        resolution_width: raw.resolution_width.max(0) as u32,
        resolution_height: raw.resolution_height.max(0) as u32,
        metric_radius: raw.metric_radius,
    }
}

pub(crate) fn calibration_from_raw(
    raw: &RawCalibration,
    depth_mode: DepthMode,
    color_resolution: ColorResolution,
) -> Calibration {
    let ext = &raw.extrinsics[ffi::CALIBRATION_TYPE_DEPTH][ffi::CALIBRATION_TYPE_COLOR];
    Calibration {
        depth: camera_from_raw(&raw.depth_camera_calibration),
        color: camera_from_raw(&raw.color_camera_calibration),
        depth_to_color: Extrinsics {
            rotation: ext.rotation,
            translation: ext.translation,
        },
        depth_mode,
        color_resolution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinect_core::calibration::CalibrationType;

    #[test]
    fn codes_follow_sdk_headers() {
        assert_eq!(color_resolution_code(ColorResolution::R720p), 1);
        assert_eq!(color_resolution_code(ColorResolution::R3072p), 6);
        assert_eq!(depth_mode_code(DepthMode::NfovBinned), 1);
        assert_eq!(depth_mode_code(DepthMode::PassiveIr), 5);
        assert_eq!(fps_code(FrameRate::Fps30), 2);
        assert_eq!(image_format_from_code(3), ImageFormat::Bgra32);
        assert_eq!(image_format_from_code(42), ImageFormat::Unknown(42));
    }

    #[test]
    fn device_configuration_forces_synchronized_bgra() {
        let cfg = DeviceConfig::new()
            .color_resolution(ColorResolution::R720p)
            .depth_mode(DepthMode::WfovBinned)
            .fps(FrameRate::Fps15)
            .depth_delay_off_color_usec(-200);
        let raw = device_configuration(&cfg);
        assert_eq!(raw.color_format, ffi::IMAGE_FORMAT_COLOR_BGRA32);
        assert_eq!(raw.color_resolution, 1);
        assert_eq!(raw.depth_mode, 3);
        assert_eq!(raw.camera_fps, 1);
        assert!(raw.synchronized_images_only);
        assert_eq!(raw.depth_delay_off_color_usec, -200);
        assert_eq!(raw.wired_sync_mode, ffi::WIRED_SYNC_MODE_STANDALONE);
    }

    #[test]
    fn raw_calibration_unpacks_parameters() {
        let mut raw = RawCalibration::default();
        let mut params = [0.0f32; param::COUNT];
        for (i, v) in params.iter_mut().enumerate() {
            *v = i as f32;
        }
        raw.color_camera_calibration.intrinsics.parameters = params;
        raw.color_camera_calibration.resolution_width = 1280;
        raw.color_camera_calibration.resolution_height = 720;
        raw.extrinsics[ffi::CALIBRATION_TYPE_DEPTH][ffi::CALIBRATION_TYPE_COLOR].translation =
            [-32.0, -2.0, 4.0];

        let cal = calibration_from_raw(&raw, DepthMode::NfovBinned, ColorResolution::R720p);
        let color = cal.camera(CalibrationType::Color);
        assert_eq!(color.intrinsics.cx, 0.0);
        assert_eq!(color.intrinsics.fx, 2.0);
        assert_eq!(color.distortion.p2, 12.0);
        assert_eq!(color.distortion.p1, 13.0);
        assert_eq!(color.resolution_width, 1280);
        assert_eq!(
            cal.distortion(CalibrationType::Color),
            [4.0, 5.0, 13.0, 12.0, 6.0, 7.0, 8.0, 9.0]
        );
        assert_eq!(cal.depth_to_color.translation, [-32.0, -2.0, 4.0]);
    }
}
