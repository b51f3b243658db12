use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{KinectError, Result};

/// 彩色相机分辨率预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorResolution {
    /// 1280x720, 16:9
    R720p,
    /// 1920x1080, 16:9
    R1080p,
    /// 2560x1440, 16:9
    R1440p,
    /// 2048x1536, 4:3
    R1536p,
    /// 3840x2160, 16:9
    R2160p,
    /// 4096x3072, 4:3，最高只支持 15 FPS
    R3072p,
}

impl ColorResolution {
    pub const ALL: [ColorResolution; 6] = [
        Self::R720p,
        Self::R1080p,
        Self::R1440p,
        Self::R1536p,
        Self::R2160p,
        Self::R3072p,
    ];

    /// 输出图像尺寸 (width, height)
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Self::R720p => (1280, 720),
            Self::R1080p => (1920, 1080),
            Self::R1440p => (2560, 1440),
            Self::R1536p => (2048, 1536),
            Self::R2160p => (3840, 2160),
            Self::R3072p => (4096, 3072),
        }
    }

    pub const fn max_fps(self) -> FrameRate {
        match self {
            Self::R3072p => FrameRate::Fps15,
            _ => FrameRate::Fps30,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::R720p => "720P",
            Self::R1080p => "1080P",
            Self::R1440p => "1440P",
            Self::R1536p => "1536P",
            Self::R2160p => "2160P",
            Self::R3072p => "3072P",
        }
    }
}

impl fmt::Display for ColorResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorResolution {
    type Err = KinectError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| KinectError::Configuration(format!("unknown color resolution '{s}'")))
    }
}

/// 深度相机工作模式 (视场角 vs 量程/精度)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum DepthMode {
    /// 窄视场 2x2 合并, 320x288
    NfovBinned,
    /// 窄视场, 640x576
    NfovUnbinned,
    /// 宽视场 2x2 合并, 512x512
    WfovBinned,
    /// 宽视场, 1024x1024，最高只支持 15 FPS
    WfovUnbinned,
    /// 只采集被动红外，不产生深度图
    PassiveIr,
}

impl DepthMode {
    pub const ALL: [DepthMode; 5] = [
        Self::NfovBinned,
        Self::NfovUnbinned,
        Self::WfovBinned,
        Self::WfovUnbinned,
        Self::PassiveIr,
    ];

    /// 深度传感器原始输出尺寸 (width, height)
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Self::NfovBinned => (320, 288),
            Self::NfovUnbinned => (640, 576),
            Self::WfovBinned => (512, 512),
            Self::WfovUnbinned | Self::PassiveIr => (1024, 1024),
        }
    }

    pub const fn max_fps(self) -> FrameRate {
        match self {
            Self::WfovUnbinned => FrameRate::Fps15,
            _ => FrameRate::Fps30,
        }
    }

    pub const fn produces_depth(self) -> bool {
        !matches!(self, Self::PassiveIr)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::NfovBinned => "NFOV_2X2BINNED",
            Self::NfovUnbinned => "NFOV_UNBINNED",
            Self::WfovBinned => "WFOV_2X2BINNED",
            Self::WfovUnbinned => "WFOV_UNBINNED",
            Self::PassiveIr => "PASSIVE_IR",
        }
    }
}

impl fmt::Display for DepthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DepthMode {
    type Err = KinectError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| KinectError::Configuration(format!("unknown depth mode '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameRate {
    Fps5 = 5,
    Fps15 = 15,
    Fps30 = 30,
}

impl FrameRate {
    pub const fn hz(self) -> u32 {
        self as u32
    }

    /// 一帧的周期 (微秒)
    pub const fn period_usec(self) -> u32 {
        1_000_000 / self.hz()
    }
}

/// capture() 的取帧策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum AcquisitionMode {
    /// 阻塞等待下一组同步帧 (受 capture_timeout 限制)
    #[default]
    WaitNext,
    /// 清空 SDK 队列，只返回最新的一组；队列为空时再等待
    Latest,
}

/// SDK 接受的最长等待时间 (int32 毫秒)
pub const MAX_CAPTURE_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    pub device_index: u32,
    pub color_resolution: ColorResolution,
    pub depth_mode: DepthMode,
    pub fps: FrameRate,
    /// 单次取帧的等待上限，不沿用 SDK 的无限等待
    pub capture_timeout: Duration,
    pub acquisition: AcquisitionMode,
    /// 深度相对彩色的采集延迟 (微秒)，必须小于一帧周期
    pub depth_delay_off_color_usec: i32,
    pub disable_streaming_indicator: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self {
            device_index: 0,
            color_resolution: ColorResolution::R1080p,
            depth_mode: DepthMode::NfovBinned,
            fps: FrameRate::Fps30,
            capture_timeout: Duration::from_millis(1000),
            acquisition: AcquisitionMode::WaitNext,
            depth_delay_off_color_usec: 0,
            disable_streaming_indicator: false,
        }
    }

    pub fn device_index(mut self, index: u32) -> Self {
        self.device_index = index;
        self
    }

    pub fn color_resolution(mut self, resolution: ColorResolution) -> Self {
        self.color_resolution = resolution;
        self
    }

    pub fn depth_mode(mut self, mode: DepthMode) -> Self {
        self.depth_mode = mode;
        self
    }

    pub fn fps(mut self, fps: FrameRate) -> Self {
        self.fps = fps;
        self
    }

    pub fn capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    pub fn acquisition(mut self, mode: AcquisitionMode) -> Self {
        self.acquisition = mode;
        self
    }

    pub fn depth_delay_off_color_usec(mut self, delay: i32) -> Self {
        self.depth_delay_off_color_usec = delay;
        self
    }

    pub fn disable_streaming_indicator(mut self, disable: bool) -> Self {
        self.disable_streaming_indicator = disable;
        self
    }

    /// 按名称设置分辨率和深度模式，例如 ("1080P", "NFOV_2X2BINNED")
    pub fn with_names(self, resolution: &str, depth_mode: &str) -> Result<Self> {
        Ok(self
            .color_resolution(resolution.parse()?)
            .depth_mode(depth_mode.parse()?))
    }

    /// 在接触硬件之前检查组合是否合法
    pub fn validate(&self) -> Result<()> {
        if !self.depth_mode.produces_depth() {
            return Err(KinectError::Configuration(format!(
                "depth mode {} has no depth stream; synchronized color+depth pairs need one",
                self.depth_mode
            )));
        }

        if self.fps > self.color_resolution.max_fps() {
            return Err(KinectError::Configuration(format!(
                "color resolution {} supports at most {} fps (requested {})",
                self.color_resolution,
                self.color_resolution.max_fps().hz(),
                self.fps.hz()
            )));
        }

        if self.fps > self.depth_mode.max_fps() {
            return Err(KinectError::Configuration(format!(
                "depth mode {} supports at most {} fps (requested {})",
                self.depth_mode,
                self.depth_mode.max_fps().hz(),
                self.fps.hz()
            )));
        }

        if self.capture_timeout > MAX_CAPTURE_TIMEOUT {
            return Err(KinectError::Configuration(format!(
                "capture timeout {:?} exceeds {:?}",
                self.capture_timeout, MAX_CAPTURE_TIMEOUT
            )));
        }

        if self.depth_delay_off_color_usec.unsigned_abs() >= self.fps.period_usec() {
            return Err(KinectError::Configuration(format!(
                "depth delay {} us must be shorter than one frame period ({} us)",
                self.depth_delay_off_color_usec,
                self.fps.period_usec()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("720p".parse::<ColorResolution>().unwrap(), ColorResolution::R720p);
        assert_eq!(" 3072P ".parse::<ColorResolution>().unwrap(), ColorResolution::R3072p);
        assert_eq!(
            "nfov_unbinned".parse::<DepthMode>().unwrap(),
            DepthMode::NfovUnbinned
        );
    }

    #[test]
    fn unknown_names_are_configuration_errors() {
        assert!(matches!(
            "4K".parse::<ColorResolution>(),
            Err(KinectError::Configuration(_))
        ));
        assert!(matches!(
            DeviceConfig::new().with_names("1080P", "NFOV_4X4"),
            Err(KinectError::Configuration(_))
        ));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for res in ColorResolution::ALL {
            assert_eq!(res.to_string().parse::<ColorResolution>().unwrap(), res);
        }
        for mode in DepthMode::ALL {
            assert_eq!(mode.to_string().parse::<DepthMode>().unwrap(), mode);
        }
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.color_resolution, ColorResolution::R1080p);
        assert_eq!(cfg.depth_mode, DepthMode::NfovBinned);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn high_resolution_modes_cap_frame_rate() {
        let cfg = DeviceConfig::new().color_resolution(ColorResolution::R3072p);
        assert!(matches!(cfg.validate(), Err(KinectError::Configuration(_))));
        assert!(cfg.fps(FrameRate::Fps15).validate().is_ok());

        let cfg = DeviceConfig::new().depth_mode(DepthMode::WfovUnbinned);
        assert!(matches!(cfg.validate(), Err(KinectError::Configuration(_))));
        assert!(cfg.fps(FrameRate::Fps5).validate().is_ok());
    }

    #[test]
    fn passive_ir_cannot_produce_pairs() {
        let cfg = DeviceConfig::new().depth_mode(DepthMode::PassiveIr);
        assert!(matches!(cfg.validate(), Err(KinectError::Configuration(_))));
    }

    #[test]
    fn depth_delay_must_fit_in_one_frame() {
        let cfg = DeviceConfig::new().depth_delay_off_color_usec(-40_000);
        assert!(matches!(cfg.validate(), Err(KinectError::Configuration(_))));
        assert!(cfg
            .fps(FrameRate::Fps15)
            .depth_delay_off_color_usec(-40_000)
            .validate()
            .is_ok());
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let cfg = DeviceConfig::new().capture_timeout(MAX_CAPTURE_TIMEOUT + Duration::from_millis(1));
        assert!(matches!(cfg.validate(), Err(KinectError::Configuration(_))));
    }
}
