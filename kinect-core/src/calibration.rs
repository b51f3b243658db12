//! 设备出厂标定参数
//!
//! 在设备打开后读取一次，会话期间不再变化。参数本身由 SDK 提供，
//! 这里只做类型化和常用布局 (3x3 内参矩阵、OpenCV 畸变系数顺序) 的转换。

use crate::builder::{ColorResolution, DepthMode};

/// 标定所属的传感器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum CalibrationType {
    Depth,
    Color,
}

/// 针孔模型内参 (像素)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    /// [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]
    pub fn matrix(&self) -> [[f32; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }
}

/// Brown-Conrady 有理模型畸变参数
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Distortion {
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub k5: f32,
    pub k6: f32,
    /// 切向畸变
    pub p1: f32,
    pub p2: f32,
    /// 畸变中心偏移
    pub codx: f32,
    pub cody: f32,
}

impl Distortion {
    /// OpenCV 顺序: [k1, k2, p1, p2, k3, k4, k5, k6]
    pub fn coefficients(&self) -> [f32; 8] {
        [
            self.k1, self.k2, self.p1, self.p2, self.k3, self.k4, self.k5, self.k6,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraCalibration {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
    pub resolution_width: u32,
    pub resolution_height: u32,
    /// 模型有效的最大归一化半径
    pub metric_radius: f32,
}

/// 刚体变换: 行主序 3x3 旋转 + 平移 (毫米)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Extrinsics {
    pub rotation: [f32; 9],
    pub translation: [f32; 3],
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self {
            rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            translation: [0.0; 3],
        }
    }
}

impl Extrinsics {
    /// 将一个点 (毫米) 从源坐标系变换到目标坐标系
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[0] * p[0] + r[1] * p[1] + r[2] * p[2] + t[0],
            r[3] * p[0] + r[4] * p[1] + r[5] * p[2] + t[1],
            r[6] * p[0] + r[7] * p[1] + r[8] * p[2] + t[2],
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    pub depth: CameraCalibration,
    pub color: CameraCalibration,
    /// 深度相机坐标系 -> 彩色相机坐标系
    pub depth_to_color: Extrinsics,
    pub depth_mode: DepthMode,
    pub color_resolution: ColorResolution,
}

impl Calibration {
    pub fn camera(&self, which: CalibrationType) -> &CameraCalibration {
        match which {
            CalibrationType::Depth => &self.depth,
            CalibrationType::Color => &self.color,
        }
    }

    pub fn matrix(&self, which: CalibrationType) -> [[f32; 3]; 3] {
        self.camera(which).intrinsics.matrix()
    }

    pub fn distortion(&self, which: CalibrationType) -> [f32; 8] {
        self.camera(which).distortion.coefficients()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Calibration {
        Calibration {
            depth: CameraCalibration {
                intrinsics: Intrinsics {
                    fx: 252.0,
                    fy: 252.1,
                    cx: 160.5,
                    cy: 144.2,
                },
                resolution_width: 320,
                resolution_height: 288,
                ..Default::default()
            },
            color: CameraCalibration {
                intrinsics: Intrinsics {
                    fx: 612.0,
                    fy: 611.8,
                    cx: 638.1,
                    cy: 366.4,
                },
                distortion: Distortion {
                    k1: 0.1,
                    k2: -0.2,
                    k3: 0.3,
                    k4: 0.4,
                    k5: 0.5,
                    k6: 0.6,
                    p1: 0.01,
                    p2: 0.02,
                    ..Default::default()
                },
                resolution_width: 1280,
                resolution_height: 720,
                metric_radius: 1.7,
            },
            depth_to_color: Extrinsics::default(),
            depth_mode: DepthMode::NfovBinned,
            color_resolution: ColorResolution::R720p,
        }
    }

    #[test]
    fn matrix_layout() {
        let m = sample().matrix(CalibrationType::Color);
        assert_eq!(m[0], [612.0, 0.0, 638.1]);
        assert_eq!(m[1], [0.0, 611.8, 366.4]);
        assert_eq!(m[2], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn distortion_uses_opencv_order() {
        let d = sample().distortion(CalibrationType::Color);
        assert_eq!(d, [0.1, -0.2, 0.01, 0.02, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn extrinsics_apply_rotation_then_translation() {
        let ext = Extrinsics {
            // 绕 Z 轴 90 度
            rotation: [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            translation: [-32.0, 0.0, 4.0],
        };
        assert_eq!(ext.transform_point([1.0, 2.0, 3.0]), [-34.0, 1.0, 7.0]);
    }
}
