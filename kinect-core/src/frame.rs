use std::time::Duration;

use crate::error::{KinectError, Result};
use crate::pixel_format::ImageFormat;

/// 彩色图像，紧凑排列的 8-bit BGR
/// 数据归调用方所有，不再引用 SDK 缓冲区
#[derive(Clone, PartialEq)]
pub struct ColorImage {
    pub width: u32,
    pub height: u32,
    /// 长度为 width * height * 3
    pub data: Vec<u8>,
    /// 设备时间戳 (相对于设备启动)
    pub device_timestamp: Duration,
}

impl ColorImage {
    pub const CHANNELS: usize = 3;

    /// 从 SDK 的 BGRA32 缓冲区拷贝并去掉 Alpha 通道
    ///
    /// `stride` 是源缓冲区每行的字节数，可能大于 width * 4。
    pub fn from_bgra(
        width: u32,
        height: u32,
        stride: usize,
        src: &[u8],
        device_timestamp: Duration,
    ) -> Result<Self> {
        check_buffer(ImageFormat::Bgra32, width, height, stride, src.len())?;

        let row_bytes = width as usize * 4;
        let mut data = Vec::with_capacity(width as usize * height as usize * Self::CHANNELS);
        for row in src.chunks(stride).take(height as usize) {
            for px in row[..row_bytes].chunks_exact(4) {
                data.extend_from_slice(&px[..3]);
            }
        }

        Ok(Self {
            width,
            height,
            data,
            device_timestamp,
        })
    }

    pub fn format(&self) -> ImageFormat {
        ImageFormat::Bgr24
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    /// (B, G, R)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }
}

impl std::fmt::Debug for ColorImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("device_timestamp", &self.device_timestamp)
            .finish()
    }
}

/// 深度图，每像素一个 u16 (毫米)，0 表示无效
#[derive(Clone, PartialEq)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    /// 长度为 width * height
    pub data: Vec<u16>,
    pub device_timestamp: Duration,
}

impl DepthImage {
    /// 从 SDK 的 DEPTH16 缓冲区拷贝
    pub fn from_depth16(
        width: u32,
        height: u32,
        stride: usize,
        src: &[u8],
        device_timestamp: Duration,
    ) -> Result<Self> {
        check_buffer(ImageFormat::Depth16, width, height, stride, src.len())?;

        let row_bytes = width as usize * 2;
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for row in src.chunks(stride).take(height as usize) {
            let row = &row[..row_bytes];
            // SDK 缓冲区通常是对齐的，走快速路径；否则逐像素读取
            match bytemuck::try_cast_slice::<u8, u16>(row) {
                Ok(px) => data.extend_from_slice(px),
                Err(_) => data.extend(row.chunks_exact(2).map(bytemuck::pod_read_unaligned::<u16>)),
            }
        }

        Ok(Self {
            width,
            height,
            data,
            device_timestamp,
        })
    }

    pub fn format(&self) -> ImageFormat {
        ImageFormat::Depth16
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    pub fn depth_mm(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y as usize * self.width as usize + x as usize])
    }

    /// Min-max 归一化到 0..=255，用于显示
    pub fn normalize_to_u8(&self) -> Vec<u8> {
        let (min, max) = self
            .data
            .iter()
            .fold((u16::MAX, u16::MIN), |(lo, hi), &d| (lo.min(d), hi.max(d)));

        if self.data.is_empty() || max == min {
            return vec![0; self.data.len()];
        }

        let range = (max - min) as f32;
        self.data
            .iter()
            .map(|&d| (((d - min) as f32 / range) * 255.0).round() as u8)
            .collect()
    }
}

impl std::fmt::Debug for DepthImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("device_timestamp", &self.device_timestamp)
            .finish()
    }
}

/// 同一采集时刻的彩色 + 深度图
/// 深度已重投影到彩色相机坐标系，两者尺寸一致
#[derive(Debug, Clone, PartialEq)]
pub struct FramePair {
    color: ColorImage,
    depth: DepthImage,
}

impl FramePair {
    pub fn new(color: ColorImage, depth: DepthImage) -> Result<Self> {
        if color.width != depth.width || color.height != depth.height {
            tracing::warn!(
                "Frame pair mismatch: color {}x{}, depth {}x{}",
                color.width,
                color.height,
                depth.width,
                depth.height
            );
            return Err(KinectError::FrameMismatch {
                color_width: color.width,
                color_height: color.height,
                depth_width: depth.width,
                depth_height: depth.height,
            });
        }
        Ok(Self { color, depth })
    }

    pub fn color(&self) -> &ColorImage {
        &self.color
    }

    pub fn depth(&self) -> &DepthImage {
        &self.depth
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.color.width, self.color.height)
    }

    pub fn into_parts(self) -> (ColorImage, DepthImage) {
        (self.color, self.depth)
    }
}

fn check_buffer(format: ImageFormat, width: u32, height: u32, stride: usize, len: usize) -> Result<()> {
    let row_bytes = format
        .packed_stride(width)
        .ok_or_else(|| KinectError::InvalidImage(format!("{format} is not a packed format")))?;

    if width == 0 || height == 0 {
        return Err(KinectError::InvalidImage(format!(
            "{format} image has zero size ({width}x{height})"
        )));
    }
    if stride < row_bytes {
        return Err(KinectError::InvalidImage(format!(
            "{format} stride {stride} is smaller than a row ({row_bytes} bytes)"
        )));
    }
    // 最后一行允许不带 padding
    let required = stride * (height as usize - 1) + row_bytes;
    if len < required {
        return Err(KinectError::InvalidImage(format!(
            "{format} buffer holds {len} bytes, {width}x{height} needs {required}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_rows_drop_alpha_and_padding() {
        // 2x2，每行 padding 4 字节
        #[rustfmt::skip]
        let src = [
            1, 2, 3, 255,  4, 5, 6, 255,  0, 0, 0, 0,
            7, 8, 9, 255,  10, 11, 12, 255,
        ];
        let img = ColorImage::from_bgra(2, 2, 12, &src, Duration::ZERO).unwrap();
        assert_eq!(img.data, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(img.pixel(1, 1), Some([10, 11, 12]));
        assert_eq!(img.pixel(2, 0), None);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let err = ColorImage::from_bgra(4, 4, 16, &[0; 40], Duration::ZERO).unwrap_err();
        assert!(matches!(err, KinectError::InvalidImage(_)));

        let err = DepthImage::from_depth16(4, 1, 4, &[0; 8], Duration::ZERO).unwrap_err();
        assert!(matches!(err, KinectError::InvalidImage(_)));
    }

    #[test]
    fn depth16_decodes_native_endian_words() -> anyhow::Result<()> {
        let words: [u16; 6] = [0, 500, 1000, 1500, 2000, 65535];
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        let img = DepthImage::from_depth16(3, 2, 6, bytes, Duration::from_micros(33))?;
        assert_eq!(img.data, words.to_vec());
        assert_eq!(img.depth_mm(2, 1), Some(65535));
        assert_eq!(img.device_timestamp, Duration::from_micros(33));
        Ok(())
    }

    #[test]
    fn depth16_handles_unaligned_rows() {
        let words: [u16; 4] = [10, 20, 30, 40];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(bytemuck::cast_slice(&words));
        let img = DepthImage::from_depth16(2, 2, 4, &bytes[1..], Duration::ZERO).unwrap();
        assert_eq!(img.data, words.to_vec());
    }

    #[test]
    fn normalization_spans_full_range() {
        let img = DepthImage {
            width: 3,
            height: 1,
            data: vec![500, 1000, 1500],
            device_timestamp: Duration::ZERO,
        };
        assert_eq!(img.normalize_to_u8(), vec![0, 128, 255]);

        let flat = DepthImage {
            data: vec![700; 3],
            ..img
        };
        assert_eq!(flat.normalize_to_u8(), vec![0, 0, 0]);
    }

    #[test]
    fn pair_requires_matching_dimensions() {
        let color = ColorImage {
            width: 4,
            height: 2,
            data: vec![0; 24],
            device_timestamp: Duration::ZERO,
        };
        let depth = DepthImage {
            width: 2,
            height: 2,
            data: vec![0; 4],
            device_timestamp: Duration::ZERO,
        };
        assert!(matches!(
            FramePair::new(color.clone(), depth),
            Err(KinectError::FrameMismatch { .. })
        ));

        let depth = DepthImage {
            width: 4,
            height: 2,
            data: vec![0; 8],
            device_timestamp: Duration::ZERO,
        };
        let pair = FramePair::new(color, depth).unwrap();
        assert_eq!(pair.dimensions(), (4, 2));
    }
}
