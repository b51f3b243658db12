use std::fmt::{self, Display};

/// SDK 图像缓冲区的像素布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Motion-JPEG，彩色相机原生压缩格式
    Mjpg,
    /// NV12 4:2:0
    Nv12,
    /// YUY2 4:2:2
    Yuy2,
    /// 8-bit B-G-R-A，深度重投影要求的彩色格式
    Bgra32,
    /// 8-bit B-G-R packed，对外输出的彩色格式
    Bgr24,
    /// 16-bit 深度 (毫米)
    Depth16,
    /// 16-bit 红外强度
    Ir16,
    /// SDK 返回了不认识的格式码
    Unknown(u32),
}

impl ImageFormat {
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Mjpg)
    }

    /// 每像素字节数；压缩或平面格式返回 None
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Bgra32 => Some(4),
            Self::Bgr24 => Some(3),
            Self::Depth16 | Self::Ir16 => Some(2),
            Self::Yuy2 => Some(2),
            Self::Mjpg | Self::Nv12 | Self::Unknown(_) => None,
        }
    }

    /// 紧凑排列时的行跨距
    pub fn packed_stride(&self, width: u32) -> Option<usize> {
        self.bytes_per_pixel().map(|bpp| bpp * width as usize)
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mjpg => f.write_str("MJPG"),
            Self::Nv12 => f.write_str("NV12"),
            Self::Yuy2 => f.write_str("YUY2"),
            Self::Bgra32 => f.write_str("BGRA32"),
            Self::Bgr24 => f.write_str("BGR24"),
            Self::Depth16 => f.write_str("DEPTH16"),
            Self::Ir16 => f.write_str("IR16"),
            Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}
