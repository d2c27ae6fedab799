//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 掩膜中背景的体素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 掩膜中前景 (结构内部) 的体素值.
    pub const MASK_FOREGROUND: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 体素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        matches!(p, MASK_FOREGROUND)
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }
}

/// 常用的背景 HU 值.
pub mod hu {
    /// CT 空气 HU 值, 常用作 CT 重采样的填充值.
    pub const CT_AIR: f32 = -1000.0;

    /// CBCT 重建常用的空气填充值.
    pub const CBCT_AIR: f32 = -1024.0;
}

/// 判定浮点数相等/退化时使用的容差.
pub mod tol {
    /// 4x4 配准矩阵行列式的奇异判定阈值.
    pub const SINGULAR_EPS: f64 = 1e-9;

    /// 齐次矩阵底行 `[0, 0, 0, 1]` 的容差.
    pub const HOMOGENEOUS_ROW: f64 = 1e-6;

    /// 方向矩阵元素判定为 0 或 ±1 的容差.
    pub const DIRECTION: f64 = 1e-6;

    /// 同一轮廓内各顶点 z 坐标允许的最大差值, 以毫米为单位.
    pub const CONTOUR_PLANARITY_MM: f64 = 1e-3;

    /// 切片绑定容差的附加松弛量, 以毫米为单位.
    pub const SLICE_SLACK_MM: f64 = 1e-6;

    /// 线性插值判定 "在体积内" 时的松弛量, 以体素为单位.
    pub const INSIDE_SLACK: f64 = 1e-9;
}
