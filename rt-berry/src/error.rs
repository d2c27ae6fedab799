//! 运行时错误.

use thiserror::Error;

/// 几何/体素化/配准过程中的运行时错误.
///
/// 所有错误都是确定性的输入校验失败, 直接报告给调用者, 不做任何重试.
#[derive(Error, Debug)]
pub enum GeoError {
    /// 网格参数非法 (spacing 非正, size 为零, direction 含非有限值等).
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// 多边形顶点不足 3 个. 参数为实际顶点数.
    #[error("degenerate polygon: {0} vertices, at least 3 required")]
    DegeneratePolygon(usize),

    /// 请求的结构名在结构集中不存在. 同时给出最接近的候选名称.
    #[error("structure `{name}` not found, closest available: {closest:?}")]
    StructureNotFound {
        /// 请求的结构名.
        name: String,
        /// 按相似度排序的候选结构名.
        closest: Vec<String>,
    },

    /// 同一个请求名匹配到了多个结构.
    #[error("structure name `{name}` is ambiguous, matches: {matches:?}")]
    DuplicateStructure {
        /// 请求的结构名.
        name: String,
        /// 所有匹配到的结构名.
        matches: Vec<String>,
    },

    /// 配准矩阵不可逆, 或不是合法的齐次仿射矩阵.
    #[error("singular or non-affine registration matrix: {0}")]
    SingularMatrix(String),

    /// 两个网格的方向约定不兼容 (目前仅支持轴对齐的方向矩阵).
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    /// 轮廓到最近切片的距离超出容差. `(轮廓 z, 最近切片 z, 容差)`, 单位毫米.
    #[error("contour at z = {0} mm is {1} mm away from the nearest slice, tolerance is {2} mm")]
    SliceOutOfTolerance(f64, f64, f64),

    /// 数组形状与网格大小不符. `(期望, 实际)`, 按 `(z, y, x)` 排列.
    #[error("shape mismatch: expected {0:?}, got {1:?}")]
    ShapeMismatch((usize, usize, usize), (usize, usize, usize)),

    /// 轮廓条目引用了未定义的 ROI 编号.
    #[error("contour item references undefined ROI number {0}")]
    UnknownRoiReference(u32),

    /// 配准记录中不存在描述移动图像的条目.
    #[error("registration record has no item for a moving frame of reference")]
    MissingMovingRegistration,

    /// 轮廓点数据长度不是 3 的倍数.
    #[error("contour data length {0} is not a multiple of 3")]
    MalformedContourData(usize),

    /// 轮廓顶点含 NaN 或无穷. 参数为第一个非法顶点的下标.
    #[error("contour vertex {0} has a non-finite coordinate")]
    NonFiniteContour(usize),

    /// nifti 读写错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// npz 写入错误.
    #[error(transparent)]
    Npz(#[from] ndarray_npy::WriteNpzError),

    /// 其他底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
