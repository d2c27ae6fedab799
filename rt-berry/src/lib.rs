#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 将 RT 结构集 (RTSTRUCT) 的轮廓体素化为与参考 CT/CBCT 网格对齐的二值掩膜,
//! 并按 DICOM 空间配准矩阵将 CBCT 刚性重采样到参考 CT 网格上.
//!
//! 该 crate 目前仅提供 `safe` 接口, 且核心算法本身不做任何文件 I/O.
//! 持久化 (NIfTI, npz, PNG) 只作为可选的辅助函数提供, 由调用者决定何时使用.
//!
//! # 注意
//!
//! 1. 体积数据一律按 `(z, y, x)` 即 `(切片, 行, 列)` 存储, 而物理坐标与网格参数按
//!   `(x, y, z)` 排列. 二者之间的换算集中在 [`geometry::Grid`] 中.
//! 2. 物理坐标系为 DICOM 使用的 LPS. 从 NIfTI (RAS) header 读写时会翻转 x, y 轴符号.
//! 3. 所有错误都是确定性的输入校验失败, 通过 [`GeoError`] 报告给调用者. 不存在部分结果:
//!   要么全部请求的结构/体积都被生成, 要么整个调用失败.
//!
//! # 开发计划
//!
//! ### 网格几何 ✅
//!
//! 物理坐标 <-> 体素坐标的相互转换, 以及与 NIfTI header 的互转.
//!
//! 实现位于 `rt-berry/src/geometry`.
//!
//! ### 多边形扫描线填充 ✅
//!
//! 像素中心采样, 奇偶规则, 左/上边界闭, 右/下边界开. 自相交多边形按同一规则处理.
//!
//! 实现位于 `rt-berry/src/raster`.
//!
//! ### 轮廓到切片的绑定 ✅
//!
//! 最近切片绑定, 平局取较小索引. 默认不允许超出半个层厚.
//!
//! 实现位于 `rt-berry/src/structure/bind.rs`.
//!
//! ### 结构掩膜构建 ✅
//!
//! 同一切片上的多个轮廓以 XOR 叠加, 从而正确表示空洞与孤岛.
//! 找不到请求的结构时报告错误, 并给出最接近的候选名.
//!
//! 实现位于 `rt-berry/src/mask`.
//!
//! ### 配准矩阵解码 ✅
//!
//! 存储的矩阵是移动 -> 固定方向, 重采样需要固定 -> 移动方向, 因此必须先求逆.
//!
//! 实现位于 `rt-berry/src/registration`.
//!
//! ### 重采样 ✅
//!
//! 最近邻与三线性插值, 支持任意旋转, 视野外取填充值.
//!
//! 实现位于 `rt-berry/src/resample`.
//!
//! ### 小功能 ✅
//!
//! 1. 掩膜的逐切片轮廓线 (用于可视化). ✅
//! 2. 掩膜与重采样结果的 NIfTI 输出, 多结构 npz 归档. ✅
//! 3. 切片 PNG 输出. ✅
//! 4. 串行/并行版本的结果一致性. ✅

/// 二维索引 `(行, 列)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 `(切片, 行, 列)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 本 crate 的计算结果.
pub type GeoResult<T> = Result<T, GeoError>;

mod error;
pub use error::GeoError;

mod save;
pub use save::ImgWriteVis;

mod window;
pub use window::CtWindow;

pub mod consts;

pub mod geometry;

pub mod raster;

pub mod structure;

pub mod mask;

pub mod registration;

pub mod resample;

pub mod prelude;
