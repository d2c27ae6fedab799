//! 三维图像网格几何: 物理坐标与体素坐标之间的相互转换.
//!
//! 网格的三个轴按 `(x, y, z)` 描述 (与 DICOM/ITK 一致), 而体素数组按
//! `(z, y, x)` 存储, 即 `(切片, 行, 列)`. 这与 [`crate::Idx3d`] 的约定相同.

use nalgebra::{Matrix3, Vector3};

use crate::consts::tol;
use crate::{GeoError, GeoResult, Idx2d, Idx3d};

mod header;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 物理空间中的点, 以毫米为单位, 按 `(x, y, z)` 排列.
pub type Point3 = [f64; 3];

/// 三维图像的空间几何定义.
///
/// - `origin`: 第一个体素中心的物理位置;
/// - `spacing`: 每个体素轴方向的间距 (毫米), 严格为正;
/// - `direction`: 行优先存储的 3x3 正交矩阵. 第 `j` 列是第 `j`
///   个体素轴在物理空间中的单位方向;
/// - `size`: 各轴体素个数, 严格为正.
///
/// 该结构是只读的. 构造时即完成合法性检查, 因此之后的所有坐标转换都不会失败.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawGrid", into = "RawGrid"))]
pub struct Grid {
    origin: Point3,
    spacing: [f64; 3],
    direction: [[f64; 3]; 3],
    size: [usize; 3],
}

/// 未经检查的网格参数. 仅用于反序列化.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RawGrid {
    origin: Point3,
    spacing: [f64; 3],
    direction: [[f64; 3]; 3],
    size: [usize; 3],
}

#[cfg(feature = "serde")]
impl TryFrom<RawGrid> for Grid {
    type Error = GeoError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        Grid::with_direction(raw.origin, raw.spacing, raw.direction, raw.size)
    }
}

#[cfg(feature = "serde")]
impl From<Grid> for RawGrid {
    fn from(g: Grid) -> Self {
        RawGrid {
            origin: g.origin,
            spacing: g.spacing,
            direction: g.direction,
            size: g.size,
        }
    }
}

/// 单位方向矩阵.
pub const IDENTITY_DIRECTION: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

impl Grid {
    /// 以单位方向矩阵构建网格.
    ///
    /// 若 `spacing` 存在非正 (或非有限) 分量, 或 `size` 存在 0 分量,
    /// 则返回 `Err(GeoError::InvalidGrid)`.
    #[inline]
    pub fn new(origin: Point3, spacing: [f64; 3], size: [usize; 3]) -> GeoResult<Self> {
        Self::with_direction(origin, spacing, IDENTITY_DIRECTION, size)
    }

    /// 以给定方向矩阵构建网格. `direction` 按行优先存储, 必须是正交矩阵.
    pub fn with_direction(
        origin: Point3,
        spacing: [f64; 3],
        direction: [[f64; 3]; 3],
        size: [usize; 3],
    ) -> GeoResult<Self> {
        if let Some(s) = spacing.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(GeoError::InvalidGrid(format!(
                "spacing must be strictly positive, got {s} in {spacing:?}"
            )));
        }
        if size.contains(&0) {
            return Err(GeoError::InvalidGrid(format!(
                "size must be strictly positive, got {size:?}"
            )));
        }
        if !origin.iter().all(|o| o.is_finite()) {
            return Err(GeoError::InvalidGrid(format!(
                "origin must be finite, got {origin:?}"
            )));
        }
        let d = Matrix3::from_fn(|r, c| direction[r][c]);
        let gram = d.transpose() * d;
        if !d.iter().all(|v| v.is_finite()) || (gram - Matrix3::identity()).amax() > tol::DIRECTION
        {
            return Err(GeoError::InvalidGrid(format!(
                "direction must be orthonormal, got {direction:?}"
            )));
        }
        Ok(Self {
            origin,
            spacing,
            direction,
            size,
        })
    }

    /// 第一个体素中心的物理位置.
    #[inline]
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    /// 体素间距, 按 `(x, y, z)` 排列, 以毫米为单位.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// 行优先的方向矩阵.
    #[inline]
    pub fn direction(&self) -> [[f64; 3]; 3] {
        self.direction
    }

    /// 体素个数, 按 `(x, y, z)` 排列.
    #[inline]
    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    /// 体素数组形状, 按 `(z, y, x)` 排列.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let [x, y, z] = self.size;
        (z, y, x)
    }

    /// 水平切片形状, 按 `(行, 列)` 即 `(y, x)` 排列.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let [x, y, _] = self.size;
        (y, x)
    }

    /// 切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.size[2]
    }

    /// 体素总数.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.size.iter().product()
    }

    /// 检查 `(z, y, x)` 索引是否在网格内.
    #[inline]
    pub fn check(&self, (z0, y0, x0): &Idx3d) -> bool {
        let (z, y, x) = self.shape();
        *z0 < z && *y0 < y && *x0 < x
    }

    /// 方向矩阵的 nalgebra 表示.
    #[inline]
    pub fn direction_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|r, c| self.direction[r][c])
    }

    /// 方向矩阵是否为对角 ±1 矩阵 (即体素轴与物理轴对齐, 允许翻转).
    pub fn is_axis_aligned(&self) -> bool {
        (0..3).all(|r| {
            (0..3).all(|c| {
                let v = self.direction[r][c];
                if r == c {
                    (v.abs() - 1.0).abs() <= tol::DIRECTION
                } else {
                    v.abs() <= tol::DIRECTION
                }
            })
        })
    }

    /// 若方向矩阵不是轴对齐的, 返回 `Err(GeoError::GridMismatch)`.
    pub fn ensure_axis_aligned(&self) -> GeoResult<()> {
        if self.is_axis_aligned() {
            Ok(())
        } else {
            Err(GeoError::GridMismatch(format!(
                "only axis-aligned directions are supported, got {:?}",
                self.direction
            )))
        }
    }

    /// 将物理坐标转换为 (小数) 体素坐标, 按 `(x, y, z)` 排列.
    ///
    /// 对单位方向矩阵而言即 `f_i = (p_i - origin_i) / spacing_i`.
    /// 不做任何取整, 取整策略由调用者决定.
    pub fn physical_to_voxel(&self, point: Point3) -> Point3 {
        let d = self.direction_matrix();
        let rel = Vector3::from(point) - Vector3::from(self.origin);
        // 正交矩阵的逆即转置.
        let local = d.transpose() * rel;
        [
            local.x / self.spacing[0],
            local.y / self.spacing[1],
            local.z / self.spacing[2],
        ]
    }

    /// 将 (小数) 体素坐标 `(x, y, z)` 转换为物理坐标. 是 [`Self::physical_to_voxel`] 的逆映射.
    pub fn voxel_to_physical(&self, index: Point3) -> Point3 {
        let scaled = Vector3::new(
            index[0] * self.spacing[0],
            index[1] * self.spacing[1],
            index[2] * self.spacing[2],
        );
        let p = Vector3::from(self.origin) + self.direction_matrix() * scaled;
        [p.x, p.y, p.z]
    }

    /// 所有切片中心沿切片轴的物理坐标. 第 `k` 项为
    /// `origin_z + k * spacing_z` (方向矩阵为单位矩阵时).
    pub fn slice_positions(&self) -> Vec<f64> {
        (0..self.len_z())
            .map(|k| self.voxel_to_physical([0.0, 0.0, k as f64])[2])
            .collect()
    }

    /// 将物理坐标投影到切片平面, 返回小数 `(列, 行)` 即 `(x, y)` 坐标.
    #[inline]
    pub fn in_plane(&self, point: Point3) -> (f64, f64) {
        let [fx, fy, _] = self.physical_to_voxel(point);
        (fx, fy)
    }

    /// 网格在物理空间中覆盖的轴对齐包围盒 (体素中心), 返回 `(最小角, 最大角)`.
    pub fn physical_bounds(&self) -> (Point3, Point3) {
        let [x, y, z] = self.size.map(|n| (n - 1) as f64);
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for corner in [
            [0.0, 0.0, 0.0],
            [x, 0.0, 0.0],
            [0.0, y, 0.0],
            [0.0, 0.0, z],
            [x, y, 0.0],
            [x, 0.0, z],
            [0.0, y, z],
            [x, y, z],
        ] {
            let p = self.voxel_to_physical(corner);
            for i in 0..3 {
                lo[i] = lo[i].min(p[i]);
                hi[i] = hi[i].max(p[i]);
            }
        }
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::Grid;
    use crate::GeoError;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_grid_invalid_input() {
        let e = Grid::new([0.0; 3], [1.0, 0.0, 1.0], [2, 2, 2]).unwrap_err();
        assert!(matches!(e, GeoError::InvalidGrid(_)));
        let e = Grid::new([0.0; 3], [1.0, 1.0, -2.5], [2, 2, 2]).unwrap_err();
        assert!(matches!(e, GeoError::InvalidGrid(_)));
        let e = Grid::new([0.0; 3], [1.0, f64::NAN, 1.0], [2, 2, 2]).unwrap_err();
        assert!(matches!(e, GeoError::InvalidGrid(_)));
        let e = Grid::new([0.0; 3], [1.0; 3], [2, 0, 2]).unwrap_err();
        assert!(matches!(e, GeoError::InvalidGrid(_)));

        // 非正交方向矩阵
        let skew = [[1.0, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let e = Grid::with_direction([0.0; 3], [1.0; 3], skew, [2, 2, 2]).unwrap_err();
        assert!(matches!(e, GeoError::InvalidGrid(_)));
    }

    #[test]
    fn test_grid_shape_order() {
        let g = Grid::new([0.0; 3], [1.0; 3], [20, 30, 10]).unwrap();
        assert_eq!(g.shape(), (10, 30, 20));
        assert_eq!(g.slice_shape(), (30, 20));
        assert_eq!(g.len_z(), 10);
        assert_eq!(g.voxel_count(), 6000);
        assert!(g.check(&(9, 29, 19)));
        assert!(!g.check(&(10, 0, 0)));
    }

    #[test]
    fn test_physical_voxel_round_trip() {
        let g = Grid::new([-120.5, 33.0, 7.25], [0.976, 0.976, 2.5], [512, 512, 90]).unwrap();
        let p = [-10.0, 101.3, 42.0];
        let f = g.physical_to_voxel(p);
        assert!(f64_eq(f[0], (-10.0 + 120.5) / 0.976));
        assert!(f64_eq(f[1], (101.3 - 33.0) / 0.976));
        assert!(f64_eq(f[2], (42.0 - 7.25) / 2.5));

        let back = g.voxel_to_physical(f);
        for i in 0..3 {
            assert!(f64_eq(back[i], p[i]));
        }
    }

    #[test]
    fn test_flipped_direction() {
        let flip = [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]];
        let g = Grid::with_direction([10.0, 10.0, 0.0], [2.0; 3], flip, [5, 5, 5]).unwrap();
        assert!(g.is_axis_aligned());
        let f = g.physical_to_voxel([6.0, 8.0, 4.0]);
        assert!(f64_eq(f[0], 2.0));
        assert!(f64_eq(f[1], 1.0));
        assert!(f64_eq(f[2], 2.0));

        let (lo, hi) = g.physical_bounds();
        assert_eq!(lo, [2.0, 2.0, 0.0]);
        assert_eq!(hi, [10.0, 10.0, 8.0]);
    }

    #[test]
    fn test_oblique_is_not_axis_aligned() {
        let (s, c) = std::f64::consts::FRAC_PI_6.sin_cos();
        let rot = [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]];
        let g = Grid::with_direction([0.0; 3], [1.0; 3], rot, [4, 4, 4]).unwrap();
        assert!(!g.is_axis_aligned());
        assert!(matches!(
            g.ensure_axis_aligned().unwrap_err(),
            GeoError::GridMismatch(_)
        ));
    }

    #[test]
    fn test_slice_positions() {
        let g = Grid::new([0.0, 0.0, -30.0], [1.0, 1.0, 2.5], [4, 4, 5]).unwrap();
        let z = g.slice_positions();
        assert_eq!(z.len(), 5);
        for (k, zk) in z.iter().enumerate() {
            assert!(f64_eq(*zk, -30.0 + k as f64 * 2.5));
        }
    }
}
