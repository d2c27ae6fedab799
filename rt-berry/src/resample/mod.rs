//! 刚性变换下的体积重采样.
//!
//! 对目标网格上的每个体素:
//!
//! 1. 计算其物理坐标;
//! 2. 用 (固定 -> 移动方向的) 变换映射到移动图像的物理空间;
//! 3. 转换为移动图像的小数体素坐标, 按给定插值方式采样.
//!
//! 落在移动图像体素范围之外的目标体素取填充值. 上述三步都是仿射的,
//! 因此预先合成为一个 "目标体素 -> 移动体素" 的仿射映射.

use std::path::Path;

use log::{debug, info};
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis};
use nifti::writer::WriterOptions;
use num::ToPrimitive;

use crate::consts::{hu, tol};
use crate::geometry::Grid;
use crate::registration::RigidTransform;
use crate::{GeoError, GeoResult, Idx3d};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 插值方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Interpolation {
    /// 最近邻.
    Nearest,

    /// 三线性, 由相邻 8 个体素加权得到.
    #[default]
    Linear,
}

/// 重采样选项.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResampleOptions {
    interpolation: Interpolation,
    fill_value: f32,
}

impl Default for ResampleOptions {
    #[inline]
    fn default() -> Self {
        Self::cbct()
    }
}

impl ResampleOptions {
    /// 构建重采样选项.
    ///
    /// `fill_value` 不能为无穷, 否则返回 `None`. NaN 是允许的, 可用于标记视野外区域.
    pub fn new(interpolation: Interpolation, fill_value: f32) -> Option<Self> {
        (!fill_value.is_infinite()).then_some(Self {
            interpolation,
            fill_value,
        })
    }

    /// CT 常用选项: 三线性插值, 以 -1000 HU 填充.
    #[inline]
    pub const fn ct() -> Self {
        Self {
            interpolation: Interpolation::Linear,
            fill_value: hu::CT_AIR,
        }
    }

    /// CBCT 常用选项: 三线性插值, 以 -1024 填充.
    #[inline]
    pub const fn cbct() -> Self {
        Self {
            interpolation: Interpolation::Linear,
            fill_value: hu::CBCT_AIR,
        }
    }

    /// 替换插值方式.
    #[inline]
    pub const fn with_interpolation(self, interpolation: Interpolation) -> Self {
        Self {
            interpolation,
            fill_value: self.fill_value,
        }
    }

    /// 插值方式.
    #[inline]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// 填充值.
    #[inline]
    pub fn fill_value(&self) -> f32 {
        self.fill_value
    }
}

/// 重采样到目标网格上的体积. 数据按 `(z, y, x)` 存储.
#[derive(Clone, Debug, PartialEq)]
pub struct ResampledVolume {
    grid: Grid,
    source_series_uid: Option<String>,
    data: Array3<f32>,
}

impl ResampledVolume {
    /// 目标网格.
    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 移动图像的 Series Instance UID (若已设置).
    #[inline]
    pub fn source_series_uid(&self) -> Option<&str> {
        self.source_series_uid.as_deref()
    }

    /// 设置移动图像的 Series Instance UID.
    pub fn with_source_series_uid<S: Into<String>>(mut self, uid: S) -> Self {
        self.source_series_uid = Some(uid.into());
        self
    }

    /// 数据形状, 按 `(z, y, x)` 排列.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_array(self) -> Array3<f32> {
        self.data
    }

    /// 获取第 `z_index` 层切片视图. 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 将体积写为 NIfTI 文件, 几何信息取自目标网格.
    pub fn write_nifti<P: AsRef<Path>>(&self, path: P) -> GeoResult<()> {
        let path = path.as_ref();
        WriterOptions::new(path)
            .reference_header(&self.grid.to_nifti_header()?)
            .write_nifti(&self.data.view().permuted_axes([2, 1, 0]))?;
        debug!("resampled volume written to {}", path.display());
        Ok(())
    }
}

/// 目标体素坐标 `(x, y, z)` 到移动图像小数体素坐标的仿射映射 `u = A v + b`.
struct VoxelMap {
    a: Matrix3<f64>,
    b: Vector3<f64>,
}

impl VoxelMap {
    fn new(moving: &Grid, target: &Grid, transform: &RigidTransform) -> Self {
        let r = transform.rotation_matrix();
        let t = transform.translation_vector();
        let s_t = Matrix3::from_diagonal(&Vector3::from(target.spacing()));
        let s_m_inv = Matrix3::from_diagonal(&Vector3::from(moving.spacing().map(|s| 1.0 / s)));
        let to_moving = s_m_inv * moving.direction_matrix().transpose();

        let a = to_moving * r * target.direction_matrix() * s_t;
        let b = to_moving * (r * Vector3::from(target.origin()) + t - Vector3::from(moving.origin()));
        Self { a, b }
    }

    #[inline]
    fn apply(&self, x: usize, y: usize, z: usize) -> Vector3<f64> {
        self.a * Vector3::new(x as f64, y as f64, z as f64) + self.b
    }
}

/// 最近邻采样. 四舍五入后的下标不在 `[0, n)` 内时返回 `None`.
fn sample_nearest<T: Copy + ToPrimitive>(moving: &ArrayView3<T>, u: &Vector3<f64>) -> Option<f64> {
    let (nz, ny, nx) = moving.dim();
    let round = |v: f64, n: usize| {
        let i = (v + 0.5).floor();
        (i >= 0.0 && i < n as f64).then_some(i as usize)
    };
    let (x, y, z) = (round(u.x, nx)?, round(u.y, ny)?, round(u.z, nz)?);
    moving[(z, y, x)].to_f64()
}

/// 三线性采样. 任一坐标不在 `[0, n - 1]` 内 (含微小松弛) 时返回 `None`.
fn sample_linear<T: Copy + ToPrimitive>(moving: &ArrayView3<T>, u: &Vector3<f64>) -> Option<f64> {
    let (nz, ny, nx) = moving.dim();
    // 返回 (下界下标, 上界下标, 上界权重).
    let split = |v: f64, n: usize| {
        let hi = (n - 1) as f64;
        if !(v >= -tol::INSIDE_SLACK && v <= hi + tol::INSIDE_SLACK) {
            return None;
        }
        let v = v.clamp(0.0, hi);
        let i0 = (v.floor() as usize).min(n - 1);
        let i1 = (i0 + 1).min(n - 1);
        Some((i0, i1, v - i0 as f64))
    };
    let (x0, x1, wx) = split(u.x, nx)?;
    let (y0, y1, wy) = split(u.y, ny)?;
    let (z0, z1, wz) = split(u.z, nz)?;

    let mut acc = 0.0;
    for (z, fz) in [(z0, 1.0 - wz), (z1, wz)] {
        for (y, fy) in [(y0, 1.0 - wy), (y1, wy)] {
            for (x, fx) in [(x0, 1.0 - wx), (x1, wx)] {
                let w = fz * fy * fx;
                if w != 0.0 {
                    acc += w * moving[(z, y, x)].to_f64()?;
                }
            }
        }
    }
    Some(acc)
}

/// 计算目标体积的第 `z` 层切片, 返回取填充值的体素个数.
fn resample_slice<T: Copy + ToPrimitive>(
    z: usize,
    mut out: ArrayViewMut2<f32>,
    moving: &ArrayView3<T>,
    map: &VoxelMap,
    options: &ResampleOptions,
) -> usize {
    let mut outside = 0;
    for ((y, x), p) in out.indexed_iter_mut() {
        let u = map.apply(x, y, z);
        let v = match options.interpolation {
            Interpolation::Nearest => sample_nearest(moving, &u),
            Interpolation::Linear => sample_linear(moving, &u),
        };
        match v {
            Some(v) => *p = v as f32,
            None => {
                *p = options.fill_value;
                outside += 1;
            }
        }
    }
    outside
}

/// 检查输入并构建体素映射.
fn prepare<T>(
    moving: &ArrayView3<T>,
    moving_grid: &Grid,
    target_grid: &Grid,
    transform: &RigidTransform,
) -> GeoResult<VoxelMap> {
    if moving.dim() != moving_grid.shape() {
        return Err(GeoError::ShapeMismatch(moving_grid.shape(), moving.dim()));
    }
    moving_grid.ensure_axis_aligned()?;
    target_grid.ensure_axis_aligned()?;
    Ok(VoxelMap::new(moving_grid, target_grid, transform))
}

fn report(target_grid: &Grid, outside: usize, options: &ResampleOptions) {
    info!(
        "resampled {} voxels ({:?}), {outside} outside the moving volume filled with {}",
        target_grid.voxel_count(),
        options.interpolation,
        options.fill_value
    );
}

/// 将移动图像 `moving` (其几何为 `moving_grid`) 重采样到 `target_grid` 上.
///
/// `transform` 必须是固定 (目标) -> 移动方向的映射, 例如 [`crate::registration::decode_rigid_transform`]
/// 的返回值. 变换可以包含任意旋转.
///
/// # 返回值
///
/// - `moving` 的形状与 `moving_grid` 不符时, 返回 `Err(GeoError::ShapeMismatch)`;
/// - 任一网格的方向矩阵不是轴对齐时, 返回 `Err(GeoError::GridMismatch)`.
pub fn resample<T>(
    moving: ArrayView3<T>,
    moving_grid: &Grid,
    target_grid: &Grid,
    transform: &RigidTransform,
    options: &ResampleOptions,
) -> GeoResult<ResampledVolume>
where
    T: Copy + ToPrimitive,
{
    let map = prepare(&moving, moving_grid, target_grid, transform)?;
    let mut data = Array3::from_elem(target_grid.shape(), options.fill_value);
    let outside: usize = data
        .axis_iter_mut(Axis(0))
        .enumerate()
        .map(|(z, s)| resample_slice(z, s, &moving, &map, options))
        .sum();
    report(target_grid, outside, options);
    Ok(ResampledVolume {
        grid: target_grid.clone(),
        source_series_uid: None,
        data,
    })
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        /// 借助 `rayon`, 按目标切片并行地运行 [`resample`]. 结果与串行版本完全一致.
        pub fn par_resample<T>(
            moving: ArrayView3<T>,
            moving_grid: &Grid,
            target_grid: &Grid,
            transform: &RigidTransform,
            options: &ResampleOptions,
        ) -> GeoResult<ResampledVolume>
        where
            T: Copy + ToPrimitive + Send + Sync,
        {
            let map = prepare(&moving, moving_grid, target_grid, transform)?;
            let mut data = Array3::from_elem(target_grid.shape(), options.fill_value);
            let outside: usize = data
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .map(|(z, s)| resample_slice(z, s, &moving, &map, options))
                .sum();
            report(target_grid, outside, options);
            Ok(ResampledVolume {
                grid: target_grid.clone(),
                source_series_uid: None,
                data,
            })
        }
    }
}
