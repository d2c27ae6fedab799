//! 结构掩膜体积.

use std::ops::Index;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis, Ix3};

use crate::consts::gray::*;
use crate::geometry::Grid;
use crate::structure::{DuplicatePolicy, NameMatch, SliceTolerance};
use crate::{GeoError, GeoResult, Idx2d, Idx3d};

mod border;
mod build;
mod save;

pub use build::build_masks;
#[cfg(feature = "rayon")]
pub use build::par_build_masks;
pub use save::write_mask_archive;

/// 掩膜构建选项.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MaskOptions {
    /// 结构名匹配策略.
    pub name_match: NameMatch,

    /// 同名结构处理策略.
    pub duplicates: DuplicatePolicy,

    /// 轮廓到切片的距离容差.
    pub slice_tolerance: SliceTolerance,
}

impl MaskOptions {
    /// 与早期脚本行为一致的选项: 精确匹配, 不检查轮廓到切片的距离.
    /// 同名结构仍会被报告.
    #[inline]
    pub fn legacy() -> Self {
        Self {
            name_match: NameMatch::Exact,
            duplicates: DuplicatePolicy::Reject,
            slice_tolerance: SliceTolerance::Unchecked,
        }
    }
}

/// 一个结构在参考网格上的二值掩膜. 背景为 `MASK_BACKGROUND`, 前景为 `MASK_FOREGROUND`.
///
/// 数据按 `(z, y, x)` 存储, 形状与参考网格一致. 该结构创建后只读.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskVolume {
    name: String,
    referenced_series_uid: String,
    grid: Grid,
    data: Array3<u8>,
}

impl Index<Idx3d> for MaskVolume {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl MaskVolume {
    /// 由已有数据创建掩膜. `data` 的形状必须等于 `grid.shape()`,
    /// 否则返回 `Err(GeoError::ShapeMismatch)`. 非零体素一律视为前景.
    pub fn from_array<S, U>(name: S, referenced_series_uid: U, grid: &Grid, data: Array3<u8>) -> GeoResult<Self>
    where
        S: Into<String>,
        U: Into<String>,
    {
        if data.dim() != grid.shape() {
            return Err(GeoError::ShapeMismatch(grid.shape(), data.dim()));
        }
        let data = data.mapv_into(|p| if p == MASK_BACKGROUND { MASK_BACKGROUND } else { MASK_FOREGROUND });
        Ok(Self {
            name: name.into(),
            referenced_series_uid: referenced_series_uid.into(),
            grid: grid.clone(),
            data,
        })
    }

    /// 创建全背景掩膜.
    pub(crate) fn empty(name: &str, referenced_series_uid: &str, grid: &Grid) -> Self {
        Self {
            name: name.to_string(),
            referenced_series_uid: referenced_series_uid.to_string(),
            grid: grid.clone(),
            data: Array3::zeros(grid.shape()),
        }
    }

    /// 结构名 (结构集中的原始名称).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 该掩膜所参照 CT 序列的 Series Instance UID.
    #[inline]
    pub fn referenced_series_uid(&self) -> &str {
        &self.referenced_series_uid
    }

    /// 参考网格.
    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// 数据形状, 按 `(z, y, x)` 排列.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_array(self) -> Array3<u8> {
        self.data
    }

    /// 获取 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, u8> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, u8>> {
        self.data.axis_iter(Axis(0))
    }

    /// 前景体素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 是否全为背景.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|p| is_background(*p))
    }

    /// 收集所有前景体素的下标. 结果按行优先存储.
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, p)| is_foreground(*p).then_some(pos))
            .collect()
    }

    /// 含有前景的切片索引, 升序.
    pub fn occupied_slices(&self) -> Vec<usize> {
        self.slice_iter()
            .enumerate()
            .filter_map(|(k, s)| s.iter().any(|p| is_foreground(*p)).then_some(k))
            .collect()
    }

    /// 第 `z_index` 层切片上的前景像素下标. 越界时 panic.
    pub fn slice_foreground_pos(&self, z_index: usize) -> Vec<Idx2d> {
        self.slice_at(z_index)
            .indexed_iter()
            .filter_map(|(pos, p)| is_foreground(*p).then_some(pos))
            .collect()
    }

    /// 以 nifti 约定的 `[x, y, z]` 轴序返回数据视图.
    #[inline]
    pub(crate) fn xyz_view(&self) -> ndarray::ArrayView<'_, u8, Ix3> {
        self.data.view().permuted_axes([2, 1, 0])
    }

    /// 用新数据替换自身数据, 保留元信息.
    #[inline]
    pub(crate) fn with_data(&self, data: Array3<u8>) -> Self {
        debug_assert_eq!(data.dim(), self.grid.shape());
        Self {
            name: self.name.clone(),
            referenced_series_uid: self.referenced_series_uid.clone(),
            grid: self.grid.clone(),
            data,
        }
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }
}
