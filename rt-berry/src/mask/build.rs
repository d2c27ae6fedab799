//! 由结构集构建掩膜体积.
//!
//! 对每个请求的结构:
//!
//! 1. 初始化与参考网格同形状的全背景体积;
//! 2. 将每个轮廓的物理顶点转换为切片平面内的小数体素坐标,
//!    绑定到最近的切片, 栅格化后与该切片做 XOR;
//! 3. 同一切片上的多个轮廓因此按奇偶规则叠加, 从而表示空洞 (环形结构) 和孤岛.
//!
//! 所有请求名在栅格化开始之前就完成解析与校验, 因此要么全部成功, 要么整体失败.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::Axis;

use super::{MaskOptions, MaskVolume};
use crate::geometry::Grid;
use crate::raster::xor_polygon_unchecked;
use crate::structure::{bind_contour, select, SliceTolerance, Structure, StructureSet};
use crate::GeoResult;

/// 按切片分组的多边形, 顶点为小数 `(x, y)` 坐标. 第 `k` 项属于第 `k` 层切片.
type SlicePolygons = Vec<Vec<Vec<(f64, f64)>>>;

/// 一个已解析并完成切片绑定的结构.
struct MaskPlan {
    /// 调用者请求的名称, 作为输出映射的键.
    requested: String,
    /// 结构集中的原始名称.
    name: String,
    polygons: SlicePolygons,
}

/// 为 `names` 中的每个结构名构建掩膜, 返回 `请求名 -> 掩膜` 的映射.
///
/// # 返回值
///
/// - 参考网格方向矩阵不是轴对齐时, 返回 `Err(GeoError::GridMismatch)`;
/// - 某个请求名在结构集中不存在时, 返回 `Err(GeoError::StructureNotFound)`,
///   其中附带最接近的候选名;
/// - 请求名匹配到多个结构且策略不允许时, 返回 `Err(GeoError::DuplicateStructure)`;
/// - 轮廓顶点少于 3 个时, 返回 `Err(GeoError::DegeneratePolygon)`;
/// - 轮廓距离最近切片超出容差时, 返回 `Err(GeoError::SliceOutOfTolerance)`.
///
/// 同一请求名出现多次时只构建一次.
pub fn build_masks<S: AsRef<str>>(
    set: &StructureSet,
    grid: &Grid,
    names: &[S],
    options: &MaskOptions,
) -> GeoResult<BTreeMap<String, MaskVolume>> {
    let plans = plan(set, grid, names, options)?;
    Ok(plans
        .into_iter()
        .map(|p| {
            let mut mask = MaskVolume::empty(&p.name, set.referenced_series_uid(), grid);
            for (mut sli, polys) in mask
                .data_mut()
                .axis_iter_mut(Axis(0))
                .zip(p.polygons.iter())
            {
                for poly in polys {
                    xor_polygon_unchecked(&mut sli, poly);
                }
            }
            report(&mask);
            (p.requested, mask)
        })
        .collect())
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        /// 借助 `rayon`, 按切片并行地运行 [`build_masks`]. 结果与串行版本完全一致.
        pub fn par_build_masks<S: AsRef<str>>(
            set: &StructureSet,
            grid: &Grid,
            names: &[S],
            options: &MaskOptions,
        ) -> GeoResult<BTreeMap<String, MaskVolume>> {
            let plans = plan(set, grid, names, options)?;
            Ok(plans
                .into_iter()
                .map(|p| {
                    let mut mask = MaskVolume::empty(&p.name, set.referenced_series_uid(), grid);
                    mask.data_mut()
                        .axis_iter_mut(Axis(0))
                        .into_par_iter()
                        .zip(p.polygons.par_iter())
                        .for_each(|(mut sli, polys)| {
                            for poly in polys {
                                xor_polygon_unchecked(&mut sli, poly);
                            }
                        });
                    report(&mask);
                    (p.requested, mask)
                })
                .collect())
        }
    }
}

/// 解析全部请求名, 并将每个结构的轮廓绑定到切片.
fn plan<S: AsRef<str>>(
    set: &StructureSet,
    grid: &Grid,
    names: &[S],
    options: &MaskOptions,
) -> GeoResult<Vec<MaskPlan>> {
    grid.ensure_axis_aligned()?;
    let structures = set.structures()?;
    let z_locs = grid.slice_positions();

    names
        .iter()
        .map(AsRef::as_ref)
        .unique()
        .map(|requested| {
            let s = select(&structures, requested, options.name_match, options.duplicates)?;
            Ok(MaskPlan {
                requested: requested.to_string(),
                name: s.name().to_string(),
                polygons: group_by_slice(s, grid, &z_locs, options.slice_tolerance)?,
            })
        })
        .collect()
}

/// 将结构的每个轮廓投影到切片平面并按切片分组.
fn group_by_slice(
    s: &Structure,
    grid: &Grid,
    z_locs: &[f64],
    tolerance: SliceTolerance,
) -> GeoResult<SlicePolygons> {
    let mut groups: SlicePolygons = vec![Vec::new(); grid.len_z()];
    for contour in s.contours() {
        let k = bind_contour(contour, grid, z_locs, tolerance)?;
        let poly = contour.points().iter().map(|p| grid.in_plane(*p)).collect();
        groups[k].push(poly);
    }

    for (k, g) in groups.iter().enumerate().filter(|(_, g)| g.len() > 1) {
        debug!(
            "structure `{}`: {} contours on slice {k}, combined by XOR",
            s.name(),
            g.len()
        );
    }
    Ok(groups)
}

fn report(mask: &MaskVolume) {
    let n = mask.count_foreground();
    if n == 0 {
        warn!("structure `{}` produced an empty mask", mask.name());
    } else {
        info!(
            "structure `{}`: {n} voxels on {} slices",
            mask.name(),
            mask.occupied_slices().len()
        );
    }
}
