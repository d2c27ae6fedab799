//! 轮廓到切片的绑定.
//!
//! 每个轮廓总是被绑定到距离最近的一个切片上, 不做跨切片插值.
//! 当轮廓间距小于图像层厚时, 多个轮廓可能落在同一切片上 (由 XOR 叠加处理);
//! 当轮廓间距大于层厚时, 部分切片不会收到任何轮廓 (保持背景).
//! 这是一种已知的近似, 而不是错误.

use log::warn;
use ordered_float::OrderedFloat;

use super::Contour;
use crate::consts::tol;
use crate::geometry::Grid;
use crate::{GeoError, GeoResult};

/// 在 `z_locs` 中选取与 `z0` 距离最近的切片索引. 距离相同时取较小的索引.
///
/// `z_locs` 为空时返回 `None`.
pub fn bind_slice(z0: f64, z_locs: &[f64]) -> Option<usize> {
    // `min_by_key` 在多个最小值中返回第一个.
    z_locs
        .iter()
        .enumerate()
        .min_by_key(|(_, z)| OrderedFloat((**z - z0).abs()))
        .map(|(k, _)| k)
}

/// 轮廓与最近切片之间允许的最大距离.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum SliceTolerance {
    /// 不超过半个层厚. 超出时报告错误, 以免不同序列的轮廓被悄悄绑定到错误的切片.
    #[default]
    HalfSpacing,

    /// 不超过给定的毫米数.
    Millimetres(f64),

    /// 不检查, 总是绑定到最近切片.
    Unchecked,
}

impl SliceTolerance {
    /// 在网格 `grid` 上的容差值 (毫米). `Unchecked` 返回 `None`.
    pub fn limit(&self, grid: &Grid) -> Option<f64> {
        match self {
            Self::HalfSpacing => Some(grid.spacing()[2] / 2.0 + tol::SLICE_SLACK_MM),
            Self::Millimetres(mm) => Some(*mm),
            Self::Unchecked => None,
        }
    }
}

/// 将轮廓绑定到 `grid` 上的切片索引. `z_locs` 为 `grid.slice_positions()` 的缓存.
///
/// # 返回值
///
/// - 顶点少于 3 个时返回 `Err(GeoError::DegeneratePolygon)`;
/// - 顶点含 NaN 或无穷时返回 `Err(GeoError::NonFiniteContour)`;
/// - 超出容差时返回 `Err(GeoError::SliceOutOfTolerance)`;
/// - 否则返回切片索引.
pub(crate) fn bind_contour(
    contour: &Contour,
    grid: &Grid,
    z_locs: &[f64],
    tolerance: SliceTolerance,
) -> GeoResult<usize> {
    if contour.len() < 3 {
        return Err(GeoError::DegeneratePolygon(contour.len()));
    }
    contour.ensure_finite()?;
    // 非空轮廓一定有 z 坐标; 合法网格至少有一个切片.
    let z0 = contour.points()[0][2];
    if !contour.is_roughly_planar() {
        warn!("contour at z = {z0} mm is not planar, binding by its first vertex");
    }
    let k = bind_slice(z0, z_locs)
        .ok_or_else(|| GeoError::InvalidGrid("grid has no slices".to_string()))?;

    let dist = (z_locs[k] - z0).abs();
    match tolerance.limit(grid) {
        // 容差为 NaN 时同样视为超出.
        Some(limit) if !(dist <= limit) => {
            return Err(GeoError::SliceOutOfTolerance(z0, dist, limit));
        }
        None if dist > grid.spacing()[2] / 2.0 + tol::SLICE_SLACK_MM => {
            warn!("contour at z = {z0} mm is {dist} mm away from slice {k}, bound anyway");
        }
        _ => {}
    }
    Ok(k)
}

#[cfg(test)]
mod tests {
    use super::{bind_contour, bind_slice, SliceTolerance};
    use crate::geometry::Grid;
    use crate::structure::Contour;
    use crate::GeoError;

    fn z_locs(origin: f64, spacing: f64, n: usize) -> Vec<f64> {
        (0..n).map(|k| origin + k as f64 * spacing).collect()
    }

    /// 位于切片中心上的轮廓必定绑定到该切片.
    #[test]
    fn test_bind_exact_positions() {
        for &(o, s) in &[(0.0, 1.0), (-312.5, 2.5), (17.3, 0.7), (-0.1, 3.0)] {
            let z = z_locs(o, s, 97);
            for (k, zk) in z.iter().enumerate() {
                assert_eq!(bind_slice(*zk, &z), Some(k));
            }
        }
    }

    #[test]
    fn test_bind_nearest_and_ties() {
        let z = z_locs(0.0, 2.0, 5);
        assert_eq!(bind_slice(2.9, &z), Some(1));
        assert_eq!(bind_slice(3.1, &z), Some(2));
        // 平局取较小索引
        assert_eq!(bind_slice(3.0, &z), Some(1));
        // 范围外取端点
        assert_eq!(bind_slice(-100.0, &z), Some(0));
        assert_eq!(bind_slice(100.0, &z), Some(4));
        assert_eq!(bind_slice(1.0, &[]), None);
    }

    #[test]
    fn test_bind_contour_tolerance() {
        let g = Grid::new([0.0; 3], [1.0, 1.0, 2.0], [4, 4, 5]).unwrap();
        let z = g.slice_positions();
        let at = |z0: f64| Contour::new(vec![[0.0, 0.0, z0], [1.0, 0.0, z0], [1.0, 1.0, z0]]);

        assert_eq!(bind_contour(&at(4.0), &g, &z, SliceTolerance::HalfSpacing).unwrap(), 2);
        assert_eq!(bind_contour(&at(4.9), &g, &z, SliceTolerance::HalfSpacing).unwrap(), 2);

        let e = bind_contour(&at(12.0), &g, &z, SliceTolerance::HalfSpacing).unwrap_err();
        assert!(matches!(e, GeoError::SliceOutOfTolerance(..)));
        assert_eq!(bind_contour(&at(12.0), &g, &z, SliceTolerance::Unchecked).unwrap(), 4);

        let e = bind_contour(&at(4.5), &g, &z, SliceTolerance::Millimetres(0.25)).unwrap_err();
        assert!(matches!(e, GeoError::SliceOutOfTolerance(..)));
    }

    #[test]
    fn test_bind_contour_non_finite() {
        let g = Grid::new([0.0; 3], [1.0; 3], [4, 4, 4]).unwrap();
        let z = g.slice_positions();
        for tolerance in [SliceTolerance::HalfSpacing, SliceTolerance::Unchecked] {
            let c = Contour::new(vec![[0.0, 0.0, f64::NAN], [1.0, 0.0, f64::NAN], [1.0, 1.0, f64::NAN]]);
            let e = bind_contour(&c, &g, &z, tolerance).unwrap_err();
            assert!(matches!(e, GeoError::NonFiniteContour(0)));

            let c = Contour::new(vec![[0.0, 0.0, 1.0], [1.0, f64::NAN, 1.0], [1.0, 1.0, 1.0]]);
            let e = bind_contour(&c, &g, &z, tolerance).unwrap_err();
            assert!(matches!(e, GeoError::NonFiniteContour(1)));
        }

        let c = Contour::new(vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0]]);
        let e = bind_contour(&c, &g, &z, SliceTolerance::Millimetres(f64::NAN)).unwrap_err();
        assert!(matches!(e, GeoError::SliceOutOfTolerance(..)));
    }

    #[test]
    fn test_bind_contour_degenerate() {
        let g = Grid::new([0.0; 3], [1.0; 3], [4, 4, 4]).unwrap();
        let z = g.slice_positions();
        let c = Contour::new(vec![[0.0, 0.0, 1.0], [1.0, 1.0, 1.0]]);
        let e = bind_contour(&c, &g, &z, SliceTolerance::Unchecked).unwrap_err();
        assert!(matches!(e, GeoError::DegeneratePolygon(2)));
    }
}
