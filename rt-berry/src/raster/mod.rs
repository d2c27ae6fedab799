//! 二维闭合多边形的扫描线填充.
//!
//! 顶点以小数 `(x, y)` 即 `(列, 行)` 给出. 像素 `(行 r, 列 c)` 的中心位于整数坐标
//! `(x = c, y = r)` 处. 填充规则如下:
//!
//! 1. 对每一行 `r`, 求出所有满足 `min(y_a, y_b) <= r < max(y_a, y_b)` 的边与水平线
//!    `y = r` 的交点 (半开区间, 因此水平边与顶点不会被重复计数);
//! 2. 交点按 x 排序后两两配对 `[x_l, x_r)`, 其中满足 `x_l <= c < x_r` 的像素为前景.
//!
//! 于是多边形的左/上边界包含在内, 右/下边界不包含. 例如顶点为
//! `(0, 0), (10, 0), (10, 10), (0, 10)` 的正方形恰好覆盖 `[0, 10) x [0, 10)`.
//!
//! 自相交多边形同样按奇偶规则处理, 结果可能反直觉, 但是确定的.
//! 超出图像范围的部分被隐式裁剪.

use itertools::Itertools;
use ndarray::{Array2, ArrayViewMut2};

use crate::consts::gray::MASK_FOREGROUND;
use crate::{GeoError, GeoResult, Idx2d};

/// 检查多边形至少有 3 个顶点.
#[inline]
pub(crate) fn check_polygon(vertices: &[(f64, f64)]) -> GeoResult<()> {
    if vertices.len() < 3 {
        Err(GeoError::DegeneratePolygon(vertices.len()))
    } else {
        Ok(())
    }
}

/// 将多边形栅格化为形状为 `shape = (行, 列)` 的布尔图像.
///
/// 顶点少于 3 个时返回 `Err(GeoError::DegeneratePolygon)`.
pub fn rasterize_polygon(vertices: &[(f64, f64)], shape: Idx2d) -> GeoResult<Array2<bool>> {
    check_polygon(vertices)?;
    let mut out = Array2::from_elem(shape, false);
    for_each_span(vertices, shape, |r, cols| {
        out.row_mut(r)
            .slice_mut(ndarray::s![cols])
            .fill(true);
    });
    Ok(out)
}

/// 将多边形内部的像素与 `slice` 做异或 (前景 <-> 背景翻转).
///
/// 多次调用即实现奇偶叠加: 被奇数个多边形覆盖的像素为前景, 偶数个为背景.
/// `slice` 中只允许出现 0 和 1.
pub fn xor_polygon(slice: &mut ArrayViewMut2<u8>, vertices: &[(f64, f64)]) -> GeoResult<()> {
    check_polygon(vertices)?;
    xor_polygon_unchecked(slice, vertices);
    Ok(())
}

/// 同 [`xor_polygon`], 但假定调用者已检查过顶点数.
pub(crate) fn xor_polygon_unchecked(slice: &mut ArrayViewMut2<u8>, vertices: &[(f64, f64)]) {
    let shape = slice.dim();
    for_each_span(vertices, shape, |r, cols| {
        slice
            .row_mut(r)
            .slice_mut(ndarray::s![cols])
            .iter_mut()
            .for_each(|p| *p ^= MASK_FOREGROUND);
    });
}

/// 对多边形覆盖的每一段行内连续像素 `(行, 列范围)` 调用 `op`. 列范围保证非空且不越界.
fn for_each_span<F>(vertices: &[(f64, f64)], (rows, cols): Idx2d, mut op: F)
where
    F: FnMut(usize, std::ops::Range<usize>),
{
    if rows == 0 || cols == 0 {
        return;
    }
    let (y_min, y_max) = match vertices.iter().map(|v| v.1).minmax().into_option() {
        Some(b) => b,
        None => return,
    };
    if !(y_min.is_finite() && y_max.is_finite()) {
        return;
    }

    // 行 r 需满足 y_min <= r < y_max.
    let r_begin = clamp_index(y_min.ceil(), rows);
    let r_end = clamp_index(y_max.ceil(), rows);

    let mut xs: Vec<f64> = Vec::with_capacity(8);
    for r in r_begin..r_end {
        let y = r as f64;
        xs.clear();
        for (&(xa, ya), &(xb, yb)) in vertices.iter().circular_tuple_windows() {
            if (ya <= y && y < yb) || (yb <= y && y < ya) {
                xs.push(xa + (y - ya) * (xb - xa) / (yb - ya));
            }
        }
        // 半开区间规则保证交点个数为偶数.
        debug_assert_eq!(xs.len() % 2, 0);
        xs.sort_unstable_by(f64::total_cmp);

        for (xl, xr) in xs.iter().tuples() {
            let c_begin = clamp_index(xl.ceil(), cols);
            let c_end = clamp_index(xr.ceil(), cols);
            if c_begin < c_end {
                op(r, c_begin..c_end);
            }
        }
    }
}

/// 将已取整的浮点坐标裁剪到 `[0, len]` 并转换为索引.
#[inline]
fn clamp_index(v: f64, len: usize) -> usize {
    if v <= 0.0 {
        0
    } else if v >= len as f64 {
        len
    } else {
        v as usize
    }
}
