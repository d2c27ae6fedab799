//! 掩膜的逐切片轮廓线, 用于可视化.

use ndarray::{Array3, ArrayView2, Axis};

use super::MaskVolume;
use crate::consts::gray::*;
use crate::Idx2d;

/// 判断切片 `s` 上的前景像素 `pos` 是否位于边界: 4-邻域中存在背景像素,
/// 或位于图像边缘 (图像外视为背景).
fn is_outline(s: &ArrayView2<u8>, (h, w): Idx2d) -> bool {
    let (height, width) = s.dim();
    if h == 0 || w == 0 || h + 1 == height || w + 1 == width {
        return true;
    }
    [(h - 1, w), (h + 1, w), (h, w - 1), (h, w + 1)]
        .into_iter()
        .any(|p| is_background(s[p]))
}

impl MaskVolume {
    /// 逐个水平切片提取前景区域的 4-邻域边界, 得到只保留轮廓线的新掩膜.
    ///
    /// 结果是原掩膜的子集, 元信息保持不变. 不跨切片考虑邻域,
    /// 因此每层切片上的区域都有完整的闭合轮廓线.
    pub fn border(&self) -> MaskVolume {
        let mut out = Array3::zeros(self.shape());
        for (s, mut o) in self.data.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            for (pos, &p) in s.indexed_iter() {
                if is_foreground(p) && is_outline(&s, pos) {
                    o[pos] = MASK_FOREGROUND;
                }
            }
        }
        self.with_data(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::Grid;
    use crate::mask::MaskVolume;
    use ndarray::{s, Array3};

    #[test]
    fn test_border_of_square() {
        let g = Grid::new([0.0; 3], [1.0; 3], [8, 8, 2]).unwrap();
        let mut data = Array3::zeros((2, 8, 8));
        data.slice_mut(s![1, 2..6, 1..7]).fill(1);
        let m = MaskVolume::from_array("S", "uid", &g, data).unwrap();

        let b = m.border();
        assert_eq!(b.name(), "S");
        assert_eq!(b.grid(), m.grid());
        // 4x6 矩形的外圈: 4*6 - 2*4
        assert_eq!(b.count_foreground(), 24 - 8);
        assert_eq!(b[(1, 2, 1)], 1);
        assert_eq!(b[(1, 3, 2)], 0);
        assert!(b.slice_foreground_pos(0).is_empty());
        assert!(b.foreground_pos().iter().all(|p| m[*p] == 1));
    }

    #[test]
    fn test_border_at_image_edge() {
        let g = Grid::new([0.0; 3], [1.0; 3], [3, 3, 1]).unwrap();
        let m = MaskVolume::from_array("S", "uid", &g, Array3::ones((1, 3, 3))).unwrap();
        let b = m.border();
        assert_eq!(b.count_foreground(), 8);
        assert_eq!(b[(0, 1, 1)], 0);
    }
}
