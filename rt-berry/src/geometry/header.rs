//! 与 nifti header 之间的几何信息转换.
//!
//! nifti 使用 RAS+ 物理坐标系, 而 DICOM (以及本 crate) 使用 LPS+.
//! 两者之间仅相差 x, y 两个轴的符号, 与 ITK 读写 nifti 时的处理方式一致.

use nalgebra::{Matrix3, Vector3};
use nifti::NiftiHeader;

use super::Grid;
use crate::{GeoError, GeoResult};

/// RAS <-> LPS 的符号翻转. 该变换是自逆的.
#[inline]
fn flip_ras_lps(v: [f64; 3]) -> [f64; 3] {
    [-v[0], -v[1], v[2]]
}

/// 按 nifti 标准从四元数参数构建旋转矩阵. `qfac` 为 `pixdim[0]` 的符号.
fn quatern_to_matrix(b: f64, c: f64, d: f64, qfac: f64) -> Matrix3<f64> {
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    Matrix3::new(
        a * a + b * b - c * c - d * d,
        2.0 * (b * c - a * d),
        2.0 * (b * d + a * c) * qfac,
        2.0 * (b * c + a * d),
        a * a + c * c - b * b - d * d,
        2.0 * (c * d - a * b) * qfac,
        2.0 * (b * d - a * c),
        2.0 * (c * d + a * b),
        (a * a + d * d - c * c - b * b) * qfac,
    )
}

impl Grid {
    /// 从 nifti header 中读取网格几何信息.
    ///
    /// 若 `sform_code > 0` 则使用 `srow_{x, y, z}` 仿射矩阵, 否则使用
    /// `pixdim`, `quatern_{x, y, z}` 偏移与四元数参数. 结果会转换为 LPS+ 坐标系.
    pub fn from_nifti_header(h: &NiftiHeader) -> GeoResult<Self> {
        let [_, nx, ny, nz, ..] = h.dim;
        // 二维图像也视为单切片三维图像.
        let size = [nx as usize, ny as usize, (nz as usize).max(1)];

        let (affine, origin_ras) = if h.sform_code > 0 {
            let rows = [h.srow_x, h.srow_y, h.srow_z];
            let a = Matrix3::from_fn(|r, c| rows[r][c] as f64);
            let o = [rows[0][3] as f64, rows[1][3] as f64, rows[2][3] as f64];
            (a, o)
        } else {
            let qfac = if h.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
            let r = quatern_to_matrix(
                h.quatern_b as f64,
                h.quatern_c as f64,
                h.quatern_d as f64,
                qfac,
            );
            let s = Vector3::new(
                (h.pixdim[1] as f64).abs(),
                (h.pixdim[2] as f64).abs(),
                (h.pixdim[3] as f64).abs(),
            );
            let o = [h.quatern_x as f64, h.quatern_y as f64, h.quatern_z as f64];
            (r * Matrix3::from_diagonal(&s), o)
        };

        let mut spacing = [0.0; 3];
        let mut direction = [[0.0; 3]; 3];
        for c in 0..3 {
            let col = affine.column(c);
            let norm = col.norm();
            spacing[c] = norm;
            // 零列会在 `Grid::with_direction` 中因 spacing 非正而被拒绝.
            let scale = if norm > 0.0 { 1.0 / norm } else { 0.0 };
            let unit = flip_ras_lps([col[0] * scale, col[1] * scale, col[2] * scale]);
            for r in 0..3 {
                direction[r][c] = unit[r];
            }
        }

        Grid::with_direction(flip_ras_lps(origin_ras), spacing, direction, size)
    }

    /// 构建携带本网格几何信息的 nifti header (仅写入 sform, 数据类型由 writer 决定).
    ///
    /// nifti-1 的每个维度以 16 位存储, 任一轴超过 `u16::MAX` 个体素时返回
    /// `Err(GeoError::InvalidGrid)`.
    pub fn to_nifti_header(&self) -> GeoResult<NiftiHeader> {
        let mut header = NiftiHeader::default();
        header.dim[0] = 3;
        for (i, n) in self.size.iter().enumerate() {
            header.dim[i + 1] = u16::try_from(*n).map_err(|_| {
                GeoError::InvalidGrid(format!("size {n} on axis {i} does not fit in a nifti-1 header"))
            })?;
        }

        header.pixdim[0] = 1.0;
        for (i, s) in self.spacing.iter().enumerate() {
            header.pixdim[i + 1] = *s as f32;
        }

        let origin = flip_ras_lps(self.origin);
        let mut rows = [[0.0f32; 4]; 3];
        for c in 0..3 {
            let col = flip_ras_lps([
                self.direction[0][c],
                self.direction[1][c],
                self.direction[2][c],
            ]);
            for r in 0..3 {
                rows[r][c] = (col[r] * self.spacing[c]) as f32;
            }
        }
        for r in 0..3 {
            rows[r][3] = origin[r] as f32;
        }
        [header.srow_x, header.srow_y, header.srow_z] = rows;
        header.sform_code = 1;
        header.qform_code = 0;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::Grid;
    use crate::GeoError;
    use nifti::NiftiHeader;

    fn f64_eq(a: f64, b: f64) -> bool {
        // header 内部以 f32 存储.
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_header_round_trip() {
        let flip = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]];
        let g = Grid::with_direction([-250.0, 180.5, -92.0], [0.9765625, 0.9765625, 3.0], flip, [512, 512, 88])
            .unwrap();
        let back = Grid::from_nifti_header(&g.to_nifti_header().unwrap()).unwrap();

        assert_eq!(back.size(), g.size());
        for i in 0..3 {
            assert!(f64_eq(back.origin()[i], g.origin()[i]));
            assert!(f64_eq(back.spacing()[i], g.spacing()[i]));
            for j in 0..3 {
                assert!(f64_eq(back.direction()[i][j], g.direction()[i][j]));
            }
        }
    }

    #[test]
    fn test_header_size_limit() {
        let g = Grid::new([0.0; 3], [1.0; 3], [65535, 2, 1]).unwrap();
        assert_eq!(g.to_nifti_header().unwrap().dim[1], 65535);

        let g = Grid::new([0.0; 3], [1.0; 3], [4, 65536, 1]).unwrap();
        assert!(matches!(g.to_nifti_header().unwrap_err(), GeoError::InvalidGrid(_)));
    }

    #[test]
    fn test_header_qform_fallback() {
        let mut h = NiftiHeader::default();
        h.dim[0] = 3;
        h.dim[1] = 10;
        h.dim[2] = 12;
        h.dim[3] = 4;
        h.pixdim[0] = 1.0;
        h.pixdim[1] = 0.5;
        h.pixdim[2] = 0.5;
        h.pixdim[3] = 2.0;
        h.sform_code = 0;
        h.qform_code = 1;
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, 0.0);
        (h.quatern_x, h.quatern_y, h.quatern_z) = (10.0, -20.0, 30.0);

        let g = Grid::from_nifti_header(&h).unwrap();
        assert_eq!(g.size(), [10, 12, 4]);
        assert_eq!(g.spacing(), [0.5, 0.5, 2.0]);
        // RAS -> LPS
        assert_eq!(g.origin(), [-10.0, 20.0, 30.0]);
        assert_eq!(
            g.direction(),
            [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]]
        );
        assert!(g.is_axis_aligned());
    }
}
