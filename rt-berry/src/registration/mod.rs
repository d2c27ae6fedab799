//! 刚性配准矩阵的解码.
//!
//! DICOM 空间配准对象 (REG) 中存储的 4x4 齐次矩阵 `M` 将 **移动图像** 的物理坐标映射到
//! **固定图像** 的物理坐标. 而重采样的定义是 "对每个目标体素, 找到源图像中的对应物理点",
//! 需要的是固定 -> 移动方向的映射. 因此解码时先对 `M` 求逆, 再分解为旋转与平移.
//!
//! 方向弄反不会产生任何错误, 只会得到一个悄无声息地错位的体积.

use log::{debug, warn};
use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::consts::tol;
use crate::geometry::Point3;
use crate::{GeoError, GeoResult};

mod record;

pub use record::{RegistrationItem, RegistrationRecord};

/// 刚性 (或一般仿射) 变换 `p -> R p + t`, 其中 `R` 为 3x3 旋转 (或旋转/缩放) 子矩阵,
/// `t` 为平移向量, 单位毫米.
///
/// 由 [`decode_rigid_transform`] 得到的变换将固定图像的物理坐标映射到移动图像的物理坐标.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RigidTransform {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl Default for RigidTransform {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// 恒等变换.
    #[inline]
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// 由行优先的旋转矩阵与平移向量直接构建.
    pub fn from_parts(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation: Matrix3::from_fn(|r, c| rotation[r][c]),
            translation: Vector3::from(translation),
        }
    }

    /// 行优先的 3x3 子矩阵.
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let r = &self.rotation;
        [0, 1, 2].map(|i| [r[(i, 0)], r[(i, 1)], r[(i, 2)]])
    }

    /// 平移向量.
    #[inline]
    pub fn translation(&self) -> [f64; 3] {
        self.translation.into()
    }

    #[inline]
    pub(crate) fn rotation_matrix(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    #[inline]
    pub(crate) fn translation_vector(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// 变换一个物理点.
    #[inline]
    pub fn transform_point(&self, p: Point3) -> Point3 {
        (self.rotation * Vector3::from(p) + self.translation).into()
    }

    /// 逆变换 `p -> R^-1 (p - t)`.
    ///
    /// 若 `R` 不可逆, 返回 `Err(GeoError::SingularMatrix)`.
    pub fn inverse(&self) -> GeoResult<Self> {
        let inv = self
            .rotation
            .try_inverse()
            .ok_or_else(|| GeoError::SingularMatrix("rotation part is not invertible".to_string()))?;
        Ok(Self {
            rotation: inv,
            translation: -(inv * self.translation),
        })
    }

    /// 3x3 子矩阵是否在 `tolerance` 内为正交矩阵 (即不含缩放/剪切).
    pub fn is_orthonormal(&self, tolerance: f64) -> bool {
        let gram = self.rotation.transpose() * self.rotation;
        (gram - Matrix3::identity()).amax() <= tolerance
    }

    /// 行优先的 4x4 齐次矩阵.
    pub fn to_homogeneous(&self) -> [f64; 16] {
        let mut m = [0.0; 16];
        for r in 0..3 {
            for c in 0..3 {
                m[r * 4 + c] = self.rotation[(r, c)];
            }
            m[r * 4 + 3] = self.translation[r];
        }
        m[15] = 1.0;
        m
    }
}

/// 将配准记录中行优先存储的 4x4 矩阵 (移动 -> 固定) 解码为固定 -> 移动方向的变换.
///
/// # 返回值
///
/// 以下情况返回 `Err(GeoError::SingularMatrix)`:
///
/// - 矩阵含有非有限值;
/// - 底行在容差内不等于 `[0, 0, 0, 1]`;
/// - 行列式的绝对值小于 `tol::SINGULAR_EPS`.
///
/// 子矩阵不正交 (含缩放/剪切) 时仍按一般仿射变换解码, 但会记录警告.
pub fn decode_rigid_transform(matrix: &[f64; 16]) -> GeoResult<RigidTransform> {
    if !matrix.iter().all(|v| v.is_finite()) {
        return Err(GeoError::SingularMatrix(format!(
            "matrix contains non-finite values: {matrix:?}"
        )));
    }
    let m = Matrix4::from_row_slice(matrix);

    let bottom = [m[(3, 0)], m[(3, 1)], m[(3, 2)], m[(3, 3)] - 1.0];
    if bottom.iter().any(|v| v.abs() > tol::HOMOGENEOUS_ROW) {
        return Err(GeoError::SingularMatrix(format!(
            "bottom row must be [0, 0, 0, 1], got {:?}",
            &matrix[12..]
        )));
    }

    let det = m.determinant();
    if det.abs() < tol::SINGULAR_EPS {
        return Err(GeoError::SingularMatrix(format!("determinant {det:e} is zero")));
    }
    let inv = m
        .try_inverse()
        .ok_or_else(|| GeoError::SingularMatrix(format!("determinant {det:e}, inversion failed")))?;

    let t = RigidTransform {
        rotation: inv.fixed_view::<3, 3>(0, 0).into_owned(),
        translation: inv.fixed_view::<3, 1>(0, 3).into_owned(),
    };
    if !t.is_orthonormal(tol::DIRECTION) {
        warn!("registration matrix is not rigid (det = {det}), decoded as a general affine");
    }
    debug!(
        "decoded registration: rotation {:?}, translation {:?}",
        t.rotation(),
        t.translation()
    );
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::{decode_rigid_transform, RigidTransform};
    use crate::GeoError;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn point_eq(a: [f64; 3], b: [f64; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| f64_eq(*x, *y))
    }

    /// 绕 z 轴旋转 `deg` 度, 再平移 `t` 的行优先齐次矩阵.
    fn rz(deg: f64, t: [f64; 3]) -> [f64; 16] {
        let (s, c) = deg.to_radians().sin_cos();
        [
            c, -s, 0.0, t[0], //
            s, c, 0.0, t[1], //
            0.0, 0.0, 1.0, t[2], //
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    #[test]
    fn test_decode_identity() {
        let t = decode_rigid_transform(&RigidTransform::identity().to_homogeneous()).unwrap();
        assert_eq!(t, RigidTransform::identity());
        assert_eq!(t.transform_point([1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    }

    /// 存储的矩阵是移动 -> 固定, 解码结果必须是固定 -> 移动.
    #[test]
    fn test_decode_inverts_stored_matrix() {
        let m = rz(30.0, [10.0, -4.5, 7.25]);
        let stored = RigidTransform::from_parts(
            [[m[0], m[1], m[2]], [m[4], m[5], m[6]], [m[8], m[9], m[10]]],
            [m[3], m[7], m[11]],
        );
        let decoded = decode_rigid_transform(&m).unwrap();

        for p in [[0.0, 0.0, 0.0], [12.0, -3.0, 8.5], [-100.0, 42.0, -7.0]] {
            let fixed = stored.transform_point(p);
            assert!(point_eq(decoded.transform_point(fixed), p));
            assert!(!point_eq(stored.transform_point(fixed), p));
        }

        // 纯平移时, 逆变换即平移取反.
        let t = decode_rigid_transform(&rz(0.0, [1.0, 2.0, 3.0])).unwrap();
        assert!(point_eq(t.translation(), [-1.0, -2.0, -3.0]));
        assert!(t.is_orthonormal(1e-12));
    }

    #[test]
    fn test_homogeneous_round_trip() {
        let m = rz(-75.0, [0.5, 0.25, -12.0]);
        let back = decode_rigid_transform(&m).unwrap().inverse().unwrap().to_homogeneous();
        assert!(m.iter().zip(back.iter()).all(|(a, b)| f64_eq(*a, *b)));
    }

    #[test]
    fn test_decode_rejects_invalid() {
        let mut m = rz(10.0, [1.0, 2.0, 3.0]);
        m[12] = 0.1;
        assert!(matches!(
            decode_rigid_transform(&m).unwrap_err(),
            GeoError::SingularMatrix(_)
        ));

        let mut m = RigidTransform::identity().to_homogeneous();
        m[10] = 0.0;
        assert!(matches!(
            decode_rigid_transform(&m).unwrap_err(),
            GeoError::SingularMatrix(_)
        ));

        let mut m = RigidTransform::identity().to_homogeneous();
        m[3] = f64::NAN;
        assert!(matches!(
            decode_rigid_transform(&m).unwrap_err(),
            GeoError::SingularMatrix(_)
        ));
    }

    #[test]
    fn test_non_rigid_is_decoded_as_affine() {
        let m = [
            2.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let t = decode_rigid_transform(&m).unwrap();
        assert!(!t.is_orthonormal(1e-6));
        assert!(point_eq(t.transform_point([4.0, 1.0, 1.0]), [2.0, 1.0, 1.0]));
    }

    #[test]
    fn test_inverse_of_singular_rotation() {
        let t = RigidTransform::from_parts([[0.0; 3]; 3], [1.0, 0.0, 0.0]);
        assert!(matches!(t.inverse().unwrap_err(), GeoError::SingularMatrix(_)));
    }
}
