//! 空间配准记录 (DICOM REG) 的数据模型.

use super::{decode_rigid_transform, RigidTransform};
use crate::{GeoError, GeoResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 配准序列中的一个条目: 某个参考坐标系及其 4x4 变换矩阵 (行优先).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegistrationItem {
    /// 该条目描述的 Frame of Reference UID.
    pub frame_of_reference_uid: String,

    /// 从该坐标系到记录自身 (固定图像) 坐标系的变换矩阵.
    pub matrix: [f64; 16],
}

/// 一个空间配准记录.
///
/// 记录自身的 Frame of Reference 即固定图像的坐标系. 通常第一个条目描述固定图像本身
/// (单位矩阵), 之后的条目描述移动图像.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegistrationRecord {
    /// 固定图像的 Frame of Reference UID.
    pub frame_of_reference_uid: String,

    /// 配准序列条目.
    pub items: Vec<RegistrationItem>,
}

impl RegistrationRecord {
    /// 创建不含条目的配准记录.
    pub fn new<S: Into<String>>(frame_of_reference_uid: S) -> Self {
        Self {
            frame_of_reference_uid: frame_of_reference_uid.into(),
            items: Vec::new(),
        }
    }

    /// 追加一个条目.
    pub fn push_item<S: Into<String>>(&mut self, frame_of_reference_uid: S, matrix: [f64; 16]) -> &mut Self {
        self.items.push(RegistrationItem {
            frame_of_reference_uid: frame_of_reference_uid.into(),
            matrix,
        });
        self
    }

    /// 第一个坐标系不同于固定图像的条目的矩阵.
    ///
    /// 不存在这样的条目时返回 `Err(GeoError::MissingMovingRegistration)`.
    pub fn moving_matrix(&self) -> GeoResult<&[f64; 16]> {
        self.items
            .iter()
            .find(|it| it.frame_of_reference_uid != self.frame_of_reference_uid)
            .map(|it| &it.matrix)
            .ok_or(GeoError::MissingMovingRegistration)
    }

    /// 解码移动图像条目的矩阵, 得到固定 -> 移动方向的变换. 见 [`decode_rigid_transform`].
    pub fn moving_transform(&self) -> GeoResult<RigidTransform> {
        decode_rigid_transform(self.moving_matrix()?)
    }
}
