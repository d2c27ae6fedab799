//! RT 结构集 (RTSTRUCT) 的数据模型.
//!
//! 结构集中的 ROI 定义 (编号 + 名称) 与 ROI 轮廓条目 (引用 ROI 编号 + 轮廓列表)
//! 是分开存储的, 这与 DICOM 中 `StructureSetROISequence` 和 `ROIContourSequence`
//! 的组织方式一致. [`StructureSet::structures`] 负责将二者解析为 [`Structure`].

use std::collections::BTreeMap;

use crate::consts::tol;
use crate::geometry::Point3;
use crate::{GeoError, GeoResult};

mod bind;
mod names;

pub use bind::{bind_slice, SliceTolerance};
pub(crate) use bind::bind_contour;
pub use names::{closest_names, DuplicatePolicy, NameMatch};
pub(crate) use names::select;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 一个闭合多边形轮廓, 由物理坐标系下的有序顶点组成.
///
/// 所有顶点 (在浮点误差内) 应处于同一切片平面上. 首尾顶点不需要重复.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contour {
    points: Vec<Point3>,
}

impl Contour {
    /// 从顶点列表创建轮廓.
    #[inline]
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    /// 从 DICOM `ContourData` 形式的 `[x0, y0, z0, x1, y1, z1, ...]` 扁平数组创建轮廓.
    ///
    /// # 返回值
    ///
    /// - 长度不是 3 的倍数时, 返回 `Err(GeoError::MalformedContourData)`;
    /// - 任一坐标为 NaN 或无穷时, 返回 `Err(GeoError::NonFiniteContour)`.
    pub fn from_flat(data: &[f64]) -> GeoResult<Self> {
        if data.len() % 3 != 0 {
            return Err(GeoError::MalformedContourData(data.len()));
        }
        let contour = Self {
            points: data.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect(),
        };
        contour.ensure_finite()?;
        Ok(contour)
    }

    /// 若有顶点含非有限坐标, 返回 `Err(GeoError::NonFiniteContour)`.
    pub fn ensure_finite(&self) -> GeoResult<()> {
        match self.points.iter().position(|p| !p.iter().all(|v| v.is_finite())) {
            Some(i) => Err(GeoError::NonFiniteContour(i)),
            None => Ok(()),
        }
    }

    /// 全部顶点.
    #[inline]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// 顶点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否没有任何顶点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 轮廓所在切片平面的物理 z 坐标, 取第一个顶点的 z 值. 无顶点时返回 `None`.
    #[inline]
    pub fn slice_coordinate(&self) -> Option<f64> {
        self.points.first().map(|p| p[2])
    }

    /// 所有顶点的 z 坐标之差是否都不超过 `tolerance` 毫米.
    pub fn is_planar(&self, tolerance: f64) -> bool {
        let Some(z0) = self.slice_coordinate() else {
            return true;
        };
        self.points.iter().all(|p| (p[2] - z0).abs() <= tolerance)
    }

    /// 以默认容差判断轮廓是否共面.
    #[inline]
    pub(crate) fn is_roughly_planar(&self) -> bool {
        self.is_planar(tol::CONTOUR_PLANARITY_MM)
    }
}

/// 一个命名结构 (ROI), 由若干轮廓组成.
///
/// 名称可以包含空格和标点, 且不保证在结构集中唯一.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Structure {
    name: String,
    contours: Vec<Contour>,
}

impl Structure {
    /// 创建结构.
    #[inline]
    pub fn new<S: Into<String>>(name: S, contours: Vec<Contour>) -> Self {
        Self {
            name: name.into(),
            contours,
        }
    }

    /// 结构名.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 全部轮廓.
    #[inline]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }
}

/// 一个 ROI 轮廓条目: 所引用的 ROI 编号与对应轮廓.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiContours {
    /// 引用的 ROI 编号.
    pub referenced_roi_number: u32,

    /// 轮廓列表.
    pub contours: Vec<Contour>,
}

/// RT 结构集.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StructureSet {
    referenced_series_uid: String,
    rois: BTreeMap<u32, String>,
    roi_contours: Vec<RoiContours>,
}

impl StructureSet {
    /// 创建空结构集. `referenced_series_uid` 是该结构集所参照 CT 序列的 Series Instance UID.
    pub fn new<S: Into<String>>(referenced_series_uid: S) -> Self {
        Self {
            referenced_series_uid: referenced_series_uid.into(),
            rois: BTreeMap::new(),
            roi_contours: Vec::new(),
        }
    }

    /// 从已解析的结构列表直接创建结构集. ROI 编号按顺序从 1 开始分配.
    pub fn from_structures<S, I>(referenced_series_uid: S, structures: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Structure>,
    {
        let mut set = Self::new(referenced_series_uid);
        for (number, s) in (1u32..).zip(structures) {
            set.define_roi(number, s.name);
            set.push_contours(number, s.contours);
        }
        set
    }

    /// 定义 ROI 编号与名称. 若编号已存在, 后定义的名称覆盖先前的.
    pub fn define_roi<S: Into<String>>(&mut self, number: u32, name: S) -> &mut Self {
        self.rois.insert(number, name.into());
        self
    }

    /// 添加一个 ROI 轮廓条目.
    pub fn push_contours(&mut self, referenced_roi_number: u32, contours: Vec<Contour>) -> &mut Self {
        self.roi_contours.push(RoiContours {
            referenced_roi_number,
            contours,
        });
        self
    }

    /// 所参照 CT 序列的 Series Instance UID.
    #[inline]
    pub fn referenced_series_uid(&self) -> &str {
        &self.referenced_series_uid
    }

    /// 按 ROI 编号排列的 ROI 名称.
    pub fn roi_names(&self) -> impl ExactSizeIterator<Item = (u32, &str)> {
        self.rois.iter().map(|(n, s)| (*n, s.as_str()))
    }

    /// ROI 轮廓条目, 按原始顺序.
    #[inline]
    pub fn roi_contours(&self) -> &[RoiContours] {
        &self.roi_contours
    }

    /// 将 ROI 轮廓条目解析为结构.
    ///
    /// 引用同一 ROI 编号的多个条目合并为一个结构, 顺序为各编号首次出现的顺序;
    /// 已定义但没有任何轮廓条目的 ROI 作为空结构按编号顺序追加在最后.
    /// 若某条目引用了未定义的 ROI 编号, 返回 `Err(GeoError::UnknownRoiReference)`.
    pub fn structures(&self) -> GeoResult<Vec<Structure>> {
        let mut out: Vec<Structure> = Vec::with_capacity(self.rois.len());
        let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
        for item in self.roi_contours.iter() {
            let n = item.referenced_roi_number;
            let name = self.rois.get(&n).ok_or(GeoError::UnknownRoiReference(n))?;
            match seen.get(&n) {
                Some(&i) => out[i].contours.extend(item.contours.iter().cloned()),
                None => {
                    seen.insert(n, out.len());
                    out.push(Structure::new(name.clone(), item.contours.clone()));
                }
            }
        }
        for (n, name) in self.rois.iter() {
            if !seen.contains_key(n) {
                out.push(Structure::new(name.clone(), Vec::new()));
            }
        }
        Ok(out)
    }
}
