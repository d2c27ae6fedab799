//! 重采样切片预览用的 CT 窗.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 以 `[下限, 上限]` (HU) 表示的 CT 窗. 区间外的值分别截断为黑/白.
///
/// 主要用于检查 CBCT 重采样到 CT 网格后的对齐效果.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CtWindow {
    lo: f32,
    hi: f32,
}

impl Default for CtWindow {
    #[inline]
    fn default() -> Self {
        Self::soft_tissue()
    }
}

impl CtWindow {
    /// 由窗位 `level` 与窗宽 `width` 构建. 窗宽非正或任一参数非有限时返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<CtWindow> {
        (level.is_finite() && width.is_finite() && width > 0.0).then(|| Self {
            lo: level - width / 2.0,
            hi: level + width / 2.0,
        })
    }

    /// 盆腔软组织窗 (40 / 400), 膀胱与直肠边界清晰.
    #[inline]
    pub const fn soft_tissue() -> CtWindow {
        Self { lo: -160.0, hi: 240.0 }
    }

    /// 骨窗 (400 / 1800). 刚性配准一般以骨性结构为准.
    #[inline]
    pub const fn bone() -> CtWindow {
        Self { lo: -500.0, hi: 1300.0 }
    }

    /// `(下限, 上限)`.
    #[inline]
    pub fn bounds(&self) -> (f32, f32) {
        (self.lo, self.hi)
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        (self.lo + self.hi) / 2.0
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.hi - self.lo
    }

    /// `hu` 对应的灰度值. 视野外的 NaN 填充值等非有限输入返回 `None`.
    pub fn eval(&self, hu: f32) -> Option<u8> {
        if !hu.is_finite() {
            return None;
        }
        let t = (hu.clamp(self.lo, self.hi) - self.lo) / self.width();
        Some((t * 255.0) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::CtWindow;
    use crate::consts::hu::CBCT_AIR;

    #[test]
    fn test_invalid_window() {
        assert!(CtWindow::new(0.0, -1.0).is_none());
        assert!(CtWindow::new(0.0, 0.0).is_none());
        assert!(CtWindow::new(f32::NAN, 10.0).is_none());
        assert!(CtWindow::new(0.0, f32::INFINITY).is_none());
    }

    #[test]
    fn test_eval() {
        let w = CtWindow::new(80.0, 40.0).unwrap();
        assert_eq!(w.bounds(), (60.0, 100.0));
        assert_eq!(w.eval(f32::NAN), None);
        assert_eq!(w.eval(f32::MIN), Some(0));
        assert_eq!(w.eval(60.0), Some(0));
        assert_eq!(w.eval(70.0), Some(63));
        assert_eq!(w.eval(99.999), Some(254));
        assert_eq!(w.eval(100.0), Some(255));
        assert_eq!(w.eval(f32::MAX), Some(255));
    }

    #[test]
    fn test_presets() {
        let s = CtWindow::default();
        assert_eq!(s, CtWindow::soft_tissue());
        assert_eq!(s, CtWindow::new(40.0, 400.0).unwrap());
        assert_eq!(CtWindow::bone(), CtWindow::new(400.0, 1800.0).unwrap());
        assert_eq!((s.level(), s.width()), (40.0, 400.0));
        // 视野外的空气填充在任何预设下都是黑色.
        assert_eq!(CtWindow::bone().eval(CBCT_AIR), Some(0));
    }
}
