//! 切片图像的持久化存储.

use std::path::Path;

use image::ImageResult;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::consts::gray::*;
use crate::CtWindow;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好"
/// 的方式保存, 而不是 "as is" 的方式. 这意味着, 对于掩膜切片这类仅存在 0, 1
/// 像素值的图像, 在保存时会映射到黑白两色; 对于以 HU 值存储的 (重采样后) 扫描切片,
/// 在保存时会用软组织窗规范化.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径. 图片格式由扩展名决定.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 使掩膜像素更有利于单通道可视化: 背景为黑色, 其余为白色.
#[inline]
fn pretty(p: u8) -> u8 {
    if is_background(p) {
        BLACK
    } else {
        WHITE
    }
}

macro_rules! impl_mask_vis {
    ($($slice: ty),+) => {
        $(
            /// 将背景/前景像素分别映射为黑色/白色.
            impl ImgWriteVis for $slice {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.dim();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pretty(pix)]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

macro_rules! impl_scan_vis {
    ($($scan: ty),+) => {
        $(
            /// 窗位 40, 窗宽 400. 无意义的 HU 值 (NaN) 映射为黑色.
            impl ImgWriteVis for $scan {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.dim();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    const WINDOW: CtWindow = CtWindow::soft_tissue();
                    for ((h, w), &hu) in self.indexed_iter() {
                        let gray = WINDOW.eval(hu).unwrap_or(BLACK);
                        buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl_mask_vis!(ArrayView2<'_, u8>, ArrayViewMut2<'_, u8>, Array2<u8>);
impl_scan_vis!(ArrayView2<'_, f32>, ArrayViewMut2<'_, f32>, Array2<f32>);

#[cfg(test)]
mod tests {
    use super::ImgWriteVis;
    use ndarray::Array2;

    #[test]
    fn test_save_mask_slice() {
        let mut s = Array2::<u8>::zeros((4, 6));
        s[(1, 2)] = 1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        s.view().save(&path).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (6, 4));
        assert_eq!(img.get_pixel(2, 1).0, [255]);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        dir.close().unwrap();
    }

    #[test]
    fn test_save_scan_slice() {
        let mut s = Array2::<f32>::from_elem((3, 3), -1024.0);
        s[(0, 1)] = 1000.0;
        s[(2, 2)] = f32::NAN;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        s.save(&path).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.get_pixel(1, 0).0, [255]);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(2, 2).0, [0]);
        dir.close().unwrap();
    }
}
