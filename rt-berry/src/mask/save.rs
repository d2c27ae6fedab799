//! 掩膜的持久化存储: NIfTI 体积与 npz 归档.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use log::debug;
use ndarray_npy::NpzWriter;
use nifti::writer::WriterOptions;

use super::MaskVolume;
use crate::GeoResult;

impl MaskVolume {
    /// 将掩膜写为 NIfTI 文件 (`.nii` 或 `.nii.gz`), 几何信息取自参考网格.
    pub fn write_nifti<P: AsRef<Path>>(&self, path: P) -> GeoResult<()> {
        let path = path.as_ref();
        let header = self.grid.to_nifti_header()?;
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&self.xyz_view())?;
        debug!("mask `{}` written to {}", self.name, path.display());
        Ok(())
    }
}

/// 将一组掩膜写入同一个 npz 归档. 条目名为 `{键}.npy` (numpy 读取时的键即为映射的键),
/// 数据按 `(z, y, x)` 存储.
pub fn write_mask_archive<P: AsRef<Path>>(
    path: P,
    masks: &BTreeMap<String, MaskVolume>,
) -> GeoResult<()> {
    let mut npz = NpzWriter::new(File::create(path.as_ref())?);
    for (name, mask) in masks {
        npz.add_array(format!("{name}.npy"), &mask.data)?;
    }
    npz.finish()?;
    debug!("{} masks archived to {}", masks.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs::File;

    use ndarray::{s, Array3};
    use ndarray_npy::NpzReader;

    use super::write_mask_archive;
    use crate::geometry::Grid;
    use crate::mask::MaskVolume;

    fn mask(name: &str) -> MaskVolume {
        let g = Grid::new([-5.0, 10.0, 2.5], [0.5, 0.75, 2.0], [6, 5, 4]).unwrap();
        let mut data = Array3::zeros((4, 5, 6));
        data.slice_mut(s![1..3, 1..4, 2..5]).fill(1);
        MaskVolume::from_array(name, "uid", &g, data).unwrap()
    }

    #[test]
    fn test_write_nifti() {
        let m = mask("Bladder");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bladder.nii");
        m.write_nifti(&path).unwrap();

        let obj = nifti::ReaderOptions::new().read_file(&path).unwrap();
        use nifti::{IntoNdArray, NiftiObject};
        let grid = Grid::from_nifti_header(obj.header()).unwrap();
        assert_eq!(grid.size(), m.grid().size());
        assert_eq!(grid.origin(), m.grid().origin());

        let xyz = obj.into_volume().into_ndarray::<u8>().unwrap();
        assert_eq!(xyz.shape(), &[6, 5, 4]);
        assert_eq!(xyz[[3, 2, 1]], 1);
        assert_eq!(xyz[[0, 0, 0]], 0);
        dir.close().unwrap();
    }

    #[test]
    fn test_write_archive() {
        let masks: BTreeMap<_, _> = ["Bladder", "Rectum"]
            .into_iter()
            .map(|n| (n.to_string(), mask(n)))
            .collect();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("masks.npz");
        write_mask_archive(&path, &masks).unwrap();

        let mut npz = NpzReader::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(npz.len(), 2);
        let a: Array3<u8> = npz.by_name("Rectum.npy").unwrap();
        assert_eq!(a, masks["Rectum"].data());
        drop(npz);
        dir.close().unwrap();
    }
}
