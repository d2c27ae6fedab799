//! 比较串行与按切片并行的掩膜构建, 以及最近邻与三线性重采样的耗时.
//!
//! 参数通过环境变量给出, 见 `utils::loader`. 若能确定输出目录, 还会写出体模的掩膜归档,
//! 重采样后的 CBCT 以及中间层切片的 PNG 预览, 便于人工检查.

mod algos;
mod result;
mod runner;

use log::{info, warn, LevelFilter};
use rt_berry::prelude::*;
use std::fs;
use std::path::Path;
use utils::loader;
use utils::phantom::{Phantom, CBCT_SERIES_UID, STRUCTURE_NAMES};

/// 写出体模的各类结果.
fn save_outputs(phantom: &Phantom, dir: &Path) -> GeoResult<()> {
    fs::create_dir_all(dir)?;

    let masks = par_build_masks(&phantom.structures, &phantom.grid, &STRUCTURE_NAMES, &MaskOptions::default())?;
    write_mask_archive(dir.join("masks.npz"), &masks)?;

    let mid = phantom.grid.len_z() / 2;
    for (name, mask) in masks.iter() {
        mask.write_nifti(dir.join(format!("{name}.nii.gz")))?;
        mask.border().write_nifti(dir.join(format!("{name}_border.nii.gz")))?;
        if let Err(e) = mask.slice_at(mid).save(dir.join(format!("{name}_{mid}.png"))) {
            warn!("cannot save preview of `{name}`: {e}");
        }
    }

    let t = phantom.registration.moving_transform()?;
    let cbct = par_resample(phantom.cbct.view(), &phantom.cbct_grid, &phantom.grid, &t, &ResampleOptions::cbct())?
        .with_source_series_uid(CBCT_SERIES_UID);
    cbct.write_nifti(dir.join("cbct_resampled.nii.gz"))?;
    if let Err(e) = cbct.slice_at(mid).save(dir.join(format!("cbct_{mid}.png"))) {
        warn!("cannot save preview of the resampled CBCT: {e}");
    }
    info!("outputs written to {}", dir.display());
    Ok(())
}

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .unwrap();

    let (phantom, result) = runner::run().unwrap();
    result.analyze().unwrap();

    match loader::out_dir_from_env_or_home() {
        Some(dir) => save_outputs(&phantom, &dir).unwrap(),
        None => warn!("no output directory, skipping outputs"),
    }
}
