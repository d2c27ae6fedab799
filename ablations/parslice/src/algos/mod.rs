mod profile;

use log::debug;
use rt_berry::prelude::*;
use utils::phantom::{Phantom, STRUCTURE_NAMES};

pub use profile::Profile;

/// 一个待测算法: 在体模上运行一轮, 返回 `(处理体素数, 有效体素数)`.
pub type Algo = fn(&Phantom) -> (usize, usize);

/// 按 `rounds` 轮运行 `algo` 并统计.
pub fn profile(algo: Algo, phantom: &Phantom, rounds: usize) -> Profile {
    let mut profile = Profile::new();
    for k in 0..rounds {
        profile.round_start();
        let (voxels, effective) = algo(phantom);
        profile.round_elapsed(voxels, effective);
        debug!("round {k}: {voxels} voxels, {effective} effective");
    }
    profile.finish()
}

fn count_masks(phantom: &Phantom, masks: &std::collections::BTreeMap<String, MaskVolume>) -> (usize, usize) {
    let voxels = phantom.grid.voxel_count() * masks.len();
    let effective = masks.values().map(MaskVolume::count_foreground).sum();
    (voxels, effective)
}

fn count_resampled(phantom: &Phantom, v: &ResampledVolume, fill: f32) -> (usize, usize) {
    let effective = v.data().iter().filter(|p| **p != fill).count();
    (phantom.grid.voxel_count(), effective)
}

/// 串行构建全部结构的掩膜.
pub fn serial_masks(phantom: &Phantom) -> (usize, usize) {
    let masks = build_masks(&phantom.structures, &phantom.grid, &STRUCTURE_NAMES, &MaskOptions::default())
        .expect("phantom structures are well-formed");
    count_masks(phantom, &masks)
}

/// 按切片并行构建全部结构的掩膜.
pub fn parallel_masks(phantom: &Phantom) -> (usize, usize) {
    let masks = par_build_masks(&phantom.structures, &phantom.grid, &STRUCTURE_NAMES, &MaskOptions::default())
        .expect("phantom structures are well-formed");
    count_masks(phantom, &masks)
}

fn run_resample(phantom: &Phantom, interpolation: Interpolation, parallel: bool) -> (usize, usize) {
    let t = phantom
        .registration
        .moving_transform()
        .expect("phantom registration is rigid");
    let opts = ResampleOptions::cbct().with_interpolation(interpolation);
    let f = if parallel { par_resample::<i16> } else { resample::<i16> };
    let v = f(phantom.cbct.view(), &phantom.cbct_grid, &phantom.grid, &t, &opts)
        .expect("phantom grids are axis-aligned");
    count_resampled(phantom, &v, opts.fill_value())
}

/// 串行最近邻重采样.
pub fn serial_nearest(phantom: &Phantom) -> (usize, usize) {
    run_resample(phantom, Interpolation::Nearest, false)
}

/// 串行三线性重采样.
pub fn serial_linear(phantom: &Phantom) -> (usize, usize) {
    run_resample(phantom, Interpolation::Linear, false)
}

/// 并行最近邻重采样.
pub fn parallel_nearest(phantom: &Phantom) -> (usize, usize) {
    run_resample(phantom, Interpolation::Nearest, true)
}

/// 并行三线性重采样.
pub fn parallel_linear(phantom: &Phantom) -> (usize, usize) {
    run_resample(phantom, Interpolation::Linear, true)
}
