//! 程序运行函数.

use crate::algos::{self, Algo};
use crate::result::AblationResult;
use log::info;
use rt_berry::GeoResult;
use utils::loader;
use utils::phantom::Phantom;

/// 参与比较的算法.
const ALGOS: [(&str, Algo); 6] = [
    ("serial_masks", algos::serial_masks),
    ("parallel_masks", algos::parallel_masks),
    ("serial_nearest", algos::serial_nearest),
    ("parallel_nearest", algos::parallel_nearest),
    ("serial_linear", algos::serial_linear),
    ("parallel_linear", algos::parallel_linear),
];

/// 实际运行. 算法依次运行, 以免并行版本之间互相争抢核心.
pub fn run() -> GeoResult<(Phantom, AblationResult)> {
    let n = loader::phantom_size_from_env();
    let rounds = loader::rounds_from_env();

    info!("building a {n} x {n} phantom...");
    let phantom = Phantom::new(n)?;
    info!(
        "phantom ready: CT {:?}, CBCT {:?}, {} cores",
        phantom.grid.shape(),
        phantom.cbct_grid.shape(),
        utils::cpus()
    );

    println!("Running ablation studies ({rounds} rounds each)...");
    let result = ALGOS
        .iter()
        .map(|(name, algo)| {
            info!("profiling `{name}`...");
            (*name, algos::profile(*algo, &phantom, rounds))
        })
        .collect();
    Ok((phantom, result))
}
