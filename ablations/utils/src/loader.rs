//! 从环境变量读取实验参数. 环境变量缺失或无法解析时回退到默认值.

use log::warn;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 默认体模边长 (体素).
pub const DEFAULT_PHANTOM_SIZE: usize = 256;

/// 默认重复轮数.
pub const DEFAULT_ROUNDS: usize = 5;

/// 读取环境变量 `key` 并解析为 `T`. 变量不存在或解析失败时返回 `default`.
fn parse_env_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(s) => s.trim().parse().unwrap_or_else(|_| {
            warn!("cannot parse `${key}` = {s:?}, using {default}");
            default
        }),
        Err(_) => default,
    }
}

/// 获取体模切片边长.
///
/// 1. 若环境变量 `$RT_BERRY_PHANTOM_SIZE` 是不小于 16 的整数, 则返回其值;
/// 2. 否则, 返回 `DEFAULT_PHANTOM_SIZE`.
pub fn phantom_size_from_env() -> usize {
    match parse_env_or("RT_BERRY_PHANTOM_SIZE", DEFAULT_PHANTOM_SIZE) {
        n if n >= 16 => n,
        n => {
            warn!("phantom size {n} is too small, using {DEFAULT_PHANTOM_SIZE}");
            DEFAULT_PHANTOM_SIZE
        }
    }
}

/// 获取每个算法的重复轮数.
///
/// 1. 若环境变量 `$RT_BERRY_ROUNDS` 是正整数, 则返回其值;
/// 2. 否则, 返回 `DEFAULT_ROUNDS`.
pub fn rounds_from_env() -> usize {
    parse_env_or("RT_BERRY_ROUNDS", DEFAULT_ROUNDS).max(1)
}

/// 获取 `$HOME` 下的 `rt-berry/...` 路径.
pub fn home_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("rt-berry");
    ans.extend(it);
    Some(ans)
}

/// 获取实验输出目录.
///
/// 1. 若环境变量 `$RT_BERRY_OUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/rt-berry`;
/// 3. 无法确定主目录时返回 `None`.
pub fn out_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("RT_BERRY_OUT_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dir_with::<&str, _>([]),
    }
}

#[cfg(test)]
mod tests {
    use super::home_dir_with;

    #[test]
    fn test_home_dir_with() {
        if let Some(p) = home_dir_with(["out", "masks.npz"]) {
            assert!(p.ends_with("rt-berry/out/masks.npz"));
        }
    }
}
