//! 算法运行统计.

use std::time::{Duration, Instant};

/// 一个算法在多轮运行中的耗时与体素计数.
///
/// 每轮只计入 `round_start` 与 `round_elapsed` 之间的时间, 即算法本身的耗时.
/// 另外记录从创建到 `finish` 的墙钟时间, 用于对照准备输入与校验输出的开销.
#[derive(Clone, Debug)]
pub struct Profile {
    created: Instant,
    round_since: Option<Instant>,
    wall: Duration,

    /// 每轮算法耗时, 按运行顺序.
    rounds: Vec<Duration>,

    /// 所有轮次中处理的体素总数.
    voxels: u64,

    /// 所有轮次中得到的有效体素总数 (掩膜前景, 或落在移动图像内的重采样体素).
    effective: u64,
}

impl Profile {
    /// 初始化. 墙钟时间从此刻开始计.
    #[inline]
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            round_since: None,
            wall: Duration::ZERO,
            rounds: Vec::new(),
            voxels: 0,
            effective: 0,
        }
    }

    /// 开始一轮计时. 重复调用会重置本轮的起点.
    #[inline]
    pub fn round_start(&mut self) {
        self.round_since = Some(Instant::now());
    }

    /// 结束一轮计时, 并记录本轮处理的体素数 `voxels` 与有效体素数 `effective`.
    ///
    /// 未调用 `round_start` 时本轮耗时记为 0.
    pub fn round_elapsed(&mut self, voxels: usize, effective: usize) {
        let d = self.round_since.take().map_or(Duration::ZERO, |t| t.elapsed());
        self.rounds.push(d);
        self.voxels += voxels as u64;
        self.effective += effective as u64;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.wall = self.created.elapsed();
        self
    }

    /// 完成的轮数.
    #[inline]
    pub fn get_rounds(&self) -> u64 {
        self.rounds.len() as u64
    }

    /// 处理的体素总数.
    #[inline]
    pub fn get_voxels(&self) -> u64 {
        self.voxels
    }

    /// 有效体素总数.
    #[inline]
    pub fn get_effective(&self) -> u64 {
        self.effective
    }

    /// 算法本身的总耗时 (微秒).
    pub fn get_target_time_us(&self) -> u64 {
        self.rounds.iter().sum::<Duration>().as_micros() as u64
    }

    /// 从创建到 `finish` 的墙钟时间 (微秒). `finish` 前为 0.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.wall.as_micros() as u64
    }

    /// 每轮的平均耗时 (微秒). 没有任何轮次时返回 `None`.
    pub fn get_avg_round_time_us(&self) -> Option<f64> {
        match self.rounds.len() {
            0 => None,
            n => Some(self.get_target_time_us() as f64 / n as f64),
        }
    }

    /// 吞吐量, 以每微秒处理的体素数计. 总耗时不足 1 微秒时返回 `None`.
    pub fn get_voxels_per_us(&self) -> Option<f64> {
        match self.get_target_time_us() {
            0 => None,
            us => Some(self.voxels as f64 / us as f64),
        }
    }

    /// 最慢一轮的耗时. 没有任何轮次时返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.rounds.iter().max().copied()
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Profile;
    use std::time::Duration;

    #[test]
    fn test_profile_counts() {
        let mut p = Profile::new();
        assert_eq!(p.get_avg_round_time_us(), None);
        assert_eq!(p.get_most_time_consuming(), None);
        for _ in 0..3 {
            p.round_start();
            p.round_elapsed(100, 40);
        }
        let p = p.finish();
        assert_eq!(p.get_rounds(), 3);
        assert_eq!(p.get_voxels(), 300);
        assert_eq!(p.get_effective(), 120);
        assert!(p.get_most_time_consuming().is_some());
        assert!(p.get_real_time_us() >= p.get_target_time_us());
    }

    #[test]
    fn test_round_without_start() {
        let mut p = Profile::new();
        p.round_elapsed(10, 1);
        assert_eq!(p.get_rounds(), 1);
        assert_eq!(p.get_most_time_consuming(), Some(Duration::ZERO));
        assert_eq!(p.get_voxels_per_us(), None);
    }
}
