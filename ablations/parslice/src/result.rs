//! 实验结果.

use crate::algos::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.3}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Rounds: {}", p.get_rounds())?;
    writeln!(w, "{S4}Voxels processed: {}", p.get_voxels())?;
    writeln!(w, "{S4}Effective voxels: {}", p.get_effective())?;
    writeln!(w, "{S4}Effective total time: {} us", p.get_target_time_us())?;
    writeln!(
        w,
        "{S4}Average time: {} us per round",
        f64_to_display(p.get_avg_round_time_us())
    )?;
    writeln!(
        w,
        "{S4}Throughput: {} voxels per us",
        f64_to_display(p.get_voxels_per_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    match p.get_most_time_consuming() {
        Some(d) => write!(w, "{S4}Slowest round costs {} us", d.as_micros()),
        None => write!(w, "{S4}Slowest round costs / us"),
    }
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl FromIterator<(&'static str, Profile)> for AblationResult {
    fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }
}

impl AblationResult {
    /// 分析运行结果, 并给出串行/并行版本的加速比.
    pub fn analyze(&self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        utils::sep_to(&mut out)?;
        for (key, profile) in self.data.iter() {
            describe_into(key, profile, &mut out)?;
            writeln!(out)?;
            utils::sep_to(&mut out)?;
        }

        for (serial, parallel) in self.pairs() {
            let s = self.avg_of(serial);
            let p = self.avg_of(parallel);
            if let (Some(s), Some(p)) = (s, p) {
                if p > 0.0 {
                    writeln!(out, "Speedup `{parallel}` over `{serial}`: {:.2}x", s / p)?;
                }
            }
        }
        Ok(())
    }

    fn avg_of(&self, name: &str) -> Option<f64> {
        self.data
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, p)| p.get_avg_round_time_us())
    }

    /// 形如 `serial_x` / `parallel_x` 的名称对.
    fn pairs(&self) -> Vec<(&'static str, &'static str)> {
        self.data
            .iter()
            .filter_map(|(n, _)| {
                let suffix = n.strip_prefix("serial_")?;
                self.data
                    .iter()
                    .find(|(m, _)| m.strip_prefix("parallel_") == Some(suffix))
                    .map(|(m, _)| (*n, *m))
            })
            .collect()
    }
}
