//! 结构名匹配.
//!
//! 不同机构/软件导出的结构名常有大小写, 首尾空白之类的差异.
//! 默认仍使用精确匹配, 但匹配失败时会给出最接近的候选名.

use itertools::Itertools;
use log::warn;

use super::Structure;
use crate::{GeoError, GeoResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 失败时最多给出的候选名个数.
const MAX_CANDIDATES: usize = 3;

/// 结构名匹配策略.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NameMatch {
    /// 精确的字符串相等, 区分大小写与空白.
    #[default]
    Exact,

    /// 去除首尾空白后忽略大小写比较.
    Normalized,
}

impl NameMatch {
    /// 判断结构名 `candidate` 是否匹配请求名 `requested`.
    #[inline]
    pub fn matches(&self, requested: &str, candidate: &str) -> bool {
        match self {
            Self::Exact => requested == candidate,
            Self::Normalized => normalize(requested) == normalize(candidate),
        }
    }
}

/// 同名结构的处理策略.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DuplicatePolicy {
    /// 报告 `GeoError::DuplicateStructure`.
    #[default]
    Reject,

    /// 使用结构集中最后出现的同名结构.
    LastWins,
}

#[inline]
fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// 经典的 Levenshtein 编辑距离 (按 `char` 计).
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != *cb);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// 按与 `requested` 的相似度从 `available` 中选出至多 `k` 个不重复的候选名.
///
/// 排序依据依次为: 规范化后是否相等, 规范化后的编辑距离, 名称本身.
pub fn closest_names<'a, I>(requested: &str, available: I, k: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let req = normalize(requested);
    available
        .into_iter()
        .unique()
        .map(|name| {
            let norm = normalize(name);
            (norm != req, levenshtein(&req, &norm), name)
        })
        .sorted()
        .take(k)
        .map(|(_, _, name)| name.to_string())
        .collect()
}

/// 从 `structures` 中选出与 `requested` 匹配的那个结构.
pub(crate) fn select<'a>(
    structures: &'a [Structure],
    requested: &str,
    matching: NameMatch,
    duplicates: DuplicatePolicy,
) -> GeoResult<&'a Structure> {
    let hits: Vec<&Structure> = structures
        .iter()
        .filter(|s| matching.matches(requested, s.name()))
        .collect();

    let Some(&last) = hits.last() else {
        return Err(GeoError::StructureNotFound {
            name: requested.to_string(),
            closest: closest_names(
                requested,
                structures.iter().map(Structure::name),
                MAX_CANDIDATES,
            ),
        });
    };

    if hits.len() == 1 {
        return Ok(last);
    }

    let distinct: Vec<String> = hits.iter().map(|s| s.name().to_string()).unique().collect();
    // 规范化匹配下的不同写法总是歧义.
    if distinct.len() > 1 || duplicates == DuplicatePolicy::Reject {
        return Err(GeoError::DuplicateStructure {
            name: requested.to_string(),
            matches: hits.iter().map(|s| s.name().to_string()).collect(),
        });
    }
    warn!(
        "{} structures named `{}`, using the last one",
        hits.len(),
        last.name()
    );
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::{closest_names, levenshtein, select, DuplicatePolicy, NameMatch};
    use crate::structure::Structure;
    use crate::GeoError;

    fn set(names: &[&str]) -> Vec<Structure> {
        names.iter().map(|n| Structure::new(*n, vec![])).collect()
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("rectum", "rectum"), 0);
    }

    #[test]
    fn test_exact_match_is_case_and_whitespace_sensitive() {
        let s = set(&["Bladder ", "rectum", "PTV45_1"]);
        let m = NameMatch::Exact;
        assert!(select(&s, "PTV45_1", m, DuplicatePolicy::Reject).is_ok());

        let e = select(&s, "Bladder", m, DuplicatePolicy::Reject).unwrap_err();
        match e {
            GeoError::StructureNotFound { name, closest } => {
                assert_eq!(name, "Bladder");
                assert_eq!(closest[0], "Bladder ");
                assert!(closest.len() <= 3);
            }
            other => panic!("unexpected {other:?}"),
        }

        let e = select(&s, "Rectum", m, DuplicatePolicy::Reject).unwrap_err();
        assert!(matches!(e, GeoError::StructureNotFound { .. }));
    }

    #[test]
    fn test_normalized_match() {
        let s = set(&["Bladder ", "rectum"]);
        let m = NameMatch::Normalized;
        assert_eq!(
            select(&s, "bladder", m, DuplicatePolicy::Reject).unwrap().name(),
            "Bladder "
        );
        assert_eq!(
            select(&s, " RECTUM", m, DuplicatePolicy::Reject).unwrap().name(),
            "rectum"
        );

        // 两种写法同时存在时即为歧义.
        let s = set(&["Rectum", "rectum "]);
        let e = select(&s, "rectum", m, DuplicatePolicy::LastWins).unwrap_err();
        assert!(matches!(e, GeoError::DuplicateStructure { .. }));
    }

    #[test]
    fn test_duplicate_policy() {
        let mut s = set(&["CTV", "CTV"]);
        s[1] = Structure::new("CTV", vec![crate::structure::Contour::new(vec![])]);

        let e = select(&s, "CTV", NameMatch::Exact, DuplicatePolicy::Reject).unwrap_err();
        assert!(matches!(e, GeoError::DuplicateStructure { .. }));

        let last = select(&s, "CTV", NameMatch::Exact, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(last.contours().len(), 1);
    }

    #[test]
    fn test_closest_names_order() {
        let names = ["PTV45_2", "PTV45_1", "Bowel", "ptv45_1", "PTV45_1"];
        let c = closest_names("PTV45_1 ", names, 3);
        // 规范化后相等者优先 (并按名称排序), 重复名只出现一次.
        assert_eq!(c, ["PTV45_1", "ptv45_1", "PTV45_2"]);
        assert!(closest_names("x", std::iter::empty(), 3).is_empty());
    }
}
