//! Reciprocal Rank Fusion.

use std::collections::HashMap;

/// The standard RRF dampening constant.
pub const RRF_K: f32 = 60.0;

/// Fuse ranked id lists: `score(d) = Σ 1/(k + rank_i(d))` with 1-indexed
/// ranks. Returns `(id, score)` sorted by descending score; ties break by
/// id for determinism.
pub fn rrf_fuse(lists: &[Vec<String>], k: f32) -> Vec<(String, f32)> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    for list in lists {
        for (rank0, id) in list.iter().enumerate() {
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + (rank0 + 1) as f32);
        }
    }
    let mut fused: Vec<(String, f32)> = scores.into_iter().collect();
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    fused
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn agreement_outranks_single_list_wins() {
        let fused = rrf_fuse(
            &[ids(&["a", "b", "c"]), ids(&["b", "a", "d"])],
            RRF_K,
        );
        // `a` and `b` each appear at ranks {1,2}; `c` and `d` only once.
        assert_eq!(fused[0].1, fused[1].1);
        assert!(fused[0].0 == "a" || fused[0].0 == "b");
        assert!(fused[2].1 < fused[1].1);
    }

    #[test]
    fn exact_scores() {
        let fused = rrf_fuse(&[ids(&["a"]), ids(&["a"])], RRF_K);
        assert!((fused[0].1 - 2.0 / 61.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn monotone_in_rank(
            len in 2usize..20,
        ) {
            let list: Vec<String> = (0..len).map(|i| format!("doc{i}")).collect();
            let fused = rrf_fuse(&[list.clone()], RRF_K);
            // A single list fuses back in its own order.
            let order: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
            let expected: Vec<&str> = list.iter().map(|s| s.as_str()).collect();
            prop_assert_eq!(order, expected);
            for pair in fused.windows(2) {
                prop_assert!(pair[0].1 > pair[1].1);
            }
        }
    }
}
