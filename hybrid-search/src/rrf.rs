use std::collections::HashMap;

use chunk_model::PointId;

/// Reciprocal Rank Fusion constant (spec §4.9): `score = 1 / (k + rank)`,
/// rank 1-based, summed across every list a point appears in.
pub const RRF_K: usize = 60;

/// A point after fusion, before it's enriched into a [`crate::SearchHit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FusedPoint {
    pub point_id: PointId,
    pub score: f32,
    pub keyword_rank: Option<usize>,
}

/// Fuses two best-to-worst ordered point lists into one ranked list.
///
/// Ties are broken by the better (lower-numbered) keyword rank, then by
/// `pointId` ascending — both deterministic, per spec §4.9 point 3.
pub fn fuse(keyword_order: &[PointId], vector_order: &[PointId], k: usize) -> Vec<FusedPoint> {
    let mut keyword_rank: HashMap<&PointId, usize> = HashMap::new();
    for (i, p) in keyword_order.iter().enumerate() {
        keyword_rank.entry(p).or_insert(i + 1);
    }

    let mut scores: HashMap<&PointId, f32> = HashMap::new();
    for (i, p) in keyword_order.iter().enumerate() {
        *scores.entry(p).or_insert(0.0) += 1.0 / (k + i + 1) as f32;
    }
    for (i, p) in vector_order.iter().enumerate() {
        *scores.entry(p).or_insert(0.0) += 1.0 / (k + i + 1) as f32;
    }

    let mut fused: Vec<FusedPoint> = scores
        .into_iter()
        .map(|(point_id, score)| FusedPoint {
            point_id: point_id.clone(),
            score,
            keyword_rank: keyword_rank.get(point_id).copied(),
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .expect("rrf scores are always finite")
            .then_with(|| {
                a.keyword_rank
                    .unwrap_or(usize::MAX)
                    .cmp(&b.keyword_rank.unwrap_or(usize::MAX))
            })
            .then_with(|| a.point_id.0.cmp(&b.point_id.0))
    });

    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PointId {
        PointId(s.to_string())
    }

    #[test]
    fn empty_inputs_yield_empty_output() {
        assert!(fuse(&[], &[], RRF_K).is_empty());
    }

    #[test]
    fn keyword_only_point_keeps_its_rank() {
        let fused = fuse(&[pid("a"), pid("b")], &[], RRF_K);
        assert_eq!(fused[0].point_id, pid("a"));
        assert_eq!(fused[0].score, 1.0 / 61.0);
        assert_eq!(fused[1].point_id, pid("b"));
    }

    #[test]
    fn shared_point_sums_both_lists() {
        let fused = fuse(&[pid("x")], &[pid("x")], RRF_K);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - (1.0 / 61.0 + 1.0 / 61.0)).abs() < 1e-6);
    }

    #[test]
    fn worked_example_from_spec_scenario_7() {
        // chunk A: keyword rank 1, vector rank 3. chunk B: keyword rank 2, vector rank 1.
        let keyword = vec![pid("A"), pid("B")];
        let vector = vec![pid("B"), pid("filler"), pid("A")];
        let fused = fuse(&keyword, &vector, 60);
        assert_eq!(fused[0].point_id, pid("B"));
        assert_eq!(fused[1].point_id, pid("A"));
    }

    #[test]
    fn ties_break_by_keyword_rank_then_point_id() {
        // Both points only in the vector list, tied at the same vector rank is
        // impossible (ranks are distinct positions), so construct a true score
        // tie via two disjoint single-list appearances at the same rank.
        let fused = fuse(&[pid("z")], &[pid("a")], 60);
        // Scores are equal (1/61 each); "z" has keyword rank 1 while "a" is
        // vector-only (keyword rank none), so "z" wins the tie.
        assert_eq!(fused[0].point_id, pid("z"));
        assert_eq!(fused[1].point_id, pid("a"));
    }

    proptest::proptest! {
        #[test]
        fn shared_point_score_matches_closed_form(r1 in 1usize..20, r2 in 1usize..20) {
            let mut keyword = (0..r1 - 1).map(|i| PointId(format!("kw-{i}"))).collect::<Vec<_>>();
            keyword.push(pid("shared"));
            let mut vector = (0..r2 - 1).map(|i| PointId(format!("vec-{i}"))).collect::<Vec<_>>();
            vector.push(pid("shared"));

            let fused = fuse(&keyword, &vector, RRF_K);
            let hit = fused.iter().find(|f| f.point_id == pid("shared")).unwrap();
            let expected = 1.0 / (RRF_K + r1) as f32 + 1.0 / (RRF_K + r2) as f32;
            prop_assert!((hit.score - expected).abs() < 1e-4);
        }
    }
}
