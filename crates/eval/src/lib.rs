//! Ranking-quality metrics for validating prediction output against
//! ground truth:
//! - MAP@K    : Mean Average Precision at K
//! - NDCG@K   : Normalized Discounted Cumulative Gain at K (binary relevance)
//! - Recall@K : Fraction of true positives retrieved in the top K
//!
//! Per-query functions plus batch variants that average across queries.
//! An empty truth set scores 0 everywhere.

use std::collections::HashSet;

/// AP@K for a single query.
pub fn average_precision_at_k(pred_ids: &[String], true_ids: &HashSet<String>, k: usize) -> f64 {
    if true_ids.is_empty() || k == 0 {
        return 0.0;
    }

    let mut hits = 0usize;
    let mut score = 0.0;
    for (index, pred) in pred_ids.iter().take(k).enumerate() {
        if true_ids.contains(pred) {
            hits += 1;
            score += hits as f64 / (index + 1) as f64;
        }
    }

    score / true_ids.len().min(k) as f64
}

/// MAP@K across queries.
pub fn mean_average_precision_at_k(
    batch_preds: &[Vec<String>],
    batch_truths: &[HashSet<String>],
    k: usize,
) -> f64 {
    let total: f64 = batch_preds
        .iter()
        .zip(batch_truths)
        .map(|(preds, truth)| average_precision_at_k(preds, truth, k))
        .sum();
    total / batch_preds.len().max(1) as f64
}

/// Binary-relevance NDCG@K for a single query.
///
/// The ideal ranking puts every relevant id first, so the normalizer is
/// the DCG of `min(|truth|, k)` leading hits.
pub fn ndcg_at_k(pred_ids: &[String], true_ids: &HashSet<String>, k: usize) -> f64 {
    if true_ids.is_empty() || k == 0 {
        return 0.0;
    }

    let dcg: f64 = pred_ids
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, pred)| true_ids.contains(*pred))
        .map(|(index, _)| discount(index))
        .sum();

    let ideal: f64 = (0..true_ids.len().min(k)).map(discount).sum();
    if ideal == 0.0 {
        0.0
    } else {
        dcg / ideal
    }
}

/// Mean NDCG@K across queries.
pub fn mean_ndcg_at_k(
    batch_preds: &[Vec<String>],
    batch_truths: &[HashSet<String>],
    k: usize,
) -> f64 {
    let total: f64 = batch_preds
        .iter()
        .zip(batch_truths)
        .map(|(preds, truth)| ndcg_at_k(preds, truth, k))
        .sum();
    total / batch_preds.len().max(1) as f64
}

/// Recall@K for a single query.
pub fn recall_at_k(pred_ids: &[String], true_ids: &HashSet<String>, k: usize) -> f64 {
    if true_ids.is_empty() {
        return 0.0;
    }
    let hits = pred_ids
        .iter()
        .take(k)
        .filter(|pred| true_ids.contains(*pred))
        .count();
    hits as f64 / true_ids.len() as f64
}

/// Mean Recall@K across queries.
pub fn mean_recall_at_k(
    batch_preds: &[Vec<String>],
    batch_truths: &[HashSet<String>],
    k: usize,
) -> f64 {
    let total: f64 = batch_preds
        .iter()
        .zip(batch_truths)
        .map(|(preds, truth)| recall_at_k(preds, truth, k))
        .sum();
    total / batch_preds.len().max(1) as f64
}

/// Gain discount at a zero-based rank: `1 / log2(rank + 2)`.
fn discount(index: usize) -> f64 {
    1.0 / ((index + 2) as f64).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    fn truth(raw: &[&str]) -> HashSet<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_ap_at_3_single_hit_at_rank_2() {
        let ap = average_precision_at_k(&ids(&["A", "B", "C"]), &truth(&["B"]), 3);
        assert_eq!(ap, 0.5);
    }

    #[test]
    fn test_ap_perfect_ranking() {
        let ap = average_precision_at_k(&ids(&["A", "B"]), &truth(&["A", "B"]), 2);
        assert!((ap - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_truth_scores_zero() {
        let preds = ids(&["A", "B"]);
        let empty = HashSet::new();
        assert_eq!(average_precision_at_k(&preds, &empty, 3), 0.0);
        assert_eq!(ndcg_at_k(&preds, &empty, 3), 0.0);
        assert_eq!(recall_at_k(&preds, &empty, 3), 0.0);
    }

    #[test]
    fn test_recall_complete_within_k() {
        let recall = recall_at_k(&ids(&["A", "B", "C"]), &truth(&["A", "C"]), 3);
        assert_eq!(recall, 1.0);
    }

    #[test]
    fn test_recall_truncated_by_k() {
        let recall = recall_at_k(&ids(&["A", "B", "C"]), &truth(&["A", "C"]), 2);
        assert_eq!(recall, 0.5);
    }

    #[test]
    fn test_ndcg_perfect_ranking_is_one() {
        let ndcg = ndcg_at_k(&ids(&["A", "B", "C"]), &truth(&["A", "B"]), 3);
        assert!((ndcg - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ndcg_penalizes_late_hits() {
        let early = ndcg_at_k(&ids(&["A", "X", "Y"]), &truth(&["A"]), 3);
        let late = ndcg_at_k(&ids(&["X", "Y", "A"]), &truth(&["A"]), 3);
        assert!(early > late);
        assert!(late > 0.0);
    }

    #[test]
    fn test_batch_means() {
        let preds = vec![ids(&["A", "B"]), ids(&["X", "Y"])];
        let truths = vec![truth(&["A"]), truth(&["Z"])];

        // first query scores 1.0, second 0.0
        assert_eq!(mean_average_precision_at_k(&preds, &truths, 2), 0.5);
        assert_eq!(mean_recall_at_k(&preds, &truths, 2), 0.5);
        assert_eq!(mean_ndcg_at_k(&preds, &truths, 2), 0.5);
    }

    #[test]
    fn test_batch_mean_of_nothing_is_zero() {
        assert_eq!(mean_average_precision_at_k(&[], &[], 5), 0.0);
        assert_eq!(mean_recall_at_k(&[], &[], 5), 0.0);
    }
}
