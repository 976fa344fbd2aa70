//! Pose-classification metrics

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use super::trait_def::Metric;

fn argmax_row(row: ndarray::ArrayView1<f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

/// Fraction of samples whose argmax class matches the label
#[derive(Debug, Default)]
pub struct Accuracy {
    correct: usize,
    total: usize,
}

impl Metric for Accuracy {
    fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }

    fn update(&mut self, predictions: &Array2<f32>, targets: &Array1<f32>) {
        for (row, &target) in predictions.rows().into_iter().zip(targets.iter()) {
            if argmax_row(row) == target as usize {
                self.correct += 1;
            }
            self.total += 1;
        }
    }

    fn finalize(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f32 / self.total as f32
    }

    fn name(&self) -> &'static str {
        "Accuracy"
    }
}

/// Mean per-class recall; robust to class imbalance in the pose labels
#[derive(Debug, Default)]
pub struct BalancedAccuracy {
    // class -> (correct, total)
    per_class: BTreeMap<usize, (usize, usize)>,
}

impl Metric for BalancedAccuracy {
    fn reset(&mut self) {
        self.per_class.clear();
    }

    fn update(&mut self, predictions: &Array2<f32>, targets: &Array1<f32>) {
        for (row, &target) in predictions.rows().into_iter().zip(targets.iter()) {
            let label = target as usize;
            let entry = self.per_class.entry(label).or_insert((0, 0));
            if argmax_row(row) == label {
                entry.0 += 1;
            }
            entry.1 += 1;
        }
    }

    fn finalize(&self) -> f32 {
        if self.per_class.is_empty() {
            return 0.0;
        }
        let recall_sum: f32 = self
            .per_class
            .values()
            .map(|&(correct, total)| correct as f32 / total.max(1) as f32)
            .sum();
        recall_sum / self.per_class.len() as f32
    }

    fn name(&self) -> &'static str {
        "Balanced accuracy"
    }
}

/// Area under the ROC curve over buffered ranking scores.
///
/// Computed at finalize time by the rank-sum (Mann-Whitney) formulation,
/// with tied scores sharing their average rank. A pass that saw only one
/// class has no defined curve and reports 0.5.
#[derive(Debug, Default)]
pub struct RocAuc {
    scores: Vec<f32>,
    labels: Vec<bool>,
}

impl Metric for RocAuc {
    fn reset(&mut self) {
        self.scores.clear();
        self.labels.clear();
    }

    fn update(&mut self, predictions: &Array2<f32>, targets: &Array1<f32>) {
        for (row, &target) in predictions.rows().into_iter().zip(targets.iter()) {
            self.scores.push(row[0]);
            self.labels.push(target > 0.5);
        }
    }

    fn finalize(&self) -> f32 {
        let positives = self.labels.iter().filter(|&&l| l).count();
        let negatives = self.labels.len() - positives;
        if positives == 0 || negatives == 0 {
            return 0.5;
        }

        let mut order: Vec<usize> = (0..self.scores.len()).collect();
        order.sort_by(|&a, &b| {
            self.scores[a]
                .partial_cmp(&self.scores[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // average ranks across ties, 1-based
        let mut ranks = vec![0.0f64; order.len()];
        let mut i = 0;
        while i < order.len() {
            let mut j = i;
            while j + 1 < order.len() && self.scores[order[j + 1]] == self.scores[order[i]] {
                j += 1;
            }
            let mean_rank = (i + j + 2) as f64 / 2.0;
            for &idx in &order[i..=j] {
                ranks[idx] = mean_rank;
            }
            i = j + 1;
        }

        let positive_rank_sum: f64 = self
            .labels
            .iter()
            .zip(ranks.iter())
            .filter_map(|(&l, &r)| l.then_some(r))
            .sum();
        let p = positives as f64;
        let n = negatives as f64;
        ((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n)) as f32
    }

    fn name(&self) -> &'static str {
        "ROC AUC"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let mut metric = Accuracy::default();
        metric.update(&array![[0.9, 0.1], [0.2, 0.8], [0.6, 0.4]], &array![0.0, 1.0, 1.0]);
        assert!((metric.finalize() - 2.0 / 3.0).abs() < 1e-6);

        metric.reset();
        assert_eq!(metric.finalize(), 0.0);
    }

    #[test]
    fn test_balanced_accuracy_weights_classes_equally() {
        let mut metric = BalancedAccuracy::default();
        // class 0: 2/2 correct, class 1: 0/1 correct
        metric.update(
            &array![[0.9, 0.1], [0.8, 0.2], [0.7, 0.3]],
            &array![0.0, 0.0, 1.0],
        );
        assert!((metric.finalize() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_roc_auc_perfect_separation() {
        let mut metric = RocAuc::default();
        metric.update(&array![[0.1], [0.2], [0.8], [0.9]], &array![0.0, 0.0, 1.0, 1.0]);
        assert!((metric.finalize() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_roc_auc_random_ranking() {
        let mut metric = RocAuc::default();
        metric.update(&array![[0.5], [0.5], [0.5], [0.5]], &array![0.0, 1.0, 0.0, 1.0]);
        // all tied, average rank gives chance level
        assert!((metric.finalize() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_roc_auc_single_class_is_chance() {
        let mut metric = RocAuc::default();
        metric.update(&array![[0.3], [0.9]], &array![1.0, 1.0]);
        assert_eq!(metric.finalize(), 0.5);
    }

    #[test]
    fn test_roc_auc_accumulates_across_updates() {
        let mut metric = RocAuc::default();
        metric.update(&array![[0.1]], &array![0.0]);
        metric.update(&array![[0.9]], &array![1.0]);
        assert!((metric.finalize() - 1.0).abs() < 1e-6);
    }
}
