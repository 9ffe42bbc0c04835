//! Binary-classifier scoring.
//!
//! The classifier itself is an external collaborator behind [`Evaluator`];
//! [`score`] turns its labels and decision scores into the five summary
//! metrics reported for a run.
use ndarray::ArrayView2;
use serde::Serialize;

use crate::error::{ConditionError, Result};

/// Summary metrics of a binary classifier. All values lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    /// Mean of true-positive and true-negative rate.
    pub balanced_accuracy: f64,
    pub accuracy: f64,
    pub true_positive_rate: f64,
    pub false_positive_rate: f64,
    /// Area under the ROC curve; 0.5 for chance.
    pub auc: f64,
}

/// A trained model that scores conditioned features.
///
/// Implementations own their labels and decision threshold; the conditioning
/// core only hands over the `[rows, features]` array.
pub trait Evaluator {
    fn evaluate(&mut self, features: ArrayView2<f64>) -> anyhow::Result<Metrics>;
}

/// Score decision values against binary labels.
///
/// A sample is predicted positive when `score >= threshold`. AUC is the
/// Mann–Whitney statistic with tied scores sharing the average rank, so a
/// constant scorer gets exactly 0.5.
///
/// ```
/// let m = eegcond::metrics::score(&[true, false], &[0.9, 0.1], 0.5).unwrap();
/// assert_eq!(m.accuracy, 1.0);
/// assert_eq!(m.auc, 1.0);
/// ```
pub fn score(labels: &[bool], scores: &[f64], threshold: f64) -> Result<Metrics> {
    if labels.len() != scores.len() {
        return Err(ConditionError::MetricsInput(format!(
            "{} labels but {} scores",
            labels.len(),
            scores.len()
        )));
    }
    if labels.is_empty() {
        return Err(ConditionError::MetricsInput("no samples".into()));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(ConditionError::MetricsInput("NaN score".into()));
    }

    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(ConditionError::MetricsInput(format!(
            "both classes required (positives: {n_pos}, negatives: {n_neg})"
        )));
    }

    let (mut tp, mut fp) = (0usize, 0usize);
    for (&label, &s) in labels.iter().zip(scores) {
        if s >= threshold {
            if label {
                tp += 1;
            } else {
                fp += 1;
            }
        }
    }
    let tn = n_neg - fp;

    let tpr = tp as f64 / n_pos as f64;
    let fpr = fp as f64 / n_neg as f64;
    let tnr = tn as f64 / n_neg as f64;

    Ok(Metrics {
        balanced_accuracy: (tpr + tnr) / 2.0,
        accuracy: (tp + tn) as f64 / labels.len() as f64,
        true_positive_rate: tpr,
        false_positive_rate: fpr,
        auc: auc(labels, scores, n_pos, n_neg),
    })
}

fn auc(labels: &[bool], scores: &[f64], n_pos: usize, n_neg: usize) -> f64 {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&i, &j| scores[i].total_cmp(&scores[j]));

    // Sum of 1-based midranks of the positives.
    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let midrank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end].iter().filter(|&&i| labels[i]).count();
        rank_sum += midrank * positives as f64;
        start = end;
    }

    let (p, n) = (n_pos as f64, n_neg as f64);
    (rank_sum - p * (p + 1.0) / 2.0) / (p * n)
}
