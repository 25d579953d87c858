//! Multi-class evaluation metrics.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    /// F1 averaged over classes, weighted by support. The score the
    /// trainer compares candidates on.
    pub weighted_f1: f64,
    pub per_class: Vec<ClassMetrics>,
    /// Rows are true classes, columns are predicted classes.
    pub confusion: Vec<Vec<usize>>,
}

/// Score predictions against ground truth. Classes with no test
/// samples keep zeroed scores; a zero denominator never panics.
pub fn evaluate(y_true: &[usize], y_pred: &[usize], classes: &[String]) -> Metrics {
    let k = classes.len();
    let mut confusion = vec![vec![0usize; k]; k];
    for (&truth, &pred) in y_true.iter().zip(y_pred) {
        if truth < k && pred < k {
            confusion[truth][pred] += 1;
        }
    }

    let total = y_true.len();
    let correct: usize = (0..k).map(|c| confusion[c][c]).sum();

    let mut per_class = Vec::with_capacity(k);
    for c in 0..k {
        let tp = confusion[c][c];
        let support: usize = confusion[c].iter().sum();
        let predicted: usize = (0..k).map(|t| confusion[t][c]).sum();
        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        per_class.push(ClassMetrics {
            label: classes[c].clone(),
            precision,
            recall,
            f1,
            support,
        });
    }

    let weighted_f1 = if total > 0 {
        per_class
            .iter()
            .map(|m| m.f1 * m.support as f64)
            .sum::<f64>()
            / total as f64
    } else {
        0.0
    };

    Metrics {
        accuracy: ratio(correct, total),
        weighted_f1,
        per_class,
        confusion,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl Metrics {
    /// Classification report in the familiar per-class table form.
    pub fn report(&self) -> String {
        let width = self
            .per_class
            .iter()
            .map(|m| m.label.len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        let total: usize = self.per_class.iter().map(|m| m.support).sum();
        let weighted_precision = self.weighted_average(|m| m.precision, total);
        let weighted_recall = self.weighted_average(|m| m.recall, total);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$}  precision  recall  f1-score  support",
            "",
            width = width
        );
        for m in &self.per_class {
            let _ = writeln!(
                out,
                "{:>width$}  {:>9.3}  {:>6.3}  {:>8.3}  {:>7}",
                m.label,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                width = width
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>width$}  {:>9}  {:>6}  {:>8.3}  {:>7}",
            "accuracy",
            "",
            "",
            self.accuracy,
            total,
            width = width
        );
        let _ = writeln!(
            out,
            "{:>width$}  {:>9.3}  {:>6.3}  {:>8.3}  {:>7}",
            "weighted avg",
            weighted_precision,
            weighted_recall,
            self.weighted_f1,
            total,
            width = width
        );
        out
    }

    fn weighted_average(&self, value: impl Fn(&ClassMetrics) -> f64, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        self.per_class
            .iter()
            .map(|m| value(m) * m.support as f64)
            .sum::<f64>()
            / total as f64
    }
}
