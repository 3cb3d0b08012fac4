//! Classification report for a labelled split
//!
//! Built once from the arg-max predictions of an evaluation pass: overall
//! accuracy, per-disease precision/recall/F1 and the confusion matrix.

use serde::{Deserialize, Serialize};

/// Square count table, rows are true classes and columns predictions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![vec![0; num_classes]; num_classes],
        }
    }

    /// Tally `(truth, prediction)` pairs; pairs outside the table are dropped
    pub fn tally(predictions: &[usize], targets: &[usize], num_classes: usize) -> Self {
        let mut matrix = Self::new(num_classes);
        for (&truth, &predicted) in targets.iter().zip(predictions) {
            matrix.record(truth, predicted);
        }
        matrix
    }

    pub fn record(&mut self, truth: usize, predicted: usize) {
        if let Some(cell) = self
            .counts
            .get_mut(truth)
            .and_then(|row| row.get_mut(predicted))
        {
            *cell += 1;
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    /// Count of images of class `truth` predicted as `predicted`
    pub fn count(&self, truth: usize, predicted: usize) -> usize {
        self.counts
            .get(truth)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn diagonal(&self) -> usize {
        (0..self.num_classes()).map(|c| self.count(c, c)).sum()
    }

    /// Images whose true class is `class`
    pub fn row_sum(&self, class: usize) -> usize {
        self.counts.get(class).map(|row| row.iter().sum()).unwrap_or(0)
    }

    /// Images predicted as `class`
    pub fn column_sum(&self, class: usize) -> usize {
        self.counts.iter().filter_map(|row| row.get(class)).sum()
    }

    /// Off-diagonal cells, largest first: `(truth, predicted, count)`
    pub fn most_confused(&self, k: usize) -> Vec<(usize, usize, usize)> {
        let mut cells: Vec<(usize, usize, usize)> = self
            .counts
            .iter()
            .enumerate()
            .flat_map(|(t, row)| {
                row.iter()
                    .enumerate()
                    .filter(move |&(p, &n)| p != t && n > 0)
                    .map(move |(p, &n)| (t, p, n))
            })
            .collect();
        cells.sort_by(|a, b| b.2.cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));
        cells.truncate(k);
        cells
    }
}

/// Precision, recall and F1 of one disease class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub class_name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of images whose true class this is
    pub support: usize,
}

impl ClassReport {
    fn from_matrix(matrix: &ConfusionMatrix, class: usize, class_name: &str) -> Self {
        let hits = matrix.count(class, class);
        let support = matrix.row_sum(class);
        let predicted = matrix.column_sum(class);

        let precision = ratio(hits, predicted);
        let recall = ratio(hits, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_name: class_name.to_string(),
            precision,
            recall,
            f1,
            support,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Classification report over one labelled split
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_samples: usize,
    pub correct_predictions: usize,
    pub accuracy: f64,
    /// Mean F1 over classes that have at least one image
    pub macro_f1: f64,
    pub classes: Vec<ClassReport>,
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Build the report from arg-max predictions and true indices
    pub fn from_predictions(predictions: &[usize], targets: &[usize], class_names: &[String]) -> Self {
        let confusion_matrix = ConfusionMatrix::tally(predictions, targets, class_names.len());
        let total_samples = confusion_matrix.total();
        let correct_predictions = confusion_matrix.diagonal();

        let classes: Vec<ClassReport> = class_names
            .iter()
            .enumerate()
            .map(|(c, name)| ClassReport::from_matrix(&confusion_matrix, c, name))
            .collect();

        let present: Vec<f64> = classes.iter().filter(|r| r.support > 0).map(|r| r.f1).collect();
        let macro_f1 = if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f64>() / present.len() as f64
        };

        Self {
            total_samples,
            correct_predictions,
            accuracy: ratio(correct_predictions, total_samples),
            macro_f1,
            classes,
            confusion_matrix,
        }
    }

    /// Per-class table plus the most frequent confusions
    pub fn display(&self) -> String {
        let mut out = format!(
            "Accuracy: {:.2}% ({}/{}) | Macro F1: {:.2}%\n",
            self.accuracy * 100.0,
            self.correct_predictions,
            self.total_samples,
            self.macro_f1 * 100.0
        );

        out.push_str(&format!(
            "  {:<45} {:>9} {:>9} {:>9} {:>8}\n",
            "class", "precision", "recall", "f1", "support"
        ));
        for r in &self.classes {
            out.push_str(&format!(
                "  {:<45} {:>8.2}% {:>8.2}% {:>8.2}% {:>8}\n",
                r.class_name,
                r.precision * 100.0,
                r.recall * 100.0,
                r.f1 * 100.0,
                r.support
            ));
        }

        let confused = self.confusion_matrix.most_confused(5);
        if !confused.is_empty() {
            out.push_str("  Most confused (true -> predicted):\n");
            for (truth, predicted, n) in confused {
                out.push_str(&format!(
                    "    {} -> {}: {}\n",
                    self.class_name(truth),
                    self.class_name(predicted),
                    n
                ));
            }
        }

        out
    }

    fn class_name(&self, class: usize) -> &str {
        self.classes
            .get(class)
            .map(|r| r.class_name.as_str())
            .unwrap_or("?")
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diseases() -> Vec<String> {
        ["Tomato_Early_blight", "Tomato_Late_blight", "Tomato_healthy"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_tally_and_sums() {
        let matrix = ConfusionMatrix::tally(&[0, 1, 1, 2], &[0, 1, 2, 2], 3);

        assert_eq!(matrix.count(0, 0), 1);
        assert_eq!(matrix.count(2, 1), 1);
        assert_eq!(matrix.total(), 4);
        assert_eq!(matrix.diagonal(), 3);
        assert_eq!(matrix.row_sum(2), 2);
        assert_eq!(matrix.column_sum(1), 2);
    }

    #[test]
    fn test_out_of_range_pairs_dropped() {
        let mut matrix = ConfusionMatrix::new(2);
        matrix.record(5, 0);
        matrix.record(0, 5);
        assert_eq!(matrix.total(), 0);
        assert_eq!(matrix.count(5, 5), 0);
    }

    #[test]
    fn test_per_class_scores() {
        let metrics = Metrics::from_predictions(&[0, 0, 1, 1], &[0, 1, 1, 1], &diseases());

        assert_eq!(metrics.total_samples, 4);
        assert_eq!(metrics.correct_predictions, 3);
        assert!((metrics.accuracy - 0.75).abs() < 1e-9);

        let early = &metrics.classes[0];
        assert!((early.precision - 0.5).abs() < 1e-9);
        assert!((early.recall - 1.0).abs() < 1e-9);

        let late = &metrics.classes[1];
        assert!((late.precision - 1.0).abs() < 1e-9);
        assert_eq!(late.support, 3);
        assert_eq!(late.class_name, "Tomato_Late_blight");

        // healthy has no images and is left out of the macro average
        assert_eq!(metrics.classes[2].support, 0);
        let expected = (2.0 / 3.0 + 0.8) / 2.0;
        assert!((metrics.macro_f1 - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_split() {
        let metrics = Metrics::from_predictions(&[], &[], &diseases());
        assert_eq!(metrics.total_samples, 0);
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(metrics.confusion_matrix.num_classes(), 3);
    }

    #[test]
    fn test_most_confused_order() {
        let matrix = ConfusionMatrix::tally(&[1, 1, 2, 0, 0], &[0, 0, 0, 1, 2], 3);
        assert_eq!(matrix.most_confused(2), vec![(0, 1, 2), (0, 2, 1)]);
    }

    #[test]
    fn test_display_names_confusions() {
        let metrics = Metrics::from_predictions(&[1, 1], &[0, 1], &diseases());
        let text = metrics.display();
        assert!(text.contains("Tomato_Early_blight -> Tomato_Late_blight: 1"));
        assert!(text.contains("50.00%"));
    }
}
