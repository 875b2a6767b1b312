//! 混同行列と評価指標

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ml::classifier::NUM_CLASSES;

/// `counts[actual][predicted]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: [[u64; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// 範囲外のクラスは無視
    pub fn record(&mut self, actual: usize, predicted: usize) {
        if actual < NUM_CLASSES && predicted < NUM_CLASSES {
            self.counts[actual][predicted] += 1;
        }
    }

    pub fn count(&self, actual: usize, predicted: usize) -> u64 {
        self.counts
            .get(actual)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    fn support(&self, class: usize) -> u64 {
        self.counts[class].iter().sum()
    }

    fn predicted(&self, class: usize) -> u64 {
        self.counts.iter().map(|row| row[class]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: u64 = (0..NUM_CLASSES).map(|c| self.counts[c][c]).sum();
        correct as f64 / total as f64
    }

    /// 一度も予測されていないクラスは0
    pub fn precision(&self, class: usize) -> f64 {
        ratio(self.counts[class][class], self.predicted(class))
    }

    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.counts[class][class], self.support(class))
    }

    pub fn f1(&self, class: usize) -> f64 {
        harmonic(self.precision(class), self.recall(class))
    }

    /// 評価データに現れたクラスだけで平均した適合率
    pub fn macro_precision(&self) -> f64 {
        self.macro_average(|m, c| m.precision(c))
    }

    pub fn macro_recall(&self) -> f64 {
        self.macro_average(|m, c| m.recall(c))
    }

    /// マクロ適合率とマクロ再現率の調和平均
    pub fn macro_f1(&self) -> f64 {
        harmonic(self.macro_precision(), self.macro_recall())
    }

    pub fn per_class_precision(&self) -> BTreeMap<usize, f64> {
        (0..NUM_CLASSES)
            .filter(|c| self.support(*c) > 0)
            .map(|c| (c, self.precision(c)))
            .collect()
    }

    fn macro_average(&self, metric: impl Fn(&Self, usize) -> f64) -> f64 {
        let present: Vec<usize> = (0..NUM_CLASSES).filter(|c| self.support(*c) > 0).collect();
        if present.is_empty() {
            return 0.0;
        }
        present.iter().map(|c| metric(self, *c)).sum::<f64>() / present.len() as f64
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic(p: f64, r: f64) -> f64 {
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actual\\pred")?;
        for class in 0..NUM_CLASSES {
            write!(f, "{:>6}", class)?;
        }
        writeln!(f)?;
        for (actual, row) in self.counts.iter().enumerate() {
            write!(f, "{:>11}", actual)?;
            for count in row {
                write!(f, "{:>6}", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
