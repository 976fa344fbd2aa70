//! Affinity-regression metrics

use ndarray::{Array1, Array2};

use super::trait_def::Metric;

#[derive(Debug, Default)]
pub struct MeanAbsoluteError {
    total: f64,
    count: usize,
}

impl Metric for MeanAbsoluteError {
    fn reset(&mut self) {
        self.total = 0.0;
        self.count = 0;
    }

    fn update(&mut self, predictions: &Array2<f32>, targets: &Array1<f32>) {
        for (row, &target) in predictions.rows().into_iter().zip(targets.iter()) {
            self.total += f64::from((row[0] - target).abs());
            self.count += 1;
        }
    }

    fn finalize(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        (self.total / self.count as f64) as f32
    }

    fn name(&self) -> &'static str {
        "MAE"
    }
}

#[derive(Debug, Default)]
pub struct MeanSquaredError {
    total: f64,
    count: usize,
}

impl Metric for MeanSquaredError {
    fn reset(&mut self) {
        self.total = 0.0;
        self.count = 0;
    }

    fn update(&mut self, predictions: &Array2<f32>, targets: &Array1<f32>) {
        for (row, &target) in predictions.rows().into_iter().zip(targets.iter()) {
            let r = f64::from(row[0] - target);
            self.total += r * r;
            self.count += 1;
        }
    }

    fn finalize(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        (self.total / self.count as f64) as f32
    }

    fn name(&self) -> &'static str {
        "MSE"
    }
}
