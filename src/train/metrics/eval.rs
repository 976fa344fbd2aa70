//! One evaluation pass: metrics bound to their output adapters
//!
//! The metric set is fixed by the model variant at setup. Dual-task runs
//! add the affinity regression metrics on top of the pose metrics.

use std::fmt;

use crate::data::Batch;
use crate::model::{ModelVariant, ScoringModel};
use crate::train::step::StepFunction;

use super::adapter::OutputAdapter;
use super::classification::{Accuracy, BalancedAccuracy, RocAuc};
use super::regression::{MeanAbsoluteError, MeanSquaredError};
use super::trait_def::Metric;

/// A metric suite for one model variant; each metric carries its adapter
pub struct Evaluation {
    metrics: Vec<(OutputAdapter, Box<dyn Metric>)>,
}

impl Evaluation {
    pub fn for_mode(variant: ModelVariant) -> Self {
        let dual = variant == ModelVariant::PoseAndAffinity;
        // single-task pose metrics take the record unchanged; dual-task ones
        // go through the pose selector
        let pose = if dual {
            OutputAdapter::SelectPose
        } else {
            OutputAdapter::Identity
        };
        let mut metrics: Vec<(OutputAdapter, Box<dyn Metric>)> = vec![
            (pose, Box::new(Accuracy::default())),
            (pose, Box::new(BalancedAccuracy::default())),
            (OutputAdapter::Roc { dual }, Box::new(RocAuc::default())),
        ];
        if dual {
            metrics.push((
                OutputAdapter::SelectAffinity,
                Box::new(MeanAbsoluteError::default()),
            ));
            metrics.push((
                OutputAdapter::SelectAffinity,
                Box::new(MeanSquaredError::default()),
            ));
        }
        Self { metrics }
    }

    /// Evaluate the model over one pass of batches and return the named
    /// metric values in their fixed order
    pub fn run<I>(
        &mut self,
        model: &dyn ScoringModel,
        step: &StepFunction,
        batches: I,
    ) -> Vec<(&'static str, f32)>
    where
        I: IntoIterator<Item = Batch>,
    {
        for (_, metric) in &mut self.metrics {
            metric.reset();
        }
        for batch in batches {
            let record = step.eval_step(model, &batch);
            for (adapter, metric) in &mut self.metrics {
                let (predictions, targets) = adapter.apply(&record);
                metric.update(&predictions, &targets);
            }
        }
        self.metrics
            .iter()
            .map(|(_, metric)| (metric.name(), metric.finalize()))
            .collect()
    }
}

/// Metric values from one evaluation pass over one data split
pub struct EvalReport {
    pub split: &'static str,
    pub epoch: usize,
    pub values: Vec<(&'static str, f32)>,
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ">>> {} Results - Epoch[{}] <<<", self.split, self.epoch)?;
        for (name, value) in &self.values {
            writeln!(f, "{name}: {value:.2}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GridSource, SyntheticGridSource};
    use crate::model::{GridDims, GridScorer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dual_suite_has_regression_metrics() {
        let mut suite = Evaluation::for_mode(ModelVariant::PoseAndAffinity);
        let dims = GridDims::new(2, 2);
        let mut rng = StdRng::seed_from_u64(5);
        let model = GridScorer::new(ModelVariant::PoseAndAffinity, dims, &mut rng);
        let source = SyntheticGridSource::random(dims, 6, 2, true, 5);
        let step = StepFunction::for_variant(ModelVariant::PoseAndAffinity);

        let values = suite.run(&model, &step, source.batches());
        let names: Vec<&str> = values.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["Accuracy", "Balanced accuracy", "ROC AUC", "MAE", "MSE"]
        );
    }

    #[test]
    fn test_pose_suite_omits_regression_metrics() {
        let mut suite = Evaluation::for_mode(ModelVariant::PoseOnly);
        let dims = GridDims::new(1, 2);
        let mut rng = StdRng::seed_from_u64(5);
        let model = GridScorer::new(ModelVariant::PoseOnly, dims, &mut rng);
        let source = SyntheticGridSource::random(dims, 4, 2, false, 5);
        let step = StepFunction::for_variant(ModelVariant::PoseOnly);

        let values = suite.run(&model, &step, source.batches());
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|(_, v)| v.is_finite()));
    }

    #[test]
    fn test_suite_resets_between_passes() {
        let mut suite = Evaluation::for_mode(ModelVariant::PoseOnly);
        let dims = GridDims::new(1, 2);
        let mut rng = StdRng::seed_from_u64(9);
        let model = GridScorer::new(ModelVariant::PoseOnly, dims, &mut rng);
        let source = SyntheticGridSource::random(dims, 4, 2, false, 9);
        let step = StepFunction::for_variant(ModelVariant::PoseOnly);

        let first = suite.run(&model, &step, source.batches());
        let second = suite.run(&model, &step, source.batches());
        assert_eq!(first, second);
    }

    #[test]
    fn test_report_format() {
        let report = EvalReport {
            split: "Train",
            epoch: 3,
            values: vec![("Accuracy", 0.875), ("MAE", 1.234)],
        };
        let text = report.to_string();
        assert!(text.starts_with(">>> Train Results - Epoch[3] <<<\n"));
        assert!(text.contains("Accuracy: 0.88\n"));
        assert!(text.contains("MAE: 1.23\n"));
    }
}
