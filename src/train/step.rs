//! Single-batch training and evaluation steps
//!
//! The step function is selected once from the model variant at setup, so
//! the per-batch path never re-inspects the configuration. Dual-task steps
//! sum the pose and affinity losses unweighted.

use ndarray::{Array1, Array2};

use crate::data::Batch;
use crate::model::{ModelOutput, OutputGrads, ScoringModel};
use crate::optim::SgdOptimizer;
use crate::train::loss::{NllLoss, PseudoHuberLoss};
use crate::{Error, Result};

/// Detached per-batch outputs and labels, collected during evaluation
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub pose_log_probs: Array2<f32>,
    pub affinity_pred: Option<Array1<f32>>,
    pub pose_labels: Array1<usize>,
    pub affinities: Option<Array1<f32>>,
}

/// The per-batch optimization step, fixed by the model variant
#[derive(Clone)]
pub enum StepFunction {
    Pose {
        pose_loss: NllLoss,
    },
    PoseAffinity {
        pose_loss: NllLoss,
        affinity_loss: PseudoHuberLoss,
    },
}

impl StepFunction {
    pub fn for_variant(variant: crate::model::ModelVariant) -> Self {
        match variant {
            crate::model::ModelVariant::PoseOnly => StepFunction::Pose {
                pose_loss: NllLoss,
            },
            crate::model::ModelVariant::PoseAndAffinity => StepFunction::PoseAffinity {
                pose_loss: NllLoss,
                affinity_loss: PseudoHuberLoss::default(),
            },
        }
    }

    /// Forward, loss, backward, optimizer update. Returns the batch loss.
    pub fn train_step(
        &self,
        model: &mut dyn ScoringModel,
        optimizer: &mut SgdOptimizer,
        batch: &Batch,
    ) -> Result<f32> {
        optimizer.zero_grad(&mut model.parameters_mut());

        let output = model.forward(&batch.grids);
        let (loss, grads) = self.loss_and_grads(&output, batch)?;

        model.backward(&batch.grids, &grads);
        optimizer.step(&mut model.parameters_mut());
        Ok(loss)
    }

    /// Forward only; records outputs and labels for metric evaluation
    pub fn eval_step(&self, model: &dyn ScoringModel, batch: &Batch) -> OutputRecord {
        let output = model.forward(&batch.grids);
        OutputRecord {
            pose_log_probs: output.pose_log_probs().clone(),
            affinity_pred: output.affinity_pred().cloned(),
            pose_labels: batch.pose_labels.clone(),
            affinities: batch.affinities.clone(),
        }
    }

    fn loss_and_grads(&self, output: &ModelOutput, batch: &Batch) -> Result<(f32, OutputGrads)> {
        match self {
            StepFunction::Pose { pose_loss } => {
                let log_probs = output.pose_log_probs();
                let loss = pose_loss.loss(log_probs, &batch.pose_labels);
                let grads = OutputGrads {
                    pose_logits: pose_loss.grad(log_probs, &batch.pose_labels),
                    affinity: None,
                };
                Ok((loss, grads))
            }
            StepFunction::PoseAffinity {
                pose_loss,
                affinity_loss,
            } => {
                let affinities = batch.affinities.as_ref().ok_or_else(|| {
                    Error::DataShapeMismatch(
                        "dual-task step requires affinity labels on every batch".to_string(),
                    )
                })?;
                let predicted = output
                    .affinity_pred()
                    .expect("dual-task model emits affinity predictions");

                let log_probs = output.pose_log_probs();
                let loss = pose_loss.loss(log_probs, &batch.pose_labels)
                    + affinity_loss.loss(predicted, affinities);
                let grads = OutputGrads {
                    pose_logits: pose_loss.grad(log_probs, &batch.pose_labels),
                    affinity: Some(affinity_loss.grad(predicted, affinities)),
                };
                Ok((loss, grads))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticGridSource;
    use crate::model::{GridDims, GridScorer, ModelVariant};
    use crate::data::GridSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dual_fixture() -> (GridScorer, Batch) {
        let dims = GridDims::new(2, 2);
        let mut rng = StdRng::seed_from_u64(11);
        let model = GridScorer::new(ModelVariant::PoseAndAffinity, dims, &mut rng);
        let source = SyntheticGridSource::random(dims, 4, 4, true, 11);
        let batch = source.batches().next().unwrap();
        (model, batch)
    }

    #[test]
    fn test_dual_loss_is_unweighted_sum() {
        let (mut model, batch) = dual_fixture();
        let step = StepFunction::for_variant(ModelVariant::PoseAndAffinity);

        let output = model.forward(&batch.grids);
        let expected = NllLoss.loss(output.pose_log_probs(), &batch.pose_labels)
            + PseudoHuberLoss::default().loss(
                output.affinity_pred().unwrap(),
                batch.affinities.as_ref().unwrap(),
            );

        let mut optimizer = SgdOptimizer::new(0.01, 0.9, 0.001);
        let loss = step.train_step(&mut model, &mut optimizer, &batch).unwrap();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_train_step_moves_parameters() {
        let (mut model, batch) = dual_fixture();
        let before = model.state();

        let step = StepFunction::for_variant(ModelVariant::PoseAndAffinity);
        let mut optimizer = SgdOptimizer::new(0.01, 0.9, 0.001);
        step.train_step(&mut model, &mut optimizer, &batch).unwrap();

        assert_ne!(before, model.state());
    }

    #[test]
    fn test_dual_step_without_affinities_fails() {
        let (mut model, mut batch) = dual_fixture();
        batch.affinities = None;

        let step = StepFunction::for_variant(ModelVariant::PoseAndAffinity);
        let mut optimizer = SgdOptimizer::new(0.01, 0.0, 0.0);
        let err = step.train_step(&mut model, &mut optimizer, &batch).unwrap_err();
        assert!(matches!(err, Error::DataShapeMismatch(_)));
    }

    #[test]
    fn test_eval_step_does_not_mutate() {
        let (model, batch) = dual_fixture();
        let before = model.state();

        let step = StepFunction::for_variant(ModelVariant::PoseAndAffinity);
        let record = step.eval_step(&model, &batch);

        assert_eq!(before, model.state());
        assert_eq!(record.pose_log_probs.nrows(), batch.len());
        assert!(record.affinity_pred.is_some());
    }

    #[test]
    fn test_pose_only_step_ignores_affinity() {
        let dims = GridDims::new(2, 2);
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = GridScorer::new(ModelVariant::PoseOnly, dims, &mut rng);
        let source = SyntheticGridSource::random(dims, 2, 2, true, 3);
        let batch = source.batches().next().unwrap();

        let step = StepFunction::for_variant(ModelVariant::PoseOnly);
        let mut optimizer = SgdOptimizer::new(0.01, 0.9, 0.001);
        assert!(step.train_step(&mut model, &mut optimizer, &batch).is_ok());
    }
}
