//! Concrete scoring model over flattened voxel grids
//!
//! One hidden feature layer with ReLU and linear prediction heads: a
//! log-softmax pose head and, for dual-task models, a scalar affinity head.
//! The parameter namespace (`features.*`, `pose.pose_output.*`,
//! `affinity.affinity_output.*`) is the target namespace of the checkpoint
//! key mapper, so legacy checkpoints land on these names after renaming.

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::Rng;

use crate::{Error, Result, Tensor};

use super::{Generation, GridDims, ModelOutput, ModelVariant, OutputGrads, ScoringModel, StateDict};

/// Width of the hidden feature layer, fixed across generations
pub const HIDDEN_FEATURES: usize = 32;

const FEATURES_WEIGHT: &str = "features.conv1.weight";
const FEATURES_BIAS: &str = "features.conv1.bias";
const POSE_WEIGHT: &str = "pose.pose_output.weight";
const POSE_BIAS: &str = "pose.pose_output.bias";
const AFFINITY_WEIGHT: &str = "affinity.affinity_output.weight";
const AFFINITY_BIAS: &str = "affinity.affinity_output.bias";

/// Grid scoring model with pose head and optional affinity head
#[derive(Debug)]
pub struct GridScorer {
    variant: ModelVariant,
    dims: GridDims,
    hidden: usize,
    features_w: Tensor,
    features_b: Tensor,
    pose_w: Tensor,
    pose_b: Tensor,
    affinity_w: Option<Tensor>,
    affinity_b: Option<Tensor>,
}

/// Reinterpret a flat parameter as a `(rows, cols)` matrix
fn matrix(t: &Tensor, rows: usize, cols: usize) -> ArrayView2<'_, f32> {
    ArrayView2::from_shape(
        (rows, cols),
        t.data().as_slice().expect("contiguous parameter data"),
    )
    .expect("parameter length matches declared shape")
}

fn flatten(a: Array2<f32>) -> Array1<f32> {
    Array1::from_iter(a.iter().copied())
}

fn log_softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = logits.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }
    out
}

impl GridScorer {
    /// Create a randomly initialized model for training
    pub fn new<R: Rng + ?Sized>(variant: ModelVariant, dims: GridDims, rng: &mut R) -> Self {
        let hidden = HIDDEN_FEATURES;
        let in_features = dims.flat_len();

        let feat_scale = 1.0 / (in_features as f32).sqrt();
        let head_scale = 1.0 / (hidden as f32).sqrt();
        let mut init = |len: usize, scale: f32| {
            Tensor::from_vec(
                (0..len).map(|_| rng.random_range(-scale..scale)).collect(),
                true,
            )
        };

        let features_w = init(hidden * in_features, feat_scale);
        let pose_w = init(2 * hidden, head_scale);
        let (affinity_w, affinity_b) = match variant {
            ModelVariant::PoseOnly => (None, None),
            ModelVariant::PoseAndAffinity => (
                Some(init(hidden, head_scale)),
                Some(Tensor::zeros(1, true)),
            ),
        };

        Self {
            variant,
            dims,
            hidden,
            features_w,
            features_b: Tensor::zeros(hidden, true),
            pose_w,
            pose_b: Tensor::zeros(2, true),
            affinity_w,
            affinity_b,
        }
    }

    /// Create an uninitialized model for a checkpoint generation; the
    /// variant comes from the checkpoint's parameter set
    pub fn for_generation(
        generation: Generation,
        grid_points: usize,
        variant: ModelVariant,
    ) -> Self {
        let dims = GridDims::new(generation.input_channels(), grid_points);
        let hidden = HIDDEN_FEATURES;
        let (affinity_w, affinity_b) = match variant {
            ModelVariant::PoseOnly => (None, None),
            ModelVariant::PoseAndAffinity => (
                Some(Tensor::zeros(hidden, true)),
                Some(Tensor::zeros(1, true)),
            ),
        };
        Self {
            variant,
            dims,
            hidden,
            features_w: Tensor::zeros(hidden * dims.flat_len(), true),
            features_b: Tensor::zeros(hidden, true),
            pose_w: Tensor::zeros(2 * hidden, true),
            pose_b: Tensor::zeros(2, true),
            affinity_w,
            affinity_b,
        }
    }

    fn named_params(&self) -> Vec<(&'static str, &Tensor)> {
        let mut params = vec![
            (FEATURES_WEIGHT, &self.features_w),
            (FEATURES_BIAS, &self.features_b),
            (POSE_WEIGHT, &self.pose_w),
            (POSE_BIAS, &self.pose_b),
        ];
        if let Some(w) = self.affinity_w.as_ref() {
            params.push((AFFINITY_WEIGHT, w));
        }
        if let Some(b) = self.affinity_b.as_ref() {
            params.push((AFFINITY_BIAS, b));
        }
        params
    }

    /// Hidden-layer pre-activations and ReLU activations, shapes `(N, hidden)`
    fn feature_maps(&self, grids: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
        let wf = matrix(&self.features_w, self.hidden, self.dims.flat_len());
        let pre = grids.dot(&wf.t()) + self.features_b.data();
        let post = pre.mapv(|v| v.max(0.0));
        (pre, post)
    }
}

impl ScoringModel for GridScorer {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn dims(&self) -> GridDims {
        self.dims
    }

    fn forward(&self, grids: &Array2<f32>) -> ModelOutput {
        let (_, post) = self.feature_maps(grids);

        let wp = matrix(&self.pose_w, 2, self.hidden);
        let logits = post.dot(&wp.t()) + self.pose_b.data();
        let pose_log_probs = log_softmax_rows(&logits);

        match (self.affinity_w.as_ref(), self.affinity_b.as_ref()) {
            (Some(wa_t), Some(ba)) => {
                let wa = matrix(wa_t, 1, self.hidden);
                let affinity_pred = post.dot(&wa.t()).column(0).to_owned() + ba.data()[0];
                ModelOutput::PoseAffinity {
                    pose_log_probs,
                    affinity_pred,
                }
            }
            _ => ModelOutput::Pose { pose_log_probs },
        }
    }

    fn backward(&mut self, grids: &Array2<f32>, grads: &OutputGrads) {
        let (pre, post) = self.feature_maps(grids);
        let dz = &grads.pose_logits;

        let d_pose_w = dz.t().dot(&post);
        let d_pose_b = dz.sum_axis(Axis(0));

        let mut d_post = {
            let wp = matrix(&self.pose_w, 2, self.hidden);
            dz.dot(&wp)
        };

        let mut d_affinity = None;
        if let (Some(da), Some(wa_t)) = (grads.affinity.as_ref(), self.affinity_w.as_ref()) {
            let wa = matrix(wa_t, 1, self.hidden);
            let da_col = da.view().insert_axis(Axis(1));
            d_post = d_post + &da_col.dot(&wa);
            let d_wa = da_col.t().dot(&post);
            d_affinity = Some((flatten(d_wa), da.sum()));
        }

        let d_pre = Zip::from(&d_post)
            .and(&pre)
            .map_collect(|&g, &p| if p > 0.0 { g } else { 0.0 });
        let d_feat_w = d_pre.t().dot(grids);
        let d_feat_b = d_pre.sum_axis(Axis(0));

        self.features_w.accumulate_grad(&flatten(d_feat_w));
        self.features_b.accumulate_grad(&d_feat_b);
        self.pose_w.accumulate_grad(&flatten(d_pose_w));
        self.pose_b.accumulate_grad(&d_pose_b);
        if let Some((d_wa, d_ba)) = d_affinity {
            if let Some(w) = self.affinity_w.as_mut() {
                w.accumulate_grad(&d_wa);
            }
            if let Some(b) = self.affinity_b.as_mut() {
                b.accumulate_grad(&Array1::from_vec(vec![d_ba]));
            }
        }
    }

    fn parameters_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        let mut params = vec![
            (FEATURES_WEIGHT, &mut self.features_w),
            (FEATURES_BIAS, &mut self.features_b),
            (POSE_WEIGHT, &mut self.pose_w),
            (POSE_BIAS, &mut self.pose_b),
        ];
        if let Some(w) = self.affinity_w.as_mut() {
            params.push((AFFINITY_WEIGHT, w));
        }
        if let Some(b) = self.affinity_b.as_mut() {
            params.push((AFFINITY_BIAS, b));
        }
        params
    }

    fn state(&self) -> StateDict {
        self.named_params()
            .into_iter()
            .map(|(name, tensor)| (name.to_string(), tensor.to_vec()))
            .collect()
    }

    fn load_state(&mut self, mut state: StateDict) -> Result<()> {
        for (name, tensor) in self.parameters_mut() {
            let values = state.remove(name).ok_or_else(|| {
                Error::Serialization(format!("checkpoint missing parameter: {name}"))
            })?;
            if values.len() != tensor.len() {
                return Err(Error::Serialization(format!(
                    "parameter {name}: expected {} values, found {}",
                    tensor.len(),
                    values.len()
                )));
            }
            *tensor.data_mut() = Array1::from_vec(values);
        }
        if let Some((key, _)) = state.into_iter().next() {
            return Err(Error::UnknownParameterKey(key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tiny_dims() -> GridDims {
        GridDims::new(2, 2)
    }

    fn batch(dims: GridDims, n: usize) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(7);
        Array2::from_shape_fn((n, dims.flat_len()), |_| rng.random_range(-1.0..1.0))
    }

    #[test]
    fn test_forward_arity_pose_only() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = GridScorer::new(ModelVariant::PoseOnly, tiny_dims(), &mut rng);
        let out = model.forward(&batch(tiny_dims(), 3));
        assert!(matches!(out, ModelOutput::Pose { .. }));
        assert_eq!(out.pose_log_probs().dim(), (3, 2));
        assert!(out.affinity_pred().is_none());
    }

    #[test]
    fn test_forward_arity_dual() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = GridScorer::new(ModelVariant::PoseAndAffinity, tiny_dims(), &mut rng);
        let out = model.forward(&batch(tiny_dims(), 3));
        assert!(matches!(out, ModelOutput::PoseAffinity { .. }));
        assert_eq!(out.affinity_pred().unwrap().len(), 3);
    }

    #[test]
    fn test_log_probs_normalize() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = GridScorer::new(ModelVariant::PoseOnly, tiny_dims(), &mut rng);
        let out = model.forward(&batch(tiny_dims(), 4));
        for row in out.pose_log_probs().rows() {
            let total: f32 = row.iter().map(|&v| v.exp()).sum();
            assert!((total - 1.0).abs() < 1e-5, "row sums to {total}");
        }
    }

    #[test]
    fn test_state_round_trip() {
        let mut rng = StdRng::seed_from_u64(2);
        let original = GridScorer::new(ModelVariant::PoseAndAffinity, tiny_dims(), &mut rng);
        let state = original.state();
        assert_eq!(state.len(), 6);

        let mut other_rng = StdRng::seed_from_u64(99);
        let mut restored =
            GridScorer::new(ModelVariant::PoseAndAffinity, tiny_dims(), &mut other_rng);
        restored.load_state(state.clone()).unwrap();
        assert_eq!(restored.state(), state);
    }

    #[test]
    fn test_load_state_rejects_unknown_key() {
        let mut model = GridScorer::for_generation(Generation::Current2018, 2, ModelVariant::PoseAndAffinity);
        let mut state = model.state();
        state.insert("unexpected_layer.weight".to_string(), vec![0.0]);
        let err = model.load_state(state).unwrap_err();
        assert!(matches!(err, Error::UnknownParameterKey(key) if key == "unexpected_layer.weight"));
    }

    #[test]
    fn test_load_state_rejects_missing_parameter() {
        let mut model = GridScorer::for_generation(Generation::Current2018, 2, ModelVariant::PoseAndAffinity);
        let mut state = model.state();
        state.remove(POSE_BIAS);
        assert!(matches!(
            model.load_state(state),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_load_state_rejects_wrong_length() {
        let mut model = GridScorer::for_generation(Generation::Current2018, 2, ModelVariant::PoseAndAffinity);
        let mut state = model.state();
        state.insert(POSE_BIAS.to_string(), vec![0.0; 5]);
        assert!(matches!(
            model.load_state(state),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_backward_populates_all_grads() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = GridScorer::new(ModelVariant::PoseAndAffinity, tiny_dims(), &mut rng);
        let grids = batch(tiny_dims(), 2);

        let grads = OutputGrads {
            pose_logits: Array2::from_elem((2, 2), 0.25),
            affinity: Some(Array1::from_vec(vec![0.5, -0.5])),
        };
        model.backward(&grids, &grads);

        for (name, tensor) in model.parameters_mut() {
            assert!(tensor.grad().is_some(), "no gradient for {name}");
        }
    }
}
