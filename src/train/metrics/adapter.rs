//! Output adapters bridging step outputs to metric inputs
//!
//! Each metric is bound to exactly one adapter at setup; all task-mode
//! branching lives in that binding, never inside a metric. Adapters are
//! pure functions of the evaluation record.

use ndarray::{Array1, Array2};

use crate::train::step::OutputRecord;

/// How a metric's `(predictions, targets)` pair is derived from one
/// evaluation record
#[derive(Debug, Clone, Copy)]
pub enum OutputAdapter {
    /// Pose log-probabilities and labels, unchanged. Argmax and ranking
    /// are invariant under log, so single-task pose metrics use this.
    Identity,
    /// Exponentiated pose log-probabilities (class probabilities)
    SelectPose,
    /// Affinity predictions as a single column against affinity targets,
    /// no activation
    SelectAffinity,
    /// Positive-class score as a single column: composes [`SelectPose`]
    /// (dual) or [`Identity`] (single), then takes the last class column.
    ///
    /// [`SelectPose`]: OutputAdapter::SelectPose
    /// [`Identity`]: OutputAdapter::Identity
    Roc { dual: bool },
}

impl OutputAdapter {
    pub fn apply(&self, record: &OutputRecord) -> (Array2<f32>, Array1<f32>) {
        let labels_f32 = || record.pose_labels.mapv(|l| l as f32);
        match self {
            OutputAdapter::Identity => (record.pose_log_probs.clone(), labels_f32()),
            OutputAdapter::SelectPose => (record.pose_log_probs.mapv(f32::exp), labels_f32()),
            OutputAdapter::SelectAffinity => {
                let pred = record
                    .affinity_pred
                    .as_ref()
                    .expect("affinity adapter requires a dual-task record");
                let targets = record
                    .affinities
                    .as_ref()
                    .expect("affinity adapter requires affinity labels");
                let n = pred.len();
                (
                    pred.clone().into_shape_with_order((n, 1)).expect("column reshape"),
                    targets.clone(),
                )
            }
            OutputAdapter::Roc { dual } => {
                let inner = if *dual {
                    OutputAdapter::SelectPose
                } else {
                    OutputAdapter::Identity
                };
                let (scores, labels) = inner.apply(record);
                let last = scores.ncols() - 1;
                let column = scores.column(last).to_owned();
                let n = column.len();
                (
                    column.into_shape_with_order((n, 1)).expect("column reshape"),
                    labels,
                )
            }
        }
    }
}
