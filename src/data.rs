//! Batches and the external data-source interface
//!
//! Grid generation (voxelization of molecular structures) happens outside
//! this core; a [`GridSource`] hands over ready-made batches of flattened
//! grids with their labels. One call to [`GridSource::batches`] yields one
//! full pass as defined by the source's iteration scheme.

use ndarray::{s, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::GridDims;
use crate::{Error, Result};

/// One batch of voxelized ligand-receptor complexes.
///
/// Owned transiently by a single training or evaluation step; the affinity
/// labels are present only when the run is in dual-task mode.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Flattened grids, shape `(N, channels * points^3)`
    pub grids: Array2<f32>,
    /// Binary pose labels (1 = correct docking), shape `(N,)`
    pub pose_labels: Array1<usize>,
    /// Experimental binding affinities, shape `(N,)`; dual-task only
    pub affinities: Option<Array1<f32>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.pose_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pose_labels.is_empty()
    }
}

/// A lazy, restartable sequence of batches with a fixed grid shape
pub trait GridSource {
    /// Per-batch grid shape; queried once at setup
    fn dims(&self) -> GridDims;

    /// Whether batches carry affinity labels (dual-task mode)
    fn provides_affinity(&self) -> bool;

    /// Start a fresh pass over the source
    fn batches(&self) -> Box<dyn Iterator<Item = Batch> + '_>;
}

/// Setup invariant: train and test sources must agree on grid dimensions
pub fn check_dims(train: &dyn GridSource, test: &dyn GridSource) -> Result<()> {
    let (t, e) = (train.dims(), test.dims());
    if t != e {
        return Err(Error::DataShapeMismatch(format!(
            "train grids are {t} but test grids are {e}"
        )));
    }
    Ok(())
}

/// In-memory source with a fixed sample set, for tests and examples
pub struct SyntheticGridSource {
    dims: GridDims,
    batch_size: usize,
    grids: Array2<f32>,
    pose_labels: Array1<usize>,
    affinities: Option<Array1<f32>>,
}

impl SyntheticGridSource {
    /// Seeded random samples; `dual` controls whether affinity labels exist
    pub fn random(dims: GridDims, samples: usize, batch_size: usize, dual: bool, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let grids = Array2::from_shape_fn((samples, dims.flat_len()), |_| {
            rng.random_range(-1.0f32..1.0)
        });
        let pose_labels = Array1::from_shape_fn(samples, |_| usize::from(rng.random_bool(0.5)));
        let affinities =
            dual.then(|| Array1::from_shape_fn(samples, |_| rng.random_range(2.0f32..12.0)));
        Self {
            dims,
            batch_size,
            grids,
            pose_labels,
            affinities,
        }
    }

    /// Wrap pre-built samples
    pub fn from_parts(
        dims: GridDims,
        grids: Array2<f32>,
        pose_labels: Array1<usize>,
        affinities: Option<Array1<f32>>,
        batch_size: usize,
    ) -> Self {
        assert_eq!(grids.ncols(), dims.flat_len(), "grid width must match dims");
        assert_eq!(grids.nrows(), pose_labels.len());
        if let Some(a) = affinities.as_ref() {
            assert_eq!(a.len(), pose_labels.len());
        }
        Self {
            dims,
            batch_size,
            grids,
            pose_labels,
            affinities,
        }
    }

    pub fn samples(&self) -> usize {
        self.pose_labels.len()
    }
}

impl GridSource for SyntheticGridSource {
    fn dims(&self) -> GridDims {
        self.dims
    }

    fn provides_affinity(&self) -> bool {
        self.affinities.is_some()
    }

    fn batches(&self) -> Box<dyn Iterator<Item = Batch> + '_> {
        let total = self.samples();
        let size = self.batch_size.max(1);
        Box::new((0..total).step_by(size).map(move |start| {
            let end = (start + size).min(total);
            Batch {
                grids: self.grids.slice(s![start..end, ..]).to_owned(),
                pose_labels: self.pose_labels.slice(s![start..end]).to_owned(),
                affinities: self
                    .affinities
                    .as_ref()
                    .map(|a| a.slice(s![start..end]).to_owned()),
            }
        }))
    }
}
