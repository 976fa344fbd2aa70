//! Loading serialized models, including historical checkpoints
//!
//! The model generation is recovered from the file name (the convention
//! the published weight files follow), parameter keys are renamed into the
//! current namespace, and the state is loaded into a freshly constructed
//! [`GridScorer`]. Both bare state dictionaries and full training
//! checkpoints are accepted.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::checkpoint::rename_key;
use crate::checkpoint::TrainingCheckpoint;
use crate::model::{Generation, GridScorer, ModelVariant, ScoringModel, StateDict};
use crate::{Error, Result};

/// A checkpoint file is either a full training checkpoint or a bare state
/// dictionary. Checkpoints are tried first since their JSON shape is the
/// more specific of the two.
#[derive(Deserialize)]
#[serde(untagged)]
enum CheckpointFile {
    Full(TrainingCheckpoint),
    Bare(StateDict),
}

fn generation_from_name(name: &str) -> Result<Generation> {
    if name.contains("default2017") {
        Ok(Generation::Legacy2017)
    } else if name.contains("default2018") {
        Ok(Generation::Current2018)
    } else if name.contains("dense") {
        Err(Error::NotImplementedVariant("dense".to_string()))
    } else {
        Err(Error::UnsupportedModelVariant(name.to_string()))
    }
}

/// Load a scoring model from a JSON weight file.
///
/// The file name must carry a recognized generation tag (`default2017` or
/// `default2018`); the tag fixes the number of input channels. Legacy
/// parameter keys are renamed on the way in, so both historical and
/// freshly trained files load through the same path. The model variant is
/// read off the parameter set: a checkpoint without affinity-head weights
/// yields a pose-only model.
pub fn load_scoring_model(path: &Path, grid_points: usize) -> Result<GridScorer> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let generation = generation_from_name(name)?;

    let contents = fs::read_to_string(path)?;
    let file: CheckpointFile =
        serde_json::from_str(&contents).map_err(|e| Error::Serialization(e.to_string()))?;
    let state = match file {
        CheckpointFile::Full(checkpoint) => checkpoint.model,
        CheckpointFile::Bare(state) => state,
    };

    let renamed = state
        .into_iter()
        .map(|(key, values)| Ok((rename_key(&key)?, values)))
        .collect::<Result<StateDict>>()?;
    let variant = if renamed.keys().any(|key| key.starts_with("affinity.")) {
        ModelVariant::PoseAndAffinity
    } else {
        ModelVariant::PoseOnly
    };

    let mut model = GridScorer::for_generation(generation, grid_points, variant);
    model.load_state(renamed)?;
    Ok(model)
}
