//! Legacy parameter-key renaming
//!
//! Historical checkpoints name layers flat (`conv1.weight`,
//! `output_fc.bias`, `pose_output.weight`); the current models namespace
//! them under `features.`, `pose.` and `affinity.`. Every key must map to
//! exactly one current name or loading fails.

use crate::{Error, Result};

/// Map one legacy parameter key onto the current namespace.
///
/// Rules are checked in order, first match wins:
///
/// 1. keys already namespaced (`features.`, `pose.`, `affinity.`) pass
///    through unchanged, making renaming idempotent
/// 2. convolutional feature layers are prefixed with `features.`
/// 3. the legacy single-output pose head `output_fc` becomes
///    `pose.pose_output` (the trailing dot keeps it from shadowing the
///    affinity head's `output_fc_aff`)
/// 4. the legacy affinity head `output_fc_aff` becomes
///    `affinity.affinity_output`
/// 5. current-generation head names (`pose_output`, `affinity_output`)
///    are prefixed with their namespace
///
/// Anything else is an [`Error::UnknownParameterKey`].
///
/// # Example
///
/// ```
/// use acoplar::checkpoint::rename_key;
///
/// assert_eq!(rename_key("conv1.weight").unwrap(), "features.conv1.weight");
/// assert_eq!(rename_key("output_fc.bias").unwrap(), "pose.pose_output.bias");
/// assert!(rename_key("unexpected_layer.weight").is_err());
/// ```
pub fn rename_key(key: &str) -> Result<String> {
    if key.starts_with("features.") || key.starts_with("pose.") || key.starts_with("affinity.") {
        Ok(key.to_string())
    } else if key.contains("conv") {
        Ok(format!("features.{key}"))
    } else if key.contains("output_fc.") {
        Ok(key.replace("output_fc", "pose.pose_output"))
    } else if key.contains("output_fc_aff.") {
        Ok(key.replace("output_fc_aff", "affinity.affinity_output"))
    } else if key.contains("pose_output") {
        Ok(format!("pose.{key}"))
    } else if key.contains("affinity_output") {
        Ok(format!("affinity.{key}"))
    } else {
        Err(Error::UnknownParameterKey(key.to_string()))
    }
}
