//! Run assembly: wire options and data sources into an engine and go
//!
//! This is the one place that inspects the configuration; everything
//! downstream (step function, metric suite, hooks) is selected here once
//! and stays fixed for the whole run.

use std::fs;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::checkpoint::{CheckpointPolicy, TrainingCheckpoint};
use crate::config::TrainOptions;
use crate::data::{check_dims, GridSource};
use crate::model::{GridScorer, ModelVariant, ScoringModel};
use crate::optim::SgdOptimizer;
use crate::report::ReportSink;
use crate::train::{EngineRun, EvalReport, Evaluation, StepFunction};
use crate::train::Engine;
use crate::{Error, Result};

/// Train a fresh model from `options` over `train`, evaluating on both
/// splits on the `test_every` schedule when a test source is given.
///
/// Dual-task mode is inferred from the training source: if it provides
/// affinity labels, the model carries the affinity head.
pub fn run_training(
    options: &TrainOptions,
    train: &dyn GridSource,
    test: Option<&dyn GridSource>,
) -> Result<EngineRun> {
    fs::create_dir_all(&options.out_dir)?;
    let mut sink = ReportSink::open(&options.out_dir, options.silent)?;
    options.echo(&mut sink)?;

    if let Some(test) = test {
        check_dims(train, test)?;
        // evaluation hooks run both splits through the same metric suite,
        // so the test source must carry the same labels as the train source
        if test.provides_affinity() != train.provides_affinity() {
            return Err(Error::DataShapeMismatch(
                "train and test sources disagree on affinity labels".to_string(),
            ));
        }
    }

    let seed = options.seed.unwrap_or_else(rand::random);
    sink.line(&format!("using seed {seed}"))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let variant = if train.provides_affinity() {
        ModelVariant::PoseAndAffinity
    } else {
        ModelVariant::PoseOnly
    };
    let model = GridScorer::new(variant, train.dims(), &mut rng);
    let optimizer = SgdOptimizer::new(
        options.base_lr as f32,
        options.momentum as f32,
        options.weight_decay as f32,
    );
    let step = StepFunction::for_variant(variant);

    let mut engine =
        Engine::new(Box::new(model), optimizer, step.clone()).with_progress(options.progress);

    // Evaluation reports on both splits, on the test schedule
    let mut train_suite = Evaluation::for_mode(variant);
    let mut test_suite = Evaluation::for_mode(variant);
    engine.on_epoch(options.test_every, move |ctx| {
        let report = EvalReport {
            split: "Train",
            epoch: ctx.epoch,
            values: train_suite.run(ctx.model, &step, train.batches()),
        };
        sink.line(report.to_string().trim_end())?;
        if let Some(test) = test {
            let report = EvalReport {
                split: "Test",
                epoch: ctx.epoch,
                values: test_suite.run(ctx.model, &step, test.batches()),
            };
            sink.line(report.to_string().trim_end())?;
        }
        Ok(())
    });

    // Rotating checkpoints of model plus optimizer state
    let mut policy = CheckpointPolicy::new(&options.out_dir, options.num_checkpoints);
    engine.on_epoch(options.checkpoint_every, move |ctx| {
        policy.save(&TrainingCheckpoint {
            epoch: ctx.epoch,
            model: ctx.model.state(),
            optimizer: ctx.optimizer.state(),
        })?;
        Ok(())
    });

    engine.run(options.iterations, || train.batches())
}

/// Score every sample of `source` with a trained model, one line per
/// sample: the pose score (probability of a correct pose) and, for
/// dual-task models, the predicted binding affinity.
pub fn run_scoring(
    model: &dyn ScoringModel,
    source: &dyn GridSource,
    sink: &mut ReportSink,
) -> Result<()> {
    for batch in source.batches() {
        let output = model.forward(&batch.grids);
        let scores = output.pose_log_probs().mapv(f32::exp);
        for i in 0..batch.len() {
            sink.line(&format!("CNNscore: {:.5}", scores[[i, 1]]))?;
            if let Some(affinity) = output.affinity_pred() {
                sink.line(&format!("CNNaffinity: {:.5}", affinity[i]))?;
            }
        }
    }
    Ok(())
}
