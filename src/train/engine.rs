//! The training engine: epoch loop with scheduled hooks
//!
//! The engine owns the model and optimizer for the duration of a run.
//! Periodic work (evaluation reports, checkpointing) is registered as
//! epoch hooks with a firing interval; hooks fire in registration order
//! and see the model and optimizer through an [`EpochContext`].

use std::io::Write;

use crate::data::Batch;
use crate::model::ScoringModel;
use crate::optim::SgdOptimizer;
use crate::train::step::StepFunction;
use crate::Result;

/// What a hook can see and touch when it fires
pub struct EpochContext<'c> {
    pub model: &'c mut dyn ScoringModel,
    pub optimizer: &'c mut SgdOptimizer,
    pub epoch: usize,
}

type EpochHook<'a> = Box<dyn FnMut(&mut EpochContext<'_>) -> Result<()> + 'a>;

struct ScheduledHook<'a> {
    every: usize,
    hook: EpochHook<'a>,
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy)]
pub struct EngineRun {
    pub epochs: usize,
    /// Mean batch loss of the last epoch; zero for a zero-iteration run
    pub final_loss: f32,
}

pub struct Engine<'a> {
    model: Box<dyn ScoringModel>,
    optimizer: SgdOptimizer,
    step: StepFunction,
    hooks: Vec<ScheduledHook<'a>>,
    progress: bool,
}

impl<'a> Engine<'a> {
    pub fn new(model: Box<dyn ScoringModel>, optimizer: SgdOptimizer, step: StepFunction) -> Self {
        Self {
            model,
            optimizer,
            step,
            hooks: Vec::new(),
            progress: false,
        }
    }

    /// Print an in-place epoch counter to stdout during the run
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Register a hook firing on every epoch divisible by `every`
    pub fn on_epoch<F>(&mut self, every: usize, hook: F)
    where
        F: FnMut(&mut EpochContext<'_>) -> Result<()> + 'a,
    {
        assert!(every >= 1, "hook interval must be at least one epoch");
        self.hooks.push(ScheduledHook {
            every,
            hook: Box::new(hook),
        });
    }

    pub fn model(&self) -> &dyn ScoringModel {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Box<dyn ScoringModel> {
        self.model
    }

    /// Run `iterations` epochs, pulling one fresh pass of batches per epoch
    pub fn run<B, I>(&mut self, iterations: usize, batch_fn: B) -> Result<EngineRun>
    where
        B: Fn() -> I,
        I: IntoIterator<Item = Batch>,
    {
        let mut final_loss = 0.0;
        for epoch in 1..=iterations {
            if self.progress {
                print!("\repoch {epoch}/{iterations}");
                let _ = std::io::stdout().flush();
            }

            let mut epoch_loss = 0.0;
            let mut batches = 0usize;
            for batch in batch_fn() {
                epoch_loss +=
                    self.step
                        .train_step(self.model.as_mut(), &mut self.optimizer, &batch)?;
                batches += 1;
            }
            final_loss = epoch_loss / batches.max(1) as f32;

            for scheduled in &mut self.hooks {
                if epoch % scheduled.every == 0 {
                    let mut ctx = EpochContext {
                        model: self.model.as_mut(),
                        optimizer: &mut self.optimizer,
                        epoch,
                    };
                    (scheduled.hook)(&mut ctx)?;
                }
            }
        }
        if self.progress && iterations > 0 {
            println!();
        }
        Ok(EngineRun {
            epochs: iterations,
            final_loss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GridSource, SyntheticGridSource};
    use crate::model::{GridDims, GridScorer, ModelVariant};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;

    fn engine_fixture<'a>(dims: GridDims) -> Engine<'a> {
        let mut rng = StdRng::seed_from_u64(17);
        let model = GridScorer::new(ModelVariant::PoseAndAffinity, dims, &mut rng);
        let optimizer = SgdOptimizer::new(0.01, 0.9, 0.001);
        let step = StepFunction::for_variant(ModelVariant::PoseAndAffinity);
        Engine::new(Box::new(model), optimizer, step)
    }

    #[test]
    fn test_hooks_fire_on_schedule() {
        let dims = GridDims::new(2, 2);
        let source = SyntheticGridSource::random(dims, 4, 2, true, 17);
        let fired = RefCell::new(Vec::new());

        let mut engine = engine_fixture(dims);
        engine.on_epoch(2, |ctx| {
            fired.borrow_mut().push(ctx.epoch);
            Ok(())
        });
        let run = engine.run(5, || source.batches()).unwrap();

        assert_eq!(run.epochs, 5);
        assert_eq!(*fired.borrow(), vec![2, 4]);
    }

    #[test]
    fn test_hooks_fire_in_registration_order() {
        let dims = GridDims::new(2, 2);
        let source = SyntheticGridSource::random(dims, 2, 2, true, 17);
        let order = RefCell::new(Vec::new());

        let mut engine = engine_fixture(dims);
        engine.on_epoch(1, |_| {
            order.borrow_mut().push("first");
            Ok(())
        });
        engine.on_epoch(1, |_| {
            order.borrow_mut().push("second");
            Ok(())
        });
        engine.run(1, || source.batches()).unwrap();

        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_training_reduces_loss_on_fixed_data() {
        let dims = GridDims::new(2, 2);
        let source = SyntheticGridSource::random(dims, 8, 8, true, 23);

        let mut engine = engine_fixture(dims);
        let first = engine.run(1, || source.batches()).unwrap();
        let later = engine.run(30, || source.batches()).unwrap();

        assert!(later.final_loss < first.final_loss);
    }

    #[test]
    fn test_hook_error_aborts_run() {
        let dims = GridDims::new(2, 2);
        let source = SyntheticGridSource::random(dims, 2, 2, true, 17);

        let mut engine = engine_fixture(dims);
        engine.on_epoch(1, |_| {
            Err(crate::Error::Serialization("hook failed".to_string()))
        });
        assert!(engine.run(3, || source.batches()).is_err());
    }

    #[test]
    #[should_panic(expected = "hook interval must be at least one epoch")]
    fn test_zero_interval_rejected() {
        let mut engine = engine_fixture(GridDims::new(1, 2));
        engine.on_epoch(0, |_| Ok(()));
    }
}
