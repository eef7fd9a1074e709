// ============================================================
// Layer 5: Sampler
// ============================================================
// Every `cadence` steps (epoch-relative) the loop asks the
// sampler for a qualitative snapshot: the first `sample_size`
// images of the current batch next to their reconstruction.
//
// The learner is switched to eval mode through an EvalGuard.
// Dropping the guard puts it back into train mode, so every
// exit path (including `?` on a failed forward pass) restores it.

use std::ops::Deref;

use crate::domain::error::TrainResult;
use crate::domain::sample::SampleArtifact;
use crate::domain::traits::{Learner, Mode, TrainBatch};

pub const SAMPLE_CADENCE: usize = 100;
pub const SAMPLE_SIZE: usize = 25;

/// Holds a learner in eval mode for as long as it lives.
pub struct EvalGuard<'a, L: Learner> {
    learner: &'a mut L,
}

impl<'a, L: Learner> EvalGuard<'a, L> {
    pub fn new(learner: &'a mut L) -> Self {
        learner.set_mode(Mode::Eval);
        Self { learner }
    }
}

impl<L: Learner> Deref for EvalGuard<'_, L> {
    type Target = L;

    fn deref(&self) -> &L {
        self.learner
    }
}

impl<L: Learner> Drop for EvalGuard<'_, L> {
    fn drop(&mut self) {
        self.learner.set_mode(Mode::Train);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    cadence:     usize,
    sample_size: usize,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(SAMPLE_CADENCE, SAMPLE_SIZE)
    }
}

impl Sampler {
    pub fn new(cadence: usize, sample_size: usize) -> Self {
        Self { cadence, sample_size }
    }

    pub fn should_sample(&self, step: usize) -> bool {
        self.cadence > 0 && step % self.cadence == 0
    }

    /// Returns `None` off-cadence, otherwise the snapshot for `step`.
    pub fn maybe_sample<L: Learner>(
        &self,
        epoch:   usize,
        step:    usize,
        batch:   &L::Batch,
        learner: &mut L,
    ) -> TrainResult<Option<SampleArtifact>> {
        if !self.should_sample(step) {
            return Ok(None);
        }

        let prefix = batch.head(self.sample_size);
        let guard = EvalGuard::new(learner);
        let (inputs, outputs) = guard.reconstruct(&prefix)?;

        Ok(Some(SampleArtifact::new(epoch, step, inputs, outputs)))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::fakes::{FakeBatch, FakeLearner};

    #[test]
    fn test_cadence_is_epoch_relative() {
        let s = Sampler::default();
        let hits: Vec<usize> = (0..250).filter(|&i| s.should_sample(i)).collect();
        assert_eq!(hits, vec![0, 100, 200]);
    }

    #[test]
    fn test_prefix_is_capped_at_sample_size() {
        let mut learner = FakeLearner::default();
        let s = Sampler::default();

        let big = s.maybe_sample(0, 0, &FakeBatch { n: 128 }, &mut learner).unwrap().unwrap();
        assert_eq!(big.inputs.len(), 25);
        assert_eq!(big.outputs.len(), 25);

        let small = s.maybe_sample(0, 100, &FakeBatch { n: 7 }, &mut learner).unwrap().unwrap();
        assert_eq!(small.inputs.len(), 7);

        assert!(s.maybe_sample(0, 42, &FakeBatch { n: 7 }, &mut learner).unwrap().is_none());
        assert_eq!(learner.reconstructions.get(), 2);
    }

    #[test]
    fn test_mode_restored_after_success_and_failure() {
        let mut learner = FakeLearner::default();
        let s = Sampler::default();

        s.maybe_sample(1, 0, &FakeBatch { n: 3 }, &mut learner).unwrap();
        assert_eq!(learner.mode(), Mode::Train);

        learner.fail_reconstruct = true;
        assert!(s.maybe_sample(1, 0, &FakeBatch { n: 3 }, &mut learner).is_err());
        assert_eq!(learner.mode(), Mode::Train);
    }

    #[test]
    fn test_guard_holds_eval_mode_while_alive() {
        let mut learner = FakeLearner::default();
        {
            let guard = EvalGuard::new(&mut learner);
            assert_eq!(guard.mode(), Mode::Eval);
        }
        assert_eq!(learner.mode(), Mode::Train);
    }
}
