// Test doubles for the domain traits, shared by the sampler and
// training-loop tests. Compiled only under `cfg(test)`.

use std::{
    cell::{Cell, RefCell},
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::domain::error::{TrainError, TrainResult};
use crate::domain::image::ImageStack;
use crate::domain::param_group::ParamGroup;
use crate::domain::progress::{EpochSummary, StepProgress};
use crate::domain::sample::SampleArtifact;
use crate::domain::traits::{
    BatchSource, GridWriter, Learner, Mode, Persistable, ProgressReporter, Schedule, StepLosses,
    TrainBatch,
};
use crate::ml::trainer::StopFlag;

pub type EventLog = Rc<RefCell<Vec<&'static str>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct FakeBatch {
    pub n: usize,
}

impl TrainBatch for FakeBatch {
    fn size(&self) -> usize {
        self.n
    }

    fn head(&self, n: usize) -> Self {
        FakeBatch { n: n.min(self.n) }
    }
}

/// A learner whose "weights" are a single counter bumped by every
/// optimizer step. Reconstruction losses come from a script.
pub struct FakeLearner {
    pub group:            ParamGroup,
    pub mode:             Mode,
    pub recon_script:     Vec<f64>,
    pub latent:           f64,
    pub nan_at_call:      Option<usize>,
    pub fail_reconstruct: bool,
    pub calls:            usize,
    pub pending:          bool,
    pub applied_lrs:      Vec<f64>,
    pub weights:          u64,
    pub reconstructions:  Cell<usize>,
    pub events:           EventLog,
}

impl Default for FakeLearner {
    fn default() -> Self {
        Self {
            group:            ParamGroup::new(1e-3),
            mode:             Mode::Train,
            recon_script:     vec![0.5],
            latent:           0.25,
            nan_at_call:      None,
            fail_reconstruct: false,
            calls:            0,
            pending:          false,
            applied_lrs:      Vec::new(),
            weights:          0,
            reconstructions:  Cell::new(0),
            events:           EventLog::default(),
        }
    }
}

impl Learner for FakeLearner {
    type Batch = FakeBatch;

    fn zero_grad(&mut self) {
        self.events.borrow_mut().push("zero_grad");
        self.pending = false;
    }

    fn forward_backward(&mut self, _batch: &FakeBatch) -> TrainResult<StepLosses> {
        self.events.borrow_mut().push("forward_backward");
        if self.mode != Mode::Train {
            return Err(TrainError::Model("fake: backward in eval mode".into()));
        }
        let recon = if self.nan_at_call == Some(self.calls) {
            f64::NAN
        } else {
            self.recon_script[self.calls % self.recon_script.len()]
        };
        self.calls += 1;
        self.pending = true;
        Ok(StepLosses { recon, latent: self.latent })
    }

    fn optimizer_step(&mut self) -> TrainResult<()> {
        self.events.borrow_mut().push("optimizer_step");
        if !self.pending {
            return Err(TrainError::Model("fake: no gradients".into()));
        }
        self.applied_lrs.push(self.group.lr);
        self.weights += 1;
        self.pending = false;
        Ok(())
    }

    fn param_group(&self) -> &ParamGroup {
        &self.group
    }

    fn param_group_mut(&mut self) -> &mut ParamGroup {
        &mut self.group
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn reconstruct(&self, batch: &FakeBatch) -> TrainResult<(ImageStack, ImageStack)> {
        if self.mode != Mode::Eval {
            return Err(TrainError::Model("fake: reconstruct in train mode".into()));
        }
        if self.fail_reconstruct {
            return Err(TrainError::Model("fake: forward failed".into()));
        }
        self.reconstructions.set(self.reconstructions.get() + 1);
        let shape = [batch.n, 1, 2, 2];
        let stack = ImageStack::new(shape, vec![0.0; batch.n * 4])?;
        Ok((stack.clone(), stack))
    }
}

impl Persistable for FakeLearner {
    fn save(&self, path: &Path) -> TrainResult<()> {
        fs::write(path, self.weights.to_string())?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> TrainResult<()> {
        let text = fs::read_to_string(path)?;
        self.weights = text
            .trim()
            .parse()
            .map_err(|e| TrainError::Model(format!("fake: {e}")))?;
        Ok(())
    }
}

/// Sets lr = call_index · 0.001 on every step.
pub struct ScriptedSchedule {
    pub calls:  usize,
    pub events: EventLog,
}

impl Schedule for ScriptedSchedule {
    fn step(&mut self, group: &mut ParamGroup) {
        self.events.borrow_mut().push("schedule");
        group.lr = self.calls as f64 * 0.001;
        self.calls += 1;
    }
}

/// One fake batch per entry of `sizes`; `fail_at` turns that batch
/// into a DataError.
#[derive(Default)]
pub struct VecSource {
    pub sizes:   Vec<usize>,
    pub fail_at: Option<usize>,
}

impl VecSource {
    pub fn new(sizes: Vec<usize>) -> Self {
        Self { sizes, fail_at: None }
    }
}

impl BatchSource<FakeBatch> for VecSource {
    fn batches(&self) -> Box<dyn Iterator<Item = TrainResult<FakeBatch>> + '_> {
        let fail_at = self.fail_at;
        Box::new(self.sizes.iter().enumerate().map(move |(i, &n)| {
            if Some(i) == fail_at {
                Err(TrainError::Data(format!("fake: batch {i} unreadable")))
            } else {
                Ok(FakeBatch { n })
            }
        }))
    }

    fn batches_per_epoch(&self) -> usize {
        self.sizes.len()
    }
}

#[derive(Default, Clone)]
pub struct Recorded {
    pub steps:  Rc<RefCell<Vec<StepProgress>>>,
    pub epochs: Rc<RefCell<Vec<EpochSummary>>>,
}

/// Records everything and optionally requests a stop at a given
/// (epoch, step) or at the end of a given epoch.
#[derive(Default)]
pub struct RecordingReporter {
    pub rec:              Recorded,
    pub stop:             StopFlag,
    pub stop_at_step:     Option<(usize, usize)>,
    pub stop_after_epoch: Option<usize>,
}

impl ProgressReporter for RecordingReporter {
    fn observe(&mut self, progress: &StepProgress) {
        self.rec.steps.borrow_mut().push(progress.clone());
        if self.stop_at_step == Some((progress.epoch, progress.step)) {
            self.stop.request_stop();
        }
    }

    fn epoch_finished(&mut self, summary: &EpochSummary) {
        self.rec.epochs.borrow_mut().push(summary.clone());
        if self.stop_after_epoch == Some(summary.epoch) {
            self.stop.request_stop();
        }
    }
}

/// Remembers (epoch, step, images) of every artifact it is given.
#[derive(Default, Clone)]
pub struct RecordingWriter {
    pub written: Rc<RefCell<Vec<(usize, usize, usize)>>>,
    pub fail:    bool,
}

impl GridWriter for RecordingWriter {
    fn write(&self, artifact: &SampleArtifact) -> TrainResult<PathBuf> {
        if self.fail {
            return Err(TrainError::Persistence {
                path:   PathBuf::from(artifact.file_name()),
                reason: "fake: disk full".into(),
            });
        }
        self.written
            .borrow_mut()
            .push((artifact.epoch, artifact.step, artifact.inputs.len()));
        Ok(PathBuf::from(artifact.file_name()))
    }
}
