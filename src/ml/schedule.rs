// ============================================================
// Layer 5: Learning-Rate Schedule
// ============================================================
// One-cycle schedule over `n_iter` optimizer steps:
//
//   phase 1 (warmup, 30%):  lr/25  ──linear──▶  lr
//   phase 2 (rest):         lr     ──cosine──▶  lr/25/1e4
//
// Optional momentum runs the opposite way (0.95 → 0.85 → 0.95).
// When the last phase is exhausted the cycle restarts.
//
// Each call to `step()` advances one iteration and writes the
// new values into the optimizer's ParamGroup.

use std::{f64::consts::PI, str::FromStr};

use crate::domain::error::TrainError;
use crate::domain::param_group::ParamGroup;
use crate::domain::traits::Schedule;

pub const DIVIDER: f64 = 25.0;
pub const WARMUP_PROPORTION: f64 = 0.3;
pub const FINAL_DIVIDER: f64 = 1e4;

/// Named schedule policies accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    Cycle,
}

impl FromStr for SchedulePolicy {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cycle" => Ok(SchedulePolicy::Cycle),
            other   => Err(TrainError::Config(format!(
                "unknown schedule '{other}' (expected 'cycle')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anneal {
    Linear,
    Cos,
}

impl Anneal {
    fn at(self, start: f64, end: f64, proportion: f64) -> f64 {
        match self {
            Anneal::Linear => start + proportion * (end - start),
            Anneal::Cos    => end + (start - end) / 2.0 * ((PI * proportion).cos() + 1.0),
        }
    }
}

#[derive(Debug, Clone)]
struct Phase {
    start:  f64,
    end:    f64,
    n_iter: usize,
    anneal: Anneal,
    n:      usize,
}

impl Phase {
    fn new(start: f64, end: f64, n_iter: usize, anneal: Anneal) -> Self {
        Self { start, end, n_iter, anneal, n: 0 }
    }

    fn step(&mut self) -> f64 {
        self.n += 1;
        let proportion = if self.n_iter == 0 {
            1.0
        } else {
            (self.n as f64 / self.n_iter as f64).min(1.0)
        };
        self.anneal.at(self.start, self.end, proportion)
    }

    fn is_done(&self) -> bool {
        self.n >= self.n_iter
    }

    fn reset(&mut self) {
        self.n = 0;
    }
}

#[derive(Debug, Clone)]
pub struct CycleScheduler {
    lr_phases:       Vec<Phase>,
    momentum_phases: Option<Vec<Phase>>,
    phase:           usize,
}

impl CycleScheduler {
    pub fn new(lr_max: f64, n_iter: usize) -> Self {
        Self::with_options(lr_max, n_iter, None, WARMUP_PROPORTION)
    }

    pub fn with_options(
        lr_max:            f64,
        n_iter:            usize,
        momentum:          Option<(f64, f64)>,
        warmup_proportion: f64,
    ) -> Self {
        let phase1 = (n_iter as f64 * warmup_proportion.clamp(0.0, 1.0)) as usize;
        let phase2 = n_iter.saturating_sub(phase1);
        let lr_min = lr_max / DIVIDER;

        let lr_phases = vec![
            Phase::new(lr_min, lr_max, phase1, Anneal::Linear),
            Phase::new(lr_max, lr_min / FINAL_DIVIDER, phase2, Anneal::Cos),
        ];
        let momentum_phases = momentum.map(|(m1, m2)| {
            vec![
                Phase::new(m1, m2, phase1, Anneal::Linear),
                Phase::new(m2, m1, phase2, Anneal::Cos),
            ]
        });

        Self { lr_phases, momentum_phases, phase: 0 }
    }

    /// Skip `steps` iterations, e.g. the ones an interrupted run
    /// already performed before being resumed.
    pub fn advance(&mut self, steps: usize) {
        let mut scratch = ParamGroup::new(0.0);
        for _ in 0..steps {
            self.step(&mut scratch);
        }
    }

    /// Advance one iteration and return (lr, momentum).
    pub fn next_values(&mut self) -> (f64, Option<f64>) {
        // A zero-length first phase contributes nothing.
        while self.phase < self.lr_phases.len() - 1 && self.lr_phases[self.phase].n_iter == 0 {
            self.phase += 1;
        }

        let lr = self.lr_phases[self.phase].step();
        let momentum = self
            .momentum_phases
            .as_mut()
            .map(|phases| phases[self.phase].step());

        if self.lr_phases[self.phase].is_done() {
            self.phase += 1;
        }
        if self.phase >= self.lr_phases.len() {
            self.lr_phases.iter_mut().for_each(Phase::reset);
            if let Some(phases) = self.momentum_phases.as_mut() {
                phases.iter_mut().for_each(Phase::reset);
            }
            self.phase = 0;
        }

        (lr, momentum)
    }
}

impl Schedule for CycleScheduler {
    fn step(&mut self, group: &mut ParamGroup) {
        let (lr, momentum) = self.next_values();
        group.lr = lr;
        if momentum.is_some() {
            group.momentum = momentum;
        }
    }
}
