// ============================================================
// Layer 3: ParamGroup
// ============================================================
// The optimizer's mutable hyper-parameter field. The learner
// owns it; a schedule receives `&mut ParamGroup` for the
// duration of its `step()` call and nothing else can write it.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamGroup {
    /// Learning rate the next optimizer step will use
    pub lr: f64,

    /// First-moment coefficient, when the schedule drives one
    pub momentum: Option<f64>,
}

impl ParamGroup {
    pub fn new(lr: f64) -> Self {
        Self { lr, momentum: None }
    }
}
