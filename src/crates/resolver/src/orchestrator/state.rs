use std::fmt;

/// Where a step is in its run.
///
/// `Pending -> Resolving -> Executing -> Synthesizing -> Completed`, or
/// `Failed` from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    Pending(usize),
    Resolving(usize),
    Executing(usize),
    Synthesizing(usize),
    Completed(usize),
    Failed { index: usize, reason: String },
}

impl StepState {
    pub fn index(&self) -> usize {
        match self {
            StepState::Pending(i)
            | StepState::Resolving(i)
            | StepState::Executing(i)
            | StepState::Synthesizing(i)
            | StepState::Completed(i) => *i,
            StepState::Failed { index, .. } => *index,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StepState::Pending(_) => "pending",
            StepState::Resolving(_) => "resolving",
            StepState::Executing(_) => "executing",
            StepState::Synthesizing(_) => "synthesizing",
            StepState::Completed(_) => "completed",
            StepState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Completed(_) | StepState::Failed { .. })
    }

    /// Failure from this state.
    pub fn fail(&self, reason: impl Into<String>) -> StepState {
        StepState::Failed {
            index: self.index(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepState::Failed { index, reason } => write!(f, "failed({}): {}", index, reason),
            other => write!(f, "{}({})", other.name(), other.index()),
        }
    }
}
