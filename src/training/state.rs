use std::fmt;

/// Why a run left the training loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    PatienceExhausted,
    EpochBudgetReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    Initialized,
    Training { epoch: usize },
    Converged(StopReason),
    Completed,
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingPhase::Initialized => f.write_str("initialized"),
            TrainingPhase::Training { epoch } => write!(f, "training (epoch {epoch})"),
            TrainingPhase::Converged(reason) => write!(f, "converged ({reason:?})"),
            TrainingPhase::Completed => f.write_str("completed"),
        }
    }
}

/// Tracks the lifecycle of one fit. Transitions only move forward.
#[derive(Debug)]
pub struct TrainingState {
    phase: TrainingPhase,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingState {
    pub fn new() -> Self {
        Self {
            phase: TrainingPhase::Initialized,
        }
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn begin_epoch(&mut self, epoch: usize) {
        debug_assert!(matches!(
            self.phase,
            TrainingPhase::Initialized | TrainingPhase::Training { .. }
        ));
        self.transition(TrainingPhase::Training { epoch });
    }

    pub fn converge(&mut self, reason: StopReason) {
        self.transition(TrainingPhase::Converged(reason));
    }

    pub fn complete(&mut self) {
        debug_assert!(matches!(self.phase, TrainingPhase::Converged(_)));
        self.transition(TrainingPhase::Completed);
    }

    fn transition(&mut self, next: TrainingPhase) {
        log::debug!("training state: {} -> {}", self.phase, next);
        self.phase = next;
    }
}
