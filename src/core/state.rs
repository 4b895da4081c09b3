//! Execution state models

use crate::core::{
    context::StepOutputs,
    error::PipelineError,
    pipeline::Pipeline,
    step::StepKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    NotStarted,
    /// Run is in progress
    Running,
    /// Every step succeeded
    Succeeded,
    /// At least one step failed, or the run timed out
    Failed,
}

/// State of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    /// Not started (yet, or ever)
    Pending,
    /// Step is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Step completed successfully
    Succeeded {
        outputs: StepOutputs,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step failed
    Failed {
        error: PipelineError,
        started_at: Option<DateTime<Utc>>,
        failed_at: DateTime<Utc>,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Succeeded { .. } | StepState::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepState::Pending => "Pending",
            StepState::Running { .. } => "Running",
            StepState::Succeeded { .. } => "Succeeded",
            StepState::Failed { .. } => "Failed",
        }
    }
}

/// One step's slot in the execution record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub kind: StepKind,
    pub state: StepState,
}

/// Record of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique execution ID
    pub execution_id: Uuid,

    pub pipeline_name: String,

    /// Current run status
    pub status: RunStatus,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Per-step state, in declaration order
    pub steps: Vec<StepRecord>,

    /// Steps in the order they reached a terminal state
    pub completion_order: Vec<String>,

    /// Run-level error (timeout, or a step failure that aborted the run)
    pub error: Option<PipelineError>,
}

impl Execution {
    /// Create an execution with every step pending
    pub fn new(pipeline: &Pipeline) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline_name: pipeline.name.clone(),
            status: RunStatus::NotStarted,
            started_at: None,
            completed_at: None,
            steps: pipeline
                .steps()
                .iter()
                .map(|s| StepRecord {
                    name: s.name.clone(),
                    kind: s.kind,
                    state: StepState::Pending,
                })
                .collect(),
            completion_order: Vec::new(),
            error: None,
        }
    }

    /// Mark the run as started
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Close the run: Succeeded only if every step succeeded
    pub fn finish(&mut self) {
        let all_succeeded = self
            .steps
            .iter()
            .all(|s| matches!(s.state, StepState::Succeeded { .. }));
        self.status = if all_succeeded && self.error.is_none() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn step_state(&self, name: &str) -> Option<&StepState> {
        self.steps.iter().find(|s| s.name == name).map(|s| &s.state)
    }

    fn slot(&mut self, name: &str) -> Option<&mut StepState> {
        self.steps
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| &mut s.state)
    }

    pub fn mark_running(&mut self, name: &str) {
        if let Some(state) = self.slot(name) {
            *state = StepState::Running {
                started_at: Utc::now(),
            };
        }
    }

    pub fn mark_succeeded(&mut self, name: &str, outputs: StepOutputs) {
        if let Some(state) = self.slot(name) {
            let started_at = match state {
                StepState::Running { started_at } => *started_at,
                _ => Utc::now(),
            };
            *state = StepState::Succeeded {
                outputs,
                started_at,
                completed_at: Utc::now(),
            };
            self.completion_order.push(name.to_string());
        }
    }

    pub fn mark_failed(&mut self, name: &str, error: PipelineError) {
        if let Some(state) = self.slot(name) {
            let started_at = match state {
                StepState::Running { started_at } => Some(*started_at),
                _ => None,
            };
            *state = StepState::Failed {
                error,
                started_at,
                failed_at: Utc::now(),
            };
            self.completion_order.push(name.to_string());
        }
    }

    /// Outputs of a succeeded step
    pub fn outputs(&self, name: &str) -> Option<&StepOutputs> {
        match self.step_state(name) {
            Some(StepState::Succeeded { outputs, .. }) => Some(outputs),
            _ => None,
        }
    }

    /// Names of steps currently in the given state
    pub fn steps_where(&self, predicate: impl Fn(&StepState) -> bool) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| predicate(&s.state))
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn succeeded_count(&self) -> usize {
        self.steps_where(|s| matches!(s, StepState::Succeeded { .. })).len()
    }

    pub fn failed_count(&self) -> usize {
        self.steps_where(|s| matches!(s, StepState::Failed { .. })).len()
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        (self.succeeded_count() + self.failed_count()) as f64 / self.steps.len() as f64
    }

    /// The error to surface for a failed run: the run-level error, else the first step failure
    pub fn primary_error(&self) -> Option<&PipelineError> {
        self.error.as_ref().or_else(|| {
            self.completion_order.iter().find_map(|name| match self.step_state(name) {
                Some(StepState::Failed { error, .. }) => Some(error),
                _ => None,
            })
        })
    }
}
