//! Execution scheduler - determines which steps to run next

use crate::core::{Execution, Pipeline, StepState};

/// Strategy for scheduling step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Execute steps in dependency order, one at a time
    #[default]
    Sequential,

    /// Execute all ready steps in parallel
    Parallel,

    /// Limited parallelism (max N concurrent steps)
    LimitedParallel(usize),
}

/// Scheduler for determining which steps to run
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Get the next batch of steps to start, given how many are running
    pub fn next_steps(&self, pipeline: &Pipeline, execution: &Execution, running: usize) -> Vec<String> {
        let capacity = match self.strategy {
            SchedulingStrategy::Sequential => 1usize.saturating_sub(running),
            SchedulingStrategy::Parallel => usize::MAX,
            SchedulingStrategy::LimitedParallel(max) => max.max(1).saturating_sub(running),
        };

        if capacity == 0 {
            return vec![];
        }

        Self::ready_steps(pipeline, execution)
            .into_iter()
            .take(capacity)
            .collect()
    }

    /// Pending steps whose dependencies have all succeeded, in execution order
    pub fn ready_steps(pipeline: &Pipeline, execution: &Execution) -> Vec<String> {
        pipeline
            .execution_order()
            .iter()
            .filter(|name| matches!(execution.step_state(name), Some(StepState::Pending)))
            .filter(|name| {
                pipeline.graph().dependencies(name).iter().all(|dep| {
                    matches!(execution.step_state(dep), Some(StepState::Succeeded { .. }))
                })
            })
            .cloned()
            .collect()
    }
}
