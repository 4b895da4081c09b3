//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    core::{
        Execution, ParameterOverrides, Pipeline, PipelineError, ResolutionContext, RunStatus,
        StepDescriptor, StepKind, StepOutputs, StepState,
    },
    execution::{ExecutionScheduler, SchedulingStrategy, StepExecutor},
    runner::{ArtifactRegistry, StepRequest, StepRunner},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        step: String,
        kind: StepKind,
    },
    StepSucceeded {
        step: String,
        outputs: StepOutputs,
    },
    StepFailed {
        step: String,
        error: PipelineError,
    },
    /// Step was never started because of an upstream failure or an aborted run
    StepSkipped {
        step: String,
        reason: String,
    },
    RunFinished {
        execution_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

type StepResult = (String, Result<StepOutputs, PipelineError>);

/// Main pipeline execution engine
pub struct ExecutionEngine<R, G> {
    scheduler: ExecutionScheduler,
    executor: Arc<StepExecutor<R, G>>,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl<R, G> ExecutionEngine<R, G>
where
    R: StepRunner + 'static,
    G: ArtifactRegistry + 'static,
{
    pub fn new(runner: R, registry: G, strategy: SchedulingStrategy) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            executor: Arc::new(StepExecutor::new(runner, registry)),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Run the pipeline against launch-time parameter overrides
    ///
    /// Parameter and graph errors are returned before anything runs. Step
    /// failures and timeouts are recorded in the returned [`Execution`],
    /// whose status is then [`RunStatus::Failed`].
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        overrides: &ParameterOverrides,
    ) -> Result<Execution, PipelineError> {
        let parameters = pipeline.parameters.resolve_all(overrides)?;
        pipeline.graph().topological_order()?;

        let mut execution = Execution::new(pipeline);
        let mut context = ResolutionContext::new(parameters);

        info!(
            "Starting pipeline run: {} ({})",
            pipeline.name, execution.execution_id
        );
        execution.start();
        self.emit_event(ExecutionEvent::RunStarted {
            execution_id: execution.execution_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: pipeline.steps().len(),
        })
        .await;

        // A limit past the clock's range means no deadline
        let deadline = pipeline.settings.timeout_secs.and_then(|secs| {
            Instant::now()
                .checked_add(Duration::from_secs(secs))
                .map(|at| (secs, at))
        });
        let mut in_flight: JoinSet<StepResult> = JoinSet::new();
        let mut halted = false;

        loop {
            if let Some((secs, at)) = deadline {
                if Instant::now() >= at {
                    in_flight.shutdown().await;
                    self.time_out(&mut execution, secs).await;
                    break;
                }
            }

            if !halted {
                for name in self.scheduler.next_steps(pipeline, &execution, in_flight.len()) {
                    let Some(step) = pipeline.step(&name) else {
                        continue;
                    };
                    execution.mark_running(&name);
                    self.emit_event(ExecutionEvent::StepStarted {
                        step: name.clone(),
                        kind: step.kind,
                    })
                    .await;

                    match build_request(pipeline, &execution, &context, step) {
                        Ok(request) => {
                            let executor = Arc::clone(&self.executor);
                            let declared = step.outputs.clone();
                            in_flight.spawn(async move {
                                let result = executor.execute(request, &declared).await;
                                (name, result)
                            });
                        }
                        Err(e) => {
                            if self.record_failure(pipeline, &mut execution, &name, e).await {
                                halted = true;
                                break;
                            }
                        }
                    }
                }
            }

            if in_flight.is_empty() {
                if !halted && !ExecutionScheduler::ready_steps(pipeline, &execution).is_empty() {
                    continue;
                }
                break;
            }

            let joined = match deadline {
                Some((secs, at)) => match tokio::time::timeout_at(at, in_flight.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        in_flight.shutdown().await;
                        self.time_out(&mut execution, secs).await;
                        break;
                    }
                },
                None => in_flight.join_next().await,
            };

            match joined {
                Some(Ok((name, Ok(outputs)))) => {
                    info!("Step {} succeeded", name);
                    context.set_step_outputs(&name, outputs.clone());
                    execution.mark_succeeded(&name, outputs.clone());
                    self.emit_event(ExecutionEvent::StepSucceeded {
                        step: name,
                        outputs,
                    })
                    .await;
                }
                Some(Ok((name, Err(e)))) => {
                    halted |= self.record_failure(pipeline, &mut execution, &name, e).await;
                }
                Some(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Some(Err(e)) => warn!("Step task ended unexpectedly: {}", e),
                None => {}
            }
        }

        self.report_skipped(&execution, halted).await;
        execution.finish();

        info!(
            "Pipeline run finished: {} - {:?}",
            pipeline.name, execution.status
        );
        self.emit_event(ExecutionEvent::RunFinished {
            execution_id: execution.execution_id,
            status: execution.status,
        })
        .await;

        Ok(execution)
    }

    /// Record a step failure; returns true when the run must stop scheduling
    async fn record_failure(
        &self,
        pipeline: &Pipeline,
        execution: &mut Execution,
        step: &str,
        error: PipelineError,
    ) -> bool {
        error!("{}", error);
        execution.mark_failed(step, error.clone());
        self.emit_event(ExecutionEvent::StepFailed {
            step: step.to_string(),
            error,
        })
        .await;

        if pipeline.settings.continue_on_failure {
            let blocked = pipeline.graph().descendants(step);
            if !blocked.is_empty() {
                info!(
                    "Continuing independent steps; {} step(s) downstream of {} will not run",
                    blocked.len(),
                    step
                );
            }
            false
        } else {
            warn!("Step {} failed, no further steps will be started", step);
            true
        }
    }

    /// Fail every unfinished step after the run deadline passes
    async fn time_out(&self, execution: &mut Execution, secs: u64) {
        error!("Run exceeded its {}s timeout", secs);
        let unfinished: Vec<String> = execution
            .steps_where(|s| !s.is_terminal())
            .into_iter()
            .map(String::from)
            .collect();

        for step in unfinished {
            execution.mark_failed(&step, PipelineError::Timeout(secs));
            self.emit_event(ExecutionEvent::StepFailed {
                step,
                error: PipelineError::Timeout(secs),
            })
            .await;
        }
        execution.error = Some(PipelineError::Timeout(secs));
    }

    async fn report_skipped(&self, execution: &Execution, halted: bool) {
        let reason = if halted {
            "run aborted after a step failure"
        } else {
            "an upstream step failed"
        };
        for step in execution.steps_where(|s| matches!(s, StepState::Pending)) {
            self.emit_event(ExecutionEvent::StepSkipped {
                step: step.to_string(),
                reason: reason.to_string(),
            })
            .await;
        }
    }
}

/// Substitute parameters and upstream outputs into a step's request
fn build_request(
    pipeline: &Pipeline,
    execution: &Execution,
    context: &ResolutionContext,
    step: &StepDescriptor,
) -> Result<StepRequest, PipelineError> {
    Ok(StepRequest {
        execution_id: execution.execution_id,
        pipeline_name: pipeline.name.clone(),
        step_name: step.name.clone(),
        kind: step.kind,
        inputs: context.resolve_inputs(step)?,
        target: context.resolve_target(&step.name, &step.target)?,
        environment: pipeline.environment.clone(),
    })
}
