use anyhow::{Context, Result};
use mlpipe::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use mlpipe::cli::output::*;
use mlpipe::cli::{log_filter, Cli, Command};
use mlpipe::core::{load_overrides, ParameterOverrides, PipelineConfig, PipelineError, RunStatus};
use mlpipe::execution::{ExecutionEngine, ExecutionEvent};
use mlpipe::persistence::{create_summary, HistoryBackend, InMemoryHistory, RunSummary};
use mlpipe::runner::{InMemoryRegistry, RunnerConfig, SubprocessRunner};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(cli.verbose, std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// Report a pipeline error and exit with its code
fn fail(error: &PipelineError) -> ! {
    println!("{} {}", CROSS, style(error).red());
    std::process::exit(error.exit_code());
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn HistoryBackend>> {
    Ok(Arc::new(
        mlpipe::persistence::SqliteHistoryStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn HistoryBackend>> {
    warn!("Built without sqlite support; run history is not persisted");
    Ok(Arc::new(InMemoryHistory::new()))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).unwrap_or_else(|e| fail(&e));
    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let mut pipeline = config.to_pipeline().unwrap_or_else(|e| fail(&e));
    if cmd.continue_on_failure {
        pipeline.settings.continue_on_failure = true;
    }
    if let Some(secs) = cmd.timeout_secs {
        pipeline.settings.timeout_secs = Some(secs);
    }

    let from_file = match &cmd.overrides {
        Some(path) => load_overrides(path).unwrap_or_else(|e| fail(&e)),
        None => ParameterOverrides::new(),
    };
    // Bad values are reported together when the run resolves its parameters
    let mut overrides = pipeline.parameters.coerce_values(from_file);
    overrides.extend(pipeline.parameters.coerce_overrides(&cmd.param));

    let mut names: Vec<&String> = overrides.keys().collect();
    names.sort();
    for name in names {
        println!(
            "{} Parameter override: {} = {}",
            INFO,
            style(name).cyan(),
            style(&overrides[name]).dim()
        );
    }

    let store: Arc<dyn HistoryBackend> = if cmd.no_history {
        Arc::new(InMemoryHistory::new())
    } else {
        open_history().await?
    };

    let strategy = cmd.scheduling_strategy(config.strategy());
    if cmd.ignores_max_concurrency(strategy) {
        warn!("--max-concurrency has no effect with the {:?} strategy", strategy);
    }
    let mut runner_config = RunnerConfig::new();
    if let Some(program) = &cmd.runner {
        runner_config = runner_config.with_program(program);
    }
    let runner = SubprocessRunner::new(runner_config);
    let engine = ExecutionEngine::new(runner, InMemoryRegistry::new(), strategy);

    let progress = create_progress_bar(pipeline.steps().len());
    let bar = progress.clone();
    engine
        .add_event_handler(move |event| {
            bar.println(format_execution_event(&event));
            match event {
                ExecutionEvent::StepSucceeded { .. } | ExecutionEvent::StepFailed { .. } => {
                    bar.inc(1)
                }
                ExecutionEvent::StepStarted { step, .. } => bar.set_message(step),
                ExecutionEvent::RunFinished { .. } => bar.finish_and_clear(),
                _ => {}
            }
        })
        .await;

    println!();
    let execution = match engine.run(&pipeline, &overrides).await {
        Ok(execution) => execution,
        Err(e) => {
            progress.finish_and_clear();
            fail(&e)
        }
    };

    println!("\n{} Step results:", INFO);
    for line in format_step_report(&execution) {
        println!("{}", line);
    }

    if !cmd.no_history {
        let summary = create_summary(&execution);
        store.save_run(&summary).await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(summary.execution_id).dim()
        );
    }

    if execution.status == RunStatus::Succeeded {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green()
        );
        Ok(())
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&pipeline.name).bold(),
            style("failed").red()
        );
        let code = match execution.primary_error() {
            Some(e) => {
                error!("{}", e);
                e.exit_code()
            }
            None => 1,
        };
        std::process::exit(code);
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let pipeline = PipelineConfig::from_file(&cmd.file)
        .and_then(|config| config.to_pipeline())
        .unwrap_or_else(|e| {
            println!("{} Validation failed:", CROSS);
            fail(&e)
        });

    println!("{} Pipeline definition is valid!", CHECK);
    println!("  Name: {}", style(&pipeline.name).bold());
    println!("  Steps: {}", style(pipeline.steps().len()).cyan());
    println!("  Parameters: {}", style(pipeline.parameters.len()).cyan());
    println!("  Execution order:");
    for (position, name) in pipeline.execution_order().iter().enumerate() {
        let dependencies = pipeline.graph().dependencies(name);
        if dependencies.is_empty() {
            println!("    {}. {}", position + 1, style(name).bold());
        } else {
            println!(
                "    {}. {} {}",
                position + 1,
                style(name).bold(),
                style(format!("(after {})", dependencies.join(", "))).dim()
            );
        }
    }

    if cmd.json {
        let parameters: Vec<_> = pipeline.parameters.iter().collect();
        let data = serde_json::json!({
            "name": pipeline.name,
            "parameters": parameters,
            "execution_order": pipeline.execution_order(),
            "steps": pipeline.steps(),
        });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = open_history().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    let mut json_data = Vec::new();
    if !cmd.json {
        println!("{} Pipelines in history:", INFO);
    }

    for pipeline_name in &pipelines {
        let runs = store.list_runs(pipeline_name).await?;
        let succeeded = runs.iter().filter(|r| r.status == RunStatus::Succeeded).count();
        let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();

        if cmd.json {
            json_data.push(serde_json::json!({
                "name": pipeline_name,
                "run_count": runs.len(),
                "succeeded": succeeded,
                "failed": failed,
            }));
        } else if cmd.with_counts {
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    if let Some(id) = &cmd.execution_id {
        let execution_id = uuid::Uuid::parse_str(id).context("Invalid execution ID format")?;
        match store.load_run(execution_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_run_details(&summary),
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut runs = match &cmd.pipeline {
        Some(pipeline_name) => store.list_runs(pipeline_name).await?,
        None => {
            let mut all_runs = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all_runs.extend(store.list_runs(&pipeline).await?);
            }
            all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all_runs
        }
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, runs.len());
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Steps: {} succeeded, {} failed, {} total",
        style(summary.succeeded_steps).green(),
        style(summary.failed_steps).red(),
        summary.total_steps
    );
    if let Some(error) = &summary.error {
        println!("  Error: {}", style(error).red());
    }
}
