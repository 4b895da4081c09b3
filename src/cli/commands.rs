//! CLI command definitions

use crate::execution::SchedulingStrategy;
use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// YAML file of parameter overrides (name: value)
    #[arg(short, long)]
    pub overrides: Option<String>,

    /// Parameter override (key=value); wins over the overrides file
    #[arg(long, value_parser = parse_key_value)]
    pub param: Vec<(String, String)>,

    /// Scheduling strategy (defaults to the definition's setting)
    #[arg(long, value_enum)]
    pub strategy: Option<SchedulingStrategyArg>,

    /// Concurrency cap; only applies when the strategy (from --strategy or the
    /// definition) is parallel-limited
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Keep running independent steps after a failure
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Run-level timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Program run for steps without a `target.command`
    #[arg(long)]
    pub runner: Option<String>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    /// Strategy from the command line, falling back to the definition's
    pub fn scheduling_strategy(&self, from_definition: SchedulingStrategy) -> SchedulingStrategy {
        match (self.strategy, self.max_concurrency) {
            (Some(SchedulingStrategyArg::ParallelLimited), max) => {
                SchedulingStrategy::LimitedParallel(max.unwrap_or(4).max(1))
            }
            (Some(arg), _) => arg.into(),
            (None, Some(max)) => match from_definition {
                SchedulingStrategy::LimitedParallel(_) => SchedulingStrategy::LimitedParallel(max.max(1)),
                other => other,
            },
            (None, None) => from_definition,
        }
    }

    /// True when `--max-concurrency` was given but the chosen strategy has no cap
    pub fn ignores_max_concurrency(&self, chosen: SchedulingStrategy) -> bool {
        self.max_concurrency.is_some() && !matches!(chosen, SchedulingStrategy::LimitedParallel(_))
    }
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List pipelines in history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[value(name = "parallel-limited")]
    ParallelLimited,
}

impl From<SchedulingStrategyArg> for SchedulingStrategy {
    fn from(arg: SchedulingStrategyArg) -> Self {
        match arg {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(4),
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
