//! Subprocess runner - executes a step as a local process

use crate::core::{StepOutputs, Value};
use crate::runner::{RunnerConfig, RunnerError, StepRequest, StepRunner};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs each step as a child process
///
/// The process gets the request as JSON on stdin and as `MLPIPE_*`
/// environment variables. Its stdout must be empty or a JSON object whose
/// values are strings or integers; that object becomes the step's outputs.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    config: RunnerConfig,
}

impl SubprocessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Program and arguments for the request
    fn command_line(&self, request: &StepRequest) -> Result<(String, Vec<String>), RunnerError> {
        if let Some((program, args)) = request.target.command.split_first() {
            return Ok((program.clone(), args.to_vec()));
        }
        match &self.config.program {
            Some(program) => Ok((program.clone(), self.config.args.clone())),
            None => Err(RunnerError::NotConfigured(request.step_name.clone())),
        }
    }

    fn environment(request: &StepRequest) -> Vec<(String, String)> {
        let mut vars = vec![
            ("MLPIPE_EXECUTION_ID".to_string(), request.execution_id.to_string()),
            ("MLPIPE_PIPELINE".to_string(), request.pipeline_name.clone()),
            ("MLPIPE_STEP".to_string(), request.step_name.clone()),
            ("MLPIPE_KIND".to_string(), request.kind.to_string()),
        ];

        let optional = [
            ("MLPIPE_REGION", request.environment.region.clone()),
            ("MLPIPE_ROLE", request.environment.role.clone()),
            ("MLPIPE_BUCKET", request.environment.bucket.clone()),
            ("MLPIPE_IMAGE_URI", request.target.image_uri.clone()),
            ("MLPIPE_INSTANCE_TYPE", request.target.instance_type.as_ref().map(Value::to_string)),
            ("MLPIPE_INSTANCE_COUNT", request.target.instance_count.as_ref().map(Value::to_string)),
        ];
        vars.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key.to_string(), v))),
        );

        for (name, value) in &request.inputs {
            let key = format!("MLPIPE_INPUT_{}", env_key(name));
            vars.push((key, value.to_string()));
        }
        vars
    }

    /// Parse the process's stdout into step outputs
    pub fn parse_outputs(stdout: &str) -> Result<StepOutputs, RunnerError> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(StepOutputs::new());
        }
        serde_json::from_str(trimmed).map_err(|e| RunnerError::InvalidOutput(e.to_string()))
    }
}

fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

#[async_trait]
impl StepRunner for SubprocessRunner {
    async fn run(&self, request: &StepRequest) -> Result<StepOutputs, RunnerError> {
        let (program, args) = self.command_line(request)?;
        let timeout_secs = request.target.timeout_secs.unwrap_or(self.config.timeout_secs);
        let payload = serde_json::to_vec(request)
            .map_err(|e| RunnerError::Internal(format!("failed to encode request: {}", e)))?;

        debug!("Spawning {} for step {}", program, request.step_name);

        let mut child = Command::new(&program)
            .args(&args)
            .envs(Self::environment(request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Spawn(format!("{}: {}", program, e)))?;

        // Feed stdin while collecting output so neither pipe can fill up and stall
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A step that ignores stdin may exit before reading it
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!("Step {} did not read its request: {}", request.step_name, e);
                }
            }
        };
        let io = async move {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let output = timeout(Duration::from_secs(timeout_secs), io)
            .await
            .map_err(|_| RunnerError::Timeout(timeout_secs))?
            .map_err(|e| RunnerError::Internal(format!("failed to wait for {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            warn!("Step {} exited with code {}: {}", request.step_name, code, stderr.trim());
            return Err(RunnerError::Exit {
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| RunnerError::InvalidOutput(format!("not UTF-8: {}", e)))?;
        debug!("Step {} returned {} bytes of output", request.step_name, stdout.len());

        Self::parse_outputs(&stdout)
    }
}
