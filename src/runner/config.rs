//! Runner configuration

/// Configuration for the subprocess runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Program used for steps that do not set `target.command`
    ///
    /// Receives the step request as JSON on stdin and must print a JSON
    /// object of outputs on stdout.
    pub program: Option<String>,

    /// Extra arguments passed to `program`
    pub args: Vec<String>,

    /// Default timeout for a step in seconds
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout_secs: 86400,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
