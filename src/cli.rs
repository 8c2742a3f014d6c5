use crate::types::{DEFAULT_LIMIT, LogRequest, RunTarget};
use clap::Parser;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "kubectl-taskrun-logs")]
#[command(about = "Show the step logs of a Tekton TaskRun")]
pub struct Cli {
    /// TaskRun name (defaults to the most recent run)
    pub name: Option<String>,

    /// Namespace
    #[arg(short = 'n', long, default_value = "default")]
    pub namespace: String,

    /// Kubeconfig context
    #[arg(long)]
    pub context: Option<String>,

    /// Show logs of all steps, including init containers
    #[arg(short = 'a', long = "all")]
    pub all_steps: bool,

    /// Only show logs of the given step (repeatable)
    #[arg(short = 's', long = "step")]
    pub steps: Vec<String>,

    /// Stream logs live until the steps finish
    #[arg(short = 'f', long)]
    pub follow: bool,

    /// Pick the most recent run of this task
    #[arg(short = 't', long)]
    pub task: Option<String>,

    /// Maximum number of runs considered for the most recent one
    #[arg(short = 'L', long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Seconds to wait for the run's pod to appear
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Disable colored step prefixes
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn log_request(&self) -> LogRequest {
        let target = match &self.name {
            Some(name) => RunTarget::ByName(name.clone()),
            None => RunTarget::Latest,
        };
        LogRequest {
            task: self.task.clone(),
            all_steps: self.all_steps,
            follow: self.follow,
            steps: self.steps.clone(),
            limit: self.limit,
            timeout: Duration::from_secs(self.timeout),
            ..LogRequest::new(self.namespace.clone(), target)
        }
    }
}
