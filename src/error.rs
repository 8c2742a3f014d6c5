use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogsError>;

#[derive(Debug, Error)]
pub enum LogsError {
    /// Mutually exclusive options were combined.
    #[error("{0}")]
    Configuration(String),

    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: &'static str, name: String },

    #[error("no taskruns found in namespace {namespace}")]
    NoRunsFound { namespace: String },

    #[error("{candidates} taskruns found but limit {limit} allows none to be selected, name one explicitly")]
    AmbiguousSelection { candidates: usize, limit: usize },

    #[error("pod for taskrun {0} not available yet")]
    PodNotAvailable(String),

    /// `message` is the text reported by the run, untouched.
    #[error("task {task} has failed: {message}")]
    ExecutionFailed {
        task: String,
        reason: String,
        message: String,
    },

    #[error("taskrun {0} has not started yet or pod for taskrun not yet available")]
    Timeout(String),

    #[error("failed to stream logs for step {container}: {message}")]
    Stream { container: String, message: String },

    #[error("watch on taskrun failed: {0}")]
    Watch(String),

    #[error("interrupted")]
    Cancelled,

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogsError {
    pub fn incompatible_flags() -> Self {
        LogsError::Configuration("option --all and option --step are not compatible".to_string())
    }
}
