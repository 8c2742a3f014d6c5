use crate::types::{Condition, TaskRun};

/// Condition reasons after which a run never makes further progress.
///
/// Tekton's own `TaskRunReason` values, plus the container-level reasons the
/// controller copies onto the run when its pod cannot start.
const TERMINAL_FAILURE_REASONS: &[&str] = &[
    "Failed",
    "TaskRunCancelled",
    "TaskRunTimeout",
    "TaskRunImagePullFailed",
    "TaskRunResultLargerThanAllowedLimit",
    "TaskRunStopSidecarFailed",
    "TaskRunResolutionFailed",
    "TaskRunValidationFailed",
    "TaskValidationFailed",
    "InvalidParamValue",
    "CouldntGetTask",
    "ResourceVerificationFailed",
    "PodCreationFailed",
    "CreateContainerConfigError",
    "CreateContainerError",
    "InvalidImageName",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Succeeded,
    Failed { reason: String, message: String },
    Unknown,
}

pub fn is_terminal_failure(reason: &str) -> bool {
    TERMINAL_FAILURE_REASONS.contains(&reason)
}

/// Classify a run's outcome condition.
///
/// A `False` status only counts as failure when the reason is terminal;
/// anything else is still progressing.
pub fn classify(condition: Option<&Condition>, has_pod: bool) -> RunState {
    let Some(condition) = condition else {
        return if has_pod {
            RunState::Running
        } else {
            RunState::NotStarted
        };
    };

    match condition.status.as_str() {
        "True" => RunState::Succeeded,
        "False" if is_terminal_failure(&condition.reason) => RunState::Failed {
            reason: condition.reason.clone(),
            message: condition.message.clone(),
        },
        "False" => RunState::Running,
        "Unknown" if has_pod => RunState::Running,
        "Unknown" => RunState::NotStarted,
        _ => RunState::Unknown,
    }
}

pub fn run_state(run: &TaskRun) -> RunState {
    classify(run.succeeded_condition(), run.pod_name().is_some())
}
