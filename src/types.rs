use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tekton TaskRun, reduced to the fields needed to find and read its logs.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default)]
#[kube(
    group = "tekton.dev",
    version = "v1",
    kind = "TaskRun",
    namespaced,
    status = "TaskRunStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ref: Option<TaskRef>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct TaskRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub steps: Vec<StepState>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    /// "True", "False" or "Unknown".
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// One step as reported by the run. Order mirrors the task definition.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting: Option<StepWaiting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<StepRunning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated: Option<StepTerminated>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct StepWaiting {
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct StepRunning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Time>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct StepTerminated {
    pub exit_code: i32,
    #[serde(default)]
    pub reason: String,
}

impl StepState {
    /// Short human form of the step's state, for diagnostics.
    pub fn describe(&self) -> String {
        if let Some(t) = &self.terminated {
            format!("terminated({})", t.exit_code)
        } else if self.running.is_some() {
            "running".to_string()
        } else if let Some(w) = &self.waiting {
            format!("waiting({})", w.reason)
        } else {
            "unknown".to_string()
        }
    }
}

/// Condition type that carries the overall outcome of a run.
pub const SUCCEEDED_CONDITION: &str = "Succeeded";

impl TaskRun {
    /// Backing pod name, if the run has been scheduled.
    pub fn pod_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.pod_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    pub fn start_time(&self) -> Option<&Time> {
        self.status.as_ref().and_then(|s| s.start_time.as_ref())
    }

    pub fn succeeded_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.iter().find(|c| c.type_ == SUCCEEDED_CONDITION))
    }

    /// Name used when reporting the run's outcome: the referenced task, or the run itself.
    pub fn task_name(&self) -> String {
        self.spec
            .task_ref
            .as_ref()
            .map(|r| r.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.name_any())
    }
}

/// One container to stream, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub container: String,
    pub init: bool,
}

impl PlannedStep {
    pub fn new(container: impl Into<String>, init: bool) -> Self {
        Self {
            container: container.into(),
            init,
        }
    }
}

/// Which run a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    ByName(String),
    Latest,
}

/// Everything a single `logs` invocation needs to know.
#[derive(Debug, Clone)]
pub struct LogRequest {
    pub target: RunTarget,
    pub namespace: String,
    /// Parent task used to narrow the "most recent" candidates.
    pub task: Option<String>,
    pub all_steps: bool,
    pub follow: bool,
    pub steps: Vec<String>,
    pub limit: usize,
    pub timeout: Duration,
}

impl LogRequest {
    pub fn new(namespace: impl Into<String>, target: RunTarget) -> Self {
        Self {
            target,
            namespace: namespace.into(),
            task: None,
            all_steps: false,
            follow: false,
            steps: Vec::new(),
            limit: DEFAULT_LIMIT,
            timeout: DEFAULT_POD_TIMEOUT,
        }
    }
}

pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_POD_TIMEOUT: Duration = Duration::from_secs(10);
