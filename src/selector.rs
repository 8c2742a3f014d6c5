use crate::error::{LogsError, Result};
use crate::types::{RunTarget, TaskRun};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use std::cmp::Ordering;

fn recency_key(run: &TaskRun) -> (Option<&Time>, Option<&Time>) {
    (run.start_time(), run.metadata.creation_timestamp.as_ref())
}

fn compare_recency(a: &TaskRun, b: &TaskRun) -> Ordering {
    recency_key(a).cmp(&recency_key(b))
}

/// Order runs newest first: start time, then creation time. Stable for full ties.
pub fn sort_latest_first(runs: &mut [TaskRun]) {
    runs.sort_by(|a, b| compare_recency(b, a));
}

/// Pick one run out of `candidates`, which are expected newest first.
pub fn select(
    candidates: Vec<TaskRun>,
    target: &RunTarget,
    limit: usize,
    namespace: &str,
) -> Result<TaskRun> {
    match target {
        RunTarget::ByName(name) => candidates
            .into_iter()
            .find(|run| run.name_any() == *name)
            .ok_or_else(|| LogsError::NotFound {
                kind: "taskrun",
                name: name.clone(),
            }),
        RunTarget::Latest => {
            if limit == 0 && !candidates.is_empty() {
                return Err(LogsError::AmbiguousSelection {
                    candidates: candidates.len(),
                    limit,
                });
            }

            candidates
                .into_iter()
                .take(limit)
                .fold(None, |best: Option<TaskRun>, run| match best {
                    Some(best) if compare_recency(&run, &best) != Ordering::Greater => Some(best),
                    _ => Some(run),
                })
                .ok_or_else(|| LogsError::NoRunsFound {
                    namespace: namespace.to_string(),
                })
        }
    }
}
