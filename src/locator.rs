use crate::error::{LogsError, Result};
use crate::kubernetes::TaskRunSource;
use crate::status::{RunState, run_state};
use crate::types::TaskRun;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::StreamExt;
use kube::ResourceExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source of delays for the pod wait.
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}

/// Outcome of looking at a single snapshot of a run.
enum Resolution {
    Pod(String),
    Fail(LogsError),
    Wait,
}

fn resolve(run: &TaskRun) -> Resolution {
    if let Some(pod) = run.pod_name() {
        return Resolution::Pod(pod.to_string());
    }
    match run_state(run) {
        RunState::Failed { reason, message } => Resolution::Fail(LogsError::ExecutionFailed {
            task: run.task_name(),
            reason,
            message,
        }),
        // finished without ever recording a pod: nothing will ever appear
        RunState::Succeeded => Resolution::Fail(LogsError::PodNotAvailable(run.name_any())),
        _ => Resolution::Wait,
    }
}

/// Find the pod backing `run`, waiting up to `timeout` for it to be scheduled.
///
/// The watch is only opened when the run has no pod yet and is not terminal.
/// It is dropped, and with it the server-side watch, on every return path.
/// A watch error ends the wait with that error rather than a timeout.
pub async fn locate(
    run: &TaskRun,
    source: &dyn TaskRunSource,
    clock: &dyn Clock,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String> {
    let name = run.name_any();
    let namespace = run.namespace().unwrap_or_default();

    match resolve(run) {
        Resolution::Pod(pod) => return Ok(pod),
        Resolution::Fail(err) => return Err(err),
        Resolution::Wait => {}
    }

    info!(
        "Waiting up to {:?} for taskrun {}/{} to get a pod",
        timeout, namespace, name
    );

    let mut events = source.watch(&namespace, &name).await?;
    let mut deadline = clock.sleep(timeout);
    let mut watching = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LogsError::Cancelled),
            _ = &mut deadline => return Err(LogsError::Timeout(name)),
            event = events.next(), if watching => match event {
                Some(Ok(update)) => {
                    if update.name_any() != name {
                        continue;
                    }
                    match resolve(&update) {
                        Resolution::Pod(pod) => {
                            info!("Taskrun {}/{} is running in pod {}", namespace, name, pod);
                            return Ok(pod);
                        }
                        Resolution::Fail(err) => return Err(err),
                        Resolution::Wait => {
                            debug!("Taskrun {}/{} updated, still no pod", namespace, name);
                        }
                    }
                }
                Some(Err(err)) => {
                    warn!("Watch on taskrun {}/{} failed: {}", namespace, name, err);
                    return Err(err);
                }
                None => {
                    debug!("Watch on taskrun {}/{} closed, waiting out the timeout", namespace, name);
                    watching = false;
                }
            },
        }
    }
}
