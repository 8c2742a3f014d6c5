use crate::error::{LogsError, Result};
use crate::kubernetes::{PodLogs, TaskRunSource, task_selector};
use crate::locator::{Clock, locate};
use crate::multiplex::{PrefixStyle, StreamTarget, stream_steps};
use crate::selector::{select, sort_latest_first};
use crate::steps::plan;
use crate::types::{LogRequest, RunTarget, TaskRun};
use kube::ResourceExt;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Collaborators shared by every log request.
#[derive(Clone)]
pub struct LogContext {
    pub runs: Arc<dyn TaskRunSource>,
    pub pods: Arc<dyn PodLogs>,
    pub clock: Arc<dyn Clock>,
    pub cancel: CancellationToken,
    pub style: PrefixStyle,
}

impl LogRequest {
    pub fn validate(&self) -> Result<()> {
        if self.all_steps && !self.steps.is_empty() {
            return Err(LogsError::incompatible_flags());
        }
        Ok(())
    }
}

async fn latest_run(
    ctx: &LogContext,
    namespace: &str,
    task: Option<&str>,
    limit: usize,
) -> Result<TaskRun> {
    let selector = task.map(task_selector);
    let mut candidates = ctx.runs.list(namespace, selector.as_deref()).await?;
    sort_latest_first(&mut candidates);
    let run = select(candidates, &RunTarget::Latest, limit, namespace)?;
    debug!("Most recent taskrun in {} is {}", namespace, run.name_any());
    Ok(run)
}

/// Name of the most recent run, optionally restricted to runs of `task`.
pub async fn resolve_latest_run(
    ctx: &LogContext,
    namespace: &str,
    task: Option<&str>,
    limit: usize,
) -> Result<String> {
    latest_run(ctx, namespace, task, limit)
        .await
        .map(|run| run.name_any())
}

/// Write the logs of the requested run to `out`.
///
/// `Ok(())` means every planned step was written in full; any error leaves
/// whatever was already written in place.
pub async fn fetch_logs<W>(ctx: &LogContext, request: &LogRequest, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    request.validate()?;
    let namespace = request.namespace.as_str();

    let run = match &request.target {
        RunTarget::ByName(name) => ctx.runs.get(namespace, name).await?,
        RunTarget::Latest => {
            latest_run(ctx, namespace, request.task.as_deref(), request.limit).await?
        }
    };
    info!("Fetching logs for taskrun {}/{}", namespace, run.name_any());
    if let Some(status) = &run.status {
        for step in &status.steps {
            debug!("Step {}: {}", step.name, step.describe());
        }
    }

    let pod_name = locate(
        &run,
        ctx.runs.as_ref(),
        ctx.clock.as_ref(),
        request.timeout,
        &ctx.cancel,
    )
    .await?;

    let pod = ctx.pods.get_pod(namespace, &pod_name).await?;
    let steps = plan(&pod, request.all_steps, &request.steps)?;
    debug!(
        "Streaming {} step(s) from pod {}: {:?}",
        steps.len(),
        pod_name,
        steps.iter().map(|s| s.container.as_str()).collect::<Vec<_>>()
    );

    let target = StreamTarget {
        namespace,
        pod_name: &pod_name,
        follow: request.follow,
    };
    stream_steps(
        &steps,
        &target,
        ctx.pods.as_ref(),
        ctx.style,
        &ctx.cancel,
        out,
    )
    .await
}
