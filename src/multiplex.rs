use crate::error::{LogsError, Result};
use crate::kubernetes::PodLogs;
use crate::types::PlannedStep;
use crate::utils::step_color;
use crossterm::style::Stylize;
use futures::stream::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Waiting reasons a container does not recover from without a new pod.
const STUCK_WAITING_REASONS: &[&str] = &[
    "CreateContainerConfigError",
    "CreateContainerError",
    "InvalidImageName",
    "ErrImageNeverPull",
];

/// How step prefixes are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixStyle {
    #[default]
    Plain,
    Colored,
}

impl PrefixStyle {
    pub fn render(self, step: &PlannedStep) -> String {
        let prefix = format!("[{}]", step.container);
        match self {
            PrefixStyle::Plain => prefix,
            PrefixStyle::Colored => prefix
                .with(step_color(&step.container, step.init))
                .to_string(),
        }
    }
}

/// Where a multiplexing pass reads from.
pub struct StreamTarget<'a> {
    pub namespace: &'a str,
    pub pod_name: &'a str,
    pub follow: bool,
}

/// Where a single container stands, as far as reading its log goes.
#[derive(Debug, PartialEq, Eq)]
enum ContainerPhase {
    Waiting(String),
    Stuck(String),
    Started,
}

fn container_phase(pod: &Pod, container: &str) -> ContainerPhase {
    let Some(status) = pod.status.as_ref() else {
        return ContainerPhase::Waiting("no pod status".to_string());
    };
    if matches!(status.phase.as_deref(), Some("Succeeded" | "Failed")) {
        return ContainerPhase::Started;
    }
    let state = status
        .init_container_statuses
        .iter()
        .flatten()
        .chain(status.container_statuses.iter().flatten())
        .find(|cs| cs.name == container)
        .and_then(|cs| cs.state.as_ref());
    let Some(state) = state else {
        return ContainerPhase::Waiting("no container status".to_string());
    };
    match &state.waiting {
        Some(waiting) => {
            let reason = waiting.reason.clone().unwrap_or_default();
            if STUCK_WAITING_REASONS.contains(&reason.as_str()) {
                let message = waiting.message.clone().unwrap_or_default();
                ContainerPhase::Stuck(format!("{}: {}", reason, message))
            } else {
                ContainerPhase::Waiting(reason)
            }
        }
        None if state.running.is_some() || state.terminated.is_some() => ContainerPhase::Started,
        None => ContainerPhase::Waiting(String::new()),
    }
}

/// Block until `container` has left its waiting state, so a follow stream can be opened.
async fn wait_until_started(
    target: &StreamTarget<'_>,
    container: &str,
    pods: &dyn PodLogs,
    cancel: &CancellationToken,
) -> Result<()> {
    let stream_error = |message: String| LogsError::Stream {
        container: container.to_string(),
        message,
    };

    let pod = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(LogsError::Cancelled),
        pod = pods.get_pod(target.namespace, target.pod_name) => pod,
    }
    .map_err(|e| stream_error(e.to_string()))?;
    match container_phase(&pod, container) {
        ContainerPhase::Started => return Ok(()),
        ContainerPhase::Stuck(reason) => return Err(stream_error(reason)),
        ContainerPhase::Waiting(reason) => {
            debug!(
                "Container {}/{} is waiting ({}), watching pod",
                target.pod_name, container, reason
            );
        }
    }

    let mut updates = pods
        .watch_pod(target.namespace, target.pod_name)
        .await
        .map_err(|e| stream_error(e.to_string()))?;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LogsError::Cancelled),
            next = updates.next() => next,
        };
        match next {
            Some(Ok(pod)) => match container_phase(&pod, container) {
                ContainerPhase::Started => return Ok(()),
                ContainerPhase::Stuck(reason) => return Err(stream_error(reason)),
                ContainerPhase::Waiting(reason) => {
                    debug!("Container {}/{} still waiting ({})", target.pod_name, container, reason);
                }
            },
            Some(Err(e)) => return Err(stream_error(e.to_string())),
            None => {
                return Err(stream_error(
                    "pod watch closed before the container started".to_string(),
                ));
            }
        }
    }
}

/// Write every planned step's log to `out`, one step after the other.
///
/// Each line is prefixed with `[container] ` and every step ends with a blank
/// line. The first step that cannot be opened or read aborts the rest; lines
/// already written stay written. In follow mode each container is only opened
/// once the pod reports it started.
pub async fn stream_steps<W>(
    plan: &[PlannedStep],
    target: &StreamTarget<'_>,
    pods: &dyn PodLogs,
    style: PrefixStyle,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    for step in plan {
        let container = step.container.as_str();
        let stream_error = |message: String| LogsError::Stream {
            container: container.to_string(),
            message,
        };

        if target.follow {
            wait_until_started(target, container, pods, cancel).await?;
        }

        debug!(
            "Opening log for {}/{} (init: {}, follow: {})",
            target.pod_name, container, step.init, target.follow
        );
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LogsError::Cancelled),
            opened = pods.open(target.namespace, target.pod_name, container, target.follow) => opened,
        };
        let mut lines = opened.map_err(|e| stream_error(e.to_string()))?;

        let prefix = style.render(step);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LogsError::Cancelled),
                next = lines.next() => next,
            };
            match next {
                Some(Ok(line)) => {
                    out.write_all(format!("{} {}\n", prefix, line).as_bytes())
                        .await?;
                }
                Some(Err(e)) => return Err(stream_error(e.to_string())),
                None => break,
            }
        }
        drop(lines);

        out.write_all(b"\n").await?;
        out.flush().await?;
        debug!("Finished log for {}/{}", target.pod_name, container);
    }

    Ok(())
}
