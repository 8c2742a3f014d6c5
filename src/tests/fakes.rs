use crate::error::{LogsError, Result};
use crate::kubernetes::{LineStream, PodEvents, PodLogs, RunEvents, TaskRunSource};
use crate::locator::Clock;
use crate::logs::LogContext;
use crate::multiplex::PrefixStyle;
use crate::types::{Condition, TaskRef, TaskRun, TaskRunSpec, TaskRunStatus};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
    ContainerStateWaiting, ContainerStatus, Pod, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::ResourceExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

pub const NS: &str = "namespace";
pub const TASK: &str = "output-task";

pub fn ts(rfc3339: &str) -> Time {
    serde_json::from_value(serde_json::json!(rfc3339)).unwrap()
}

pub fn task_run(name: &str) -> TaskRun {
    let mut run = TaskRun::new(
        name,
        TaskRunSpec {
            task_ref: Some(TaskRef {
                name: TASK.to_string(),
            }),
        },
    );
    run.metadata.namespace = Some(NS.to_string());
    run.metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert("tekton.dev/task".to_string(), TASK.to_string());
    run.status = Some(TaskRunStatus::default());
    run
}

pub fn with_pod(mut run: TaskRun, pod: &str) -> TaskRun {
    run.status.get_or_insert_with(Default::default).pod_name = Some(pod.to_string());
    run
}

pub fn with_condition(mut run: TaskRun, status: &str, reason: &str, message: &str) -> TaskRun {
    run.status
        .get_or_insert_with(Default::default)
        .conditions
        .push(Condition {
            type_: "Succeeded".to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
        });
    run
}

pub fn started_at(mut run: TaskRun, start: &str) -> TaskRun {
    run.status.get_or_insert_with(Default::default).start_time = Some(ts(start));
    run
}

pub fn succeeded(run: TaskRun) -> TaskRun {
    with_condition(run, "True", "Succeeded", "All Steps have completed executing")
}

pub fn running(run: TaskRun) -> TaskRun {
    with_condition(run, "Unknown", "Running", "Not all Steps in the Task have finished executing")
}

fn container_status(name: &str, state: ContainerState) -> ContainerStatus {
    ContainerStatus {
        name: name.to_string(),
        state: Some(state),
        ..Default::default()
    }
}

fn terminated() -> ContainerState {
    ContainerState {
        terminated: Some(ContainerStateTerminated {
            exit_code: 0,
            reason: Some("Completed".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn waiting(reason: &str) -> ContainerState {
    ContainerState {
        waiting: Some(ContainerStateWaiting {
            reason: Some(reason.to_string()),
            message: Some(format!("container is {reason}")),
        }),
        ..Default::default()
    }
}

fn pod_with(name: &str, init: &[&str], containers: &[&str], phase: &str, state: ContainerState) -> Pod {
    let to_container = |name: &&str| Container {
        name: name.to_string(),
        ..Default::default()
    };
    let to_status = |name: &&str| container_status(name, state.clone());
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NS.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            init_containers: (!init.is_empty()).then(|| init.iter().map(to_container).collect()),
            containers: containers.iter().map(to_container).collect(),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            init_container_statuses: (!init.is_empty())
                .then(|| init.iter().map(to_status).collect()),
            container_statuses: Some(containers.iter().map(to_status).collect()),
            ..Default::default()
        }),
    }
}

/// Pod whose containers have all run to completion.
pub fn pod(name: &str, init: &[&str], containers: &[&str]) -> Pod {
    pod_with(name, init, containers, "Succeeded", terminated())
}

/// Freshly scheduled pod: every container is still being created.
pub fn pending_pod(name: &str, init: &[&str], containers: &[&str]) -> Pod {
    pod_with(name, init, containers, "Pending", waiting("ContainerCreating"))
}

fn set_state(mut pod: Pod, container: &str, state: ContainerState) -> Pod {
    if let Some(status) = pod.status.as_mut() {
        for cs in status
            .init_container_statuses
            .iter_mut()
            .flatten()
            .chain(status.container_statuses.iter_mut().flatten())
            .filter(|cs| cs.name == container)
        {
            cs.state = Some(state.clone());
        }
    }
    pod
}

pub fn with_running(pod: Pod, container: &str) -> Pod {
    let mut pod = set_state(
        pod,
        container,
        ContainerState {
            running: Some(ContainerStateRunning::default()),
            ..Default::default()
        },
    );
    if let Some(status) = pod.status.as_mut() {
        status.phase = Some("Running".to_string());
    }
    pod
}

pub fn with_waiting(pod: Pod, container: &str, reason: &str) -> Pod {
    set_state(pod, container, waiting(reason))
}

#[derive(Clone)]
pub enum LogSource {
    Lines(Vec<String>),
    FailOpen(String),
    FailAfter(Vec<String>, String),
}

pub fn lines(lines: &[&str]) -> LogSource {
    LogSource::Lines(lines.iter().map(|l| l.to_string()).collect())
}

/// Marks the watch closed when the stream holding it is dropped.
struct CloseGuard(Arc<AtomicBool>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// In-memory cluster: runs, pods, container logs and scripted watches.
#[derive(Default)]
pub struct FakeCluster {
    runs: Vec<TaskRun>,
    pods: Vec<Pod>,
    logs: HashMap<(String, String), LogSource>,
    watch_rx: Mutex<Option<mpsc::Receiver<TaskRun>>>,
    watch_error: Option<String>,
    pod_watch_rx: Mutex<Option<mpsc::Receiver<Pod>>>,
    pub fetches: AtomicUsize,
    pub watches_opened: AtomicUsize,
    pub pod_watches_opened: AtomicUsize,
    pub watch_closed: Arc<AtomicBool>,
    pub opened: Mutex<Vec<(String, bool)>>,
    pub selectors: Mutex<Vec<Option<String>>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(mut self, run: TaskRun) -> Self {
        self.runs.push(run);
        self
    }

    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn with_log(mut self, pod: &str, container: &str, source: LogSource) -> Self {
        self.logs
            .insert((pod.to_string(), container.to_string()), source);
        self
    }

    /// Script the watch; updates sent on the returned channel reach the locator.
    pub fn with_watch(self) -> (Self, mpsc::Sender<TaskRun>) {
        let (tx, rx) = mpsc::channel(16);
        *self.watch_rx.lock().unwrap() = Some(rx);
        (self, tx)
    }

    /// Every poll of the run watch fails with `message`, as a watch without
    /// permission does.
    pub fn with_failing_watch(mut self, message: &str) -> Self {
        self.watch_error = Some(message.to_string());
        self
    }

    /// Script the pod watch used while a followed container is still waiting.
    pub fn with_pod_watch(self) -> (Self, mpsc::Sender<Pod>) {
        let (tx, rx) = mpsc::channel(16);
        *self.pod_watch_rx.lock().unwrap() = Some(rx);
        (self, tx)
    }

    pub fn opened_containers(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(c, _)| c.clone())
            .collect()
    }
}

#[async_trait]
impl TaskRunSource for FakeCluster {
    async fn get(&self, _namespace: &str, name: &str) -> Result<TaskRun> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.runs
            .iter()
            .find(|r| r.name_any() == name)
            .cloned()
            .ok_or_else(|| LogsError::NotFound {
                kind: "taskrun",
                name: name.to_string(),
            })
    }

    async fn list(&self, _namespace: &str, label_selector: Option<&str>) -> Result<Vec<TaskRun>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.selectors
            .lock()
            .unwrap()
            .push(label_selector.map(str::to_string));
        let wanted = label_selector.and_then(|sel| sel.split_once('='));
        Ok(self
            .runs
            .iter()
            .filter(|run| match wanted {
                Some((key, value)) => run.labels().get(key).map(String::as_str) == Some(value),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn watch(&self, _namespace: &str, _name: &str) -> Result<RunEvents> {
        self.watches_opened.fetch_add(1, Ordering::SeqCst);
        let guard = CloseGuard(self.watch_closed.clone());
        if let Some(message) = self.watch_error.clone() {
            return Ok(stream::repeat_with(move || {
                let _held = &guard;
                Err(LogsError::Watch(message.clone()))
            })
            .boxed());
        }
        let scripted = self.watch_rx.lock().unwrap().take();
        let events = match scripted {
            Some(rx) => ReceiverStream::new(rx)
                .map(move |run| {
                    let _held = &guard;
                    Ok(run)
                })
                .boxed(),
            None => stream::pending()
                .map(move |run: TaskRun| {
                    let _held = &guard;
                    Ok(run)
                })
                .boxed(),
        };
        Ok(events)
    }
}

#[async_trait]
impl PodLogs for FakeCluster {
    async fn get_pod(&self, _namespace: &str, name: &str) -> Result<Pod> {
        self.pods
            .iter()
            .find(|p| p.name_any() == name)
            .cloned()
            .ok_or_else(|| LogsError::NotFound {
                kind: "pod",
                name: name.to_string(),
            })
    }

    async fn watch_pod(&self, _namespace: &str, _name: &str) -> Result<PodEvents> {
        self.pod_watches_opened.fetch_add(1, Ordering::SeqCst);
        let scripted = self.pod_watch_rx.lock().unwrap().take();
        let events: PodEvents = match scripted {
            Some(rx) => ReceiverStream::new(rx).map(Ok).boxed(),
            None => stream::pending::<Result<Pod>>().boxed(),
        };
        Ok(events)
    }

    async fn open(
        &self,
        _namespace: &str,
        pod_name: &str,
        container: &str,
        follow: bool,
    ) -> Result<LineStream> {
        self.opened
            .lock()
            .unwrap()
            .push((container.to_string(), follow));
        let source = self
            .logs
            .get(&(pod_name.to_string(), container.to_string()))
            .cloned()
            .ok_or_else(|| LogsError::NotFound {
                kind: "container",
                name: container.to_string(),
            })?;
        let items: Vec<std::io::Result<String>> = match source {
            LogSource::Lines(lines) => lines.into_iter().map(Ok).collect(),
            LogSource::FailOpen(message) => {
                return Err(LogsError::Io(std::io::Error::other(message)));
            }
            LogSource::FailAfter(lines, message) => lines
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(std::io::Error::other(message))))
                .collect(),
        };
        Ok(stream::iter(items).boxed())
    }
}

/// Clock whose only timer fires when the test says so.
#[derive(Default, Clone)]
pub struct ManualClock {
    fired: Arc<Notify>,
}

impl ManualClock {
    pub fn fire(&self) {
        self.fired.notify_one();
    }
}

impl Clock for ManualClock {
    fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
        let fired = self.fired.clone();
        async move { fired.notified().await }.boxed()
    }
}

pub fn context(cluster: Arc<FakeCluster>, clock: Arc<dyn Clock>) -> LogContext {
    LogContext {
        runs: cluster.clone(),
        pods: cluster,
        clock,
        cancel: CancellationToken::new(),
        style: PrefixStyle::Plain,
    }
}
