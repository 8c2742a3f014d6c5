use crate::error::{LogsError, Result};
use crate::types::TaskRun;
use async_trait::async_trait;
use futures::io::AsyncBufReadExt;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams};
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Config as WatcherConfig};
use kube::{Api, Client};
use tracing::debug;

/// Updated TaskRuns for a single run. Dropping the stream ends the watch.
pub type RunEvents = BoxStream<'static, Result<TaskRun>>;

/// Updated snapshots of a single pod. Dropping the stream ends the watch.
pub type PodEvents = BoxStream<'static, Result<Pod>>;

/// Lines of one container's log, in the order the container wrote them.
pub type LineStream = BoxStream<'static, std::io::Result<String>>;

/// Label Tekton puts on every run pointing back to its task.
pub const TASK_LABEL: &str = "tekton.dev/task";

#[async_trait]
pub trait TaskRunSource: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<TaskRun>;

    async fn list(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<TaskRun>>;

    async fn watch(&self, namespace: &str, name: &str) -> Result<RunEvents>;
}

#[async_trait]
pub trait PodLogs: Send + Sync {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    async fn watch_pod(&self, namespace: &str, name: &str) -> Result<PodEvents>;

    /// Open a container's log. `follow` keeps the stream open until the container exits.
    async fn open(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        follow: bool,
    ) -> Result<LineStream>;
}

pub fn task_selector(task: &str) -> String {
    format!("{}={}", TASK_LABEL, task)
}

fn not_found_or(err: kube::Error, kind: &'static str, name: &str) -> LogsError {
    if let kube::Error::Api(resp) = &err
        && resp.code == 404
    {
        return LogsError::NotFound {
            kind,
            name: name.to_string(),
        };
    }
    LogsError::Kube(err)
}

/// Both collaborators backed by a live cluster.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn runs(&self, namespace: &str) -> Api<TaskRun> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl TaskRunSource for KubeCluster {
    async fn get(&self, namespace: &str, name: &str) -> Result<TaskRun> {
        self.runs(namespace)
            .get(name)
            .await
            .map_err(|e| not_found_or(e, "taskrun", name))
    }

    async fn list(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<TaskRun>> {
        let mut lp = ListParams::default();
        if let Some(sel) = label_selector {
            lp = lp.labels(sel);
        }
        let list = self.runs(namespace).list(&lp).await?;
        debug!(
            "Listed {} taskruns in {} (selector: {:?})",
            list.items.len(),
            namespace,
            label_selector
        );
        Ok(list.items)
    }

    async fn watch(&self, namespace: &str, name: &str) -> Result<RunEvents> {
        let field_selector = format!("metadata.name={}", name);
        let cfg = WatcherConfig::default().fields(&field_selector);
        debug!("Starting watcher for taskrun {}/{}", namespace, name);
        let stream = watcher::watcher(self.runs(namespace), cfg)
            .applied_objects()
            .map_err(|e| LogsError::Watch(e.to_string()))
            .boxed();
        Ok(stream)
    }
}

#[async_trait]
impl PodLogs for KubeCluster {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.pods(namespace)
            .get(name)
            .await
            .map_err(|e| not_found_or(e, "pod", name))
    }

    async fn watch_pod(&self, namespace: &str, name: &str) -> Result<PodEvents> {
        let field_selector = format!("metadata.name={}", name);
        let cfg = WatcherConfig::default().fields(&field_selector);
        debug!("Starting watcher for pod {}/{}", namespace, name);
        let stream = watcher::watcher(self.pods(namespace), cfg)
            .applied_objects()
            .map_err(|e| LogsError::Watch(e.to_string()))
            .boxed();
        Ok(stream)
    }

    async fn open(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        follow: bool,
    ) -> Result<LineStream> {
        let lp = LogParams {
            follow,
            container: Some(container.to_string()),
            ..Default::default()
        };
        let reader = self.pods(namespace).log_stream(pod_name, &lp).await?;
        Ok(reader.lines().boxed())
    }
}
