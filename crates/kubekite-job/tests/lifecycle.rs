//! Launch-to-cleanup flow against an in-memory cluster

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStatus, Pod,
    PodStatus,
};
use kube::ResourceExt;

use kubekite_common::events::NoopEventPublisher;
use kubekite_common::{Error, ManagerConfig, JOB_NAME_LABEL_KEY};
use kubekite_job::{
    ClusterClient, DeletePropagation, JobLauncher, JobRegistry, JobTemplate, LaunchOutcome,
    QueueEntry, Reconciler,
};

const TEMPLATE: &str = r#"
apiVersion: batch/v1
kind: Job
metadata:
  name: placeholder
spec:
  template:
    spec:
      restartPolicy: Never
      containers:
        - name: buildkite-agent
          image: buildkite/agent:3
        - name: docker
          image: docker:dind
"#;

/// Stores Jobs and materializes one pod per Job, the way the Job controller would.
#[derive(Default)]
struct FakeCluster {
    jobs: Mutex<BTreeMap<String, Job>>,
    pods: Mutex<Vec<Pod>>,
    creates: Mutex<usize>,
    deletes: Mutex<Vec<(String, DeletePropagation)>>,
}

impl FakeCluster {
    fn set_agent_state(&self, job_name: &str, state: ContainerState) {
        let mut pods = self.pods.lock().expect("mutex should not be poisoned");
        for pod in pods.iter_mut() {
            if pod.labels().get(JOB_NAME_LABEL_KEY).map(String::as_str) == Some(job_name) {
                pod.status = Some(PodStatus {
                    container_statuses: Some(vec![ContainerStatus {
                        name: "buildkite-agent".to_string(),
                        state: Some(state.clone()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                });
            }
        }
    }

    fn add_foreign_pod(&self, job_name: &str, labels: BTreeMap<String, String>) {
        let mut pod = Pod::default();
        pod.metadata.name = Some(format!("{job_name}-xyz"));
        let mut labels = labels;
        labels.insert(JOB_NAME_LABEL_KEY.to_string(), job_name.to_string());
        pod.metadata.labels = Some(labels);
        self.pods
            .lock()
            .expect("mutex should not be poisoned")
            .push(pod);
    }

    fn job_names(&self) -> Vec<String> {
        self.jobs
            .lock()
            .expect("mutex should not be poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

fn matches_selector(pod: &Pod, selector: &str) -> bool {
    selector.split(',').all(|term| match term.split_once('=') {
        Some((key, value)) => pod.labels().get(key).map(String::as_str) == Some(value),
        None => false,
    })
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_job(&self, name: &str) -> Result<Option<Job>, Error> {
        Ok(self
            .jobs
            .lock()
            .expect("mutex should not be poisoned")
            .get(name)
            .cloned())
    }

    async fn create_job(&self, job: &Job) -> Result<Job, Error> {
        let name = job.name_any();
        let mut created = job.clone();
        created.metadata.uid = Some(format!("uid-{name}"));

        let mut pod = Pod::default();
        pod.metadata.name = Some(format!("{name}-abcde"));
        let mut labels = job
            .spec
            .as_ref()
            .and_then(|spec| spec.template.metadata.as_ref())
            .and_then(|meta| meta.labels.clone())
            .unwrap_or_default();
        labels.insert(JOB_NAME_LABEL_KEY.to_string(), name.clone());
        pod.metadata.labels = Some(labels);

        *self.creates.lock().expect("mutex should not be poisoned") += 1;
        self.jobs
            .lock()
            .expect("mutex should not be poisoned")
            .insert(name, created.clone());
        self.pods
            .lock()
            .expect("mutex should not be poisoned")
            .push(pod);
        Ok(created)
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, Error> {
        Ok(self
            .pods
            .lock()
            .expect("mutex should not be poisoned")
            .iter()
            .filter(|pod| matches_selector(pod, label_selector))
            .cloned()
            .collect())
    }

    async fn delete_job(&self, name: &str, propagation: DeletePropagation) -> Result<(), Error> {
        self.deletes
            .lock()
            .expect("mutex should not be poisoned")
            .push((name.to_string(), propagation));
        self.jobs
            .lock()
            .expect("mutex should not be poisoned")
            .remove(name);
        if propagation != DeletePropagation::Orphan {
            self.pods
                .lock()
                .expect("mutex should not be poisoned")
                .retain(|pod| pod.labels().get(JOB_NAME_LABEL_KEY).map(String::as_str) != Some(name));
        }
        Ok(())
    }
}

fn terminated(exit_code: i32) -> ContainerState {
    ContainerState {
        terminated: Some(ContainerStateTerminated {
            exit_code,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn running() -> ContainerState {
    ContainerState {
        running: Some(ContainerStateRunning::default()),
        ..Default::default()
    }
}

#[tokio::test]
async fn job_is_launched_once_and_reaped_after_agent_exits() {
    let config = ManagerConfig::new("acme", "deploy");
    let cluster = Arc::new(FakeCluster::default());
    let template = JobTemplate::from_yaml_str(TEMPLATE).unwrap();

    let launcher = JobLauncher::new(
        &config,
        Arc::new(template),
        cluster.clone(),
        Arc::new(JobRegistry::new()),
        Arc::new(NoopEventPublisher),
    );
    let reconciler = Reconciler::new(&config, cluster.clone(), Arc::new(NoopEventPublisher));

    let entry = QueueEntry::new("ABC-1", ["queue=default", "image=ruby:3.3", "memory=2Gi"]);

    let first = launcher.launch(&entry).await.unwrap();
    let second = launcher.launch(&entry).await.unwrap();
    assert!(matches!(first, LaunchOutcome::Created { .. }));
    assert!(matches!(second, LaunchOutcome::AlreadyExists { .. }));
    assert_eq!(first.name(), "buildkite-agent-abc-1");
    assert_eq!(*cluster.creates.lock().unwrap(), 1);

    let stored = cluster.get_job("buildkite-agent-abc-1").await.unwrap().unwrap();
    let container = &stored.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0];
    assert_eq!(container.image.as_deref(), Some("ruby:3.3"));
    let env = container.env.as_ref().unwrap();
    assert!(env
        .iter()
        .any(|var| var.name == "BUILDKITE_AGENT_TAGS"
            && var.value.as_deref() == Some("queue=default,image=ruby:3.3,memory=2Gi")));

    // agent still running: nothing to clean
    cluster.set_agent_state("buildkite-agent-abc-1", running());
    let report = reconciler.reconcile_once().await;
    assert_eq!(report.pods, 1);
    assert!(report.deleted.is_empty());

    cluster.set_agent_state("buildkite-agent-abc-1", terminated(0));
    let report = reconciler.reconcile_once().await;
    assert_eq!(report.deleted, vec!["buildkite-agent-abc-1".to_string()]);
    assert!(cluster.job_names().is_empty());
    assert_eq!(
        cluster.deletes.lock().unwrap().as_slice(),
        &[("buildkite-agent-abc-1".to_string(), DeletePropagation::Foreground)]
    );

    // pods went with the job
    let report = reconciler.reconcile_once().await;
    assert_eq!(report.pods, 0);
}

#[tokio::test]
async fn other_pipelines_are_left_alone() {
    let config = ManagerConfig::new("acme", "deploy");
    let cluster = Arc::new(FakeCluster::default());

    cluster.add_foreign_pod(
        "buildkite-agent-other",
        BTreeMap::from([
            ("kubekite-managed".to_string(), "true".to_string()),
            ("kubekite-org".to_string(), "acme".to_string()),
            ("kubekite-pipeline".to_string(), "release".to_string()),
        ]),
    );
    cluster.set_agent_state("buildkite-agent-other", terminated(1));

    let reconciler = Reconciler::new(&config, cluster.clone(), Arc::new(NoopEventPublisher));
    let report = reconciler.reconcile_once().await;

    assert_eq!(report.pods, 0);
    assert!(cluster.deletes.lock().unwrap().is_empty());
}
