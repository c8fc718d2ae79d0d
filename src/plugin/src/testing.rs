//! In-memory runtime gateway for tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use imagefs_core::error::{ImagefsError, Result};
use imagefs_runtime::gateway::MERGED_DIR_KEY;
use imagefs_runtime::{
    ContainerDetails, ContainerEntry, ContainerFilter, ContainerSpec, ImageReference, Platform,
    RuntimeGateway, SnapshotDescriptor,
};

/// A gateway call, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Pull(String),
    Create(String),
    Start(String),
    Stop(String, Duration),
    Inspect(String),
    List,
    Commit(String, String),
    Push(String),
    Remove(String),
}

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub running: bool,
    pub snapshot: Option<SnapshotDescriptor>,
    pub spec: Option<ContainerSpec>,
}

struct Failure {
    /// Calls of the operation that succeed before it starts failing.
    after: usize,
    message: String,
}

#[derive(Default)]
struct State {
    containers: Vec<FakeContainer>,
    calls: Vec<Call>,
    counts: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, Failure>,
    next_id: usize,
}

pub struct FakeGateway {
    state: Mutex<State>,
    platform_support: bool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            platform_support: true,
        }
    }

    pub fn without_platform_support() -> Self {
        Self {
            platform_support: false,
            ..Self::new()
        }
    }

    /// Make every later call of `operation` fail with `message`.
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.fail_after(operation, 0, message);
    }

    /// Let the next `n` calls of `operation` succeed, then fail the rest.
    pub fn fail_after(&self, operation: &'static str, n: usize, message: &str) {
        let mut state = self.state.lock();
        let after = state.counts.get(operation).copied().unwrap_or(0) + n;
        state.failures.insert(
            operation,
            Failure {
                after,
                message: message.to_string(),
            },
        );
    }

    /// Add a container directly, bypassing `create_container`.
    pub fn insert_container(&self, name: &str, labels: &[(&str, &str)]) -> String {
        let mut state = self.state.lock();
        let id = next_id(&mut state);
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            image: "img:base".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            running: false,
            snapshot: Some(overlay_snapshot(&id)),
            spec: None,
        });
        id
    }

    /// Replace the snapshot descriptor of the container named `name`.
    pub fn set_snapshot(&self, name: &str, snapshot: Option<SnapshotDescriptor>) {
        let mut state = self.state.lock();
        for c in state.containers.iter_mut().filter(|c| c.name == name) {
            c.snapshot = snapshot.clone();
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Calls other than reads (inspect/list).
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Inspect(_) | Call::List))
            .collect()
    }

    pub fn containers(&self) -> Vec<FakeContainer> {
        self.state.lock().containers.clone()
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.containers().into_iter().find(|c| c.name == name)
    }

    fn record(&self, call: Call, operation: &'static str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        let count = state.counts.entry(operation).or_insert(0);
        *count += 1;
        let count = *count;
        match state.failures.get(operation) {
            Some(failure) if count > failure.after => {
                Err(ImagefsError::runtime(operation, failure.message.clone()))
            }
            _ => Ok(()),
        }
    }
}

fn next_id(state: &mut State) -> String {
    state.next_id += 1;
    format!("c{:04}", state.next_id)
}

pub fn overlay_snapshot(id: &str) -> SnapshotDescriptor {
    let mut data = HashMap::new();
    data.insert(
        MERGED_DIR_KEY.to_string(),
        format!("/var/lib/docker/overlay2/{}/merged", id),
    );
    SnapshotDescriptor {
        driver: "overlay2".to_string(),
        data,
    }
}

fn no_such_container(operation: &str, id: &str) -> ImagefsError {
    ImagefsError::runtime(operation, format!("No such container: {}", id))
}

#[async_trait]
impl RuntimeGateway for FakeGateway {
    fn supports_platform(&self) -> bool {
        self.platform_support
    }

    async fn pull_image(&self, image: &ImageReference, _platform: Option<&Platform>) -> Result<()> {
        self.record(Call::Pull(image.full_reference()), "pull_image")
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        self.record(Call::Create(spec.name.clone()), "create_container")?;
        let mut state = self.state.lock();
        if state.containers.iter().any(|c| c.name == spec.name) {
            return Err(ImagefsError::runtime(
                "create_container",
                format!("Conflict. The container name \"/{}\" is already in use", spec.name),
            ));
        }
        let id = next_id(&mut state);
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.full_reference(),
            labels: spec.labels.clone(),
            running: false,
            snapshot: Some(overlay_snapshot(&id)),
            spec: Some(spec.clone()),
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record(Call::Start(id.to_string()), "start_container")?;
        let mut state = self.state.lock();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| no_such_container("start_container", id))?;
        container.running = true;
        Ok(())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()> {
        self.record(Call::Stop(id.to_string(), grace), "stop_container")?;
        let mut state = self.state.lock();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| no_such_container("stop_container", id))?;
        container.running = false;
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        self.record(Call::Inspect(id.to_string()), "inspect_container")?;
        let state = self.state.lock();
        let c = state
            .containers
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| no_such_container("inspect_container", id))?;
        Ok(ContainerDetails {
            id: c.id.clone(),
            name: c.name.clone(),
            image: Some(c.image.clone()),
            labels: c.labels.clone(),
            running: c.running,
            snapshot: c.snapshot.clone(),
        })
    }

    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerEntry>> {
        self.record(Call::List, "list_containers")?;
        let state = self.state.lock();
        Ok(state
            .containers
            .iter()
            .filter(|c| filter.matches(&c.name, &c.labels))
            .map(|c| ContainerEntry {
                id: c.id.clone(),
                names: vec![format!("/{}", c.name)],
                labels: c.labels.clone(),
            })
            .collect())
    }

    async fn commit_container(&self, id: &str, reference: &ImageReference) -> Result<()> {
        self.record(
            Call::Commit(id.to_string(), reference.full_reference()),
            "commit_container",
        )
    }

    async fn push_image(&self, reference: &ImageReference) -> Result<()> {
        self.record(Call::Push(reference.full_reference()), "push_image")
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.record(Call::Remove(id.to_string()), "remove_container")?;
        let mut state = self.state.lock();
        let before = state.containers.len();
        state.containers.retain(|c| c.id != id);
        if state.containers.len() == before {
            return Err(no_such_container("remove_container", id));
        }
        Ok(())
    }
}
