//! In-process facade with a fixed inventory.
//!
//! [`StaticFacade`] answers every facade operation from memory. Integration
//! tests use it to drive sessions without a cloud backend, and it can inject
//! failures or hold a project's calls open to exercise the error and
//! concurrency paths of the runner.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use stackgate_core::{
    Credentials, FacadeError, InstanceRequest, ResourceFacade, ResourceHandles, ResourceRecord,
};
use tokio::sync::Notify;

/// Facade operation, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `authenticate`
    Authenticate,
    /// `list_images`
    ListImages,
    /// `list_flavors`
    ListFlavors,
    /// `list_networks`
    ListNetworks,
    /// `create_instance`
    CreateInstance,
}

/// Handle issued by [`StaticFacade`]: the project the session is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHandle {
    /// Project id from the credentials
    pub project_id: String,
}

#[derive(Default)]
struct Inventory {
    accounts: HashSet<(String, String, String)>,
    images: Vec<ResourceRecord>,
    flavors: Vec<ResourceRecord>,
    networks: Vec<ResourceRecord>,
    instances: Vec<ResourceRecord>,
    failing: HashSet<Operation>,
    calls: HashMap<Operation, usize>,
    stalled: HashMap<String, Arc<Notify>>,
}

/// Facade backed by an in-memory inventory.
///
/// Clones share the inventory, so a test can keep one clone for assertions
/// and hand another to the server.
#[derive(Clone, Default)]
pub struct StaticFacade {
    inner: Arc<Mutex<Inventory>>,
}

impl StaticFacade {
    /// Empty inventory with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept this credential triple.
    #[must_use]
    pub fn with_account(self, username: &str, password: &str, project_id: &str) -> Self {
        self.inventory().accounts.insert((
            username.to_string(),
            password.to_string(),
            project_id.to_string(),
        ));
        self
    }

    /// Replace the image list.
    #[must_use]
    pub fn with_images(self, images: Vec<ResourceRecord>) -> Self {
        self.inventory().images = images;
        self
    }

    /// Replace the flavor list.
    #[must_use]
    pub fn with_flavors(self, flavors: Vec<ResourceRecord>) -> Self {
        self.inventory().flavors = flavors;
        self
    }

    /// Replace the network list.
    #[must_use]
    pub fn with_networks(self, networks: Vec<ResourceRecord>) -> Self {
        self.inventory().networks = networks;
        self
    }

    /// Make `operation` fail with a backend error until [`recover`](Self::recover).
    pub fn fail(&self, operation: Operation) {
        self.inventory().failing.insert(operation);
    }

    /// Stop failing `operation`.
    pub fn recover(&self, operation: Operation) {
        self.inventory().failing.remove(&operation);
    }

    /// Number of times `operation` was called.
    pub fn calls(&self, operation: Operation) -> usize {
        self.inventory().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Instances created through `create_instance`.
    pub fn instances(&self) -> Vec<ResourceRecord> {
        self.inventory().instances.clone()
    }

    /// Hold every listing call for `project_id` until
    /// [`release_project`](Self::release_project).
    pub fn stall_project(&self, project_id: &str) {
        self.inventory().stalled.insert(project_id.to_string(), Arc::new(Notify::new()));
    }

    /// Let stalled listing calls for `project_id` proceed.
    pub fn release_project(&self, project_id: &str) {
        if let Some(gate) = self.inventory().stalled.remove(project_id) {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    fn inventory(&self) -> MutexGuard<'_, Inventory> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and apply injected failure.
    fn enter(&self, operation: Operation) -> Result<(), FacadeError> {
        let mut inventory = self.inventory();
        *inventory.calls.entry(operation).or_insert(0) += 1;

        if inventory.failing.contains(&operation) {
            return Err(FacadeError::Backend(format!("injected failure for {operation:?}")));
        }
        Ok(())
    }

    async fn wait_if_stalled(&self, handle: &ProjectHandle) {
        let gate = self.inventory().stalled.get(&handle.project_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    async fn listing(
        &self,
        operation: Operation,
        handle: &ProjectHandle,
        select: fn(&Inventory) -> &Vec<ResourceRecord>,
    ) -> Result<Vec<ResourceRecord>, FacadeError> {
        self.enter(operation)?;
        self.wait_if_stalled(handle).await;

        Ok(select(&self.inventory()).clone())
    }
}

#[async_trait]
impl ResourceFacade for StaticFacade {
    type Compute = ProjectHandle;
    type Image = ProjectHandle;
    type Network = ProjectHandle;

    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<ResourceHandles<Self>, FacadeError> {
        self.enter(Operation::Authenticate)?;

        let key = (
            credentials.username.clone(),
            credentials.password.clone(),
            credentials.project_id.clone(),
        );
        if !self.inventory().accounts.contains(&key) {
            return Err(FacadeError::Rejected {
                status: 401,
                message: "The request you have made requires authentication.".to_string(),
            });
        }

        let handle = ProjectHandle { project_id: credentials.project_id.clone() };
        Ok(ResourceHandles::new(handle.clone(), handle.clone(), handle))
    }

    async fn list_images(&self, image: &ProjectHandle) -> Result<Vec<ResourceRecord>, FacadeError> {
        self.listing(Operation::ListImages, image, |inventory| &inventory.images).await
    }

    async fn list_flavors(
        &self,
        compute: &ProjectHandle,
    ) -> Result<Vec<ResourceRecord>, FacadeError> {
        self.listing(Operation::ListFlavors, compute, |inventory| &inventory.flavors).await
    }

    async fn list_networks(
        &self,
        network: &ProjectHandle,
    ) -> Result<Vec<ResourceRecord>, FacadeError> {
        self.listing(Operation::ListNetworks, network, |inventory| &inventory.networks).await
    }

    async fn create_instance(
        &self,
        _compute: &ProjectHandle,
        request: &InstanceRequest,
    ) -> Result<ResourceRecord, FacadeError> {
        self.enter(Operation::CreateInstance)?;

        let mut inventory = self.inventory();
        let id = format!("instance-{}", inventory.instances.len() + 1);
        let record = ResourceRecord::new(id, &request.name);
        inventory.instances.push(record.clone());

        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn credentials(password: &str) -> Credentials {
        Credentials::parse(&format!("alice,{password},demo"), "http://keystone.test").unwrap()
    }

    fn facade() -> StaticFacade {
        StaticFacade::new()
            .with_account("alice", "s3cret", "demo")
            .with_images(vec![ResourceRecord::new("img-1", "cirros")])
    }

    #[tokio::test]
    async fn authenticates_known_account() {
        let facade = facade();

        let handles = facade.authenticate(&credentials("s3cret")).await.unwrap();
        assert_eq!(handles.image.project_id, "demo");
        assert_eq!(facade.calls(Operation::Authenticate), 1);
    }

    #[tokio::test]
    async fn rejects_unknown_account() {
        let result = facade().authenticate(&credentials("wrong")).await;
        assert!(matches!(result, Err(FacadeError::Rejected { status: 401, .. })));
    }

    #[tokio::test]
    async fn injected_failure_until_recovered() {
        let facade = facade();
        let handles = facade.authenticate(&credentials("s3cret")).await.unwrap();

        facade.fail(Operation::ListImages);
        assert!(matches!(facade.list_images(&handles.image).await, Err(FacadeError::Backend(_))));

        facade.recover(Operation::ListImages);
        assert_eq!(facade.list_images(&handles.image).await.unwrap().len(), 1);
        assert_eq!(facade.calls(Operation::ListImages), 2);
    }

    #[tokio::test]
    async fn stalled_project_waits_for_release() {
        let facade = facade();
        let handles = facade.authenticate(&credentials("s3cret")).await.unwrap();
        facade.stall_project("demo");

        let call = {
            let facade = facade.clone();
            tokio::spawn(async move { facade.list_images(&handles.image).await })
        };
        tokio::task::yield_now().await;
        assert!(!call.is_finished());

        facade.release_project("demo");
        assert_eq!(call.await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_instance_records_request() {
        let facade = facade();
        let handles = facade.authenticate(&credentials("s3cret")).await.unwrap();

        let request = InstanceRequest {
            flavor_id: "1".to_string(),
            network_id: "net-a".to_string(),
            name: "vm-1".to_string(),
            image_id: Some("img-1".to_string()),
        };
        let created = facade.create_instance(&handles.compute, &request).await.unwrap();

        assert_eq!(created, ResourceRecord::new("instance-1", "vm-1"));
        assert_eq!(facade.instances(), vec![created]);
    }
}
