//! Resource Service Facade contract.
//!
//! The gateway never talks to a cloud SDK directly. It talks to a
//! [`ResourceFacade`], which authenticates a project and hands back opaque
//! per-service handles. Every later call is made with one of those handles.
//!
//! Implementations must be non-blocking: sessions run as cooperative tasks,
//! and a facade call that blocks its worker thread stalls every session
//! scheduled on that thread.

use std::fmt;

use async_trait::async_trait;
use stackgate_proto::messages::RECORD_SEPARATOR;

use crate::{auth::Credentials, error::FacadeError};

/// A named control-plane resource (image, flavor, network, server).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRecord {
    /// Backend identifier
    pub id: String,
    /// Human-readable name (may be empty)
    pub name: String,
}

impl ResourceRecord {
    /// Create a record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }

    /// Render a listing as newline-joined `<id> : <name>` lines.
    ///
    /// Order is preserved exactly as given; the facade's ordering is part of
    /// the response.
    pub fn render_listing(records: &[Self]) -> String {
        records.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{RECORD_SEPARATOR}{}", self.id, self.name)
    }
}

/// Parameters for creating a compute instance.
///
/// Reserved: the session protocol does not yet expose a way for the client to
/// choose a flavor and network, so nothing in the session issues this call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRequest {
    /// Flavor to boot with
    pub flavor_id: String,
    /// Network to attach
    pub network_id: String,
    /// Name of the new instance
    pub name: String,
    /// Image to boot from, when the flavor does not boot from volume
    pub image_id: Option<String>,
}

/// Handles to the three services a session uses after authentication.
///
/// Owned exclusively by one session and dropped when that session closes.
pub struct ResourceHandles<F: ResourceFacade + ?Sized> {
    /// Compute service handle (flavors, servers)
    pub compute: F::Compute,
    /// Image service handle
    pub image: F::Image,
    /// Network service handle
    pub network: F::Network,
}

impl<F: ResourceFacade + ?Sized> ResourceHandles<F> {
    /// Bundle three service handles.
    pub fn new(compute: F::Compute, image: F::Image, network: F::Network) -> Self {
        Self { compute, image, network }
    }
}

impl<F: ResourceFacade + ?Sized> fmt::Debug for ResourceHandles<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Handles usually embed access tokens.
        f.debug_struct("ResourceHandles").finish_non_exhaustive()
    }
}

/// Cloud control-plane operations consumed by the gateway.
///
/// The associated handle types are opaque to the core. A real adapter
/// typically stores an endpoint URL and an access token in each.
#[async_trait]
pub trait ResourceFacade: Send + Sync + 'static {
    /// Handle for the compute service.
    type Compute: Send + Sync + 'static;
    /// Handle for the image service.
    type Image: Send + Sync + 'static;
    /// Handle for the network service.
    type Network: Send + Sync + 'static;

    /// Authenticate against the identity service at `credentials.auth_url`.
    ///
    /// # Errors
    ///
    /// Any failure to obtain a non-empty access token and all three handles.
    /// Implementations must not return partial success.
    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<ResourceHandles<Self>, FacadeError>;

    /// List images visible to the authenticated project, in backend order.
    async fn list_images(&self, image: &Self::Image) -> Result<Vec<ResourceRecord>, FacadeError>;

    /// List compute flavors, in backend order.
    async fn list_flavors(
        &self,
        compute: &Self::Compute,
    ) -> Result<Vec<ResourceRecord>, FacadeError>;

    /// List networks visible to the project, in backend order.
    async fn list_networks(
        &self,
        network: &Self::Network,
    ) -> Result<Vec<ResourceRecord>, FacadeError>;

    /// Create a compute instance.
    async fn create_instance(
        &self,
        compute: &Self::Compute,
        request: &InstanceRequest,
    ) -> Result<ResourceRecord, FacadeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_renders_with_separator() {
        let record = ResourceRecord::new("c1d2", "cirros-0.6.2");
        assert_eq!(record.to_string(), "c1d2 : cirros-0.6.2");
    }

    #[test]
    fn listing_preserves_order() {
        let records = vec![
            ResourceRecord::new("b", "second-alphabetically"),
            ResourceRecord::new("a", "first-alphabetically"),
        ];
        assert_eq!(
            ResourceRecord::render_listing(&records),
            "b : second-alphabetically\na : first-alphabetically"
        );
    }

    #[test]
    fn empty_name_still_renders_separator() {
        assert_eq!(ResourceRecord::render_listing(&[ResourceRecord::new("x", "")]), "x : ");
    }
}
