//! OpenStack facade.
//!
//! Speaks the OpenStack REST APIs directly with `reqwest`:
//!
//! - Keystone (identity) issues a project-scoped token and a service catalog
//! - Glance (image) lists images
//! - Nova (compute) lists flavors and creates servers
//! - Neutron (network) lists networks
//!
//! Authentication resolves the public endpoint of each service from the
//! catalog. The handles returned to the session carry that endpoint and the
//! token, so later calls need no further identity round trips.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use stackgate_core::{
    Credentials, FacadeError, InstanceRequest, ResourceFacade, ResourceHandles, ResourceRecord,
};

use crate::config::IdentityVersion;

const TOKEN_HEADER: &str = "X-Auth-Token";
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Service endpoint plus the token to present to it.
#[derive(Clone)]
pub struct ServiceEndpoint {
    url: String,
    token: String,
}

impl ServiceEndpoint {
    fn new(url: &str, token: &str) -> Self {
        Self { url: url.trim_end_matches('/').to_string(), token: token.to_string() }
    }

    /// Base URL of the service.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Nova handle.
#[derive(Debug, Clone)]
pub struct ComputeHandle(ServiceEndpoint);

/// Glance handle.
#[derive(Debug, Clone)]
pub struct ImageHandle(ServiceEndpoint);

/// Neutron handle.
#[derive(Debug, Clone)]
pub struct NetworkHandle(ServiceEndpoint);

/// Facade backed by an OpenStack deployment.
pub struct OpenStackFacade {
    client: Client,
    version: IdentityVersion,
}

impl OpenStackFacade {
    /// Create a facade speaking `version` of the identity API.
    pub fn new(version: IdentityVersion) -> Self {
        Self::with_client(Client::new(), version)
    }

    /// Create a facade with a preconfigured HTTP client.
    pub fn with_client(client: Client, version: IdentityVersion) -> Self {
        Self { client, version }
    }

    async fn authenticate_v3(&self, credentials: &Credentials) -> Result<Catalog, FacadeError> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": credentials.username,
                            "domain": { "name": "Default" },
                            "password": credentials.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "id": credentials.project_id,
                        "domain": { "name": "Default" },
                    }
                }
            }
        });

        let url = format!("{}/v3/auth/tokens", credentials.auth_url.trim_end_matches('/'));
        let request = self.client.post(&url).json(&body).send().await;
        let response = check(request.map_err(transport_failure)?).await?;

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body: V3TokenResponse = decode(response).await?;
        let services = body
            .token
            .catalog
            .into_iter()
            .map(|service| {
                let url = service
                    .endpoints
                    .into_iter()
                    .find(|endpoint| endpoint.interface == "public")
                    .map(|endpoint| endpoint.url);
                (service.kind, url)
            })
            .collect();

        Ok(Catalog { token, services })
    }

    async fn authenticate_v2(&self, credentials: &Credentials) -> Result<Catalog, FacadeError> {
        let body = json!({
            "auth": {
                "passwordCredentials": {
                    "username": credentials.username,
                    "password": credentials.password,
                },
                "tenantId": credentials.project_id,
            }
        });

        let url = format!("{}/v2.0/tokens", credentials.auth_url.trim_end_matches('/'));
        let request = self.client.post(&url).json(&body).send().await;
        let response = check(request.map_err(transport_failure)?).await?;

        let body: V2TokenResponse = decode(response).await?;
        let services = body
            .access
            .service_catalog
            .into_iter()
            .map(|service| {
                let url = service.endpoints.into_iter().next().map(|endpoint| endpoint.public_url);
                (service.kind, url)
            })
            .collect();

        Ok(Catalog { token: body.access.token.id, services })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &ServiceEndpoint,
        url: &str,
    ) -> Result<T, FacadeError> {
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &endpoint.token)
            .send()
            .await
            .map_err(transport_failure)?;

        decode(check(response).await?).await
    }
}

#[async_trait]
impl ResourceFacade for OpenStackFacade {
    type Compute = ComputeHandle;
    type Image = ImageHandle;
    type Network = NetworkHandle;

    async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<ResourceHandles<Self>, FacadeError> {
        let catalog = match self.version {
            IdentityVersion::V3 => self.authenticate_v3(credentials).await?,
            IdentityVersion::V2 => self.authenticate_v2(credentials).await?,
        };

        if catalog.token.is_empty() {
            return Err(FacadeError::MissingToken);
        }

        Ok(ResourceHandles::new(
            ComputeHandle(catalog.endpoint("compute")?),
            ImageHandle(catalog.endpoint("image")?),
            NetworkHandle(catalog.endpoint("network")?),
        ))
    }

    async fn list_images(&self, image: &ImageHandle) -> Result<Vec<ResourceRecord>, FacadeError> {
        let endpoint = &image.0;
        let mut url = format!("{}/v2/images", endpoint.url);
        let mut records = Vec::new();
        let mut visited = HashSet::from([url.clone()]);

        loop {
            let page: ImagePage = self.get(endpoint, &url).await?;
            records.extend(page.images.into_iter().map(NamedResource::into_record));

            let Some(next) = page.next else { break };
            let next = absolute_next(&endpoint.url, &next);
            if !visited.insert(next.clone()) {
                return Err(FacadeError::Malformed(format!("image paging loops at {next}")));
            }
            url = next;
        }

        Ok(records)
    }

    async fn list_flavors(
        &self,
        compute: &ComputeHandle,
    ) -> Result<Vec<ResourceRecord>, FacadeError> {
        let endpoint = &compute.0;
        let body: FlavorList = self.get(endpoint, &format!("{}/flavors", endpoint.url)).await?;

        Ok(body.flavors.into_iter().map(NamedResource::into_record).collect())
    }

    async fn list_networks(
        &self,
        network: &NetworkHandle,
    ) -> Result<Vec<ResourceRecord>, FacadeError> {
        let endpoint = &network.0;
        let body: NetworkList =
            self.get(endpoint, &format!("{}/v2.0/networks", endpoint.url)).await?;

        Ok(body.networks.into_iter().map(NamedResource::into_record).collect())
    }

    async fn create_instance(
        &self,
        compute: &ComputeHandle,
        request: &InstanceRequest,
    ) -> Result<ResourceRecord, FacadeError> {
        let endpoint = &compute.0;

        let mut server = json!({
            "name": request.name,
            "flavorRef": request.flavor_id,
            "networks": [{ "uuid": request.network_id }],
        });
        if let Some(image_id) = &request.image_id {
            server["imageRef"] = json!(image_id);
        }

        let response = self
            .client
            .post(format!("{}/servers", endpoint.url))
            .header(TOKEN_HEADER, &endpoint.token)
            .json(&json!({ "server": server }))
            .send()
            .await
            .map_err(transport_failure)?;

        let body: CreatedServer = decode(check(response).await?).await?;
        Ok(ResourceRecord::new(body.server.id, &request.name))
    }
}

/// Token plus public endpoint per service type.
struct Catalog {
    token: String,
    services: Vec<(String, Option<String>)>,
}

impl Catalog {
    fn endpoint(&self, kind: &str) -> Result<ServiceEndpoint, FacadeError> {
        self.services
            .iter()
            .find_map(|(service, url)| if service == kind { url.as_deref() } else { None })
            .map(|url| ServiceEndpoint::new(url, &self.token))
            .ok_or_else(|| FacadeError::MissingEndpoint(kind.to_string()))
    }
}

/// Glance returns `next` relative to the service root.
fn absolute_next(base: &str, next: &str) -> String {
    if next.starts_with("http://") || next.starts_with("https://") {
        next.to_string()
    } else {
        format!("{base}{next}")
    }
}

async fn check(response: Response) -> Result<Response, FacadeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(FacadeError::Rejected { status: status.as_u16(), message })
        },
        _ => Err(FacadeError::Backend(format!("HTTP {status}: {message}"))),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FacadeError> {
    response.json::<T>().await.map_err(|e| FacadeError::Malformed(e.to_string()))
}

fn transport_failure(err: reqwest::Error) -> FacadeError {
    FacadeError::Unreachable(err.to_string())
}

#[derive(Deserialize)]
struct V3TokenResponse {
    token: V3Token,
}

#[derive(Deserialize)]
struct V3Token {
    #[serde(default)]
    catalog: Vec<V3Service>,
}

#[derive(Deserialize)]
struct V3Service {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<V3Endpoint>,
}

#[derive(Deserialize)]
struct V3Endpoint {
    interface: String,
    url: String,
}

#[derive(Deserialize)]
struct V2TokenResponse {
    access: V2Access,
}

#[derive(Deserialize)]
struct V2Access {
    token: V2Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<V2Service>,
}

#[derive(Deserialize)]
struct V2Token {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct V2Service {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<V2Endpoint>,
}

#[derive(Deserialize)]
struct V2Endpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
}

#[derive(Deserialize)]
struct NamedResource {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl NamedResource {
    fn into_record(self) -> ResourceRecord {
        ResourceRecord::new(self.id, self.name.unwrap_or_default())
    }
}

#[derive(Deserialize)]
struct ImagePage {
    images: Vec<NamedResource>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct FlavorList {
    flavors: Vec<NamedResource>,
}

#[derive(Deserialize)]
struct NetworkList {
    networks: Vec<NamedResource>,
}

#[derive(Deserialize)]
struct CreatedServer {
    server: CreatedServerId,
}

#[derive(Deserialize)]
struct CreatedServerId {
    id: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn next_link_is_resolved_against_service_root() {
        assert_eq!(
            absolute_next("http://glance:9292", "/v2/images?marker=abc"),
            "http://glance:9292/v2/images?marker=abc"
        );
        assert_eq!(
            absolute_next("http://glance:9292", "https://other/v2/images?marker=abc"),
            "https://other/v2/images?marker=abc"
        );
    }

    #[test]
    fn catalog_reports_missing_service() {
        let catalog = Catalog {
            token: "tok".to_string(),
            services: vec![
                ("compute".to_string(), Some("http://nova/v2.1/".to_string())),
                ("image".to_string(), None),
            ],
        };

        assert_eq!(catalog.endpoint("compute").unwrap().url(), "http://nova/v2.1");
        assert_eq!(
            catalog.endpoint("image").unwrap_err(),
            FacadeError::MissingEndpoint("image".to_string())
        );
        assert!(matches!(catalog.endpoint("network"), Err(FacadeError::MissingEndpoint(_))));
    }

    #[test]
    fn endpoint_debug_redacts_token() {
        let endpoint = ServiceEndpoint::new("http://nova", "gAAAAA-secret");
        assert!(!format!("{endpoint:?}").contains("secret"));
    }
}
