//! Capability interfaces over the IONOS Cloud APIs.
//!
//! Each product API (compute, DNS, container registry, ...) is reached
//! through a [`CloudClient`]. Modules only depend on the traits; the HTTP
//! implementation lives in [`http`] and an in-process implementation used by
//! tests lives in [`memory`].

pub mod http;
pub mod memory;

use crate::config::Settings;
use crate::modules::{ModuleParams, ModuleResult, ModuleError, ParamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::pagination::Page;

pub use http::HttpClient;
pub use memory::InMemoryCloud;

/// A product API with its own endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    /// Cloud API v6: datacenters, LANs, Kubernetes, user management
    Compute,
    ContainerRegistry,
    Dns,
    Logging,
    PostgresDbaas,
    MongoDbaas,
    /// Object storage management: access keys and regions
    ObjectStorage,
    VmAutoscaling,
}

impl Service {
    pub const ALL: [Service; 8] = [
        Service::Compute,
        Service::ContainerRegistry,
        Service::Dns,
        Service::Logging,
        Service::PostgresDbaas,
        Service::MongoDbaas,
        Service::ObjectStorage,
        Service::VmAutoscaling,
    ];

    /// Name used for endpoint overrides in the settings file
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Compute => "compute",
            Service::ContainerRegistry => "container_registry",
            Service::Dns => "dns",
            Service::Logging => "logging",
            Service::PostgresDbaas => "postgres",
            Service::MongoDbaas => "mongo",
            Service::ObjectStorage => "object_storage",
            Service::VmAutoscaling => "vm_autoscaling",
        }
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            Service::Compute => "https://api.ionos.com/cloudapi/v6",
            Service::ContainerRegistry => "https://api.ionos.com/containerregistries",
            Service::Dns => "https://dns.de-fra.ionos.com",
            Service::Logging => "https://logging.de-txl.ionos.com",
            Service::PostgresDbaas => "https://api.ionos.com/databases/postgresql",
            Service::MongoDbaas => "https://api.ionos.com/databases/mongodb",
            Service::ObjectStorage => "https://s3.ionos.com",
            Service::VmAutoscaling => "https://api.ionos.com/autoscaling",
        }
    }

    /// Product tag appended to the user agent
    pub fn product(&self) -> &'static str {
        match self {
            Service::Compute => "cloudapi",
            Service::ContainerRegistry => "container-registry",
            Service::Dns => "dns",
            Service::Logging => "logging",
            Service::PostgresDbaas => "dbaas-postgres",
            Service::MongoDbaas => "dbaas-mongo",
            Service::ObjectStorage => "object-storage-management",
            Service::VmAutoscaling => "vm-autoscaling",
        }
    }

    /// Whether listings accept a `depth` query parameter
    pub fn supports_depth(&self) -> bool {
        matches!(self, Service::Compute | Service::VmAutoscaling)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters of a listing call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub depth: Option<u32>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl ListQuery {
    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    pub fn page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }
}

/// Outcome of a mutating call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    /// Response body, `Null` when the API returned none
    pub resource: Value,
    /// `Location` of the asynchronous request tracking the change, if any
    pub request: Option<String>,
}

/// Status of an asynchronous compute request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl RequestStatus {
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "DONE" => RequestStatus::Done,
            "FAILED" => RequestStatus::Failed,
            "RUNNING" => RequestStatus::Running,
            _ => RequestStatus::Queued,
        }
    }
}

/// Read access to collections and single resources
pub trait ResourceLister: Send + Sync {
    /// One page of the collection at `path`
    fn list(&self, path: &str, query: &ListQuery) -> ModuleResult<Page>;

    /// The resource at `path`
    fn get(&self, path: &str, depth: Option<u32>) -> ModuleResult<Value>;
}

/// Write access to collections and single resources
pub trait ResourceMutator: Send + Sync {
    /// POST `body` to `path`
    fn create(&self, path: &str, body: &Value) -> ModuleResult<Mutation>;

    /// PUT `body` to `path`
    fn replace(&self, path: &str, body: &Value) -> ModuleResult<Mutation>;

    /// PATCH `body` to `path`
    fn update(&self, path: &str, body: &Value) -> ModuleResult<Mutation>;

    /// DELETE `path`
    fn delete(&self, path: &str) -> ModuleResult<Mutation>;
}

/// A client for one product API
pub trait CloudClient: ResourceLister + ResourceMutator {
    /// Status of an asynchronous request, by request id
    fn request_status(&self, request_id: &str) -> ModuleResult<RequestStatus>;
}

/// Username/password or token credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// How requests authenticate; a token wins over username and password
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Token(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl Credentials {
    pub fn auth(&self) -> Auth {
        match (&self.token, &self.username, &self.password) {
            (Some(token), _, _) => Auth::Token(token.clone()),
            (None, Some(username), Some(password)) => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::Anonymous,
        }
    }
}

/// Connection settings for the clients of one module invocation
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub credentials: Credentials,
    /// Overrides the endpoint of every service the module uses
    pub api_url: Option<String>,
    pub certificate_fingerprint: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn from_params(params: &ModuleParams, settings: &Settings) -> ModuleResult<Self> {
        Ok(Self {
            credentials: Credentials {
                username: params.get_string("username")?,
                password: params.get_string("password")?,
                token: params.get_string("token")?,
            },
            api_url: params.get_string("api_url")?,
            certificate_fingerprint: params.get_string("certificate_fingerprint")?,
            user_agent: format!("ionos-cloud-modules/{}", env!("CARGO_PKG_VERSION")),
            timeout: settings.http_timeout,
        })
    }

    /// Endpoint for a service: `api_url`, then the settings file, then the default
    pub fn host_for(&self, service: Service, settings: &Settings) -> String {
        self.api_url
            .clone()
            .or_else(|| settings.endpoint(service.as_str()).map(str::to_string))
            .unwrap_or_else(|| service.default_host().to_string())
    }
}

/// The clients available to a module invocation, one per service
#[derive(Clone, Default)]
pub struct Clients {
    clients: HashMap<Service, Arc<dyn CloudClient>>,
}

impl fmt::Debug for Clients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clients")
            .field("services", &self.services())
            .finish()
    }
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: Service, client: Arc<dyn CloudClient>) -> Self {
        self.insert(service, client);
        self
    }

    pub fn insert(&mut self, service: Service, client: Arc<dyn CloudClient>) {
        self.clients.insert(service, client);
    }

    /// Build HTTP clients for the given services
    pub fn connect(config: &ApiConfig, services: &[Service], settings: &Settings) -> ModuleResult<Self> {
        let mut clients = Self::new();
        for &service in services {
            let host = config.host_for(service, settings);
            debug!(%service, %host, "connecting");
            clients.insert(service, Arc::new(HttpClient::new(service, &host, config)?));
        }
        Ok(clients)
    }

    pub fn client(&self, service: Service) -> ModuleResult<Arc<dyn CloudClient>> {
        self.clients
            .get(&service)
            .cloned()
            .ok_or_else(|| ModuleError::SdkUnavailable(service.to_string()))
    }

    /// Services with a client, sorted
    pub fn services(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.clients.keys().copied().collect();
        services.sort();
        services
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials {
            username: Some("me".into()),
            password: Some("secret".into()),
            token: Some("tok".into()),
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("me"));
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("tok\""));
    }

    #[test]
    fn test_token_wins_over_basic_auth() {
        let credentials = Credentials {
            username: Some("me".into()),
            password: Some("pw".into()),
            token: Some("tok".into()),
        };
        assert!(matches!(credentials.auth(), Auth::Token(t) if t == "tok"));

        let credentials = Credentials {
            token: None,
            ..credentials
        };
        assert!(matches!(credentials.auth(), Auth::Basic { .. }));
        assert!(matches!(Credentials::default().auth(), Auth::Anonymous));
    }

    #[test]
    fn test_host_precedence() {
        let mut params = ModuleParams::new();
        params.insert("token".into(), json!("t"));
        let mut settings = Settings::default();
        settings
            .endpoints
            .insert("dns".into(), "http://localhost:8080".into());

        let config = ApiConfig::from_params(&params, &settings).unwrap();
        assert_eq!(config.host_for(Service::Dns, &settings), "http://localhost:8080");
        assert_eq!(
            config.host_for(Service::Compute, &settings),
            Service::Compute.default_host()
        );

        params.insert("api_url".into(), json!("http://override"));
        let config = ApiConfig::from_params(&params, &settings).unwrap();
        assert_eq!(config.host_for(Service::Dns, &settings), "http://override");
    }

    #[test]
    fn test_missing_client_is_sdk_unavailable() {
        let clients = Clients::new().with(Service::Dns, Arc::new(InMemoryCloud::new()));
        assert!(clients.client(Service::Dns).is_ok());
        let err = clients.client(Service::Logging).err().unwrap();
        assert!(matches!(err, ModuleError::SdkUnavailable(ref s) if s == "logging"));
        assert_eq!(clients.services(), vec![Service::Dns]);
    }

    #[test]
    fn test_request_status_parse() {
        assert_eq!(RequestStatus::parse("DONE"), RequestStatus::Done);
        assert_eq!(RequestStatus::parse("failed"), RequestStatus::Failed);
        assert_eq!(RequestStatus::parse("QUEUED"), RequestStatus::Queued);
    }
}
