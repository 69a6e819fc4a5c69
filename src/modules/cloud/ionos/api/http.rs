//! HTTP implementation of the cloud client traits.

use super::{
    ApiConfig, Auth, CloudClient, ListQuery, Mutation, RequestStatus, ResourceLister,
    ResourceMutator, Service,
};
use crate::modules::cloud::ionos::pagination::Page;
use crate::modules::{ModuleError, ModuleResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{header, Method};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// A blocking JSON client for one product API
pub struct HttpClient {
    service: Service,
    base: String,
    auth: Auth,
    client: Client,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("service", &self.service)
            .field("base", &self.base)
            .finish()
    }
}

impl HttpClient {
    pub fn new(service: Service, host: &str, config: &ApiConfig) -> ModuleResult<Self> {
        let base = Url::parse(host)
            .map_err(|e| ModuleError::InvalidParameter(format!("invalid API URL '{}': {}", host, e)))?;

        if config.certificate_fingerprint.is_some() {
            warn!(%service, "certificate_fingerprint is accepted but not verified by this client");
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("{}_{}", config.user_agent, service.product()))
            .build()
            .map_err(|e| ModuleError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            service,
            base: base.as_str().trim_end_matches('/').to_string(),
            auth: config.credentials.auth(),
            client,
        })
    }

    pub fn service(&self) -> Service {
        self.service
    }

    fn url(&self, path: &str) -> ModuleResult<Url> {
        let joined = format!("{}/{}", self.base, path.trim_start_matches('/'));
        Url::parse(&joined)
            .map_err(|e| ModuleError::InvalidParameter(format!("invalid URL '{}': {}", joined, e)))
    }

    fn request(&self, method: Method, path: &str) -> ModuleResult<RequestBuilder> {
        let url = self.url(path)?;
        debug!(service = %self.service, %method, %url, "api call");

        let request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");

        Ok(match &self.auth {
            Auth::Token(token) => request.bearer_auth(token),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Anonymous => request,
        })
    }

    fn send(&self, request: RequestBuilder) -> ModuleResult<Response> {
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                ModuleError::Transport(format!("request to {} timed out: {}", self.service, e))
            } else if e.is_connect() {
                ModuleError::Transport(format!("Connection failed: {}", e))
            } else {
                ModuleError::Transport(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().unwrap_or_default();
        Err(ModuleError::Api {
            status: status.as_u16(),
            message: error_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string()),
        })
    }

    fn json_body(response: Response) -> ModuleResult<Value> {
        let text = response
            .text()
            .map_err(|e| ModuleError::Transport(format!("Failed to read response body: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn mutate(&self, method: Method, path: &str, body: Option<&Value>) -> ModuleResult<Mutation> {
        let mut request = self.request(method, path)?;
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.send(request)?;
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(Mutation {
            resource: Self::json_body(response)?,
            request: location,
        })
    }
}

/// The messages of an API error body, or its raw text
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let messages: Vec<String> = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("messages").and_then(Value::as_array).cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|m| m.get("message").and_then(Value::as_str).map(str::to_string))
        .collect();

    if messages.is_empty() {
        Some(body.to_string())
    } else {
        Some(messages.join("; "))
    }
}

/// Split a listing response into its items and next link
fn parse_page(body: Value) -> Page {
    let next = ["_links", "links"]
        .iter()
        .find_map(|key| body.get(key).and_then(|links| links.get("next")).and_then(Value::as_str))
        .map(str::to_string);

    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    Page { items, next }
}

impl ResourceLister for HttpClient {
    fn list(&self, path: &str, query: &ListQuery) -> ModuleResult<Page> {
        let mut pairs = Vec::new();
        if let Some(depth) = query.depth {
            pairs.push(("depth", depth));
        }
        if let Some(offset) = query.offset {
            pairs.push(("offset", offset));
        }
        if let Some(limit) = query.limit {
            pairs.push(("limit", limit));
        }

        let request = self.request(Method::GET, path)?.query(&pairs);
        let body = Self::json_body(self.send(request)?)?;
        Ok(parse_page(body))
    }

    fn get(&self, path: &str, depth: Option<u32>) -> ModuleResult<Value> {
        let mut request = self.request(Method::GET, path)?;
        if let Some(depth) = depth {
            request = request.query(&[("depth", depth)]);
        }
        Self::json_body(self.send(request)?)
    }
}

impl ResourceMutator for HttpClient {
    fn create(&self, path: &str, body: &Value) -> ModuleResult<Mutation> {
        self.mutate(Method::POST, path, Some(body))
    }

    fn replace(&self, path: &str, body: &Value) -> ModuleResult<Mutation> {
        self.mutate(Method::PUT, path, Some(body))
    }

    fn update(&self, path: &str, body: &Value) -> ModuleResult<Mutation> {
        self.mutate(Method::PATCH, path, Some(body))
    }

    fn delete(&self, path: &str) -> ModuleResult<Mutation> {
        self.mutate(Method::DELETE, path, None)
    }
}

impl CloudClient for HttpClient {
    fn request_status(&self, request_id: &str) -> ModuleResult<RequestStatus> {
        let status = self.get(&format!("/requests/{}/status", request_id), None)?;
        let status = status
            .pointer("/metadata/status")
            .and_then(Value::as_str)
            .unwrap_or("QUEUED");
        Ok(RequestStatus::parse(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_page() {
        let page = parse_page(json!({
            "items": [{"id": "a1"}],
            "_links": {"next": "/datacenters?offset=1"}
        }));
        assert_eq!(page.items, vec![json!({"id": "a1"})]);
        assert_eq!(page.next.as_deref(), Some("/datacenters?offset=1"));

        let page = parse_page(json!({"items": [], "links": {}}));
        assert!(page.items.is_empty());
        assert!(page.next.is_none());

        let page = parse_page(json!([{"id": "x"}]));
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"httpStatus":404,"messages":[{"errorCode":"309","message":"Resource does not exist"}]}"#;
        assert_eq!(error_message(body).as_deref(), Some("Resource does not exist"));
        assert_eq!(error_message("gateway exploded").as_deref(), Some("gateway exploded"));
        assert_eq!(error_message("  "), None);
    }
}
