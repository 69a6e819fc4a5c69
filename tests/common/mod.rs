//! Shared helpers for the integration tests
//!
//! Modules run against an [`InMemoryCloud`] registered for every service, so
//! no test touches the network unless it starts its own mock server.

#![allow(dead_code)]

use ionos_cloud_modules::config::Settings;
use ionos_cloud_modules::modules::cloud::ionos::api::{Clients, CloudClient, InMemoryCloud, Service};
use ionos_cloud_modules::modules::{ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Build module parameters from a JSON object
pub fn params(value: Value) -> ModuleParams {
    serde_json::from_value(value).expect("parameters must be a JSON object")
}

/// Settings with a poll interval short enough for tests
pub fn fast_settings() -> Settings {
    Settings {
        poll_interval: Duration::from_millis(1),
        ..Settings::default()
    }
}

/// A context whose clients all point at `cloud`
pub fn context(cloud: &Arc<InMemoryCloud>) -> ModuleContext {
    let mut clients = Clients::new();
    for service in Service::ALL {
        clients.insert(service, Arc::clone(cloud) as Arc<dyn CloudClient>);
    }
    ModuleContext::new()
        .with_settings(fast_settings())
        .with_clients(clients)
}

/// Run a builtin module through the registry, the way the CLI does
pub fn run(module: &str, params: Value, context: &ModuleContext) -> ModuleOutput {
    ModuleRegistry::with_builtins().run(module, &self::params(params), context)
}

/// Two datacenters, `web` (a1) and `db` (b2)
pub fn datacenters() -> Vec<Value> {
    vec![
        serde_json::json!({
            "id": "a1",
            "metadata": {"state": "AVAILABLE"},
            "properties": {"name": "web", "location": "de/fra", "description": "frontend"}
        }),
        serde_json::json!({
            "id": "b2",
            "metadata": {"state": "AVAILABLE"},
            "properties": {"name": "db", "location": "de/txl"}
        }),
    ]
}
