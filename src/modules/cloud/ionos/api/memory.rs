//! An in-process cloud, for tests and dry experiments.
//!
//! Collections are keyed by their path (`/datacenters`,
//! `/datacenters/<id>/lans`), resources live at `<collection>/<id>`. Every
//! call is recorded so tests can assert on the traffic a module produced.

use super::{CloudClient, ListQuery, Mutation, RequestStatus, ResourceLister, ResourceMutator};
use crate::modules::cloud::ionos::pagination::Page;
use crate::modules::{ModuleError, ModuleResult};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// A recorded API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, Vec<Value>>,
    documents: HashMap<String, Value>,
    calls: Vec<Call>,
    failure: Option<(u16, String)>,
}

/// In-memory implementation of [`CloudClient`]
#[derive(Debug)]
pub struct InMemoryCloud {
    state: Mutex<MemoryState>,
    ready_state: String,
    actions: HashSet<String>,
}

impl Default for InMemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

fn split(path: &str) -> Option<(&str, &str)> {
    path.trim_end_matches('/').rsplit_once('/')
}

fn not_found() -> ModuleError {
    ModuleError::Api {
        status: 404,
        message: "Resource does not exist".to_string(),
    }
}

/// The properties carried by a request body, with or without the envelope
fn properties_of(body: &Value) -> Map<String, Value> {
    match body.get("properties") {
        Some(Value::Object(properties)) => properties.clone(),
        _ => body.as_object().cloned().unwrap_or_default(),
    }
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            ready_state: "AVAILABLE".to_string(),
            actions: HashSet::new(),
        }
    }

    /// `metadata.state` given to created and updated resources
    pub fn with_ready_state(mut self, state: &str) -> Self {
        self.ready_state = state.to_string();
        self
    }

    /// Treat POST on `<resource>/<action>` as an action instead of a creation
    pub fn with_action(mut self, action: &str) -> Self {
        self.actions.insert(action.to_string());
        self
    }

    pub fn with_items(self, collection: &str, items: Vec<Value>) -> Self {
        self.seed(collection, items);
        self
    }

    /// Serve `value` for GET requests on `path`
    pub fn with_document(self, path: &str, value: Value) -> Self {
        self.state.lock().documents.insert(path.to_string(), value);
        self
    }

    pub fn seed(&self, collection: &str, items: Vec<Value>) {
        self.state
            .lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(items);
    }

    /// Current content of a collection
    pub fn items(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Number of calls made with an HTTP method
    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    /// Number of POST, PUT, PATCH and DELETE calls
    pub fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.method != "GET")
            .count()
    }

    /// Make every following call fail with an API error
    pub fn fail_with(&self, status: u16, message: &str) {
        self.state.lock().failure = Some((status, message.to_string()));
    }

    fn record(&self, method: &'static str, path: &str) -> ModuleResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call {
            method,
            path: path.to_string(),
        });
        match &state.failure {
            Some((status, message)) => Err(ModuleError::Api {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn request_location() -> String {
        format!("memory://cloud/requests/{}/status", Uuid::new_v4())
    }

    fn find(state: &MemoryState, path: &str) -> Option<Value> {
        let (collection, id) = split(path)?;
        state
            .collections
            .get(collection)?
            .iter()
            .find(|item| item.get("id").and_then(Value::as_str) == Some(id))
            .cloned()
    }

    fn insert(&self, state: &mut MemoryState, collection: &str, id: String, body: &Value) -> Value {
        let resource = json!({
            "id": id,
            "metadata": {"state": self.ready_state},
            "properties": Value::Object(properties_of(body)),
        });
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(resource.clone());
        resource
    }

    fn modify<F>(&self, path: &str, apply: F) -> ModuleResult<Value>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let (collection, id) = split(path).ok_or_else(not_found)?;
        let mut state = self.state.lock();
        let resource = state
            .collections
            .get_mut(collection)
            .and_then(|items| {
                items
                    .iter_mut()
                    .find(|item| item.get("id").and_then(Value::as_str) == Some(id))
            })
            .ok_or_else(not_found)?;

        if let Some(Value::Object(properties)) = resource.get_mut("properties") {
            apply(properties);
        }
        if let Some(Value::Object(metadata)) = resource.get_mut("metadata") {
            metadata.insert("state".to_string(), Value::String(self.ready_state.clone()));
        }
        Ok(resource.clone())
    }
}

impl ResourceLister for InMemoryCloud {
    fn list(&self, path: &str, query: &ListQuery) -> ModuleResult<Page> {
        self.record("GET", path)?;
        let items = self.items(path);

        let offset = query.offset.unwrap_or(0) as usize;
        let Some(limit) = query.limit.map(|limit| limit as usize) else {
            return Ok(Page::last(items.into_iter().skip(offset).collect()));
        };

        let end = offset.saturating_add(limit);
        let next = (end < items.len()).then(|| format!("{}?offset={}&limit={}", path, end, limit));
        let page = items.into_iter().skip(offset).take(limit).collect();
        Ok(Page::new(page, next))
    }

    fn get(&self, path: &str, _depth: Option<u32>) -> ModuleResult<Value> {
        self.record("GET", path)?;
        let state = self.state.lock();
        if let Some(document) = state.documents.get(path) {
            return Ok(document.clone());
        }
        Self::find(&state, path).ok_or_else(not_found)
    }
}

impl ResourceMutator for InMemoryCloud {
    fn create(&self, path: &str, body: &Value) -> ModuleResult<Mutation> {
        self.record("POST", path)?;
        let mut state = self.state.lock();

        // A registered action below an existing resource, e.g. `/pipelines/<id>/key`
        if let Some((parent, action)) = split(path) {
            if self.actions.contains(action) && Self::find(&state, parent).is_some() {
                let mut resource = Map::new();
                resource.insert(action.to_string(), Value::String(Uuid::new_v4().to_string()));
                return Ok(Mutation {
                    resource: Value::Object(resource),
                    request: None,
                });
            }
        }

        let resource = self.insert(&mut state, path, Uuid::new_v4().to_string(), body);
        Ok(Mutation {
            resource,
            request: Some(Self::request_location()),
        })
    }

    fn replace(&self, path: &str, body: &Value) -> ModuleResult<Mutation> {
        self.record("PUT", path)?;
        let properties = properties_of(body);

        let exists = Self::find(&self.state.lock(), path).is_some();
        let resource = if exists {
            self.modify(path, |current| *current = properties)?
        } else {
            let (collection, id) = split(path).ok_or_else(not_found)?;
            let mut state = self.state.lock();
            self.insert(&mut state, collection, id.to_string(), body)
        };

        Ok(Mutation {
            resource,
            request: Some(Self::request_location()),
        })
    }

    fn update(&self, path: &str, body: &Value) -> ModuleResult<Mutation> {
        self.record("PATCH", path)?;
        let changes = properties_of(body);
        let resource = self.modify(path, |current| current.extend(changes))?;
        Ok(Mutation {
            resource,
            request: Some(Self::request_location()),
        })
    }

    fn delete(&self, path: &str) -> ModuleResult<Mutation> {
        self.record("DELETE", path)?;
        let (collection, id) = split(path).ok_or_else(not_found)?;
        let mut state = self.state.lock();
        let items = state.collections.get_mut(collection).ok_or_else(not_found)?;
        let before = items.len();
        items.retain(|item| item.get("id").and_then(Value::as_str) != Some(id));
        if items.len() == before {
            return Err(not_found());
        }
        Ok(Mutation {
            resource: Value::Null,
            request: Some(Self::request_location()),
        })
    }
}

impl CloudClient for InMemoryCloud {
    fn request_status(&self, request_id: &str) -> ModuleResult<RequestStatus> {
        self.record("GET", &format!("/requests/{}/status", request_id))?;
        Ok(RequestStatus::Done)
    }
}
