//! Declarative resource and info modules.
//!
//! Most IONOS resources differ only in where they live, which parameters map
//! to which API properties, how a change is sent and what "ready" means. A
//! [`ResourceDefinition`] captures exactly that; [`DeclarativeResource`]
//! turns it into a [`ResourceHandler`] and [`ResourceModule`] exposes any
//! handler as a [`Module`]. Listing-only modules use [`InfoDefinition`].

use crate::config::Settings;
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::api::{ApiConfig, Clients, CloudClient, ListQuery, Mutation, Service};
use super::normalize::{get_path, normalize, set_path, to_api, value_matches};
use super::options::{check_credentials, info_options, info_options_with_depth, OptionSchema, OptionSpec, State};
use super::orchestrator::{Invocation, Orchestrator, ResourceHandler, ResourceKind};
use super::pagination::fetch_all;
use super::resolver::{self, apply_filters};
use super::wait::{wait_for_removal, wait_for_request, wait_for_state, WaitOptions};

/// What a change to a field requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Recreate the resource
    Replace,
    /// Apply in place
    Update,
    /// Only sent on creation, never compared
    CreateOnly,
    /// Sent on creation and update, compared by the handler itself
    Managed,
}

/// A module parameter mapped onto a resource property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub param: &'static str,
    /// Location in the normalized resource, e.g. `["properties", "name"]`
    pub path: &'static [&'static str],
    pub policy: Policy,
    /// Compare lists as multisets
    pub unordered: bool,
    /// The parameter names another resource, sent as that resource's id
    pub lookup: Option<Parent>,
}

impl Field {
    pub fn replace(param: &'static str, path: &'static [&'static str]) -> Self {
        Self::new(param, path, Policy::Replace)
    }

    pub fn update(param: &'static str, path: &'static [&'static str]) -> Self {
        Self::new(param, path, Policy::Update)
    }

    pub fn create_only(param: &'static str, path: &'static [&'static str]) -> Self {
        Self::new(param, path, Policy::CreateOnly)
    }

    pub fn managed(param: &'static str, path: &'static [&'static str]) -> Self {
        Self::new(param, path, Policy::Managed)
    }

    fn new(param: &'static str, path: &'static [&'static str], policy: Policy) -> Self {
        Self {
            param,
            path,
            policy,
            unordered: false,
            lookup: None,
        }
    }

    pub fn unordered(mut self) -> Self {
        self.unordered = true;
        self
    }

    pub fn looked_up_in(mut self, lookup: Parent) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// The parameter value, if one was given
    pub fn desired<'p>(&self, params: &'p ModuleParams) -> Option<&'p Value> {
        params.get(self.param).filter(|value| !value.is_null())
    }

    /// Whether a given parameter disagrees with the resource
    pub fn differs(&self, existing: &Value, params: &ModuleParams) -> bool {
        self.desired(params)
            .is_some_and(|desired| !value_matches(desired, get_path(existing, self.path), self.unordered))
    }
}

/// A parent resource the collection path depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parent {
    /// Parameter carrying the parent's name or id
    pub param: &'static str,
    pub object_name: &'static str,
    /// Collection the parent is resolved in
    pub collection: &'static str,
}

impl Parent {
    /// Resolve the parent's id, listing its collection
    pub fn resolve(&self, client: &dyn CloudClient, identifier: &str) -> ModuleResult<String> {
        let items = client
            .list(self.collection, &ListQuery::default().with_depth(Some(1)))?
            .items;
        resolver::find(&items, identifier, &resolver::default_identity_paths())
            .and_then(resolver::resource_id)
            .map(str::to_string)
            .ok_or_else(|| ModuleError::DependencyNotFound {
                kind: self.object_name.to_string(),
                identifier: identifier.to_string(),
            })
    }
}

/// Where the collection of a resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    Root(&'static str),
    /// Nested below a required parent; `{}` in the template is the parent id
    Child { parent: Parent, template: &'static str },
    /// Nested below an optional parent, `fallback` when it is not given
    OptionalChild {
        parent: Parent,
        template: &'static str,
        fallback: &'static str,
    },
}

impl Collection {
    pub fn resolve(&self, client: &dyn CloudClient, params: &ModuleParams) -> ModuleResult<String> {
        match self {
            Collection::Root(path) => Ok((*path).to_string()),
            Collection::Child { parent, template } => {
                let identifier = params.get_string(parent.param)?.ok_or_else(|| {
                    ModuleError::MissingParameter(format!("{} parameter is required", parent.param))
                })?;
                Ok(template.replace("{}", &parent.resolve(client, &identifier)?))
            }
            Collection::OptionalChild {
                parent,
                template,
                fallback,
            } => match params.get_string(parent.param)? {
                Some(identifier) => Ok(template.replace("{}", &parent.resolve(client, &identifier)?)),
                None => Ok((*fallback).to_string()),
            },
        }
    }
}

/// How a resource is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateRequest {
    /// POST to the collection
    Post,
    /// PUT to `<collection>/<generated uuid>`
    PutWithGeneratedId,
}

/// How a change is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRequest {
    /// PATCH the changed properties, without envelope
    PatchProperties,
    /// PATCH `{"properties": {...}}` with the changed properties
    PatchEnvelope,
    /// PUT `{"properties": {...}}` with the desired values over the existing ones
    PutEnvelope,
}

/// When a mutated resource counts as provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Immediate,
    /// The asynchronous request in the `Location` header is done
    Request,
    /// The value at `path` equals `ready`
    State {
        path: &'static [&'static str],
        ready: &'static str,
    },
}

/// How a collection is listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    Single,
    /// Offset/limit pages of the configured size
    Offset,
}

/// List a collection, normalized
pub fn fetch_collection(
    client: &dyn CloudClient,
    path: &str,
    depth: Option<u32>,
    paging: Paging,
    settings: &Settings,
) -> ModuleResult<Vec<Value>> {
    let query = ListQuery::default().with_depth(depth);
    let items = match paging {
        Paging::Single => client.list(path, &query)?.items,
        Paging::Offset => fetch_all(
            |offset, limit| client.list(path, &query.page(offset, limit)),
            settings.page_size,
        )?,
    };
    debug!(%path, count = items.len(), "listed");
    Ok(items.into_iter().map(normalize).collect())
}

/// Deterministic namespace, random name: ids the API accepts for PUT creation
pub fn generated_id() -> Uuid {
    let namespace = Uuid::new_v5(&Uuid::NAMESPACE_URL, env!("CARGO_PKG_REPOSITORY").as_bytes());
    Uuid::new_v5(&namespace, Uuid::new_v4().to_string().as_bytes())
}

/// Everything that distinguishes one declarative resource from another
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    pub kind: ResourceKind,
    pub service: Service,
    pub collection: Collection,
    pub fields: Vec<Field>,
    pub create: CreateRequest,
    pub update: UpdateRequest,
    pub readiness: Readiness,
    /// Poll until the resource answers 404 after deletion
    pub wait_for_removal: bool,
    pub depth: Option<u32>,
}

impl ResourceDefinition {
    pub fn new(kind: ResourceKind, service: Service, collection: Collection) -> Self {
        Self {
            kind,
            service,
            collection,
            fields: Vec::new(),
            create: CreateRequest::Post,
            update: UpdateRequest::PatchProperties,
            readiness: Readiness::Immediate,
            wait_for_removal: false,
            depth: None,
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn create_with(mut self, create: CreateRequest) -> Self {
        self.create = create;
        self
    }

    pub fn update_with(mut self, update: UpdateRequest) -> Self {
        self.update = update;
        self
    }

    pub fn ready_when(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn wait_for_removal(mut self) -> Self {
        self.wait_for_removal = true;
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// A [`ResourceHandler`] driven by a [`ResourceDefinition`]
#[derive(Debug, Clone)]
pub struct DeclarativeResource {
    definition: ResourceDefinition,
}

impl DeclarativeResource {
    pub fn new(definition: ResourceDefinition) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    pub fn client(&self, invocation: &Invocation<'_>) -> ModuleResult<Arc<dyn CloudClient>> {
        invocation.clients.client(self.definition.service)
    }

    pub fn collection_path(&self, client: &dyn CloudClient, invocation: &Invocation<'_>) -> ModuleResult<String> {
        self.definition.collection.resolve(client, invocation.params)
    }

    /// `<collection>/<id>` of an existing resource
    pub fn item_path(
        &self,
        client: &dyn CloudClient,
        existing: &Value,
        invocation: &Invocation<'_>,
    ) -> ModuleResult<String> {
        let id = resolver::resource_id(existing)
            .ok_or_else(|| ModuleError::NotFound(format!("id of the {}", self.definition.kind.object_name)))?;
        Ok(format!("{}/{}", self.collection_path(client, invocation)?, id))
    }

    /// A normalized body of the fields accepted by `include`, falling back to
    /// `existing` for fields without a parameter
    fn body<F>(&self, existing: Option<&Value>, params: &ModuleParams, include: F) -> Value
    where
        F: Fn(&Field) -> bool,
    {
        let mut body = Value::Object(Map::new());
        for field in self.definition.fields.iter().filter(|field| include(field)) {
            let value = field
                .desired(params)
                .or_else(|| existing.and_then(|existing| get_path(existing, field.path)));
            if let Some(value) = value {
                set_path(&mut body, field.path, value.clone());
            }
        }
        body
    }

    fn is_updatable(field: &Field) -> bool {
        matches!(field.policy, Policy::Update | Policy::Managed)
    }

    /// Wait for a mutation to settle and return the resource at `item`
    fn settle(
        &self,
        client: &dyn CloudClient,
        item: &str,
        mutation: Mutation,
        wait: &WaitOptions,
    ) -> ModuleResult<Value> {
        let fetch_or_keep = |resource: Value| -> ModuleResult<Value> {
            if resource.is_null() {
                client.get(item, self.definition.depth)
            } else {
                Ok(resource)
            }
        };

        if !wait.enabled {
            return fetch_or_keep(mutation.resource).map(normalize);
        }

        let resource = match self.definition.readiness {
            Readiness::Immediate => fetch_or_keep(mutation.resource)?,
            Readiness::Request => {
                if let Some(location) = mutation.request.as_deref() {
                    wait_for_request(client, location, wait)?;
                }
                client.get(item, self.definition.depth)?
            }
            Readiness::State { path, ready } => wait_for_state(client, item, path, ready, wait)?,
        };
        Ok(normalize(resource))
    }
}

impl ResourceHandler for DeclarativeResource {
    fn kind(&self) -> &ResourceKind {
        &self.definition.kind
    }

    fn resolve_references(&self, params: &ModuleParams, clients: &Clients) -> ModuleResult<Option<ModuleParams>> {
        let mut resolved: Option<ModuleParams> = None;
        for field in &self.definition.fields {
            let Some(lookup) = &field.lookup else {
                continue;
            };
            let Some(identifier) = field.desired(params).and_then(Value::as_str) else {
                continue;
            };
            let client = clients.client(self.definition.service)?;
            let id = lookup.resolve(client.as_ref(), identifier)?;
            debug!(param = field.param, %identifier, %id, "resolved reference");
            resolved
                .get_or_insert_with(|| params.clone())
                .insert(field.param.to_string(), Value::String(id));
        }
        Ok(resolved)
    }

    fn list(&self, invocation: &Invocation<'_>) -> ModuleResult<Vec<Value>> {
        let client = self.client(invocation)?;
        let path = self.collection_path(client.as_ref(), invocation)?;
        fetch_collection(
            client.as_ref(),
            &path,
            self.definition.depth,
            Paging::Single,
            invocation.settings,
        )
    }

    fn should_replace(&self, existing: &Value, invocation: &Invocation<'_>) -> bool {
        self.definition
            .fields
            .iter()
            .filter(|field| field.policy == Policy::Replace)
            .any(|field| field.differs(existing, invocation.params))
    }

    fn should_update(&self, existing: &Value, invocation: &Invocation<'_>) -> bool {
        self.definition
            .fields
            .iter()
            .filter(|field| field.policy == Policy::Update)
            .any(|field| field.differs(existing, invocation.params))
    }

    fn create(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> ModuleResult<Value> {
        let client = self.client(invocation)?;
        let collection = self.collection_path(client.as_ref(), invocation)?;
        let body = to_api(self.body(existing, invocation.params, |_| true));

        let (mutation, item) = match self.definition.create {
            CreateRequest::Post => {
                let mutation = client.create(&collection, &body)?;
                let id = resolver::resource_id(&mutation.resource)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ModuleError::NotFound(format!(
                            "id of the created {}",
                            self.definition.kind.object_name
                        ))
                    })?;
                (mutation, format!("{}/{}", collection, id))
            }
            CreateRequest::PutWithGeneratedId => {
                let item = format!("{}/{}", collection, generated_id());
                (client.replace(&item, &body)?, item)
            }
        };

        self.settle(client.as_ref(), &item, mutation, &invocation.wait)
    }

    fn update(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<Value> {
        let client = self.client(invocation)?;
        let item = self.item_path(client.as_ref(), existing, invocation)?;

        let mutation = match self.definition.update {
            UpdateRequest::PatchProperties => {
                let body = self.body(None, invocation.params, Self::is_updatable);
                let properties = body
                    .get("properties")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                client.update(&item, &to_api(properties))?
            }
            UpdateRequest::PatchEnvelope => {
                let body = self.body(None, invocation.params, Self::is_updatable);
                client.update(&item, &to_api(body))?
            }
            UpdateRequest::PutEnvelope => {
                let body = self.body(Some(existing), invocation.params, Self::is_updatable);
                client.replace(&item, &to_api(body))?
            }
        };

        self.settle(client.as_ref(), &item, mutation, &invocation.wait)
    }

    fn remove(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<()> {
        let client = self.client(invocation)?;
        let item = self.item_path(client.as_ref(), existing, invocation)?;
        let mutation = client.delete(&item)?;

        if !invocation.wait.enabled {
            return Ok(());
        }
        if self.definition.wait_for_removal {
            wait_for_removal(client.as_ref(), &item, &invocation.wait)?;
        } else if let (Readiness::Request, Some(location)) =
            (self.definition.readiness, mutation.request.as_deref())
        {
            wait_for_request(client.as_ref(), location, &invocation.wait)?;
        }
        Ok(())
    }

    fn desired(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> Value {
        let mut resource = self.body(existing, invocation.params, |_| true);
        if let Some(id) = existing.and_then(|existing| existing.get("id")) {
            set_path(&mut resource, &["id"], id.clone());
        }
        resource
    }
}

/// Build the clients of an invocation, unless the context already carries them
pub fn connect_clients(
    params: &ModuleParams,
    context: &ModuleContext,
    object_name: &str,
    state: State,
    services: &[Service],
) -> ModuleResult<Arc<Clients>> {
    if let Some(clients) = &context.clients {
        return Ok(Arc::clone(clients));
    }
    check_credentials(params, object_name, state)?;
    let config = ApiConfig::from_params(params, &context.settings)?;
    Ok(Arc::new(Clients::connect(&config, services, &context.settings)?))
}

/// A [`Module`] running a [`ResourceHandler`] through the [`Orchestrator`]
pub struct ResourceModule {
    name: &'static str,
    description: &'static str,
    schema: OptionSchema,
    services: Vec<Service>,
    handler: Box<dyn ResourceHandler>,
}

impl ResourceModule {
    pub fn new<H>(
        name: &'static str,
        description: &'static str,
        schema: OptionSchema,
        services: &[Service],
        handler: H,
    ) -> Self
    where
        H: ResourceHandler + 'static,
    {
        Self {
            name,
            description,
            schema,
            services: services.to_vec(),
            handler: Box::new(handler),
        }
    }
}

impl Module for ResourceModule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn object_name(&self) -> &'static str {
        self.schema.object_name()
    }

    fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    fn execute(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let state = self.schema.requested_state(params);
        let clients = connect_clients(params, context, self.object_name(), state, &self.services)?;
        let resolved = match state {
            State::Present | State::Update => self.handler.resolve_references(params, &clients)?,
            _ => None,
        };
        let params = resolved.as_ref().unwrap_or(params);
        let invocation = Invocation {
            params,
            state,
            clients: &clients,
            settings: &context.settings,
            wait: WaitOptions::from_params(params, &context.settings)?,
            check_mode: context.check_mode,
            diff_mode: context.diff_mode,
        };
        Orchestrator::new(self.handler.as_ref()).run(&invocation)
    }
}

/// A listing-only module
#[derive(Debug, Clone)]
pub struct InfoDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub object_name: &'static str,
    pub returned_key: &'static str,
    pub service: Service,
    pub collection: Collection,
    pub paging: Paging,
}

pub struct InfoModule {
    definition: InfoDefinition,
    schema: OptionSchema,
}

impl InfoModule {
    /// `options` are the module's own; filters, depth and auth are added
    pub fn new(definition: InfoDefinition, options: Vec<OptionSpec>) -> Self {
        let shared = if definition.service.supports_depth() {
            info_options_with_depth()
        } else {
            info_options()
        };
        let schema = OptionSchema::new(definition.object_name, &[State::Info])
            .merge(options)
            .merge(shared);
        Self { definition, schema }
    }
}

impl Module for InfoModule {
    fn name(&self) -> &'static str {
        self.definition.name
    }

    fn description(&self) -> &'static str {
        self.definition.description
    }

    fn object_name(&self) -> &'static str {
        self.definition.object_name
    }

    fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    fn execute(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let definition = &self.definition;
        let clients = connect_clients(
            params,
            context,
            definition.object_name,
            State::Info,
            &[definition.service],
        )?;
        let client = clients.client(definition.service)?;

        let path = definition.collection.resolve(client.as_ref(), params)?;
        let depth = if definition.service.supports_depth() {
            params.get_u32("depth")?
        } else {
            None
        };
        let items = fetch_collection(client.as_ref(), &path, depth, definition.paging, &context.settings)?;
        let filters = params.get_object("filters")?.unwrap_or_default();
        let items = apply_filters(items, &filters);

        debug!(module = definition.name, count = items.len(), "listed");
        Ok(ModuleOutput::ok().with_data(definition.returned_key, Value::Array(items)))
    }

    fn failure_message(&self, _state: State, error: &ModuleError) -> String {
        format!("failed to list the {}: {}", self.definition.object_name, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cloud::ionos::api::InMemoryCloud;
    use serde_json::json;

    fn params(value: Value) -> ModuleParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_field_differs_only_when_given() {
        let field = Field::update("name", &["properties", "name"]);
        let existing = json!({"properties": {"name": "web"}});
        assert!(!field.differs(&existing, &params(json!({}))));
        assert!(!field.differs(&existing, &params(json!({"name": null}))));
        assert!(!field.differs(&existing, &params(json!({"name": "web"}))));
        assert!(field.differs(&existing, &params(json!({"name": "db"}))));

        let field = Field::update("days", &["properties", "days"]).unordered();
        let existing = json!({"properties": {"days": ["Monday", "Friday"]}});
        assert!(!field.differs(&existing, &params(json!({"days": ["Friday", "Monday"]}))));
    }

    #[test]
    fn test_child_collection_resolves_parent() {
        let cloud = InMemoryCloud::new().with_items(
            "/datacenters",
            vec![json!({"id": "dc-1", "properties": {"name": "Prod"}})],
        );
        let collection = Collection::Child {
            parent: Parent {
                param: "datacenter",
                object_name: "Datacenter",
                collection: "/datacenters",
            },
            template: "/datacenters/{}/lans",
        };

        let path = collection
            .resolve(&cloud, &params(json!({"datacenter": "prod"})))
            .unwrap();
        assert_eq!(path, "/datacenters/dc-1/lans");

        let err = collection
            .resolve(&cloud, &params(json!({"datacenter": "staging"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Datacenter 'staging' not found");
    }

    #[test]
    fn test_optional_child_falls_back() {
        let cloud = InMemoryCloud::new();
        let collection = Collection::OptionalChild {
            parent: Parent {
                param: "group",
                object_name: "Group",
                collection: "/um/groups",
            },
            template: "/um/groups/{}/users",
            fallback: "/um/users",
        };
        assert_eq!(collection.resolve(&cloud, &params(json!({}))).unwrap(), "/um/users");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generated_id();
        let b = generated_id();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 5);
    }

    #[test]
    fn test_fetch_collection_normalizes_and_pages() {
        let cloud = InMemoryCloud::new().with_items(
            "/um/users",
            (0..5)
                .map(|i| json!({"id": i.to_string(), "properties": {"firstName": "u"}}))
                .collect(),
        );
        let settings = Settings {
            page_size: 2,
            ..Settings::default()
        };
        let users = fetch_collection(&cloud, "/um/users", None, Paging::Offset, &settings).unwrap();
        assert_eq!(users.len(), 5);
        assert_eq!(users[0]["properties"]["first_name"], json!("u"));
        assert_eq!(cloud.count("GET"), 3);
    }
}
