//! Container registry modules.
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `name` | present | Registry name; changing it recreates the registry |
//! | `location` | present | Registry location; changing it recreates the registry |
//! | `garbage_collection_schedule` | No | `{days, time}`; days compared unordered |
//! | `features` | No | `{vulnerability_scanning: {enabled}}` |
//! | `registry` | update, absent | Name or id of an existing registry |
//!
//! Vulnerability scanning can be switched on in place but switching it off
//! requires a new registry.

use serde_json::Value;

use super::api::Service;
use super::normalize::get_path;
use super::options::{default_options, OptionSchema, OptionSpec, OptionType, State};
use super::orchestrator::{Invocation, ResourceHandler, ResourceKind};
use super::resource::{
    Collection, DeclarativeResource, Field, InfoDefinition, InfoModule, Paging, Readiness,
    ResourceDefinition, ResourceModule,
};
use crate::modules::ModuleResult;

const REGISTRY_STATES: &[State] = &[State::Present, State::Absent, State::Update];

const SCANNING: &[&str] = &["vulnerability_scanning", "enabled"];

/// Registry handler adding the vulnerability scanning transition rules
pub struct RegistryResource {
    inner: DeclarativeResource,
}

impl RegistryResource {
    pub fn new() -> Self {
        let definition = ResourceDefinition::new(
            ResourceKind::new("Registry", "registry", "name", "registry"),
            Service::ContainerRegistry,
            Collection::Root("/registries"),
        )
        .field(Field::replace("name", &["properties", "name"]))
        .field(Field::replace("location", &["properties", "location"]))
        .field(
            Field::update(
                "garbage_collection_schedule",
                &["properties", "garbage_collection_schedule"],
            )
            .unordered(),
        )
        .field(Field::managed("features", &["properties", "features"]))
        .ready_when(Readiness::State {
            path: &["metadata", "state"],
            ready: "Running",
        })
        .wait_for_removal();

        Self {
            inner: DeclarativeResource::new(definition),
        }
    }

    /// (current, desired) vulnerability scanning flags
    fn scanning(existing: &Value, invocation: &Invocation<'_>) -> (Option<bool>, Option<bool>) {
        let current = get_path(existing, &["properties", "features"])
            .and_then(|features| get_path(features, SCANNING))
            .and_then(Value::as_bool);
        let desired = invocation
            .params
            .get("features")
            .and_then(|features| get_path(features, SCANNING))
            .and_then(Value::as_bool);
        (current, desired)
    }
}

impl Default for RegistryResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandler for RegistryResource {
    fn kind(&self) -> &ResourceKind {
        self.inner.kind()
    }

    fn list(&self, invocation: &Invocation<'_>) -> ModuleResult<Vec<Value>> {
        self.inner.list(invocation)
    }

    fn should_replace(&self, existing: &Value, invocation: &Invocation<'_>) -> bool {
        self.inner.should_replace(existing, invocation)
            || Self::scanning(existing, invocation) == (Some(true), Some(false))
    }

    fn should_update(&self, existing: &Value, invocation: &Invocation<'_>) -> bool {
        self.inner.should_update(existing, invocation)
            || Self::scanning(existing, invocation) == (Some(false), Some(true))
    }

    fn create(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> ModuleResult<Value> {
        self.inner.create(existing, invocation)
    }

    fn update(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<Value> {
        self.inner.update(existing, invocation)
    }

    fn remove(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<()> {
        self.inner.remove(existing, invocation)
    }

    fn desired(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> Value {
        self.inner.desired(existing, invocation)
    }
}

pub fn registry() -> ResourceModule {
    let mutable = [State::Present, State::Update];
    let schema = OptionSchema::new("Registry", REGISTRY_STATES)
        .option(
            OptionSpec::new("garbage_collection_schedule", OptionType::Dict)
                .description(
                    "Dict containing \"time\" (the time of the day when to perform the garbage_collection) and \"days\" (the days when to perform the garbage_collection).",
                )
                .available_in(&mutable),
        )
        .option(
            OptionSpec::new("location", OptionType::Str)
                .description("The location of your registry")
                .available_in(&mutable)
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("features", OptionType::Dict)
                .description(
                    "Optional registry features: 'vulnerability_scanning' with a boolean 'enabled' key.",
                )
                .available_in(&mutable),
        )
        .option(
            OptionSpec::new("name", OptionType::Str)
                .description("The name of your registry.")
                .available_in(&mutable)
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("registry", OptionType::Str)
                .description("The ID or name of an existing Registry.")
                .available_in(&[State::Update, State::Absent])
                .required_in(&[State::Update, State::Absent]),
        )
        .merge(default_options(REGISTRY_STATES));

    ResourceModule::new(
        "registry",
        "Create, update or destroy a container registry",
        schema,
        &[Service::ContainerRegistry],
        RegistryResource::new(),
    )
}

pub fn registry_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "registry_info",
            description: "List the container registries",
            object_name: "Registries",
            returned_key: "registries",
            service: Service::ContainerRegistry,
            collection: Collection::Root("/registries"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}
