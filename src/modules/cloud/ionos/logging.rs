//! Logging pipeline modules.
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `name` | present | Pipeline name |
//! | `logs` | present | Log sources: `{source, tag, protocol, destinations}` |
//! | `pipeline` | update, absent, renew | Name or id of an existing pipeline |
//!
//! `state: renew` regenerates the key used to ship logs to the pipeline. A
//! pipeline only accepts changes while `AVAILABLE`, so updates and renewals
//! wait for that state first.

use serde_json::{json, Value};
use tracing::info;

use super::api::Service;
use super::normalize::normalize;
use super::options::{default_options, OptionSchema, OptionSpec, OptionType, State};
use super::orchestrator::{Invocation, ResourceHandler, ResourceKind};
use super::resource::{
    Collection, DeclarativeResource, Field, InfoDefinition, InfoModule, Paging, Readiness,
    ResourceDefinition, ResourceModule, UpdateRequest,
};
use super::wait::{wait_for_state, WaitOptions};
use crate::modules::ModuleResult;

const PIPELINE_STATES: &[State] = &[State::Present, State::Absent, State::Update, State::Renew];

const STATE_PATH: &[&str] = &["metadata", "state"];
const AVAILABLE: &str = "AVAILABLE";

/// Pipeline handler adding key renewal
pub struct PipelineResource {
    inner: DeclarativeResource,
}

impl PipelineResource {
    pub fn new() -> Self {
        let definition = ResourceDefinition::new(
            ResourceKind::new("Pipeline", "pipeline", "name", "pipeline"),
            Service::Logging,
            Collection::Root("/pipelines"),
        )
        .field(Field::update("name", &["properties", "name"]))
        .field(Field::update("logs", &["properties", "logs"]))
        .update_with(UpdateRequest::PatchEnvelope)
        .ready_when(Readiness::State {
            path: STATE_PATH,
            ready: AVAILABLE,
        });

        Self {
            inner: DeclarativeResource::new(definition),
        }
    }

    /// Wait until the pipeline accepts changes, whatever the `wait` option says
    fn wait_until_available(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<String> {
        let client = self.inner.client(invocation)?;
        let item = self.inner.item_path(client.as_ref(), existing, invocation)?;
        let options = WaitOptions {
            enabled: true,
            ..invocation.wait
        };
        wait_for_state(client.as_ref(), &item, STATE_PATH, AVAILABLE, &options)?;
        Ok(item)
    }
}

impl Default for PipelineResource {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHandler for PipelineResource {
    fn kind(&self) -> &ResourceKind {
        self.inner.kind()
    }

    fn list(&self, invocation: &Invocation<'_>) -> ModuleResult<Vec<Value>> {
        self.inner.list(invocation)
    }

    fn should_replace(&self, existing: &Value, invocation: &Invocation<'_>) -> bool {
        self.inner.should_replace(existing, invocation)
    }

    fn should_update(&self, existing: &Value, invocation: &Invocation<'_>) -> bool {
        self.inner.should_update(existing, invocation)
    }

    fn create(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> ModuleResult<Value> {
        self.inner.create(existing, invocation)
    }

    fn update(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<Value> {
        self.wait_until_available(existing, invocation)?;
        self.inner.update(existing, invocation)
    }

    fn remove(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<()> {
        self.inner.remove(existing, invocation)
    }

    fn renew(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<Value> {
        let item = self.wait_until_available(existing, invocation)?;
        let client = self.inner.client(invocation)?;
        let mutation = client.create(&format!("{}/key", item), &json!({}))?;
        info!(pipeline = %item, "pipeline key renewed");
        Ok(normalize(mutation.resource))
    }

    fn desired(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> Value {
        self.inner.desired(existing, invocation)
    }
}

pub fn pipeline() -> ResourceModule {
    let mutable = [State::Present, State::Update];
    let schema = OptionSchema::new("Pipeline", PIPELINE_STATES)
        .option(
            OptionSpec::new("name", OptionType::Str)
                .description("The name of your logging pipeline.")
                .available_in(&mutable)
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("logs", OptionType::List)
                .description("The information of the log pipelines")
                .elements(OptionType::Dict)
                .available_in(&mutable)
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("pipeline", OptionType::Str)
                .description("The ID or name of an existing Pipeline.")
                .available_in(&[State::Update, State::Absent, State::Renew])
                .required_in(&[State::Update, State::Absent, State::Renew]),
        )
        .merge(default_options(PIPELINE_STATES));

    ResourceModule::new(
        "pipeline",
        "Create, update, renew or destroy a logging pipeline",
        schema,
        &[Service::Logging],
        PipelineResource::new(),
    )
}

pub fn pipeline_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "pipeline_info",
            description: "List the logging pipelines",
            object_name: "Pipelines",
            returned_key: "pipelines",
            service: Service::Logging,
            collection: Collection::Root("/pipelines"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}
