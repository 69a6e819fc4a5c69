//! Managed Kubernetes modules.
//!
//! ## k8s_cluster
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `cluster_name` | present | Cluster name |
//! | `k8s_cluster` | update, absent | Name or id of an existing cluster |
//! | `k8s_version` | No | Kubernetes version |
//! | `maintenance_window` | update | `{day_of_the_week, time}` |
//! | `api_subnet_allow_list` | No | CIDRs allowed to reach the API server, compared unordered |
//! | `public` | No | Public or private cluster (creation only) |
//! | `location` | No | Location of a private cluster (creation only) |
//! | `nat_gateway_ip` | No | NAT gateway IP of a private cluster (creation only) |
//! | `node_subnet` | No | Node subnet of a private cluster (creation only) |
//!
//! Clusters are updated with a PUT of the full property set and are ready once
//! `metadata.state` is `ACTIVE`. Deletion waits until the cluster is gone.
//!
//! ## k8s_config
//!
//! Fetches the kubeconfig of a cluster and writes it to `config_file`. The file
//! is only rewritten when its content differs.

use crate::modules::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::api::Service;
use super::normalize::normalize;
use super::options::{auth_options, default_options, state_option, OptionSchema, OptionSpec, OptionType, State};
use super::orchestrator::ResourceKind;
use super::resolver;
use super::resource::{
    connect_clients, fetch_collection, Collection, DeclarativeResource, Field, InfoDefinition,
    InfoModule, Paging, Readiness, ResourceDefinition, ResourceModule, UpdateRequest,
};

const CLUSTER_STATES: &[State] = &[State::Present, State::Absent, State::Update];

const ACTIVE: Readiness = Readiness::State {
    path: &["metadata", "state"],
    ready: "ACTIVE",
};

pub fn k8s_cluster() -> ResourceModule {
    let mutable = [State::Present, State::Update];
    let schema = OptionSchema::new("K8s Cluster", CLUSTER_STATES)
        .option(
            OptionSpec::new("cluster_name", OptionType::Str)
                .description("A Kubernetes cluster name.")
                .available_in(&mutable)
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("k8s_cluster", OptionType::Str)
                .description("The ID or name of the K8s cluster.")
                .available_in(&[State::Update, State::Absent])
                .required_in(&[State::Update, State::Absent]),
        )
        .option(
            OptionSpec::new("k8s_version", OptionType::Str)
                .description("The Kubernetes version the cluster is running.")
                .available_in(&mutable),
        )
        .option(
            OptionSpec::new("maintenance_window", OptionType::Dict)
                .description("The maintenance window: day_of_the_week and time.")
                .available_in(&mutable)
                .required_in(&[State::Update]),
        )
        .option(
            OptionSpec::new("api_subnet_allow_list", OptionType::List)
                .description("Access to the K8s API server is restricted to these CIDRs.")
                .elements(OptionType::Str)
                .available_in(&mutable),
        )
        .option(
            OptionSpec::new("public", OptionType::Bool)
                .description("The indicator if the cluster is public or private.")
                .available_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("location", OptionType::Str)
                .description("The location of the cluster if the cluster is private.")
                .available_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("nat_gateway_ip", OptionType::Str)
                .description("The nat gateway IP of the cluster if the cluster is private.")
                .available_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("node_subnet", OptionType::Str)
                .description("The node subnet of the cluster, if the cluster is private.")
                .available_in(&[State::Present]),
        )
        .merge(default_options(CLUSTER_STATES));

    let definition = ResourceDefinition::new(
        ResourceKind::new("K8s Cluster", "cluster", "cluster_name", "k8s_cluster"),
        Service::Compute,
        Collection::Root("/k8s"),
    )
    .field(Field::update("cluster_name", &["properties", "name"]))
    .field(Field::update("k8s_version", &["properties", "k8s_version"]))
    .field(Field::update("maintenance_window", &["properties", "maintenance_window"]))
    .field(Field::update("api_subnet_allow_list", &["properties", "api_subnet_allow_list"]).unordered())
    .field(Field::create_only("public", &["properties", "public"]))
    .field(Field::create_only("location", &["properties", "location"]))
    .field(Field::create_only("nat_gateway_ip", &["properties", "nat_gateway_ip"]))
    .field(Field::create_only("node_subnet", &["properties", "node_subnet"]))
    .update_with(UpdateRequest::PutEnvelope)
    .ready_when(ACTIVE)
    .wait_for_removal()
    .depth(1);

    ResourceModule::new(
        "k8s_cluster",
        "Create, update or destroy a managed Kubernetes cluster",
        schema,
        &[Service::Compute],
        DeclarativeResource::new(definition),
    )
}

pub fn k8s_cluster_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "k8s_cluster_info",
            description: "List the managed Kubernetes clusters",
            object_name: "K8s Clusters",
            returned_key: "clusters",
            service: Service::Compute,
            collection: Collection::Root("/k8s"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}

/// Writes the kubeconfig of a cluster to a file
pub struct KubeconfigModule {
    schema: OptionSchema,
}

impl Default for KubeconfigModule {
    fn default() -> Self {
        Self::new()
    }
}

impl KubeconfigModule {
    pub fn new() -> Self {
        let schema = OptionSchema::new("K8s Config", &[State::Present])
            .option(
                OptionSpec::new("k8s_cluster", OptionType::Str)
                    .description("The ID or name of the K8s cluster.")
                    .alias("k8s_cluster_id")
                    .required_in(&[State::Present]),
            )
            .option(
                OptionSpec::new("config_file", OptionType::Str)
                    .description("The name of the file in which to save the config.")
                    .required_in(&[State::Present]),
            )
            .merge(auth_options())
            .option(state_option(&[State::Present]));
        Self { schema }
    }
}

/// Render a line diff of two texts, `+`/`-` prefixed
fn unified_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    let mut output = String::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        output.push_str(&format!("{}{}", sign, change));
    }

    output
}

/// Replace `path` with `content` through a temporary file in the same directory
fn write_atomically(path: &Path, content: &str) -> ModuleResult<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(directory)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|e| ModuleError::Io(e.error))?;
    Ok(())
}

impl Module for KubeconfigModule {
    fn name(&self) -> &'static str {
        "k8s_config"
    }

    fn description(&self) -> &'static str {
        "Write the kubeconfig of a managed Kubernetes cluster to a file"
    }

    fn object_name(&self) -> &'static str {
        "K8s Config"
    }

    fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    fn execute(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let clients = connect_clients(params, context, self.object_name(), State::Present, &[Service::Compute])?;
        let client = clients.client(Service::Compute)?;

        let identifier = params.get_string_required("k8s_cluster")?;
        let config_file = params.get_string_required("config_file")?;

        let clusters = fetch_collection(client.as_ref(), "/k8s", None, Paging::Single, &context.settings)?;
        let cluster_id = resolver::find(&clusters, &identifier, &resolver::default_identity_paths())
            .and_then(resolver::resource_id)
            .map(str::to_string)
            .ok_or_else(|| ModuleError::DependencyNotFound {
                kind: "K8s Cluster".to_string(),
                identifier: identifier.clone(),
            })?;

        let response = client.get(&format!("/k8s/{}/kubeconfig", cluster_id), None)?;
        let kubeconfig = response
            .pointer("/properties/kubeconfig")
            .and_then(Value::as_str)
            .ok_or_else(|| ModuleError::NotFound(format!("kubeconfig of cluster {}", cluster_id)))?
            .to_string();

        let path = Path::new(&config_file);
        let current = fs::read_to_string(path).ok();
        if current.as_deref() == Some(kubeconfig.as_str()) {
            debug!(path = %path.display(), "kubeconfig is up to date");
            return Ok(ModuleOutput::ok().with_data("config", normalize(response)));
        }

        if !context.check_mode {
            write_atomically(path, &kubeconfig)?;
            info!(cluster = %cluster_id, path = %path.display(), "wrote kubeconfig");
        }

        let mut output = ModuleOutput::changed();
        if context.diff_mode {
            let before = current.unwrap_or_default();
            let details = unified_diff(&before, &kubeconfig);
            output = output.with_diff(
                Diff::new(Value::String(before), Value::String(kubeconfig)).with_details(details),
            );
        }
        Ok(output.with_data("config", normalize(response)))
    }

    fn failure_message(&self, _state: State, error: &ModuleError) -> String {
        format!("failed to get the k8s cluster config: {}", error)
    }
}
