//! DNS zone modules.
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `name` | present | Zone name, e.g. `example.com` |
//! | `description` | No | Free-form description |
//! | `enabled` | No | Whether the zone is served |
//! | `zone` | update, absent | Name or id of an existing zone |
//!
//! Zones are created with a PUT on an id generated by the client and are
//! matched by id or `zone_name`.

use super::api::Service;
use super::options::{default_options, OptionSchema, OptionSpec, OptionType, State};
use super::orchestrator::ResourceKind;
use super::resolver::IdentityPath;
use super::resource::{
    Collection, CreateRequest, DeclarativeResource, Field, InfoDefinition, InfoModule, Paging,
    ResourceDefinition, ResourceModule, UpdateRequest,
};

const ZONE_STATES: &[State] = &[State::Present, State::Absent, State::Update];

pub fn zone_identity_paths() -> Vec<IdentityPath> {
    vec![
        IdentityPath::new(["id"]),
        IdentityPath::new(["properties", "zone_name"]),
    ]
}

pub fn dns_zone() -> ResourceModule {
    let mutable = [State::Present, State::Update];
    let schema = OptionSchema::new("Zone", ZONE_STATES)
        .option(
            OptionSpec::new("enabled", OptionType::Bool)
                .description("Users can activate and deactivate zones.")
                .available_in(&mutable),
        )
        .option(
            OptionSpec::new("description", OptionType::Str)
                .description("The hosted zone is used for...")
                .available_in(&mutable),
        )
        .option(
            OptionSpec::new("name", OptionType::Str)
                .description("The zone name")
                .available_in(&mutable)
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("zone", OptionType::Str)
                .description("The ID or name of an existing Zone.")
                .available_in(&[State::Update, State::Absent])
                .required_in(&[State::Update, State::Absent]),
        )
        .merge(default_options(ZONE_STATES));

    let definition = ResourceDefinition::new(
        ResourceKind::new("Zone", "zone", "name", "zone").with_identity_paths(zone_identity_paths()),
        Service::Dns,
        Collection::Root("/zones"),
    )
    .field(Field::update("name", &["properties", "zone_name"]))
    .field(Field::update("description", &["properties", "description"]))
    .field(Field::update("enabled", &["properties", "enabled"]))
    .create_with(CreateRequest::PutWithGeneratedId)
    .update_with(UpdateRequest::PutEnvelope);

    ResourceModule::new(
        "dns_zone",
        "Create, update or destroy a DNS zone",
        schema,
        &[Service::Dns],
        DeclarativeResource::new(definition),
    )
}

pub fn dns_zone_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "dns_zone_info",
            description: "List the DNS zones",
            object_name: "DNS Zones",
            returned_key: "zones",
            service: Service::Dns,
            collection: Collection::Root("/zones"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}
