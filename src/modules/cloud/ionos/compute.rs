//! Datacenter and LAN modules (Cloud API v6).
//!
//! ## datacenter
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `name` | present | Datacenter name |
//! | `description` | No | Free-form description |
//! | `location` | present | Physical location; changing it recreates the datacenter |
//! | `datacenter` | update, absent | Name or id of an existing datacenter |
//!
//! ## lan
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `datacenter` | Yes | Name or id of the parent datacenter |
//! | `name` | present | LAN name |
//! | `public` | No | Whether the LAN faces the internet (default: false) |
//! | `ipv6_cidr` | No | `/64` block or `AUTO` |
//! | `pcc` | No | Id of a cross connect |
//! | `ip_failover` | No | IP failover groups (update only) |
//! | `lan` | update, absent | Name or id of an existing LAN |
//!
//! Compute mutations are asynchronous: with `wait` enabled the module polls
//! the request named in the `Location` header until it is done.

use serde_json::Value;

use super::api::Service;
use super::options::{default_options, OptionSchema, OptionSpec, OptionType, State};
use super::orchestrator::ResourceKind;
use super::resource::{
    Collection, DeclarativeResource, Field, InfoDefinition, InfoModule, Paging, Parent,
    Readiness, ResourceDefinition, ResourceModule,
};

const DATACENTER_STATES: &[State] = &[State::Present, State::Absent, State::Update];

pub const LOCATIONS: &[&str] = &[
    "us/las", "us/ewr", "de/fra", "de/fkb", "de/txl", "gb/lhr", "es/vit", "fr/par",
];

/// The parent of every datacenter-scoped collection
pub fn datacenter_parent() -> Parent {
    Parent {
        param: "datacenter",
        object_name: "Datacenter",
        collection: "/datacenters",
    }
}

fn pcc_lookup() -> Parent {
    Parent {
        param: "pcc",
        object_name: "Cross Connect",
        collection: "/pccs",
    }
}

pub fn datacenter() -> ResourceModule {
    let schema = OptionSchema::new("Datacenter", DATACENTER_STATES)
        .option(
            OptionSpec::new("name", OptionType::Str)
                .description("The name of the resource.")
                .available_in(&[State::Present, State::Update])
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("description", OptionType::Str)
                .description("A description for the datacenter, such as staging, production.")
                .available_in(&[State::Present, State::Update]),
        )
        .option(
            OptionSpec::new("location", OptionType::Str)
                .description("The physical location where the datacenter will be created.")
                .choices(LOCATIONS.iter().copied())
                .available_in(&[State::Present, State::Update])
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("datacenter", OptionType::Str)
                .description("The ID or name of the virtual datacenter.")
                .available_in(&[State::Update, State::Absent])
                .required_in(&[State::Update, State::Absent]),
        )
        .merge(default_options(DATACENTER_STATES));

    let definition = ResourceDefinition::new(
        ResourceKind::new("Datacenter", "datacenter", "name", "datacenter"),
        Service::Compute,
        Collection::Root("/datacenters"),
    )
    .field(Field::update("name", &["properties", "name"]))
    .field(Field::update("description", &["properties", "description"]))
    .field(Field::replace("location", &["properties", "location"]))
    .ready_when(Readiness::Request)
    .depth(1);

    ResourceModule::new(
        "datacenter",
        "Create, update or destroy a virtual datacenter",
        schema,
        &[Service::Compute],
        DeclarativeResource::new(definition),
    )
}

pub fn lan() -> ResourceModule {
    let states = DATACENTER_STATES;
    let schema = OptionSchema::new("LAN", states)
        .option(
            OptionSpec::new("datacenter", OptionType::Str)
                .description("The datacenter name or UUID in which to operate.")
                .required_in(states),
        )
        .option(
            OptionSpec::new("lan", OptionType::Str)
                .description("The LAN name or UUID.")
                .available_in(&[State::Absent, State::Update])
                .required_in(&[State::Absent, State::Update]),
        )
        .option(
            OptionSpec::new("name", OptionType::Str)
                .description("The name of the resource.")
                .available_in(&[State::Present, State::Update])
                .required_in(&[State::Present]),
        )
        .option(
            OptionSpec::new("pcc", OptionType::Str)
                .description("The name or UUID of the Cross Connect the LAN is connected to, if any.")
                .available_in(&[State::Present, State::Update]),
        )
        .option(
            OptionSpec::new("ip_failover", OptionType::List)
                .description("IP failover configurations for lan")
                .elements(OptionType::Dict)
                .available_in(&[State::Update]),
        )
        .option(
            OptionSpec::new("public", OptionType::Bool)
                .description("Indicates if the LAN is connected to the internet or not.")
                .available_in(&[State::Present, State::Update])
                .default_value(Value::Bool(false)),
        )
        .option(
            OptionSpec::new("ipv6_cidr", OptionType::Str)
                .description("The /64 IPv6 CIDR block of the LAN, or 'AUTO' to have one assigned.")
                .available_in(&[State::Present, State::Update]),
        )
        .merge(default_options(states));

    let definition = ResourceDefinition::new(
        ResourceKind::new("LAN", "lan", "name", "lan"),
        Service::Compute,
        Collection::Child {
            parent: datacenter_parent(),
            template: "/datacenters/{}/lans",
        },
    )
    .field(Field::update("name", &["properties", "name"]))
    .field(Field::update("public", &["properties", "public"]))
    .field(Field::update("pcc", &["properties", "pcc"]).looked_up_in(pcc_lookup()))
    .field(Field::update("ipv6_cidr", &["properties", "ipv6_cidr_block"]))
    .field(Field::update("ip_failover", &["properties", "ip_failover"]))
    .ready_when(Readiness::Request)
    .depth(1);

    ResourceModule::new(
        "lan",
        "Create, update or destroy a LAN in a datacenter",
        schema,
        &[Service::Compute],
        DeclarativeResource::new(definition),
    )
}

pub fn datacenter_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "datacenter_info",
            description: "List the virtual datacenters",
            object_name: "Datacenters",
            returned_key: "datacenters",
            service: Service::Compute,
            collection: Collection::Root("/datacenters"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}

pub fn lan_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "lan_info",
            description: "List the LANs of a datacenter",
            object_name: "LANs",
            returned_key: "lans",
            service: Service::Compute,
            collection: Collection::Child {
                parent: datacenter_parent(),
                template: "/datacenters/{}/lans",
            },
            paging: Paging::Single,
        },
        vec![OptionSpec::new("datacenter", OptionType::Str)
            .description("The ID or name of the virtual datacenter.")
            .required_in(&[State::Info])],
    )
}
