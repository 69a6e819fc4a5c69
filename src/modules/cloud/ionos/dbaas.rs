//! Database-as-a-service cluster listings.

use super::api::Service;
use super::resource::{Collection, InfoDefinition, InfoModule, Paging};

pub fn postgres_cluster_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "postgres_cluster_info",
            description: "List the PostgreSQL clusters",
            object_name: "Postgres Clusters",
            returned_key: "result",
            service: Service::PostgresDbaas,
            collection: Collection::Root("/clusters"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}

pub fn mongo_cluster_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "mongo_cluster_info",
            description: "List the MongoDB clusters",
            object_name: "Mongo Clusters",
            returned_key: "mongo_clusters",
            service: Service::MongoDbaas,
            collection: Collection::Root("/clusters"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}
