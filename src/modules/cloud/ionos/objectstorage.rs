//! Object storage management listings: access keys and regions.

use super::api::Service;
use super::resource::{Collection, InfoDefinition, InfoModule, Paging};

pub fn object_storage_access_key_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "object_storage_access_key_info",
            description: "List the object storage access keys",
            object_name: "Access Keys",
            returned_key: "access_keys",
            service: Service::ObjectStorage,
            collection: Collection::Root("/accesskeys"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}

pub fn object_storage_region_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "object_storage_region_info",
            description: "List the object storage regions",
            object_name: "Object Storage Regions",
            returned_key: "object_storage_regions",
            service: Service::ObjectStorage,
            collection: Collection::Root("/regions"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}
