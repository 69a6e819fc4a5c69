//! VM autoscaling group listing.

use super::api::Service;
use super::resource::{Collection, InfoDefinition, InfoModule, Paging};

pub fn vm_autoscaling_group_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "vm_autoscaling_group_info",
            description: "List the VM autoscaling groups",
            object_name: "VM Autoscaling Groups",
            returned_key: "result",
            service: Service::VmAutoscaling,
            collection: Collection::Root("/groups"),
            paging: Paging::Single,
        },
        Vec::new(),
    )
}
