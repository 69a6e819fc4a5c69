//! User listing.
//!
//! Users are listed a page at a time. With `group` set (name or id) only the
//! members of that group are returned.

use super::api::Service;
use super::options::{OptionSpec, OptionType};
use super::resource::{Collection, InfoDefinition, InfoModule, Paging, Parent};

pub fn user_info() -> InfoModule {
    InfoModule::new(
        InfoDefinition {
            name: "user_info",
            description: "List the users of the contract or of a group",
            object_name: "Users",
            returned_key: "users",
            service: Service::Compute,
            collection: Collection::OptionalChild {
                parent: Parent {
                    param: "group",
                    object_name: "Group",
                    collection: "/um/groups",
                },
                template: "/um/groups/{}/users",
                fallback: "/um/users",
            },
            paging: Paging::Offset,
        },
        vec![OptionSpec::new("group", OptionType::Str)
            .description("The ID or name of the group. Only the users of this group are listed.")],
    )
}
