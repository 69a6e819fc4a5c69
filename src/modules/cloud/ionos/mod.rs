//! IONOS Cloud modules.
//!
//! Resource modules (`datacenter`, `lan`, `k8s_cluster`, `registry`,
//! `dns_zone`, `pipeline`) converge a single resource through the shared
//! [`orchestrator`]. Info modules list a collection, optionally filtered.
//!
//! ## Example
//!
//! ```yaml
//! - name: Create a datacenter
//!   datacenter:
//!     name: web
//!     location: de/fra
//!
//! - name: Add a public LAN
//!   lan:
//!     datacenter: web
//!     name: frontend
//!     public: true
//!
//! - name: Remove it again
//!   lan:
//!     datacenter: web
//!     lan: frontend
//!     state: absent
//! ```
//!
//! Credentials come from the `token` or `username`/`password` options, with
//! `IONOS_TOKEN`, `IONOS_USERNAME` and `IONOS_PASSWORD` as fallback.

pub mod api;
pub mod normalize;
pub mod options;
pub mod orchestrator;
pub mod pagination;
pub mod resolver;
pub mod resource;
pub mod wait;

pub mod autoscaling;
pub mod compute;
pub mod dbaas;
pub mod dns;
pub mod kubernetes;
pub mod logging;
pub mod objectstorage;
pub mod registry;
pub mod users;

use crate::modules::Module;
use std::sync::Arc;

/// Every IONOS module, in no particular order
pub fn builtin_modules() -> Vec<Arc<dyn Module>> {
    vec![
        Arc::new(compute::datacenter()),
        Arc::new(compute::datacenter_info()),
        Arc::new(compute::lan()),
        Arc::new(compute::lan_info()),
        Arc::new(kubernetes::k8s_cluster()),
        Arc::new(kubernetes::k8s_cluster_info()),
        Arc::new(kubernetes::KubeconfigModule::new()),
        Arc::new(registry::registry()),
        Arc::new(registry::registry_info()),
        Arc::new(dns::dns_zone()),
        Arc::new(dns::dns_zone_info()),
        Arc::new(logging::pipeline()),
        Arc::new(logging::pipeline_info()),
        Arc::new(dbaas::postgres_cluster_info()),
        Arc::new(dbaas::mongo_cluster_info()),
        Arc::new(objectstorage::object_storage_access_key_info()),
        Arc::new(objectstorage::object_storage_region_info()),
        Arc::new(autoscaling::vm_autoscaling_group_info()),
        Arc::new(users::user_info()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_names_are_unique() {
        let modules = builtin_modules();
        let names: HashSet<&str> = modules.iter().map(|m| m.name()).collect();
        assert_eq!(names.len(), modules.len());
    }

    #[test]
    fn test_every_schema_offers_credentials() {
        for module in builtin_modules() {
            for option in ["token", "username", "password", "api_url"] {
                assert!(
                    module.schema().get(option).is_some(),
                    "{} lacks {}",
                    module.name(),
                    option
                );
            }
        }
    }
}
