//! # ionos-cloud-modules - Declarative IONOS Cloud resource management
//!
//! A collection of idempotent modules that converge IONOS Cloud resources
//! (datacenters, LANs, Kubernetes clusters, container registries, DNS zones,
//! logging pipelines) to a desired state, plus listing modules for those and
//! for users, database clusters and autoscaling groups.
//!
//! ## Core Concepts
//!
//! - **Modules**: Named units that validate parameters against an option
//!   schema and return a uniform result `{changed, failed, msg?, ...}`
//! - **States**: `present`, `absent`, `update`, `renew` for resource modules,
//!   `info` for listing modules
//! - **Orchestrator**: The shared lookup/compare/create/update/replace/delete
//!   decision procedure every resource module runs through
//! - **Clients**: One client per product API behind the `ResourceLister` and
//!   `ResourceMutator` capability traits
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                              │
//! │              (clap: run / list / describe, JSON result)              │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Module Registry                             │
//! │          (schema validation, failure message at the boundary)        │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┴─────────────────────────┐
//!          ▼                                                   ▼
//! ┌─────────────────────┐                         ┌─────────────────────┐
//! │   Orchestrator +    │                         │    Info modules     │
//! │ resource handlers   │                         │ (list, filter, page)│
//! └─────────────────────┘                         └─────────────────────┘
//!          │                                                   │
//!          └─────────────────────────┬─────────────────────────┘
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Cloud clients (HTTP or in-memory)                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use ionos_cloud_modules::prelude::*;
//! use serde_json::json;
//!
//! let registry = ModuleRegistry::with_builtins();
//! let params: ModuleParams = serde_json::from_value(json!({
//!     "name": "web",
//!     "location": "de/fra",
//!     "token": "...",
//! }))
//! .unwrap();
//!
//! let output = registry.run("datacenter", &params, &ModuleContext::new());
//! println!("{}", serde_json::to_string(&output).unwrap());
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Error handling
    pub use crate::error::{Error, Result};

    // Settings
    pub use crate::config::Settings;

    // Module system
    pub use crate::modules::{
        Action, Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams,
        ModuleRegistry, ModuleResult, ParamExt,
    };

    // Cloud access
    pub use crate::modules::cloud::ionos::api::{
        Clients, CloudClient, InMemoryCloud, ResourceLister, ResourceMutator, Service,
    };
    pub use crate::modules::cloud::ionos::options::State;
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for the command line and configuration layer.
pub mod error;

/// Settings loaded from configuration files and the environment.
pub mod config;

/// The module system and the IONOS Cloud modules.
pub mod modules;

/// Command-line interface.
pub mod cli;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
