//! Module system for the IONOS Cloud modules
//!
//! This module provides the core traits, types, and registry for the module system.
//! A module declares an option schema, talks to one or more cloud services and
//! shapes the outcome into a uniform [`ModuleOutput`].

pub mod cloud;

use crate::config::Settings;
use cloud::ionos::api::Clients;
use cloud::ionos::options::{OptionSchema, State};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    /// An identifier resolved to no resource.
    #[error("{0} not found")]
    NotFound(String),

    /// A referenced parent resource (datacenter, cluster, group) is missing.
    #[error("{kind} '{identifier}' not found")]
    DependencyNotFound { kind: String, identifier: String },

    /// No client is available for the service a module needs.
    #[error("no client available for the {0} service")]
    SdkUnavailable(String),

    /// Network or authentication failure below the API layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// A wait loop ran out of time.
    #[error("timed out after {seconds} seconds waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    MissingParameter(String),

    #[error("{0} should be replaced but allow_replace is set to False.")]
    ReplaceNotAllowed(String),

    #[error("failed to update the {kind}: Another resource with the desired name ({name}) exists")]
    NameConflict { kind: String, name: String },

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModuleError {
    /// Whether the error is an HTTP 404 from the API
    pub fn is_not_found_status(&self) -> bool {
        matches!(self, ModuleError::Api { status: 404, .. })
    }

    /// Refusals reported verbatim rather than as a failed state change
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            ModuleError::InvalidParameter(_)
                | ModuleError::MissingParameter(_)
                | ModuleError::ReplaceNotAllowed(_)
                | ModuleError::NameConflict { .. }
        )
    }
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Parameters passed to a module
pub type ModuleParams = HashMap<String, serde_json::Value>;

/// The lifecycle action a module performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
    Renew,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
            Action::Renew => write!(f, "renew"),
        }
    }
}

/// Represents a difference between current and desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// State before the change
    pub before: serde_json::Value,
    /// State after the change
    pub after: serde_json::Value,
    /// Human-readable rendering, such as a unified text diff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Diff {
    pub fn new(before: serde_json::Value, after: serde_json::Value) -> Self {
        Self {
            before,
            after,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Result of a module execution
///
/// Serializes to the flat `{changed, failed, msg?, action?, <key>: ...}` shape
/// expected by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Whether the module changed anything
    pub changed: bool,
    /// Whether the module failed
    pub failed: bool,
    /// Human-readable message, always set on failure
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
    /// Lifecycle action that was (or would be) performed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Optional diff showing what changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    /// Additional data returned by the module
    #[serde(flatten)]
    pub data: IndexMap<String, serde_json::Value>,
}

impl ModuleOutput {
    fn new(changed: bool, failed: bool) -> Self {
        Self {
            changed,
            failed,
            msg: String::new(),
            action: None,
            diff: None,
            data: IndexMap::new(),
        }
    }

    /// Create a new successful output with no changes
    pub fn ok() -> Self {
        Self::new(false, false)
    }

    /// Create a new successful output with changes
    pub fn changed() -> Self {
        Self::new(true, false)
    }

    /// Create a failed output
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::new(false, true).with_msg(msg)
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = msg.into();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Add a diff to the output
    pub fn with_diff(mut self, diff: Diff) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Add data to the output
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Context passed to module execution
#[derive(Clone, Default)]
pub struct ModuleContext {
    /// Whether to run in check mode (dry run)
    pub check_mode: bool,
    /// Whether to attach before/after diffs
    pub diff_mode: bool,
    /// Settings loaded at startup
    pub settings: Arc<Settings>,
    /// Preconfigured service clients; built from the credentials when absent
    pub clients: Option<Arc<Clients>>,
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("check_mode", &self.check_mode)
            .field("diff_mode", &self.diff_mode)
            .field("settings", &self.settings)
            .field("clients", &self.clients.as_ref().map(|c| c.services()))
            .finish()
    }
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_diff_mode(mut self, diff_mode: bool) -> Self {
        self.diff_mode = diff_mode;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn with_clients(mut self, clients: Clients) -> Self {
        self.clients = Some(Arc::new(clients));
        self
    }
}

/// Trait that all modules must implement
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &'static str;

    /// Returns a description of what the module does
    fn description(&self) -> &'static str;

    /// Human-readable name of the managed object, used in messages
    fn object_name(&self) -> &'static str;

    /// The option schema parameters are validated against
    fn schema(&self) -> &OptionSchema;

    /// Execute the module with validated parameters
    fn execute(&self, params: &ModuleParams, context: &ModuleContext)
        -> ModuleResult<ModuleOutput>;

    /// Check what would change without making changes
    fn check(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let context = context.clone().with_check_mode(true);
        self.execute(params, &context)
    }

    /// Message reported when execution fails
    fn failure_message(&self, state: State, error: &ModuleError) -> String {
        format!(
            "failed to set {} state {}: {}",
            self.object_name(),
            state,
            error
        )
    }
}

/// Extension trait for typed access to module parameters.
///
/// A JSON `null` is treated the same as an absent key.
pub trait ParamExt {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>>;
    fn get_string_required(&self, key: &str) -> ModuleResult<String>;
    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>>;
    fn get_bool_or(&self, key: &str, default: bool) -> bool;
    fn get_i64(&self, key: &str) -> ModuleResult<Option<i64>>;
    fn get_u32(&self, key: &str) -> ModuleResult<Option<u32>>;
    fn get_vec_string(&self, key: &str) -> ModuleResult<Option<Vec<String>>>;
    fn get_object(
        &self,
        key: &str,
    ) -> ModuleResult<Option<serde_json::Map<String, serde_json::Value>>>;
}

impl ParamExt for ModuleParams {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(v) => Ok(Some(v.to_string().trim_matches('"').to_string())),
        }
    }

    fn get_string_required(&self, key: &str) -> ModuleResult<String> {
        self.get_string(key)?.ok_or_else(|| {
            ModuleError::MissingParameter(format!("missing required parameter: {}", key))
        })
    }

    fn get_bool(&self, key: &str) -> ModuleResult<Option<bool>> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
            Some(serde_json::Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Some(true)),
                "false" | "no" | "0" | "off" => Ok(Some(false)),
                _ => Err(ModuleError::InvalidParameter(format!(
                    "{} must be a boolean",
                    key
                ))),
            },
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a boolean",
                key
            ))),
        }
    }

    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).ok().flatten().unwrap_or(default)
    }

    fn get_i64(&self, key: &str) -> ModuleResult<Option<i64>> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| {
                ModuleError::InvalidParameter(format!("{} must be an integer", key))
            }),
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ModuleError::InvalidParameter(format!("{} must be an integer", key))),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be an integer",
                key
            ))),
        }
    }

    fn get_u32(&self, key: &str) -> ModuleResult<Option<u32>> {
        match self.get_i64(key)? {
            Some(v) => u32::try_from(v).map(Some).map_err(|_| {
                ModuleError::InvalidParameter(format!("{} must be a positive integer", key))
            }),
            None => Ok(None),
        }
    }

    fn get_vec_string(&self, key: &str) -> ModuleResult<Option<Vec<String>>> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Array(arr)) => Ok(Some(
                arr.iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.clone(),
                        v => v.to_string().trim_matches('"').to_string(),
                    })
                    .collect(),
            )),
            Some(serde_json::Value::String(s)) => {
                // Handle comma-separated string
                Ok(Some(s.split(',').map(|s| s.trim().to_string()).collect()))
            }
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a list",
                key
            ))),
        }
    }

    fn get_object(
        &self,
        key: &str,
    ) -> ModuleResult<Option<serde_json::Map<String, serde_json::Value>>> {
        match self.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a dict",
                key
            ))),
        }
    }
}

/// Registry for looking up modules by name
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Create a registry with all built-in modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for module in cloud::ionos::builtin_modules() {
            registry.register(module);
        }
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Get all module names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(|s| s.as_str()).collect()
    }

    /// Iterate over all registered modules, sorted by name
    pub fn modules(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.values()
    }

    /// Validate parameters and execute a module by name
    pub fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(format!("module '{}'", name)))?;

        let validated = module.schema().validate(params)?;

        // Execute based on mode
        if context.check_mode {
            module.check(&validated, context)
        } else {
            module.execute(&validated, context)
        }
    }

    /// Run a module by name, converting every error into a failed output
    pub fn run(&self, name: &str, params: &ModuleParams, context: &ModuleContext) -> ModuleOutput {
        let Some(module) = self.get(name) else {
            return ModuleOutput::failed(format!("module '{}' not found", name));
        };

        match self.execute(name, params, context) {
            Ok(output) => {
                debug!(module = name, changed = output.changed, "module finished");
                output
            }
            Err(error) if error.is_refusal() => {
                warn!(module = name, %error, "module refused the parameters");
                ModuleOutput::failed(error.to_string())
            }
            Err(error) => {
                let state = module.schema().requested_state(params);
                warn!(module = name, %state, %error, "module failed");
                ModuleOutput::failed(module.failure_message(state, &error))
            }
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud::ionos::options::{OptionSpec, OptionType};
    use serde_json::json;

    struct TestModule {
        schema: OptionSchema,
    }

    impl TestModule {
        fn new() -> Self {
            Self {
                schema: OptionSchema::new("Test", &[State::Present, State::Absent])
                    .option(OptionSpec::new("msg", OptionType::Str))
                    .option(OptionSpec::new("fail", OptionType::Bool).default_value(json!(false)))
                    .option(
                        OptionSpec::new("state", OptionType::Str)
                            .default_value(json!("present"))
                            .choices(["present", "absent"]),
                    ),
            }
        }
    }

    impl Module for TestModule {
        fn name(&self) -> &'static str {
            "test"
        }

        fn description(&self) -> &'static str {
            "A test module"
        }

        fn object_name(&self) -> &'static str {
            "Test"
        }

        fn schema(&self) -> &OptionSchema {
            &self.schema
        }

        fn execute(
            &self,
            params: &ModuleParams,
            context: &ModuleContext,
        ) -> ModuleResult<ModuleOutput> {
            if params.get_bool_or("fail", false) {
                return Err(ModuleError::Transport("connection reset".to_string()));
            }
            if context.check_mode {
                return Ok(ModuleOutput::ok().with_msg("Would do something"));
            }

            let msg = params
                .get_string("msg")?
                .unwrap_or_else(|| "Hello".to_string());
            Ok(ModuleOutput::changed().with_msg(msg))
        }
    }

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(TestModule::new()));
        registry
    }

    #[test]
    fn test_module_registry() {
        let registry = registry();

        assert!(registry.contains("test"));
        assert!(!registry.contains("nonexistent"));

        let module = registry.get("test").unwrap();
        assert_eq!(module.name(), "test");
    }

    #[test]
    fn test_builtin_registry_is_sorted() {
        let registry = ModuleRegistry::with_builtins();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(registry.contains("datacenter"));
        assert!(registry.contains("user_info"));
    }

    #[test]
    fn test_module_output_serializes_flat() {
        let output = ModuleOutput::changed()
            .with_action(Action::Delete)
            .with_data("id", json!("a1"));

        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(
            value,
            json!({"changed": true, "failed": false, "action": "delete", "id": "a1"})
        );
    }

    #[test]
    fn test_run_wraps_errors() {
        let mut params = ModuleParams::new();
        params.insert("fail".to_string(), json!(true));

        let output = registry().run("test", &params, &ModuleContext::new());
        assert!(output.failed);
        assert!(!output.changed);
        assert_eq!(
            output.msg,
            "failed to set Test state present: transport error: connection reset"
        );
    }

    #[test]
    fn test_run_reports_parameter_errors_verbatim() {
        let mut params = ModuleParams::new();
        params.insert("state".to_string(), json!("gone"));

        let output = registry().run("test", &params, &ModuleContext::new());
        assert!(output.failed);
        assert!(output.msg.starts_with("value of state must be one of"));
    }

    #[test]
    fn test_run_unknown_module() {
        let output = registry().run("nope", &ModuleParams::new(), &ModuleContext::new());
        assert!(output.failed);
        assert_eq!(output.msg, "module 'nope' not found");
    }

    #[test]
    fn test_check_mode_dispatch() {
        let context = ModuleContext::new().with_check_mode(true);
        let output = registry().run("test", &ModuleParams::new(), &context);
        assert!(!output.changed);
        assert_eq!(output.msg, "Would do something");
    }

    #[test]
    fn test_param_ext() {
        let mut params: ModuleParams = HashMap::new();
        params.insert("string".to_string(), json!("hello"));
        params.insert("bool_true".to_string(), json!(true));
        params.insert("bool_str".to_string(), json!("yes"));
        params.insert("number".to_string(), json!(42));
        params.insert("nothing".to_string(), serde_json::Value::Null);
        params.insert("array".to_string(), json!(["one", "two", "three"]));
        params.insert("dict".to_string(), json!({"a": 1}));

        assert_eq!(
            params.get_string("string").unwrap(),
            Some("hello".to_string())
        );
        assert_eq!(params.get_string("nothing").unwrap(), None);
        assert_eq!(params.get_bool("bool_true").unwrap(), Some(true));
        assert_eq!(params.get_bool("bool_str").unwrap(), Some(true));
        assert_eq!(params.get_i64("number").unwrap(), Some(42));
        assert_eq!(params.get_u32("number").unwrap(), Some(42));
        assert_eq!(
            params.get_vec_string("array").unwrap(),
            Some(vec![
                "one".to_string(),
                "two".to_string(),
                "three".to_string()
            ])
        );
        assert!(params.get_object("dict").unwrap().is_some());
        assert!(params.get_object("string").is_err());
        assert!(matches!(
            params.get_string_required("missing"),
            Err(ModuleError::MissingParameter(_))
        ));
    }
}
