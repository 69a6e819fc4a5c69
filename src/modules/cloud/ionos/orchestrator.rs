//! The generic lifecycle shared by every resource module.
//!
//! A resource module only describes *how* to list, create, update, replace,
//! remove or renew its resource through a [`ResourceHandler`]. The
//! [`Orchestrator`] decides *what* to do for the requested state: it looks the
//! resource up, compares it with the desired parameters and shapes the result.
//!
//! Per state:
//!
//! - `present`: create when missing, otherwise update or replace when the
//!   parameters differ, otherwise report the resource unchanged.
//! - `update`: like `present` but never creates; a missing resource is a
//!   no-op, and renaming onto a name held by another resource fails.
//! - `absent`: remove when found, a no-op otherwise.
//! - `renew`: rotate the resource's credentials when found.

use crate::config::Settings;
use crate::modules::{
    Action, Diff, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};
use serde_json::Value;
use tracing::{debug, info};

use super::api::Clients;
use super::options::State;
use super::resolver::{self, IdentityPath};
use super::wait::WaitOptions;

/// Naming and identity of a managed resource type
#[derive(Debug, Clone)]
pub struct ResourceKind {
    /// Used in messages, e.g. `K8s Cluster`
    pub object_name: &'static str,
    /// Key the resource is returned under, e.g. `cluster`
    pub returned_key: &'static str,
    /// Parameter carrying the desired name
    pub name_param: &'static str,
    /// Parameter carrying the name or id of an existing resource
    pub identifier_param: &'static str,
    pub identity_paths: Vec<IdentityPath>,
}

impl ResourceKind {
    pub fn new(
        object_name: &'static str,
        returned_key: &'static str,
        name_param: &'static str,
        identifier_param: &'static str,
    ) -> Self {
        Self {
            object_name,
            returned_key,
            name_param,
            identifier_param,
            identity_paths: resolver::default_identity_paths(),
        }
    }

    pub fn with_identity_paths(mut self, paths: Vec<IdentityPath>) -> Self {
        self.identity_paths = paths;
        self
    }
}

/// Everything a handler needs for one module invocation
pub struct Invocation<'a> {
    pub params: &'a ModuleParams,
    pub state: State,
    pub clients: &'a Clients,
    pub settings: &'a Settings,
    pub wait: WaitOptions,
    pub check_mode: bool,
    pub diff_mode: bool,
}

impl Invocation<'_> {
    pub fn allow_replace(&self) -> bool {
        self.params.get_bool_or("allow_replace", false)
    }
}

/// Type-specific behavior of a resource module.
///
/// Resources exchanged with the orchestrator are normalized (snake_case keys).
pub trait ResourceHandler: Send + Sync {
    fn kind(&self) -> &ResourceKind;

    /// The parameters with names of referenced resources replaced by ids,
    /// `None` when nothing needed resolving
    fn resolve_references(&self, _params: &ModuleParams, _clients: &Clients) -> ModuleResult<Option<ModuleParams>> {
        Ok(None)
    }

    /// Every resource of the collection the invocation targets
    fn list(&self, invocation: &Invocation<'_>) -> ModuleResult<Vec<Value>>;

    /// Whether a change requires recreating the resource
    fn should_replace(&self, existing: &Value, invocation: &Invocation<'_>) -> bool;

    /// Whether a change can be applied in place
    fn should_update(&self, existing: &Value, invocation: &Invocation<'_>) -> bool;

    /// Create the resource; `existing` is the resource being replaced, if any
    fn create(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> ModuleResult<Value>;

    fn update(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<Value>;

    fn remove(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<()>;

    /// Rotate the credentials of the resource
    fn renew(&self, _existing: &Value, _invocation: &Invocation<'_>) -> ModuleResult<Value> {
        Err(ModuleError::Unsupported(format!(
            "{} cannot be renewed",
            self.kind().object_name
        )))
    }

    /// The resource as it would look after applying the parameters
    fn desired(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> Value;
}

/// Drives a [`ResourceHandler`] through the requested state
pub struct Orchestrator<'h> {
    handler: &'h dyn ResourceHandler,
}

impl<'h> Orchestrator<'h> {
    pub fn new(handler: &'h dyn ResourceHandler) -> Self {
        Self { handler }
    }

    pub fn run(&self, invocation: &Invocation<'_>) -> ModuleResult<ModuleOutput> {
        debug!(
            object = self.kind().object_name,
            state = %invocation.state,
            check_mode = invocation.check_mode,
            "running"
        );
        match invocation.state {
            State::Present => self.present(invocation),
            State::Update => self.update(invocation),
            State::Absent => self.absent(invocation),
            State::Renew => self.renew(invocation),
            State::Info => Err(ModuleError::Unsupported(format!(
                "{} has no info state",
                self.kind().object_name
            ))),
        }
    }

    fn kind(&self) -> &ResourceKind {
        self.handler.kind()
    }

    /// The resource named by the identifier parameter, or else by the name parameter
    fn lookup(&self, items: &[Value], invocation: &Invocation<'_>) -> ModuleResult<Option<Value>> {
        let kind = self.kind();
        let identifier = match invocation.params.get_string(kind.identifier_param)? {
            Some(identifier) => Some(identifier),
            None => invocation.params.get_string(kind.name_param)?,
        };

        Ok(identifier.and_then(|identifier| {
            resolver::find(items, &identifier, &kind.identity_paths).cloned()
        }))
    }

    fn present(&self, invocation: &Invocation<'_>) -> ModuleResult<ModuleOutput> {
        let items = self.handler.list(invocation)?;
        match self.lookup(&items, invocation)? {
            Some(existing) => self.update_or_replace(existing, invocation),
            None => {
                let resource = if invocation.check_mode {
                    self.handler.desired(None, invocation)
                } else {
                    let created = self.handler.create(None, invocation)?;
                    info!(object = self.kind().object_name, id = ?resolver::resource_id(&created), "created");
                    created
                };
                Ok(self.finish(Action::Create, None, resource, invocation))
            }
        }
    }

    fn update(&self, invocation: &Invocation<'_>) -> ModuleResult<ModuleOutput> {
        let kind = self.kind();
        let items = self.handler.list(invocation)?;
        let Some(existing) = self.lookup(&items, invocation)? else {
            debug!(object = kind.object_name, "nothing to update");
            return Ok(ModuleOutput::ok());
        };

        if let Some(name) = invocation.params.get_string(kind.name_param)? {
            let name_paths: Vec<IdentityPath> = kind
                .identity_paths
                .iter()
                .filter(|path| !path.is_id())
                .cloned()
                .collect();
            let existing_id = resolver::resource_id(&existing);
            let conflict = resolver::matching(&items, &name, &name_paths)
                .into_iter()
                .any(|other| resolver::resource_id(other) != existing_id);
            if conflict {
                return Err(ModuleError::NameConflict {
                    kind: kind.object_name.to_string(),
                    name,
                });
            }
        }

        self.update_or_replace(existing, invocation)
    }

    fn update_or_replace(&self, existing: Value, invocation: &Invocation<'_>) -> ModuleResult<ModuleOutput> {
        let kind = self.kind();

        if self.handler.should_replace(&existing, invocation) {
            if !invocation.allow_replace() {
                return Err(ModuleError::ReplaceNotAllowed(kind.object_name.to_string()));
            }
            let resource = if invocation.check_mode {
                self.handler.desired(Some(&existing), invocation)
            } else {
                let created = self.handler.create(Some(&existing), invocation)?;
                self.handler.remove(&existing, invocation)?;
                info!(
                    object = kind.object_name,
                    old = ?resolver::resource_id(&existing),
                    new = ?resolver::resource_id(&created),
                    "replaced"
                );
                created
            };
            return Ok(self.finish(Action::Create, Some(existing), resource, invocation));
        }

        if self.handler.should_update(&existing, invocation) {
            let resource = if invocation.check_mode {
                self.handler.desired(Some(&existing), invocation)
            } else {
                let updated = self.handler.update(&existing, invocation)?;
                info!(object = kind.object_name, id = ?resolver::resource_id(&existing), "updated");
                updated
            };
            return Ok(self.finish(Action::Update, Some(existing), resource, invocation));
        }

        debug!(object = kind.object_name, "already in the desired state");
        Ok(ModuleOutput::ok()
            .with_action(Action::Create)
            .with_data(kind.returned_key, existing))
    }

    fn absent(&self, invocation: &Invocation<'_>) -> ModuleResult<ModuleOutput> {
        let kind = self.kind();
        let items = self.handler.list(invocation)?;
        let Some(existing) = self.lookup(&items, invocation)? else {
            debug!(object = kind.object_name, "already absent");
            return Ok(ModuleOutput::ok());
        };

        let id = resolver::resource_id(&existing).map(Value::from).unwrap_or(Value::Null);
        if !invocation.check_mode {
            self.handler.remove(&existing, invocation)?;
            info!(object = kind.object_name, %id, "deleted");
        }

        let mut output = ModuleOutput::changed()
            .with_action(Action::Delete)
            .with_data("id", id);
        if invocation.diff_mode {
            output = output.with_diff(Diff::new(existing, Value::Null));
        }
        Ok(output)
    }

    fn renew(&self, invocation: &Invocation<'_>) -> ModuleResult<ModuleOutput> {
        let kind = self.kind();
        let items = self.handler.list(invocation)?;
        let Some(existing) = self.lookup(&items, invocation)? else {
            debug!(object = kind.object_name, "nothing to renew");
            return Ok(ModuleOutput::ok());
        };

        let id = resolver::resource_id(&existing).map(Value::from).unwrap_or(Value::Null);
        let mut output = ModuleOutput::changed()
            .with_action(Action::Renew)
            .with_data("id", id.clone());

        if !invocation.check_mode {
            let renewed = self.handler.renew(&existing, invocation)?;
            info!(object = kind.object_name, %id, "renewed");
            if let Value::Object(fields) = renewed {
                for (key, value) in fields {
                    output = output.with_data(key, value);
                }
            }
        }
        Ok(output)
    }

    fn finish(
        &self,
        action: Action,
        before: Option<Value>,
        resource: Value,
        invocation: &Invocation<'_>,
    ) -> ModuleOutput {
        let mut output = ModuleOutput::changed().with_action(action);
        if invocation.diff_mode {
            output = output.with_diff(Diff::new(
                before.unwrap_or(Value::Null),
                resource.clone(),
            ));
        }
        output.with_data(self.kind().returned_key, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    /// A handler over a plain vector, comparing `name` and `size` only
    struct VecHandler {
        kind: ResourceKind,
        items: Mutex<Vec<Value>>,
        log: Mutex<Vec<String>>,
    }

    impl VecHandler {
        fn new(items: Vec<Value>) -> Self {
            Self {
                kind: ResourceKind::new("Thing", "thing", "name", "thing"),
                items: Mutex::new(items),
                log: Mutex::new(Vec::new()),
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }

        fn property(params: &ModuleParams, key: &str) -> Option<Value> {
            params.get(key).filter(|v| !v.is_null()).cloned()
        }
    }

    impl ResourceHandler for VecHandler {
        fn kind(&self) -> &ResourceKind {
            &self.kind
        }

        fn list(&self, _invocation: &Invocation<'_>) -> ModuleResult<Vec<Value>> {
            Ok(self.items.lock().clone())
        }

        fn should_replace(&self, existing: &Value, invocation: &Invocation<'_>) -> bool {
            Self::property(invocation.params, "size")
                .is_some_and(|size| existing["properties"]["size"] != size)
        }

        fn should_update(&self, existing: &Value, invocation: &Invocation<'_>) -> bool {
            Self::property(invocation.params, "name")
                .is_some_and(|name| existing["properties"]["name"] != name)
        }

        fn create(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> ModuleResult<Value> {
            let resource = self.desired(existing, invocation);
            let mut items = self.items.lock();
            let resource = json!({"id": format!("id-{}", items.len() + 1), "properties": resource["properties"]});
            items.push(resource.clone());
            self.log.lock().push("create".into());
            Ok(resource)
        }

        fn update(&self, existing: &Value, invocation: &Invocation<'_>) -> ModuleResult<Value> {
            self.log.lock().push("update".into());
            let mut items = self.items.lock();
            let item = items
                .iter_mut()
                .find(|item| item["id"] == existing["id"])
                .ok_or_else(|| ModuleError::NotFound("thing".into()))?;
            item["properties"]["name"] = Self::property(invocation.params, "name").unwrap_or(Value::Null);
            Ok(item.clone())
        }

        fn remove(&self, existing: &Value, _invocation: &Invocation<'_>) -> ModuleResult<()> {
            self.log.lock().push("remove".into());
            self.items.lock().retain(|item| item["id"] != existing["id"]);
            Ok(())
        }

        fn desired(&self, existing: Option<&Value>, invocation: &Invocation<'_>) -> Value {
            let mut resource = existing.cloned().unwrap_or_else(|| json!({"properties": {}}));
            for key in ["name", "size"] {
                if let Some(value) = Self::property(invocation.params, key) {
                    resource["properties"][key] = value;
                }
            }
            resource
        }
    }

    fn run(handler: &VecHandler, state: State, params: Value, check_mode: bool) -> ModuleResult<ModuleOutput> {
        let params: ModuleParams = serde_json::from_value(params).unwrap();
        let clients = Clients::new();
        let settings = Settings::default();
        let invocation = Invocation {
            params: &params,
            state,
            clients: &clients,
            settings: &settings,
            wait: WaitOptions::disabled(),
            check_mode,
            diff_mode: true,
        };
        Orchestrator::new(handler).run(&invocation)
    }

    fn existing() -> Vec<Value> {
        vec![
            json!({"id": "id-a", "properties": {"name": "alpha", "size": 1}}),
            json!({"id": "id-b", "properties": {"name": "beta", "size": 1}}),
        ]
    }

    #[test]
    fn test_present_creates_then_is_idempotent() {
        let handler = VecHandler::new(Vec::new());
        let first = run(&handler, State::Present, json!({"name": "web", "size": 2}), false).unwrap();
        assert!(first.changed);
        assert_eq!(first.action, Some(Action::Create));
        assert_eq!(first.data["thing"]["properties"]["name"], json!("web"));

        let second = run(&handler, State::Present, json!({"name": "web", "size": 2}), false).unwrap();
        assert!(!second.changed);
        assert_eq!(second.action, Some(Action::Create));
        assert_eq!(handler.log(), vec!["create"]);
    }

    #[test]
    fn test_replace_requires_allow_replace() {
        let handler = VecHandler::new(existing());
        let err = run(&handler, State::Present, json!({"name": "alpha", "size": 5}), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Thing should be replaced but allow_replace is set to False."
        );
        assert!(handler.log().is_empty());

        let output = run(
            &handler,
            State::Present,
            json!({"name": "alpha", "size": 5, "allow_replace": true}),
            false,
        )
        .unwrap();
        assert_eq!(output.action, Some(Action::Create));
        assert_eq!(handler.log(), vec!["create", "remove"]);
        assert_ne!(output.data["thing"]["id"], json!("id-a"));
    }

    #[test]
    fn test_update_by_identifier() {
        let handler = VecHandler::new(existing());
        let output = run(&handler, State::Update, json!({"thing": "id-a", "name": "gamma"}), false).unwrap();
        assert_eq!(output.action, Some(Action::Update));
        assert_eq!(output.data["thing"]["properties"]["name"], json!("gamma"));
        let diff = output.diff.unwrap();
        assert_eq!(diff.before["properties"]["name"], json!("alpha"));
    }

    #[test]
    fn test_update_name_conflict() {
        let handler = VecHandler::new(existing());
        let err = run(&handler, State::Update, json!({"thing": "alpha", "name": "BETA"}), false).unwrap_err();
        assert!(matches!(err, ModuleError::NameConflict { ref name, .. } if name == "BETA"));
        assert!(handler.log().is_empty());
    }

    #[test]
    fn test_missing_resource_is_a_noop() {
        let handler = VecHandler::new(existing());
        for state in [State::Update, State::Absent, State::Renew] {
            let output = run(&handler, state, json!({"thing": "nope", "name": "x"}), false).unwrap();
            assert!(!output.changed, "{} should not change anything", state);
        }
        assert!(handler.log().is_empty());
    }

    #[test]
    fn test_absent_reports_id() {
        let handler = VecHandler::new(existing());
        let output = run(&handler, State::Absent, json!({"thing": "beta"}), false).unwrap();
        assert!(output.changed);
        assert_eq!(output.action, Some(Action::Delete));
        assert_eq!(output.data["id"], json!("id-b"));
        assert_eq!(handler.items.lock().len(), 1);
    }

    #[test]
    fn test_check_mode_does_not_mutate() {
        let handler = VecHandler::new(existing());
        let created = run(&handler, State::Present, json!({"name": "new"}), true).unwrap();
        assert_eq!(created.action, Some(Action::Create));
        let removed = run(&handler, State::Absent, json!({"thing": "id-a"}), true).unwrap();
        assert_eq!(removed.action, Some(Action::Delete));
        assert!(handler.log().is_empty());
        assert_eq!(handler.items.lock().len(), 2);
    }

    #[test]
    fn test_renew_unsupported_by_default() {
        let handler = VecHandler::new(existing());
        let err = run(&handler, State::Renew, json!({"thing": "id-a"}), false).unwrap_err();
        assert!(matches!(err, ModuleError::Unsupported(_)));
    }
}
