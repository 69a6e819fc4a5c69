//! Option schemas for the IONOS Cloud modules.
//!
//! Every module describes its parameters as an [`OptionSchema`]: its own
//! options composed with shared fragments such as [`auth_options`] or
//! [`default_options`]. Each option records the states it is available in and
//! the states that require it, so the same schema drives validation and the
//! `describe` output.

use crate::modules::{ModuleError, ModuleParams, ModuleResult, ParamExt};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// Desired lifecycle state of a module invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Present,
    Absent,
    Update,
    Renew,
    Info,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Present => "present",
            State::Absent => "absent",
            State::Update => "update",
            State::Renew => "renew",
            State::Info => "info",
        }
    }

    pub fn parse(s: &str) -> ModuleResult<Self> {
        match s {
            "present" => Ok(State::Present),
            "absent" => Ok(State::Absent),
            "update" => Ok(State::Update),
            "renew" => Ok(State::Renew),
            "info" => Ok(State::Info),
            other => Err(ModuleError::InvalidParameter(format!(
                "unknown state '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type an option value is coerced to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Str,
    Bool,
    Int,
    List,
    Dict,
    Raw,
}

/// A single module option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    #[serde(skip)]
    pub name: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: OptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<OptionType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Value>,
    /// States the option is used in; empty means every state
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<State>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<State>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_fallback: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_log: bool,
}

impl OptionSpec {
    pub fn new(name: &'static str, kind: OptionType) -> Self {
        Self {
            name,
            description: "",
            kind,
            elements: None,
            aliases: Vec::new(),
            default: None,
            choices: Vec::new(),
            available: Vec::new(),
            required: Vec::new(),
            env_fallback: None,
            no_log: false,
        }
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn elements(mut self, elements: OptionType) -> Self {
        self.elements = Some(elements);
        self
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn available_in(mut self, states: &[State]) -> Self {
        self.available = states.to_vec();
        self
    }

    pub fn required_in(mut self, states: &[State]) -> Self {
        self.required = states.to_vec();
        self
    }

    pub fn env(mut self, variable: &'static str) -> Self {
        self.env_fallback = Some(variable);
        self
    }

    pub fn no_log(mut self) -> Self {
        self.no_log = true;
        self
    }

    fn answers_to(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }

    fn is_available_in(&self, state: State) -> bool {
        self.available.is_empty() || self.available.contains(&state)
    }

    fn coerce(&self, value: Value) -> ModuleResult<Value> {
        match (self.kind, value) {
            (OptionType::List, Value::Array(items)) => match self.elements {
                Some(elements) => items
                    .into_iter()
                    .map(|item| coerce_value(self.name, elements, item))
                    .collect::<ModuleResult<Vec<_>>>()
                    .map(Value::Array),
                None => Ok(Value::Array(items)),
            },
            (kind, value) => coerce_value(self.name, kind, value),
        }
    }

    fn check_choices(&self, value: &Value) -> ModuleResult<()> {
        if self.choices.is_empty() || self.choices.contains(value) {
            return Ok(());
        }
        let choices: Vec<String> = self.choices.iter().map(display_value).collect();
        Err(ModuleError::InvalidParameter(format!(
            "value of {} must be one of: {}, got: {}",
            self.name,
            choices.join(", "),
            display_value(value)
        )))
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_value(name: &str, kind: OptionType, value: Value) -> ModuleResult<Value> {
    let invalid = |what: &str| ModuleError::InvalidParameter(format!("{} must be {}", name, what));

    match (kind, value) {
        (OptionType::Raw, value) => Ok(value),
        (OptionType::Str, Value::String(s)) => Ok(Value::String(s)),
        (OptionType::Str, value @ (Value::Number(_) | Value::Bool(_))) => {
            Ok(Value::String(value.to_string()))
        }
        (OptionType::Str, _) => Err(invalid("a string")),
        (OptionType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
        (OptionType::Bool, Value::String(s)) => match s.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(Value::Bool(true)),
            "false" | "no" | "0" | "off" => Ok(Value::Bool(false)),
            _ => Err(invalid("a boolean")),
        },
        (OptionType::Bool, _) => Err(invalid("a boolean")),
        (OptionType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
        (OptionType::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid("an integer")),
        (OptionType::Int, _) => Err(invalid("an integer")),
        (OptionType::List, Value::Array(items)) => Ok(Value::Array(items)),
        (OptionType::List, Value::String(s)) => Ok(Value::Array(
            s.split(',')
                .map(|part| Value::String(part.trim().to_string()))
                .collect(),
        )),
        (OptionType::List, _) => Err(invalid("a list")),
        (OptionType::Dict, Value::Object(map)) => Ok(Value::Object(map)),
        (OptionType::Dict, _) => Err(invalid("a dict")),
    }
}

/// The complete parameter schema of a module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSchema {
    object_name: &'static str,
    states: Vec<State>,
    options: IndexMap<&'static str, OptionSpec>,
}

impl OptionSchema {
    /// An empty schema for an object supporting the given states
    pub fn new(object_name: &'static str, states: &[State]) -> Self {
        Self {
            object_name,
            states: states.to_vec(),
            options: IndexMap::new(),
        }
    }

    /// Add an option, replacing any option of the same name
    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.insert(spec.name, spec);
        self
    }

    /// Add every option of a shared fragment
    pub fn merge(self, fragment: Vec<OptionSpec>) -> Self {
        fragment.into_iter().fold(self, OptionSchema::option)
    }

    pub fn object_name(&self) -> &'static str {
        self.object_name
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options.get(name)
    }

    pub fn options(&self) -> impl Iterator<Item = &OptionSpec> {
        self.options.values()
    }

    /// The state used when the caller does not name one
    pub fn default_state(&self) -> State {
        self.options
            .get("state")
            .and_then(|spec| spec.default.as_ref())
            .and_then(Value::as_str)
            .and_then(|s| State::parse(s).ok())
            .or_else(|| self.states.first().copied())
            .unwrap_or(State::Present)
    }

    /// The state requested by raw, unvalidated parameters
    pub fn requested_state(&self, params: &ModuleParams) -> State {
        params
            .get("state")
            .and_then(Value::as_str)
            .and_then(|s| State::parse(s).ok())
            .unwrap_or_else(|| self.default_state())
    }

    /// Validate parameters, reading environment fallbacks from the process environment
    pub fn validate(&self, params: &ModuleParams) -> ModuleResult<ModuleParams> {
        self.validate_with_env(params, |variable| std::env::var(variable).ok())
    }

    /// Validate parameters against the schema.
    ///
    /// Aliases are resolved to canonical names, missing values are filled from
    /// the environment fallback and then the default, values are coerced to
    /// their declared type and checked against their choices. Options required
    /// in the effective state must end up with a value.
    pub fn validate_with_env<F>(&self, params: &ModuleParams, env: F) -> ModuleResult<ModuleParams>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut provided: HashMap<&'static str, Value> = HashMap::new();
        let mut unsupported = Vec::new();

        for (key, value) in params {
            if key.starts_with("_ansible_") {
                continue;
            }
            let Some(spec) = self.options.values().find(|spec| spec.answers_to(key)) else {
                unsupported.push(key.as_str());
                continue;
            };
            if value.is_null() {
                continue;
            }
            if provided.insert(spec.name, value.clone()).is_some() {
                return Err(ModuleError::InvalidParameter(format!(
                    "parameter {} was given more than once (through an alias)",
                    spec.name
                )));
            }
        }

        if !unsupported.is_empty() {
            unsupported.sort_unstable();
            let supported: Vec<&str> = self.options.keys().copied().collect();
            return Err(ModuleError::InvalidParameter(format!(
                "Unsupported parameters for {}: {}. Supported parameters include: {}",
                self.object_name,
                unsupported.join(", "),
                supported.join(", ")
            )));
        }

        let mut validated = ModuleParams::new();
        let mut explicit = HashSet::new();

        for spec in self.options.values() {
            let raw = match provided.remove(spec.name) {
                Some(value) => {
                    explicit.insert(spec.name);
                    Some(value)
                }
                None => spec
                    .env_fallback
                    .and_then(&env)
                    .map(Value::String)
                    .or_else(|| spec.default.clone()),
            };

            if let Some(raw) = raw {
                let value = spec.coerce(raw)?;
                spec.check_choices(&value)?;
                validated.insert(spec.name.to_string(), value);
            }
        }

        let state = match validated.get_string("state")? {
            Some(state) => State::parse(&state)?,
            None => self.default_state(),
        };

        if !self.states.contains(&state) {
            return Err(ModuleError::InvalidParameter(format!(
                "{} does not support state {}",
                self.object_name, state
            )));
        }

        for spec in self.options.values() {
            if spec.required.contains(&state) && !validated.contains_key(spec.name) {
                let msg = match state {
                    State::Info => format!(
                        "{} parameter is required for retrieving {}",
                        spec.name, self.object_name
                    ),
                    _ => format!(
                        "{} parameter is required for {} state {}",
                        spec.name, self.object_name, state
                    ),
                };
                return Err(ModuleError::MissingParameter(msg));
            }
            if explicit.contains(spec.name) && !spec.is_available_in(state) {
                warn!(
                    option = spec.name,
                    %state,
                    "option is not used by {} in this state", self.object_name
                );
            }
        }

        Ok(validated)
    }
}

/// Credential and endpoint options shared by every module
pub fn auth_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec::new("api_url", OptionType::Str)
            .description("The Ionos API base URL.")
            .env("IONOS_API_URL"),
        OptionSpec::new("certificate_fingerprint", OptionType::Str)
            .description("The Ionos API certificate fingerprint.")
            .env("IONOS_CERTIFICATE_FINGERPRINT"),
        OptionSpec::new("username", OptionType::Str)
            .description("The Ionos username. Overrides the IONOS_USERNAME environment variable.")
            .alias("subscription_user")
            .env("IONOS_USERNAME"),
        OptionSpec::new("password", OptionType::Str)
            .description("The Ionos password. Overrides the IONOS_PASSWORD environment variable.")
            .alias("subscription_password")
            .env("IONOS_PASSWORD")
            .no_log(),
        OptionSpec::new("token", OptionType::Str)
            .description("The Ionos token. Overrides the IONOS_TOKEN environment variable.")
            .env("IONOS_TOKEN")
            .no_log(),
    ]
}

pub fn wait_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec::new("wait", OptionType::Bool)
            .description("Wait for the resource to be created before returning.")
            .default_value(Value::Bool(true)),
        OptionSpec::new("wait_timeout", OptionType::Int)
            .description("How long before wait gives up, in seconds.")
            .default_value(Value::from(600)),
    ]
}

pub fn state_option(states: &[State]) -> OptionSpec {
    OptionSpec::new("state", OptionType::Str)
        .description("Indicate desired state of the resource.")
        .default_value(Value::from("present"))
        .choices(states.iter().map(State::as_str))
}

pub fn allow_replace_option() -> OptionSpec {
    OptionSpec::new("allow_replace", OptionType::Bool)
        .description(
            "Boolean indicating if the resource should be recreated when the state cannot be reached in another way.",
        )
        .available_in(&[State::Present, State::Update])
        .default_value(Value::Bool(false))
}

/// Options shared by every resource module
pub fn default_options(states: &[State]) -> Vec<OptionSpec> {
    let mut options = Vec::new();
    if states.contains(&State::Present) {
        options.push(allow_replace_option());
    }
    options.extend(auth_options());
    options.extend(wait_options());
    options.push(state_option(states));
    options
}

/// Options shared by every info module
pub fn info_options() -> Vec<OptionSpec> {
    let mut options = vec![OptionSpec::new("filters", OptionType::Dict).description(
        "Filter that can be used to list only objects which have a certain set of properties, e.g. 'properties.name': 'server_name'.",
    )];
    options.extend(auth_options());
    options
}

/// Options shared by info modules whose service supports a listing depth
pub fn info_options_with_depth() -> Vec<OptionSpec> {
    let mut options = vec![OptionSpec::new("depth", OptionType::Int)
        .description("The depth used when retrieving the items.")
        .default_value(Value::from(1))];
    options.extend(info_options());
    options
}

/// Fail unless a token or a username and password pair was supplied
pub fn check_credentials(params: &ModuleParams, object_name: &str, state: State) -> ModuleResult<()> {
    let non_empty = |key: &str| -> ModuleResult<bool> {
        Ok(params.get_string(key)?.is_some_and(|v| !v.is_empty()))
    };

    if non_empty("token")? || (non_empty("username")? && non_empty("password")?) {
        return Ok(());
    }

    let msg = match state {
        State::Info => format!(
            "Token or username & password are required for {}",
            object_name
        ),
        _ => format!(
            "Token or username & password are required for {} state {}",
            object_name, state
        ),
    };
    Err(ModuleError::MissingParameter(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const STATES: &[State] = &[State::Present, State::Absent, State::Update];

    fn schema() -> OptionSchema {
        OptionSchema::new("Datacenter", STATES)
            .option(
                OptionSpec::new("name", OptionType::Str)
                    .available_in(&[State::Present, State::Update])
                    .required_in(&[State::Present]),
            )
            .option(
                OptionSpec::new("datacenter", OptionType::Str)
                    .available_in(&[State::Update, State::Absent])
                    .required_in(&[State::Update, State::Absent]),
            )
            .option(OptionSpec::new("location", OptionType::Str).choices(["de/fra", "de/txl"]))
            .option(OptionSpec::new("tags", OptionType::List).elements(OptionType::Str))
            .merge(default_options(STATES))
    }

    fn params(value: Value) -> ModuleParams {
        serde_json::from_value(value).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_are_filled() {
        let validated = schema()
            .validate_with_env(&params(json!({"name": "web"})), no_env)
            .unwrap();

        assert_eq!(validated["state"], json!("present"));
        assert_eq!(validated["wait"], json!(true));
        assert_eq!(validated["wait_timeout"], json!(600));
        assert_eq!(validated["allow_replace"], json!(false));
        assert!(!validated.contains_key("token"));
    }

    #[test]
    fn test_aliases_resolve_to_canonical_names() {
        let validated = schema()
            .validate_with_env(
                &params(json!({"name": "web", "subscription_user": "me", "subscription_password": "pw"})),
                no_env,
            )
            .unwrap();

        assert_eq!(validated["username"], json!("me"));
        assert_eq!(validated["password"], json!("pw"));
    }

    #[test]
    fn test_alias_and_name_together_is_rejected() {
        let err = schema()
            .validate_with_env(
                &params(json!({"name": "web", "username": "a", "subscription_user": "b"})),
                no_env,
            )
            .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidParameter(_)));
    }

    #[test]
    fn test_env_fallback_loses_to_explicit_value() {
        let env = |var: &str| match var {
            "IONOS_TOKEN" => Some("from-env".to_string()),
            "IONOS_API_URL" => Some("http://localhost".to_string()),
            _ => None,
        };
        let validated = schema()
            .validate_with_env(&params(json!({"name": "web", "token": "explicit"})), env)
            .unwrap();

        assert_eq!(validated["token"], json!("explicit"));
        assert_eq!(validated["api_url"], json!("http://localhost"));
    }

    #[test]
    fn test_required_per_state() {
        let err = schema()
            .validate_with_env(&params(json!({"state": "absent"})), no_env)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "datacenter parameter is required for Datacenter state absent"
        );

        assert!(schema()
            .validate_with_env(&params(json!({"state": "absent", "datacenter": "a1"})), no_env)
            .is_ok());
    }

    #[test]
    fn test_choices_are_enforced() {
        let err = schema()
            .validate_with_env(&params(json!({"name": "web", "location": "us/las"})), no_env)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "value of location must be one of: de/fra, de/txl, got: us/las"
        );

        let err = schema()
            .validate_with_env(&params(json!({"name": "web", "state": "renew"})), no_env)
            .unwrap_err();
        assert!(err.to_string().starts_with("value of state must be one of"));
    }

    #[test]
    fn test_unknown_parameters_are_rejected() {
        let err = schema()
            .validate_with_env(&params(json!({"name": "web", "colour": "red"})), no_env)
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Unsupported parameters for Datacenter: colour."));
    }

    #[test]
    fn test_engine_internal_parameters_are_ignored() {
        let validated = schema()
            .validate_with_env(
                &params(json!({"name": "web", "_ansible_check_mode": true})),
                no_env,
            )
            .unwrap();
        assert!(!validated.contains_key("_ansible_check_mode"));
    }

    #[test]
    fn test_coercion() {
        let validated = schema()
            .validate_with_env(
                &params(json!({"name": 42, "wait": "no", "wait_timeout": "30", "tags": "a, b"})),
                no_env,
            )
            .unwrap();

        assert_eq!(validated["name"], json!("42"));
        assert_eq!(validated["wait"], json!(false));
        assert_eq!(validated["wait_timeout"], json!(30));
        assert_eq!(validated["tags"], json!(["a", "b"]));

        let err = schema()
            .validate_with_env(&params(json!({"name": "web", "wait_timeout": "soon"})), no_env)
            .unwrap_err();
        assert_eq!(err.to_string(), "wait_timeout must be an integer");
    }

    #[test]
    fn test_info_schema_uses_info_state() {
        let schema = OptionSchema::new("LAN", &[State::Info])
            .option(
                OptionSpec::new("datacenter", OptionType::Str).required_in(&[State::Info]),
            )
            .merge(info_options_with_depth());

        assert_eq!(schema.default_state(), State::Info);
        let err = schema
            .validate_with_env(&ModuleParams::new(), no_env)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "datacenter parameter is required for retrieving LAN"
        );

        let validated = schema
            .validate_with_env(&params(json!({"datacenter": "dc"})), no_env)
            .unwrap();
        assert_eq!(validated["depth"], json!(1));
    }

    #[test]
    fn test_check_credentials() {
        let ok = params(json!({"token": "t"}));
        assert!(check_credentials(&ok, "Datacenter", State::Present).is_ok());

        let ok = params(json!({"username": "u", "password": "p"}));
        assert!(check_credentials(&ok, "Datacenter", State::Present).is_ok());

        let missing = params(json!({"username": "u"}));
        let err = check_credentials(&missing, "Datacenter", State::Absent).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Token or username & password are required for Datacenter state absent"
        );

        let err = check_credentials(&ModuleParams::new(), "LAN", State::Info).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Token or username & password are required for LAN"
        );
    }

    #[test]
    fn test_schema_describe_shape() {
        let value = serde_json::to_value(schema()).unwrap();
        assert_eq!(value["object_name"], json!("Datacenter"));
        assert_eq!(value["options"]["password"]["no_log"], json!(true));
        assert_eq!(value["options"]["username"]["aliases"], json!(["subscription_user"]));
        assert!(value["options"]["name"].get("no_log").is_none());
    }
}
