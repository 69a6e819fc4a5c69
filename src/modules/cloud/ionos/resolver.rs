//! Resolution of user-supplied identifiers against fetched collections.
//!
//! An identifier is either a UUID or a human-readable name, so every resource
//! type declares the [`IdentityPath`]s to compare it with. The default is
//! `id` followed by `properties.name`. Lookups are pure: they scan an already
//! fetched collection and never call the API.

use crate::modules::{ModuleError, ModuleResult};
use serde_json::{Map, Value};

use super::normalize::get_path;

/// How an extracted identity value is compared to the identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matching {
    /// Byte-for-byte, used for UUIDs
    Exact,
    /// Case-insensitive, used for names
    IgnoreCase,
}

/// Where to read an identifying value from a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPath {
    segments: Vec<String>,
    matching: Matching,
}

impl IdentityPath {
    /// A path compared exactly when it is `id`, case-insensitively otherwise
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let matching = if segments.len() == 1 && segments[0] == "id" {
            Matching::Exact
        } else {
            Matching::IgnoreCase
        };
        Self { segments, matching }
    }

    pub fn with_matching(mut self, matching: Matching) -> Self {
        self.matching = matching;
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_id(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == "id"
    }

    /// The identifying value of a resource at this path, if it is a string
    pub fn extract<'a>(&self, resource: &'a Value) -> Option<&'a str> {
        get_path(resource, &self.segments).and_then(Value::as_str)
    }

    pub fn matches(&self, resource: &Value, identifier: &str) -> bool {
        match self.extract(resource) {
            Some(value) => match self.matching {
                Matching::Exact => value == identifier,
                Matching::IgnoreCase => value.to_lowercase() == identifier.to_lowercase(),
            },
            None => false,
        }
    }
}

/// `[["id"], ["properties", "name"]]`
pub fn default_identity_paths() -> Vec<IdentityPath> {
    vec![
        IdentityPath::new(["id"]),
        IdentityPath::new(["properties", "name"]),
    ]
}

fn is_match(resource: &Value, identifier: &str, paths: &[IdentityPath]) -> bool {
    paths.iter().any(|path| path.matches(resource, identifier))
}

/// Every element matching the identifier on any path, in collection order
pub fn matching<'a>(
    collection: &'a [Value],
    identifier: &str,
    paths: &[IdentityPath],
) -> Vec<&'a Value> {
    collection
        .iter()
        .filter(|resource| is_match(resource, identifier, paths))
        .collect()
}

/// The first element matching the identifier
pub fn find<'a>(collection: &'a [Value], identifier: &str, paths: &[IdentityPath]) -> Option<&'a Value> {
    collection
        .iter()
        .find(|resource| is_match(resource, identifier, paths))
}

/// Like [`find`], failing with `NotFound` when nothing matches
pub fn resolve<'a>(
    collection: &'a [Value],
    identifier: &str,
    paths: &[IdentityPath],
) -> ModuleResult<&'a Value> {
    find(collection, identifier, paths)
        .ok_or_else(|| ModuleError::NotFound(format!("'{}'", identifier)))
}

/// The id of the resolved element
pub fn resolve_id(collection: &[Value], identifier: &str, paths: &[IdentityPath]) -> ModuleResult<String> {
    let resource = resolve(collection, identifier, paths)?;
    resource_id(resource)
        .map(str::to_string)
        .ok_or_else(|| ModuleError::NotFound(format!("id of '{}'", identifier)))
}

pub fn resource_id(resource: &Value) -> Option<&str> {
    resource.get("id").and_then(Value::as_str)
}

/// Keep the items for which every `dotted.path: value` filter holds
pub fn apply_filters(items: Vec<Value>, filters: &Map<String, Value>) -> Vec<Value> {
    if filters.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            filters.iter().all(|(path, expected)| {
                let segments: Vec<&str> = path.split('.').collect();
                get_path(item, &segments) == Some(expected)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> Vec<Value> {
        vec![
            json!({"id": "a1", "properties": {"name": "web"}}),
            json!({"id": "b2", "properties": {"name": "db"}}),
        ]
    }

    #[test]
    fn test_resolve_by_name() {
        let items = collection();
        let found = resolve(&items, "web", &default_identity_paths()).unwrap();
        assert_eq!(found, &items[0]);
    }

    #[test]
    fn test_resolve_by_id() {
        let items = collection();
        assert_eq!(resolve_id(&items, "b2", &default_identity_paths()).unwrap(), "b2");
    }

    #[test]
    fn test_names_ignore_case_ids_do_not() {
        let items = collection();
        assert!(find(&items, "WEB", &default_identity_paths()).is_some());
        assert!(find(&items, "A1", &default_identity_paths()).is_none());
    }

    #[test]
    fn test_names_ignore_non_ascii_case() {
        let items = vec![json!({"id": "a1", "properties": {"name": "Übung"}})];
        let found = find(&items, "übung", &default_identity_paths()).unwrap();
        assert_eq!(found["id"], "a1");
    }

    #[test]
    fn test_not_found() {
        let err = resolve(&collection(), "cache", &default_identity_paths()).unwrap_err();
        assert!(matches!(err, ModuleError::NotFound(_)));
        assert_eq!(err.to_string(), "'cache' not found");
    }

    #[test]
    fn test_first_match_wins() {
        let items = vec![
            json!({"id": "a1", "properties": {"name": "web"}}),
            json!({"id": "a2", "properties": {"name": "web"}}),
        ];
        assert_eq!(matching(&items, "web", &default_identity_paths()).len(), 2);
        assert_eq!(resolve_id(&items, "web", &default_identity_paths()).unwrap(), "a1");
    }

    #[test]
    fn test_custom_identity_paths() {
        let items = vec![json!({"id": "z1", "properties": {"zone_name": "example.com"}})];
        let paths = vec![
            IdentityPath::new(["id"]),
            IdentityPath::new(["properties", "zone_name"]),
        ];
        assert!(find(&items, "example.com", &paths).is_some());
        assert!(find(&items, "example.com", &default_identity_paths()).is_none());
    }

    #[test]
    fn test_apply_filters() {
        let items = vec![
            json!({"id": "a1", "properties": {"name": "web", "location": "de/fra"}}),
            json!({"id": "b2", "properties": {"name": "db", "location": "de/fra"}}),
            json!({"id": "c3", "properties": {"name": "web", "location": "us/las"}}),
        ];
        let filters: Map<String, Value> = serde_json::from_value(json!({
            "properties.name": "web",
            "properties.location": "de/fra"
        }))
        .unwrap();

        let filtered = apply_filters(items.clone(), &filters);
        assert_eq!(filtered, vec![items[0].clone()]);
        assert_eq!(apply_filters(items.clone(), &Map::new()), items);
    }
}
