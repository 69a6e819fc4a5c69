//! Conversion between API payloads and module results.
//!
//! The APIs speak camelCase JSON, modules and their callers speak snake_case.
//! [`normalize`] turns an API object into the returned shape, [`to_api`] does
//! the reverse for request bodies. Free-form maps such as `labels` keep their
//! keys untouched in both directions.

use serde_json::{Map, Value};

/// Keys whose values are user-defined maps and are never renamed
const FREE_FORM_KEYS: &[&str] = &["labels", "annotations"];

/// `apiSubnetAllowList` -> `api_subnet_allow_list`, `_links` -> `links`
///
/// A run of capitals is one word (`natGatewayIP` -> `nat_gateway_ip`), so
/// keys with single-letter segments such as `a_b_c` do not survive a trip
/// through [`to_camel_case`].
pub fn to_snake_case(key: &str) -> String {
    let key = key.trim_start_matches('_');
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `ipv6_cidr_block` -> `ipv6CidrBlock`
pub fn to_camel_case(key: &str) -> String {
    let mut parts = key.split('_').filter(|part| !part.is_empty());
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    out
}

fn rename_keys(value: Value, rename: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let key = rename(&key);
                    let value = if FREE_FORM_KEYS.contains(&key.as_str()) {
                        value
                    } else {
                        rename_keys(value, rename)
                    };
                    (key, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rename_keys(item, rename))
                .collect(),
        ),
        other => other,
    }
}

/// Convert an API object into the shape returned by modules
pub fn normalize(value: Value) -> Value {
    rename_keys(value, to_snake_case)
}

/// Convert a snake_case request body into the API's camelCase
pub fn to_api(value: Value) -> Value {
    rename_keys(value, to_camel_case)
}

/// Read a nested value, e.g. `["properties", "name"]`
pub fn get_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, segment| current.get(segment.as_ref()))
}

/// Write a nested value, creating intermediate objects as needed
pub fn set_path<S: AsRef<str>>(target: &mut Value, path: &[S], new_value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *target = new_value;
        return;
    };

    let mut current = target;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.as_ref().to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.as_ref().to_string(), new_value);
    }
}

/// Whether a current value already satisfies a desired one.
///
/// Objects match when every desired key matches; keys the caller did not
/// ask for are ignored. Arrays match element-wise, or as multisets when
/// `unordered` is set. A desired `null` matches anything.
pub fn value_matches(desired: &Value, current: Option<&Value>, unordered: bool) -> bool {
    let current = match (desired, current) {
        (Value::Null, _) => return true,
        (_, None) => return false,
        (_, Some(current)) => current,
    };

    match (desired, current) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(key, value)| value_matches(value, have.get(key), unordered)),
        (Value::Array(want), Value::Array(have)) => {
            if want.len() != have.len() {
                return false;
            }
            if !unordered {
                return want
                    .iter()
                    .zip(have)
                    .all(|(w, h)| value_matches(w, Some(h), unordered));
            }
            let mut used = vec![false; have.len()];
            want.iter().all(|w| {
                let found = have
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !used[*i] && value_matches(w, Some(*h), unordered))
                    .map(|(i, _)| i);
                match found {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        (Value::Number(want), Value::Number(have)) => want.as_f64() == have.as_f64(),
        (want, have) => want == have,
    }
}
