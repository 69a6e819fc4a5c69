//! Bounded polling for asynchronous provisioning.

use crate::config::Settings;
use crate::modules::{ModuleError, ModuleParams, ModuleResult, ParamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::api::{CloudClient, RequestStatus};
use super::normalize::get_path;

static REQUEST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/requests/([-A-Fa-f0-9]+)/").expect("Invalid request id regex"));

/// The `wait`/`wait_timeout` options plus the poll interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub enabled: bool,
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(600),
            interval: Duration::from_secs(5),
        }
    }
}

impl WaitOptions {
    pub fn from_params(params: &ModuleParams, settings: &Settings) -> ModuleResult<Self> {
        let timeout = params.get_u32("wait_timeout")?.unwrap_or(600);
        Ok(Self {
            enabled: params.get_bool("wait")?.unwrap_or(true),
            timeout: Duration::from_secs(u64::from(timeout)),
            interval: settings.poll_interval,
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Poll `check` until it reports true or the timeout elapses.
///
/// The first check happens immediately; `Timeout` is returned once the
/// deadline passes without success.
pub fn wait_until<F>(what: &str, options: &WaitOptions, mut check: F) -> ModuleResult<()>
where
    F: FnMut() -> ModuleResult<bool>,
{
    let start = Instant::now();
    info!(%what, timeout = ?options.timeout, "waiting");

    loop {
        if check()? {
            debug!(%what, elapsed = ?start.elapsed(), "wait finished");
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Err(ModuleError::Timeout {
                what: what.to_string(),
                seconds: options.timeout.as_secs(),
            });
        }

        std::thread::sleep(std::cmp::min(options.interval, options.timeout - elapsed));
    }
}

/// The request id inside a `Location` header such as `.../requests/<id>/status`
pub fn request_id(location: &str) -> Option<&str> {
    REQUEST_ID
        .captures(location)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Wait for an asynchronous compute request to finish
pub fn wait_for_request(client: &dyn CloudClient, location: &str, options: &WaitOptions) -> ModuleResult<()> {
    let Some(id) = request_id(location) else {
        debug!(%location, "no request id to wait for");
        return Ok(());
    };

    wait_until(&format!("request {}", id), options, || {
        match client.request_status(id)? {
            RequestStatus::Done => Ok(true),
            RequestStatus::Failed => Err(ModuleError::Api {
                status: 500,
                message: format!("request {} failed", id),
            }),
            RequestStatus::Queued | RequestStatus::Running => Ok(false),
        }
    })
}

/// Wait until the resource at `path` reports `ready` at `state_path`, returning it
pub fn wait_for_state(
    client: &dyn CloudClient,
    path: &str,
    state_path: &[&str],
    ready: &str,
    options: &WaitOptions,
) -> ModuleResult<Value> {
    let mut last = Value::Null;
    wait_until(&format!("{} to become {}", path, ready), options, || {
        last = client.get(path, None)?;
        let state = get_path(&last, state_path).and_then(Value::as_str);
        debug!(%path, ?state, "polled state");
        Ok(state == Some(ready))
    })?;
    Ok(last)
}

/// Wait until GET on `path` answers 404
pub fn wait_for_removal(client: &dyn CloudClient, path: &str, options: &WaitOptions) -> ModuleResult<()> {
    wait_until(&format!("{} to be removed", path), options, || match client.get(path, None) {
        Ok(_) => Ok(false),
        Err(e) if e.is_not_found_status() => Ok(true),
        Err(e) => Err(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cloud::ionos::api::{InMemoryCloud, ResourceMutator};
    use serde_json::json;

    fn fast() -> WaitOptions {
        WaitOptions {
            enabled: true,
            timeout: Duration::from_millis(50),
            interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_request_id() {
        assert_eq!(
            request_id("https://api.ionos.com/cloudapi/v6/requests/3f1a-BC09/status"),
            Some("3f1a-BC09")
        );
        assert_eq!(request_id("https://api.ionos.com/cloudapi/v6/datacenters"), None);
    }

    #[test]
    fn test_wait_until_succeeds_after_polls() {
        let mut polls = 0;
        wait_until("thing", &fast(), || {
            polls += 1;
            Ok(polls == 3)
        })
        .unwrap();
        assert_eq!(polls, 3);
    }

    #[test]
    fn test_wait_until_times_out() {
        let err = wait_until("thing", &fast(), || Ok(false)).unwrap_err();
        assert!(matches!(err, ModuleError::Timeout { ref what, .. } if what == "thing"));
    }

    #[test]
    fn test_wait_for_state_and_removal() {
        let cloud = InMemoryCloud::new().with_ready_state("ACTIVE");
        let created = cloud
            .create("/k8s", &json!({"properties": {"name": "c"}}))
            .unwrap();
        let path = format!("/k8s/{}", created.resource["id"].as_str().unwrap());

        let resource = wait_for_state(&cloud, &path, &["metadata", "state"], "ACTIVE", &fast()).unwrap();
        assert_eq!(resource["properties"]["name"], json!("c"));

        let err = wait_for_state(&cloud, &path, &["metadata", "state"], "DEPLOYING", &fast()).unwrap_err();
        assert!(matches!(err, ModuleError::Timeout { .. }));

        cloud.delete(&path).unwrap();
        wait_for_removal(&cloud, &path, &fast()).unwrap();
    }

    #[test]
    fn test_wait_for_request() {
        let cloud = InMemoryCloud::new();
        wait_for_request(&cloud, "memory://cloud/requests/abc-123/status", &fast()).unwrap();
        assert_eq!(cloud.count("GET"), 1);
    }
}
