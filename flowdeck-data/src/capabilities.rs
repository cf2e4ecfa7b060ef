//! Typed UI capability set with ETag caching.
//!
//! The backend exposes `GET /api/me/ui-capabilities` describing what the
//! current user may see: menu entries, feature flags, and a data scope.
//! The loosely-shaped JSON is validated **once** at this boundary into a
//! typed [`CapabilitySet`] — `has_menu`/`has_feature` are set lookups, not
//! ad-hoc re-interpretation at every call site.
//!
//! Caching contract:
//!
//! * Responses are cached together with their `ETag`; subsequent fetches
//!   send `If-None-Match` and a `304 Not Modified` serves the cache.
//! * A `403` means permissions changed under us: the cache is invalidated
//!   and one forced re-fetch runs. A second `403` is a real access-denied
//!   state, surfaced to the caller.

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde_json::Value;

use crate::entity::DataError;
use crate::transport::{EntityTransport, HttpRequest};

const CAPABILITIES_PATH: &str = "/api/me/ui-capabilities";

/// How far the user's data visibility reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataScope {
    AllTenants,
    OwnTenant,
    #[default]
    OwnData,
}

impl DataScope {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "all_tenants" => Some(Self::AllTenants),
            "own_tenant" => Some(Self::OwnTenant),
            "own_data" => Some(Self::OwnData),
            _ => None,
        }
    }
}

/// Validated capability set for the current user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilitySet {
    menu: BTreeSet<String>,
    features: BTreeSet<String>,
    data_scope: DataScope,
}

impl CapabilitySet {
    /// Validate the raw capability document. Rejects wrong shapes instead
    /// of interpreting them leniently downstream.
    pub fn from_value(value: &Value) -> Result<Self, DataError> {
        let invalid = |message: &str| DataError::Validation {
            message: format!("invalid capability document: {message}"),
        };

        let menu = match value.get("menu") {
            None => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.get("id")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .ok_or_else(|| invalid("menu entry without string id"))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid("menu is not an array")),
        };

        let features = match value.get("features") {
            None => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(String::from)
                        .ok_or_else(|| invalid("feature is not a string"))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid("features is not an array")),
        };

        let data_scope = match value.get("dataScope") {
            None => DataScope::default(),
            Some(Value::String(raw)) => {
                DataScope::parse(raw).ok_or_else(|| invalid("unknown dataScope"))?
            }
            Some(_) => return Err(invalid("dataScope is not a string")),
        };

        Ok(Self {
            menu,
            features,
            data_scope,
        })
    }

    pub fn has_menu(&self, menu_id: &str) -> bool {
        self.menu.contains(menu_id)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn data_scope(&self) -> DataScope {
        self.data_scope
    }

    pub fn menu_ids(&self) -> impl Iterator<Item = &str> {
        self.menu.iter().map(String::as_str)
    }
}

/// Capability fetcher with ETag/304 caching and 403 refresh.
pub struct CapabilityClient<T> {
    transport: T,
    cache: Mutex<Option<(String, CapabilitySet)>>,
}

impl<T: EntityTransport> CapabilityClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: Mutex::new(None),
        }
    }

    /// Fetch the capability set, serving from cache on 304.
    pub async fn fetch(&self) -> Result<CapabilitySet, DataError> {
        let mut forced = false;
        loop {
            let cached = if forced {
                None
            } else {
                self.cache.lock().unwrap().clone()
            };

            let mut request = HttpRequest::get(CAPABILITIES_PATH);
            if let Some((etag, _)) = &cached {
                request = request.with_if_none_match(etag.clone());
            }

            let response = self.transport.execute(request).await?;
            match response.status {
                304 => {
                    if let Some((etag, set)) = cached {
                        log::debug!("capabilities unchanged (304), using cache (etag {etag})");
                        return Ok(set);
                    }
                    return Err(DataError::Http {
                        status: 304,
                        message: "304 without a cached capability set".into(),
                    });
                }
                200 => {
                    let body = response.body.unwrap_or(Value::Null);
                    let set = CapabilitySet::from_value(&body)?;
                    if let Some(etag) = response.etag {
                        *self.cache.lock().unwrap() = Some((etag, set.clone()));
                    }
                    return Ok(set);
                }
                403 if !forced => {
                    // Permissions changed server-side; drop the cache and
                    // try exactly once more.
                    log::warn!("403 on capabilities, invalidating cache and re-fetching");
                    self.invalidate();
                    forced = true;
                }
                403 => return Err(DataError::AccessDenied),
                status => {
                    return Err(crate::entity::status_error(status, response.body.as_ref()))
                }
            }
        }
    }

    /// Drop the cached set (logout, tenant switch, tests).
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap() = None;
    }

    pub fn cached(&self) -> Option<CapabilitySet> {
        self.cache.lock().unwrap().as_ref().map(|(_, set)| set.clone())
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::HttpResponse;

    fn capability_body() -> Value {
        json!({
            "menu": [{"id": "users"}, {"id": "workflows"}],
            "features": ["export_data", "grafana_admin"],
            "dataScope": "own_tenant"
        })
    }

    #[test]
    fn test_validates_shape_once() {
        let set = CapabilitySet::from_value(&capability_body()).unwrap();
        assert!(set.has_menu("workflows"));
        assert!(!set.has_menu("billing"));
        assert!(set.has_feature("export_data"));
        assert!(!set.has_feature("nope"));
        assert_eq!(set.data_scope(), DataScope::OwnTenant);
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let set = CapabilitySet::from_value(&json!({})).unwrap();
        assert!(!set.has_menu("users"));
        assert_eq!(set.data_scope(), DataScope::OwnData);
    }

    #[test]
    fn test_rejects_malformed_documents() {
        for bad in [
            json!({"menu": "nope"}),
            json!({"menu": [{"label": "no id"}]}),
            json!({"features": [1, 2]}),
            json!({"dataScope": "galaxy"}),
        ] {
            assert!(
                matches!(CapabilitySet::from_value(&bad), Err(DataError::Validation { .. })),
                "should reject {bad}"
            );
        }
    }

    #[tokio::test]
    async fn test_304_serves_cache_with_validator() {
        let transport = MockTransport::new(|req| {
            if req.if_none_match.as_deref() == Some("\"c1\"") {
                Ok(HttpResponse::new(304))
            } else {
                Ok(HttpResponse::new(200)
                    .with_etag("\"c1\"")
                    .with_body(capability_body()))
            }
        });
        let client = CapabilityClient::new(transport);

        let first = client.fetch().await.unwrap();
        let second = client.fetch().await.unwrap();
        assert_eq!(first, second);

        let requests = client.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].if_none_match.is_none());
        assert_eq!(requests[1].if_none_match.as_deref(), Some("\"c1\""));
    }

    #[tokio::test]
    async fn test_403_forces_exactly_one_refetch() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let transport = MockTransport::new(move |_req| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(HttpResponse::new(403))
            } else {
                Ok(HttpResponse::new(200)
                    .with_etag("\"c2\"")
                    .with_body(capability_body()))
            }
        });
        let client = CapabilityClient::new(transport);

        let set = client.fetch().await.unwrap();
        assert!(set.has_feature("export_data"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_403_is_access_denied() {
        let transport = MockTransport::new(|_req| Ok(HttpResponse::new(403)));
        let client = CapabilityClient::new(transport);

        let result = client.fetch().await;
        assert!(matches!(result, Err(DataError::AccessDenied)));
        assert_eq!(client.transport.request_count(), 2); // initial + forced
        assert!(client.cached().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_drops_cache() {
        let transport = MockTransport::new(|_req| {
            Ok(HttpResponse::new(200)
                .with_etag("\"c1\"")
                .with_body(capability_body()))
        });
        let client = CapabilityClient::new(transport);

        client.fetch().await.unwrap();
        assert!(client.cached().is_some());
        client.invalidate();
        assert!(client.cached().is_none());
    }
}
