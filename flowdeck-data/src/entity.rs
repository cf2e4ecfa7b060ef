//! Entity data layer with optimistic-concurrency protection.
//!
//! Every fetched entity snapshot carries an opaque [`ETag`]; mutations send
//! it back as an `If-Match` precondition. A precondition failure is a
//! **conflict** — its own error variant, surfaced through an explicit
//! conflict handler — never a generic error and never silently retried.
//!
//! ```text
//! fetch ──► {data, etag E1}
//! update(..., E1) ──► 200 {etag E2}            happy path, E2 ≠ E1
//! update(..., stale) ──► 409/412 ──► Conflict ──► handler ──► reload()
//!                                                               │
//!                                                   always fails fast:
//!                                            caller must go back through
//!                                            fetch() to resynchronize
//! ```
//!
//! The failing reload is a deliberate guardrail: conflict resolution is
//! never automatic, the caller has to refetch and re-apply on fresh state.
//!
//! `patch` additionally consults the advisory [`LockTable`] before any
//! network call and rejects edits to fields held by another user.

use serde_json::Value;
use thiserror::Error;

use crate::locks::LockTable;
use crate::transport::{EntityTransport, HttpRequest, TransportError};

/// Opaque optimistic-concurrency token, 1:1 with a fetched snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag(String);

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fetched entity snapshot and its version token.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub data: Value,
    pub etag: ETag,
}

/// Optimistic-concurrency rejection. The two server codes (409, 412) are
/// treated identically.
#[derive(Debug, Clone, Error)]
#[error("conflict: {message}")]
pub struct Conflict {
    pub status: u16,
    pub message: String,
}

impl Conflict {
    /// The reload action handed to conflict handlers.
    ///
    /// Always fails fast: resynchronizing requires an actual
    /// [`EntityClient::fetch`], this method exists so callers cannot
    /// pretend the conflict resolved itself.
    pub fn reload(&self) -> Result<EntityView, DataError> {
        Err(DataError::ReloadRequired)
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Recoverable input problem; user corrects and retries.
    #[error("validation failed: {message}")]
    Validation { message: String },
    /// Optimistic-concurrency conflict; resolve via explicit refetch.
    #[error(transparent)]
    Conflict(#[from] Conflict),
    /// Returned by [`Conflict::reload`]; go back through `fetch`.
    #[error("reload required: refetch the entity to resynchronize")]
    ReloadRequired,
    #[error("access denied")]
    AccessDenied,
    /// Rejected locally by the advisory lock check, before any network call.
    #[error("field '{field}' is locked by {holder}")]
    FieldLocked { field: String, holder: String },
    #[error("unexpected status {status}: {message}")]
    Http { status: u16, message: String },
}

/// Map a non-2xx response to the error taxonomy. Conflicts are handled at
/// the call sites that carry preconditions.
pub(crate) fn status_error(status: u16, body: Option<&Value>) -> DataError {
    let message = body_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        400 | 422 => DataError::Validation { message },
        403 => DataError::AccessDenied,
        _ => DataError::Http { status, message },
    }
}

pub(crate) fn body_message(body: Option<&Value>) -> Option<String> {
    body.and_then(|b| b.get("message"))
        .and_then(|m| m.as_str())
        .map(String::from)
}

type ConflictHandler = Box<dyn Fn(&Conflict) + Send + Sync>;

/// Client for single-entity CRUD with ETag preconditions and advisory
/// field locks.
pub struct EntityClient<T> {
    transport: T,
    local_user_id: String,
    locks: LockTable,
    on_conflict: Option<ConflictHandler>,
}

impl<T: EntityTransport> EntityClient<T> {
    pub fn new(transport: T, local_user_id: impl Into<String>) -> Self {
        Self {
            transport,
            local_user_id: local_user_id.into(),
            locks: LockTable::new(),
            on_conflict: None,
        }
    }

    /// Register the conflict handler invoked (before the error returns)
    /// whenever a mutation hits a stale precondition.
    pub fn on_conflict(mut self, handler: impl Fn(&Conflict) + Send + Sync + 'static) -> Self {
        self.on_conflict = Some(Box::new(handler));
        self
    }

    /// The advisory lock table, fed by the presence layer.
    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Fetch one entity. The returned etag replaces any previously held
    /// token for this entity — GETs never carry preconditions.
    pub async fn fetch(&self, entity_type: &str, entity_id: &str) -> Result<EntityView, DataError> {
        let request = HttpRequest::get(format!("/api/entities/{entity_type}/{entity_id}"));
        let response = self.transport.execute(request).await?;

        match response.status {
            200 => {
                let etag = response.etag.ok_or(DataError::Http {
                    status: 200,
                    message: "missing ETag header on entity response".into(),
                })?;
                Ok(EntityView {
                    data: response.body.unwrap_or(Value::Null),
                    etag: ETag::new(etag),
                })
            }
            status => Err(status_error(status, response.body.as_ref())),
        }
    }

    /// Replace an entity under an `If-Match` precondition.
    pub async fn update(
        &self,
        entity_type: &str,
        entity_id: &str,
        data: Value,
        etag: &ETag,
    ) -> Result<EntityView, DataError> {
        let request = HttpRequest::put(format!("/api/entities/{entity_type}/{entity_id}"), data)
            .with_if_match(etag.as_str());
        self.mutate(request).await
    }

    /// Partially update one field under an `If-Match` precondition.
    ///
    /// Pre-flight: when the advisory table shows `field` locked by a
    /// different user, the patch is rejected locally with the holder's
    /// name — no request is issued. Advisory only; the server may still
    /// reject a patch the table knew nothing about.
    pub async fn patch(
        &self,
        entity_type: &str,
        entity_id: &str,
        data: Value,
        etag: &ETag,
        field: &str,
    ) -> Result<EntityView, DataError> {
        if let Some(holder) = self.locks.held_by_other(entity_id, field, &self.local_user_id) {
            log::warn!("patch of {entity_type}/{entity_id}.{field} blocked: locked by {holder}");
            return Err(DataError::FieldLocked {
                field: field.to_string(),
                holder,
            });
        }

        let request = HttpRequest::patch(format!("/api/entities/{entity_type}/{entity_id}"), data)
            .with_if_match(etag.as_str());
        self.mutate(request).await
    }

    /// Delete an entity under an `If-Match` precondition.
    pub async fn delete(
        &self,
        entity_type: &str,
        entity_id: &str,
        etag: &ETag,
    ) -> Result<(), DataError> {
        let request = HttpRequest::delete(format!("/api/entities/{entity_type}/{entity_id}"))
            .with_if_match(etag.as_str());
        let response = self.transport.execute(request).await?;
        match response.status {
            200 | 204 => Ok(()),
            409 | 412 => Err(self.raise_conflict(response.status, response.body.as_ref())),
            status => Err(status_error(status, response.body.as_ref())),
        }
    }

    async fn mutate(&self, request: HttpRequest) -> Result<EntityView, DataError> {
        let response = self.transport.execute(request).await?;
        match response.status {
            200 | 204 => {
                let etag = response.etag.ok_or(DataError::Http {
                    status: response.status,
                    message: "missing ETag header on mutation response".into(),
                })?;
                Ok(EntityView {
                    data: response.body.unwrap_or(Value::Null),
                    etag: ETag::new(etag),
                })
            }
            409 | 412 => Err(self.raise_conflict(response.status, response.body.as_ref())),
            status => Err(status_error(status, response.body.as_ref())),
        }
    }

    fn raise_conflict(&self, status: u16, body: Option<&Value>) -> DataError {
        let conflict = Conflict {
            status,
            message: body_message(body)
                .unwrap_or_else(|| "entity was modified by someone else".into()),
        };
        log::warn!("optimistic-concurrency conflict ({status}): {}", conflict.message);
        if let Some(handler) = &self.on_conflict {
            handler(&conflict);
        }
        DataError::Conflict(conflict)
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::locks::FieldLock;
    use crate::transport::mock::MockTransport;
    use crate::transport::{HttpResponse, Method};

    /// A mock backend whose entity version bumps on every accepted write
    /// and whose preconditions actually bite.
    fn versioned_backend() -> (Arc<AtomicU64>, MockTransport) {
        let version = Arc::new(AtomicU64::new(1));
        let v = version.clone();
        let transport = MockTransport::new(move |req| {
            let current = v.load(Ordering::SeqCst);
            let current_etag = format!("\"v{current}\"");
            match req.method {
                Method::Get => Ok(HttpResponse::new(200)
                    .with_etag(current_etag)
                    .with_body(json!({"id": "42", "version": current}))),
                Method::Put | Method::Patch => {
                    if req.if_match.as_deref() != Some(current_etag.as_str()) {
                        return Ok(HttpResponse::new(412)
                            .with_body(json!({"message": "precondition failed"})));
                    }
                    let next = v.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(HttpResponse::new(200)
                        .with_etag(format!("\"v{next}\""))
                        .with_body(json!({"id": "42", "version": next})))
                }
                Method::Delete => Ok(HttpResponse::new(204).with_etag(current_etag)),
                _ => Ok(HttpResponse::new(500)),
            }
        });
        (version, transport)
    }

    #[tokio::test]
    async fn test_fetch_returns_data_and_etag() {
        let (_, transport) = versioned_backend();
        let client = EntityClient::new(transport, "u1");

        let view = client.fetch("Order", "42").await.unwrap();
        assert_eq!(view.etag, ETag::new("\"v1\""));
        assert_eq!(view.data["id"], "42");
    }

    #[tokio::test]
    async fn test_accepted_update_yields_new_etag() {
        let (_, transport) = versioned_backend();
        let client = EntityClient::new(transport, "u1");

        let before = client.fetch("Order", "42").await.unwrap();
        let after = client
            .update("Order", "42", json!({"status": "DONE"}), &before.etag)
            .await
            .unwrap();
        assert_ne!(after.etag, before.etag);

        // The next fetch observes the new version too.
        let refetched = client.fetch("Order", "42").await.unwrap();
        assert_eq!(refetched.etag, after.etag);
    }

    #[tokio::test]
    async fn test_stale_etag_invokes_conflict_handler() {
        let (_, transport) = versioned_backend();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let client = EntityClient::new(transport, "u1").on_conflict(move |c| {
            sink.lock().unwrap().push(c.message.clone());
        });

        let view = client.fetch("Order", "42").await.unwrap();
        // Someone else writes first.
        client
            .update("Order", "42", json!({"a": 1}), &view.etag)
            .await
            .unwrap();

        // Our stale write must conflict, never silently succeed.
        let result = client.update("Order", "42", json!({"b": 2}), &view.etag).await;
        let conflict = match result {
            Err(DataError::Conflict(c)) => c,
            other => panic!("expected conflict, got {other:?}"),
        };
        assert_eq!(conflict.status, 412);
        assert_eq!(seen.lock().unwrap().len(), 1);

        // The reload action fails fast, forcing the fetch path.
        assert!(matches!(conflict.reload(), Err(DataError::ReloadRequired)));

        // Recovery goes through fetch, then the update applies.
        let fresh = client.fetch("Order", "42").await.unwrap();
        client
            .update("Order", "42", json!({"b": 2}), &fresh.etag)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_locked_field_rejected_before_any_network_call() {
        let (_, transport) = versioned_backend();
        let client = EntityClient::new(transport, "u1");
        client.locks().insert(FieldLock {
            entity_id: "42".into(),
            field: "totalAmount".into(),
            holder_user_id: "u2".into(),
        });

        let etag = ETag::new("\"v1\"");
        let result = client
            .patch("Order", "42", json!({"totalAmount": 99}), &etag, "totalAmount")
            .await;

        match result {
            Err(DataError::FieldLocked { field, holder }) => {
                assert_eq!(field, "totalAmount");
                assert_eq!(holder, "u2");
            }
            other => panic!("expected FieldLocked, got {other:?}"),
        }
        // Pre-flight means pre-network.
        assert_eq!(client.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_own_lock_does_not_block_patch() {
        let (_, transport) = versioned_backend();
        let client = EntityClient::new(transport, "u1");
        client.locks().insert(FieldLock {
            entity_id: "42".into(),
            field: "status".into(),
            holder_user_id: "u1".into(),
        });

        let view = client.fetch("Order", "42").await.unwrap();
        let result = client
            .patch("Order", "42", json!({"status": "X"}), &view.etag, "status")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_validation_error_is_distinct_from_conflict() {
        let transport = MockTransport::new(|_req| {
            Ok(HttpResponse::new(422).with_body(json!({"message": "label is required"})))
        });
        let client = EntityClient::new(transport, "u1");

        let result = client
            .update("Order", "42", json!({}), &ETag::new("\"v1\""))
            .await;
        match result {
            Err(DataError::Validation { message }) => assert_eq!(message, "label is required"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_403_maps_to_access_denied() {
        let transport = MockTransport::new(|_req| Ok(HttpResponse::new(403)));
        let client = EntityClient::new(transport, "u1");

        let result = client.fetch("Order", "42").await;
        assert!(matches!(result, Err(DataError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_transport_errors_propagate_without_retry() {
        let transport =
            MockTransport::new(|_req| Err(TransportError::Network("connection refused".into())));
        let client = EntityClient::new(transport, "u1");

        let result = client.fetch("Order", "42").await;
        assert!(matches!(result, Err(DataError::Transport(_))));
        // Exactly one attempt — the layer never retries on its own.
        assert_eq!(client.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_with_precondition() {
        let (_, transport) = versioned_backend();
        let client = EntityClient::new(transport, "u1");

        let view = client.fetch("Order", "42").await.unwrap();
        client.delete("Order", "42", &view.etag).await.unwrap();
    }
}
