//! Workflow authoring sub-resources.
//!
//! Proposal lifecycle (create/list/approve/reject/diff), validation,
//! dry-run, and publish are plain request/response JSON calls with no
//! special concurrency semantics — ordinary error handling only. They
//! share the transport and error taxonomy of the entity layer.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use flowdeck_core::draft::WorkflowDraft;

use crate::entity::{status_error, DataError};
use crate::transport::{EntityTransport, HttpRequest};

/// A reviewable bundle of draft changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// Outcome of server-side draft validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Client for the workflow authoring endpoints of one entity type.
pub struct AuthoringClient<T> {
    transport: T,
}

impl<T: EntityTransport> AuthoringClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Server-side validation of a draft definition.
    pub async fn validate(&self, draft: &WorkflowDraft) -> Result<ValidationReport, DataError> {
        let body = self
            .call(HttpRequest::post(
                format!("/api/workflows/{}/validate", draft.entity_type),
                to_value(draft)?,
            ))
            .await?;
        parse(body)
    }

    /// Execute a draft against a sample context without persisting anything.
    pub async fn dry_run(&self, draft: &WorkflowDraft, context: Value) -> Result<Value, DataError> {
        self.call(HttpRequest::post(
            format!("/api/workflows/{}/dry-run", draft.entity_type),
            json!({ "definition": to_value(draft)?, "context": context }),
        ))
        .await
    }

    /// Submit a draft as a named proposal for review.
    pub async fn create_proposal(
        &self,
        name: &str,
        draft: &WorkflowDraft,
    ) -> Result<ProposalSummary, DataError> {
        let body = self
            .call(HttpRequest::post(
                format!("/api/workflows/{}/proposals", draft.entity_type),
                json!({ "name": name, "definition": to_value(draft)? }),
            ))
            .await?;
        parse(body)
    }

    pub async fn list_proposals(&self, entity_type: &str) -> Result<Vec<ProposalSummary>, DataError> {
        let body = self
            .call(HttpRequest::get(format!(
                "/api/workflows/{entity_type}/proposals"
            )))
            .await?;
        parse(body)
    }

    pub async fn approve_proposal(
        &self,
        entity_type: &str,
        proposal_id: &str,
    ) -> Result<ProposalSummary, DataError> {
        let body = self
            .call(HttpRequest::post(
                format!("/api/workflows/{entity_type}/proposals/{proposal_id}/approve"),
                Value::Null,
            ))
            .await?;
        parse(body)
    }

    pub async fn reject_proposal(
        &self,
        entity_type: &str,
        proposal_id: &str,
        reason: &str,
    ) -> Result<ProposalSummary, DataError> {
        let body = self
            .call(HttpRequest::post(
                format!("/api/workflows/{entity_type}/proposals/{proposal_id}/reject"),
                json!({ "reason": reason }),
            ))
            .await?;
        parse(body)
    }

    /// Diff of a proposal against the active version, as rendered by the
    /// server.
    pub async fn proposal_diff(
        &self,
        entity_type: &str,
        proposal_id: &str,
    ) -> Result<Value, DataError> {
        self.call(HttpRequest::get(format!(
            "/api/workflows/{entity_type}/proposals/{proposal_id}/diff"
        )))
        .await
    }

    /// Publish the approved definition (server hot-reloads running
    /// instances).
    pub async fn publish(&self, entity_type: &str) -> Result<(), DataError> {
        self.call(HttpRequest::post(
            format!("/api/workflows/{entity_type}/publish"),
            Value::Null,
        ))
        .await?;
        Ok(())
    }

    async fn call(&self, request: HttpRequest) -> Result<Value, DataError> {
        let response = self.transport.execute(request).await?;
        match response.status {
            200 | 201 | 204 => Ok(response.body.unwrap_or(Value::Null)),
            status => Err(status_error(status, response.body.as_ref())),
        }
    }
}

fn to_value<S: Serialize>(value: &S) -> Result<Value, DataError> {
    serde_json::to_value(value).map_err(|e| DataError::Validation {
        message: format!("unserializable draft: {e}"),
    })
}

fn parse<D: for<'de> Deserialize<'de>>(body: Value) -> Result<D, DataError> {
    serde_json::from_value(body).map_err(|e| DataError::Validation {
        message: format!("unexpected response shape: {e}"),
    })
}

// ===================================================================
// Tests
// ===================================================================
