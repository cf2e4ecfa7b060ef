//! # flowdeck-data — entity data layer with optimistic concurrency
//!
//! The HTTP-facing half of the Flowdeck client:
//!
//! - [`transport`] — the pluggable HTTP seam ([`reqwest`] in production)
//! - [`entity`] — single-entity CRUD guarded by ETag/If-Match, with an
//!   explicit conflict path that never resolves silently
//! - [`locks`] — advisory per-field locks reflected from presence
//! - [`capabilities`] — typed UI capability set with ETag/304 caching and
//!   403 invalidate-and-refetch
//! - [`authoring`] — proposal/validate/dry-run/publish sub-resources
//! - [`cache`] — injectable memoize-first-success session cache
//!
//! Failure discipline, crate-wide: no call is retried automatically, no
//! error is swallowed — everything surfaces as a typed [`DataError`]
//! (validation / conflict / access-denied / locked-field / transport) so
//! the presentation layer can render, and the user can decide, per case.

pub mod authoring;
pub mod cache;
pub mod capabilities;
pub mod entity;
pub mod locks;
pub mod transport;

pub use authoring::{AuthoringClient, ProposalSummary, ValidationReport};
pub use cache::SessionCache;
pub use capabilities::{CapabilityClient, CapabilitySet, DataScope};
pub use entity::{Conflict, DataError, ETag, EntityClient, EntityView};
pub use locks::{FieldLock, LockTable};
pub use transport::{EntityTransport, HttpRequest, HttpResponse, Method, ReqwestTransport, TransportError};
