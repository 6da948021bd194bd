//! Schema-driven UI runtime.
//!
//! A server process holds the authoritative UI description of each
//! named *instance* as a [`schema::UiSchema`]. Agents mutate it through
//! [`patch::SchemaPatch`] batches (directly, or via the tool surface in
//! [`agent`]); browsers subscribe over a WebSocket and receive patches
//! or full schema snapshots as they happen. The schema is the single
//! source of truth: no client-side state survives a reload that the
//! schema does not carry.
//!
//! Layering, bottom up:
//!
//! - [`path`] / [`template`]: dotted-path addressing and `${...}`
//!   placeholder expansion over JSON documents.
//! - [`schema`]: the typed schema model (blocks, fields, actions).
//! - [`patch`]: the patch algebra and the apply engine.
//! - [`runtime`]: instance store, patch history, subscriber registry,
//!   and the single locked write path.
//! - [`event`]: translation of user events into patch batches.
//! - [`external`]: outbound HTTP calls for `api` actions.
//! - [`agent`]: the JSON-RPC tool surface.
//! - [`api`]: the axum router binding it all to HTTP.

pub mod agent;
pub mod api;
pub mod error;
pub mod event;
pub mod external;
pub mod patch;
pub mod path;
pub mod runtime;
pub mod schema;
pub mod template;

pub use error::{PatchError, RuntimeError};
pub use patch::{PatchOp, SchemaPatch};
pub use runtime::{shared, Runtime, SharedRuntime};
pub use schema::UiSchema;
