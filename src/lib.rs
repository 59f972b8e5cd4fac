//! Persistent identifier lifecycle engine
//!
//! Mints, updates, and deletes ARK and PURL identifiers for repository
//! entities by driving the CDL EZID and Kiwi PURL HTTP APIs. The host
//! system owns entity storage and triggering; this crate owns the
//! protocol dialects, the lifecycle engine, and the transport.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use registrar::{
//!     BindingRegistry, LifecycleAction, MemoryEntity, OperationKind, RequestExecutor,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = BindingRegistry::from_toml(
//!     r#"
//!     [bindings.ark]
//!     service = "ezid"
//!     host = "https://ezid.cdlib.org"
//!     username = "apitest"
//!     password = "apitest"
//!     namespace = "ark:/99999/fk4"
//!
//!     [records.thesis-ark]
//!     entity_type = "node"
//!     bundle = "islandora_object"
//!     field = "field_ark_identifier"
//!     binding = "ark"
//!     "#,
//! )?;
//!
//! let action = LifecycleAction::new(Arc::new(registry), RequestExecutor::with_defaults());
//!
//! let mut entity = MemoryEntity::new("node", "islandora_object", "42")
//!     .with_field("field_ark_identifier", "")
//!     .with_external_url("https://repo.example.edu/islandora/object/42");
//!
//! let outcome = action
//!     .execute(&mut entity, "thesis-ark", OperationKind::Mint)
//!     .await;
//! assert!(!outcome.is_failure());
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod executor;

pub use action::{ActionOutcome, LifecycleAction, OperationKind, SkipReason};
pub use config::{BindingRegistry, IdentifierRecord, ServiceBinding, ServiceKind, ServiceParams};
pub use dialect::{dialect_for, EzidDialect, HttpDialect, Lookup, PurlDialect, StoredIdentifier};
pub use entity::{Entity, MemoryEntity};
pub use error::{ActionError, ConfigError, Result};
pub use executor::{
    BasicAuth, ExecutorConfig, Method, RequestExecutor, ServiceRequest, ServiceResponse, Transport,
};
