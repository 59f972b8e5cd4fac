//! Identifier lifecycle engine
//!
//! One engine drives mint, update, and delete against whichever service a
//! record is bound to. Every invocation runs to a terminal state and logs
//! it with the entity's identity; failures are reported in the returned
//! outcome, never raised — a broken identifier service must not block the
//! host's save pipeline.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{BindingRegistry, ServiceBinding};
use crate::dialect::{dialect_for, HttpDialect, Lookup, StoredIdentifier};
use crate::entity::Entity;
use crate::error::ActionError;
use crate::executor::Transport;

/// Which lifecycle transition fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Mint,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Mint => "mint",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an invocation ended without touching the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No identifier record is configured under the requested key.
    RecordMissing { record: String },
    /// The entity does not carry the configured field.
    FieldMissing { field: String },
    /// The field already holds an identifier; minting again would
    /// re-issue it.
    AlreadyMinted { value: String },
    /// The field is empty; there is nothing to update or delete.
    NotMinted,
    /// The service holds no record for the stored identifier.
    RemoteAbsent { value: String },
    /// The bound service defines no verb for this operation.
    UnsupportedOperation,
    /// The entity has no canonical URL to point the identifier at.
    NoExternalUrl,
}

/// Terminal state of one invocation.
#[derive(Debug)]
pub enum ActionOutcome {
    /// Identifier minted and written to the entity field.
    Minted { identifier: String },
    /// Remote record updated; the stored identifier is unchanged.
    Updated,
    /// Remote record tombstoned; the stored identifier is left in place.
    Deleted,
    /// Nothing to do; no request was sent for this operation's verb.
    Skipped(SkipReason),
    /// The operation aborted; the entity is untouched.
    Failed(ActionError),
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }
}

/// Drives identifier operations for entities against configured services.
pub struct LifecycleAction<T: Transport> {
    registry: Arc<BindingRegistry>,
    transport: T,
}

impl<T: Transport> LifecycleAction<T> {
    pub fn new(registry: Arc<BindingRegistry>, transport: T) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Run one operation to completion.
    ///
    /// The entity field is written only after the dialect confirms a
    /// minted identifier; every other path leaves the entity untouched.
    pub async fn execute(
        &self,
        entity: &mut dyn Entity,
        record_key: &str,
        operation: OperationKind,
    ) -> ActionOutcome {
        let outcome = self.run(entity, record_key, operation).await;
        log_outcome(&*entity, operation, &outcome);
        outcome
    }

    async fn run(
        &self,
        entity: &mut dyn Entity,
        record_key: &str,
        operation: OperationKind,
    ) -> ActionOutcome {
        let Some(record) = self.registry.record(record_key) else {
            return ActionOutcome::Skipped(SkipReason::RecordMissing {
                record: record_key.to_string(),
            });
        };
        let Some(binding) = self.registry.binding(&record.binding) else {
            // add_record checks the reference, so this only fires for a
            // registry assembled by hand.
            return ActionOutcome::Skipped(SkipReason::RecordMissing {
                record: record_key.to_string(),
            });
        };
        let Some(current) = entity.field_value(&record.field) else {
            return ActionOutcome::Skipped(SkipReason::FieldMissing {
                field: record.field.clone(),
            });
        };

        let dialect = dialect_for(binding.kind());

        match operation {
            OperationKind::Mint => {
                if !current.is_empty() {
                    return ActionOutcome::Skipped(SkipReason::AlreadyMinted { value: current });
                }
                if dialect.requires_external_url(operation) && entity.external_url().is_none() {
                    return ActionOutcome::Skipped(SkipReason::NoExternalUrl);
                }
                self.mint(entity, &record.field, binding, dialect).await
            }
            OperationKind::Update => {
                if current.is_empty() {
                    return ActionOutcome::Skipped(SkipReason::NotMinted);
                }
                if dialect.requires_external_url(operation) && entity.external_url().is_none() {
                    return ActionOutcome::Skipped(SkipReason::NoExternalUrl);
                }
                let stored = match self.resolve_stored(&current, binding, dialect).await {
                    Ok(stored) => stored,
                    Err(e) => return ActionOutcome::Failed(e),
                };
                self.update(&*entity, binding, dialect, &stored).await
            }
            OperationKind::Delete => {
                if current.is_empty() {
                    return ActionOutcome::Skipped(SkipReason::NotMinted);
                }
                if dialect.requires_external_url(operation) && entity.external_url().is_none() {
                    return ActionOutcome::Skipped(SkipReason::NoExternalUrl);
                }
                let stored = match self.resolve_stored(&current, binding, dialect).await {
                    Ok(stored) => stored,
                    Err(e) => return ActionOutcome::Failed(e),
                };
                self.delete(binding, dialect, &stored).await
            }
        }
    }

    async fn mint(
        &self,
        entity: &mut dyn Entity,
        field: &str,
        binding: &ServiceBinding,
        dialect: &dyn HttpDialect,
    ) -> ActionOutcome {
        let request = match dialect.build_mint_request(&*entity, binding) {
            Ok(request) => request,
            Err(e) => return ActionOutcome::Failed(e),
        };
        debug!(service = %binding.kind(), url = %request.url, "dispatching mint request");
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return ActionOutcome::Failed(e),
        };
        match dialect.parse_mint_response(binding, &response) {
            Ok(identifier) => {
                entity.set_field(field, identifier.clone());
                ActionOutcome::Minted { identifier }
            }
            Err(e) => ActionOutcome::Failed(e),
        }
    }

    async fn update(
        &self,
        entity: &dyn Entity,
        binding: &ServiceBinding,
        dialect: &dyn HttpDialect,
        stored: &StoredIdentifier,
    ) -> ActionOutcome {
        let request = match dialect.build_update_request(entity, binding, stored) {
            Ok(Some(request)) => request,
            Ok(None) => return ActionOutcome::Skipped(SkipReason::UnsupportedOperation),
            Err(e) => return ActionOutcome::Failed(e),
        };
        debug!(service = %binding.kind(), url = %request.url, "dispatching update request");
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return ActionOutcome::Failed(e),
        };
        match dialect.parse_update_response(&response) {
            Ok(()) => ActionOutcome::Updated,
            Err(e) => ActionOutcome::Failed(e),
        }
    }

    async fn delete(
        &self,
        binding: &ServiceBinding,
        dialect: &dyn HttpDialect,
        stored: &StoredIdentifier,
    ) -> ActionOutcome {
        let request = match dialect.build_delete_request(stored, binding) {
            Ok(Some(request)) => request,
            Ok(None) => {
                return ActionOutcome::Skipped(SkipReason::RemoteAbsent {
                    value: stored.value.clone(),
                })
            }
            Err(e) => return ActionOutcome::Failed(e),
        };
        debug!(service = %binding.kind(), url = %request.url, "dispatching delete request");
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return ActionOutcome::Failed(e),
        };
        match dialect.parse_delete_response(&response) {
            Ok(()) => ActionOutcome::Deleted,
            Err(e) => ActionOutcome::Failed(e),
        }
    }

    /// Existence lookup for the stored identifier, where the dialect
    /// needs one before choosing a verb.
    async fn resolve_stored(
        &self,
        value: &str,
        binding: &ServiceBinding,
        dialect: &dyn HttpDialect,
    ) -> Result<StoredIdentifier, ActionError> {
        let remote_id = match dialect.build_lookup_request(value, binding)? {
            Lookup::NotRequired | Lookup::ShortCircuit => 0,
            Lookup::Request(request) => {
                debug!(url = %request.url, "resolving remote identifier");
                let response = self.transport.send(request).await?;
                dialect.parse_lookup_response(&response)
            }
        };
        Ok(StoredIdentifier {
            value: value.to_string(),
            remote_id,
        })
    }
}

fn log_outcome(entity: &dyn Entity, operation: OperationKind, outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Minted { identifier } => info!(
            entity_type = %entity.entity_type(),
            id = %entity.id(),
            operation = %operation,
            identifier = %identifier,
            "identifier minted"
        ),
        ActionOutcome::Updated => info!(
            entity_type = %entity.entity_type(),
            id = %entity.id(),
            operation = %operation,
            "identifier updated"
        ),
        ActionOutcome::Deleted => info!(
            entity_type = %entity.entity_type(),
            id = %entity.id(),
            operation = %operation,
            "identifier deleted"
        ),
        ActionOutcome::Skipped(reason) => match reason {
            SkipReason::UnsupportedOperation | SkipReason::NoExternalUrl => warn!(
                entity_type = %entity.entity_type(),
                id = %entity.id(),
                operation = %operation,
                reason = ?reason,
                "identifier operation skipped"
            ),
            _ => info!(
                entity_type = %entity.entity_type(),
                id = %entity.id(),
                operation = %operation,
                reason = ?reason,
                "identifier operation skipped"
            ),
        },
        ActionOutcome::Failed(e) => error!(
            entity_type = %entity.entity_type(),
            id = %entity.id(),
            operation = %operation,
            error = %e,
            "identifier operation failed"
        ),
    }
}
