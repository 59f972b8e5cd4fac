//! Per-service protocol dialects
//!
//! A dialect knows how to build requests for one identifier service and
//! how to read that service's answers. The lifecycle engine stays
//! protocol-agnostic: it asks the dialect for requests, sends them
//! through the transport, and hands the raw responses back.

pub mod ezid;
pub mod purl;

use crate::action::OperationKind;
use crate::config::{ServiceBinding, ServiceKind};
use crate::entity::Entity;
use crate::error::ActionError;
use crate::executor::{ServiceRequest, ServiceResponse};

pub use ezid::EzidDialect;
pub use purl::PurlDialect;

/// Identifier value already stored on the entity, as seen by update and
/// delete operations.
#[derive(Debug, Clone)]
pub struct StoredIdentifier {
    /// Raw field value, a full resolvable URI.
    pub value: String,
    /// Remote numeric id from the existence lookup. `0` means the service
    /// has no record, or the dialect does not use lookups.
    pub remote_id: i64,
}

/// Existence-lookup plan for a stored identifier.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The dialect addresses requests directly off the stored value.
    NotRequired,
    /// The lookup key is empty; resolution short-circuits to absent.
    ShortCircuit,
    /// Query the service before choosing a verb.
    Request(ServiceRequest),
}

/// Request building and response interpretation for one service protocol.
pub trait HttpDialect: Send + Sync {
    fn kind(&self) -> ServiceKind;

    /// Whether this operation needs the entity's canonical URL.
    fn requires_external_url(&self, operation: OperationKind) -> bool;

    fn build_mint_request(
        &self,
        entity: &dyn Entity,
        binding: &ServiceBinding,
    ) -> Result<ServiceRequest, ActionError>;

    /// Final identifier value on success.
    fn parse_mint_response(
        &self,
        binding: &ServiceBinding,
        response: &ServiceResponse,
    ) -> Result<String, ActionError>;

    fn build_lookup_request(
        &self,
        stored_value: &str,
        binding: &ServiceBinding,
    ) -> Result<Lookup, ActionError>;

    /// Positive remote id when the identifier exists, else `0`.
    fn parse_lookup_response(&self, response: &ServiceResponse) -> i64;

    /// `None` when the dialect defines no update verb.
    fn build_update_request(
        &self,
        entity: &dyn Entity,
        binding: &ServiceBinding,
        stored: &StoredIdentifier,
    ) -> Result<Option<ServiceRequest>, ActionError>;

    fn parse_update_response(&self, response: &ServiceResponse) -> Result<(), ActionError>;

    /// `None` when the service holds nothing to delete.
    fn build_delete_request(
        &self,
        stored: &StoredIdentifier,
        binding: &ServiceBinding,
    ) -> Result<Option<ServiceRequest>, ActionError>;

    fn parse_delete_response(&self, response: &ServiceResponse) -> Result<(), ActionError>;
}

/// Dialect for a service kind.
pub fn dialect_for(kind: ServiceKind) -> &'static dyn HttpDialect {
    match kind {
        ServiceKind::Ezid => &EzidDialect,
        ServiceKind::Purl => &PurlDialect,
    }
}
