//! CDL EZID dialect
//!
//! EZID speaks an ANVL-style line format: newline-separated `key: value`
//! pairs in both request and response bodies. Minting posts metadata
//! under a shoulder namespace; the response echoes either a `success` key
//! carrying the assigned identifier or an `error` key.
//! See https://ezid.cdlib.org/doc/apidoc.html

use super::{HttpDialect, Lookup, StoredIdentifier};
use crate::action::OperationKind;
use crate::config::{ServiceBinding, ServiceKind, ServiceParams};
use crate::entity::Entity;
use crate::error::ActionError;
use crate::executor::{Method, ServiceRequest, ServiceResponse};

const CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

pub struct EzidDialect;

impl EzidDialect {
    fn params<'a>(
        &self,
        binding: &'a ServiceBinding,
    ) -> Result<(&'a str, &'a str, &'a str), ActionError> {
        match &binding.params {
            ServiceParams::Ezid {
                username,
                password,
                namespace,
            } => Ok((username, password, namespace)),
            ServiceParams::Purl { .. } => Err(ActionError::Protocol(format!(
                "binding `{}` is not an EZID binding",
                binding.key
            ))),
        }
    }
}

impl HttpDialect for EzidDialect {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Ezid
    }

    fn requires_external_url(&self, operation: OperationKind) -> bool {
        operation == OperationKind::Mint
    }

    fn build_mint_request(
        &self,
        entity: &dyn Entity,
        binding: &ServiceBinding,
    ) -> Result<ServiceRequest, ActionError> {
        let (username, password, namespace) = self.params(binding)?;
        let external_url = entity
            .external_url()
            .ok_or_else(|| ActionError::Protocol("entity has no canonical URL".to_string()))?;

        // _target makes the identifier resolve to the entity; _status
        // "reserved" keeps it deletable later. Both win over any
        // caller-supplied keys of the same name.
        let mut pairs = vec![
            ("_target".to_string(), external_url),
            ("_status".to_string(), "reserved".to_string()),
        ];
        for (key, value) in entity.metadata() {
            if pairs.iter().any(|(existing, _)| *existing == key) {
                continue;
            }
            pairs.push((key, value));
        }

        Ok(
            ServiceRequest::new(Method::Post, format!("{}/shoulder/{namespace}", binding.base()))
                .header("Content-Type", CONTENT_TYPE)
                .basic_auth(username, password)
                .body(encode_anvl(&pairs)),
        )
    }

    fn parse_mint_response(
        &self,
        binding: &ServiceBinding,
        response: &ServiceResponse,
    ) -> Result<String, ActionError> {
        let suffix = success_value(&response.body).ok_or_else(|| ActionError::Service {
            status: response.status,
            message: response.body.trim().to_string(),
        })?;
        Ok(format!("{}/id/{suffix}", binding.base()))
    }

    fn build_lookup_request(
        &self,
        _stored_value: &str,
        _binding: &ServiceBinding,
    ) -> Result<Lookup, ActionError> {
        // EZID addresses identifiers directly by their stored value.
        Ok(Lookup::NotRequired)
    }

    fn parse_lookup_response(&self, _response: &ServiceResponse) -> i64 {
        0
    }

    fn build_update_request(
        &self,
        _entity: &dyn Entity,
        _binding: &ServiceBinding,
        _stored: &StoredIdentifier,
    ) -> Result<Option<ServiceRequest>, ActionError> {
        // EZID defines no update verb for this engine.
        Ok(None)
    }

    fn parse_update_response(&self, _response: &ServiceResponse) -> Result<(), ActionError> {
        Ok(())
    }

    fn build_delete_request(
        &self,
        stored: &StoredIdentifier,
        binding: &ServiceBinding,
    ) -> Result<Option<ServiceRequest>, ActionError> {
        let (username, password, _) = self.params(binding)?;

        // Stored values look like "{host}/id/{suffix}"; the delete
        // endpoint wants the bare suffix.
        let suffix = stored
            .value
            .split_once("/id/")
            .map(|(_, suffix)| suffix)
            .unwrap_or(stored.value.as_str());

        Ok(Some(
            ServiceRequest::new(Method::Delete, format!("{}/id/{suffix}", binding.base()))
                .basic_auth(username, password),
        ))
    }

    fn parse_delete_response(&self, response: &ServiceResponse) -> Result<(), ActionError> {
        match success_value(&response.body) {
            Some(_) => Ok(()),
            None => Err(ActionError::Service {
                status: response.status,
                message: response.body.trim().to_string(),
            }),
        }
    }
}

/// Encode metadata pairs into the EZID line format.
fn encode_anvl(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a response body into key/value pairs. Values may themselves
/// contain colons (`ark:/99999/...`), so each line splits on the first
/// colon only.
fn parse_anvl(body: &str) -> Vec<(String, String)> {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Value of the `success` key, when the response carries one.
fn success_value(body: &str) -> Option<String> {
    parse_anvl(body)
        .into_iter()
        .find(|(key, _)| key == "success")
        .map(|(_, value)| value)
}
