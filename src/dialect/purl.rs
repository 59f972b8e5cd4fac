//! Kiwi PURL service dialect
//!
//! JSON over HTTP, authenticated by a `KiwiApiKey` header. Minting posts
//! a redirect record; update and delete address an existing record by the
//! numeric id resolved from its path. A delete does not remove the
//! record: the service tombstones it and reports `status: 2`.

use serde::{Deserialize, Serialize};
use url::Url;

use super::{HttpDialect, Lookup, StoredIdentifier};
use crate::action::OperationKind;
use crate::config::{ServiceBinding, ServiceKind, ServiceParams};
use crate::entity::Entity;
use crate::error::ActionError;
use crate::executor::{Method, ServiceRequest, ServiceResponse};

const API_KEY_HEADER: &str = "KiwiApiKey";
const CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// The service's `status` value for a tombstoned record.
const STATUS_TOMBSTONED: i64 = 2;

pub struct PurlDialect;

/// Redirect record sent on mint and update.
#[derive(Debug, Clone, Serialize)]
struct PurlRecord {
    #[serde(rename = "purlPath")]
    purl_path: String,
    /// Redirect type; the service speaks HTTP 301.
    #[serde(rename = "type")]
    redirect_type: &'static str,
    target: String,
    #[serde(rename = "institutionCode")]
    institution_code: String,
}

/// Subset of the service's JSON answers the engine interprets.
#[derive(Debug, Clone, Deserialize)]
struct PurlResponse {
    #[serde(rename = "purlPath")]
    purl_path: Option<String>,
    status: Option<i64>,
    #[serde(rename = "purlId", alias = "id")]
    purl_id: Option<i64>,
    #[serde(rename = "responseCode")]
    response_code: Option<i64>,
}

impl PurlDialect {
    fn params<'a>(
        &self,
        binding: &'a ServiceBinding,
    ) -> Result<(&'a str, &'a str, &'a str, &'a Url), ActionError> {
        match &binding.params {
            ServiceParams::Purl {
                apikey,
                domain,
                institution,
                target,
            } => Ok((apikey, domain, institution, target)),
            ServiceParams::Ezid { .. } => Err(ActionError::Protocol(format!(
                "binding `{}` is not a PURL binding",
                binding.key
            ))),
        }
    }

    fn request(&self, method: Method, url: String, apikey: &str) -> ServiceRequest {
        ServiceRequest::new(method, url)
            .header(API_KEY_HEADER, apikey)
            .header("Content-Type", CONTENT_TYPE)
    }

    /// Turn a failure response into the mapped service error when the
    /// body carries a known application code, the opaque body otherwise.
    fn classify_failure(&self, response: &ServiceResponse) -> ActionError {
        if let Ok(parsed) = serde_json::from_str::<PurlResponse>(&response.body) {
            if let Some(code) = parsed.response_code {
                let message = match map_response_code(code) {
                    Some(mapped) => format!("{code}: {mapped}"),
                    None => format!("unrecognized response code {code}"),
                };
                return ActionError::Service {
                    status: response.status,
                    message,
                };
            }
        }
        ActionError::Service {
            status: response.status,
            message: response.body.trim().to_string(),
        }
    }
}

impl HttpDialect for PurlDialect {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Purl
    }

    fn requires_external_url(&self, operation: OperationKind) -> bool {
        matches!(operation, OperationKind::Mint | OperationKind::Update)
    }

    fn build_mint_request(
        &self,
        entity: &dyn Entity,
        binding: &ServiceBinding,
    ) -> Result<ServiceRequest, ActionError> {
        let (apikey, domain, institution, target) = self.params(binding)?;
        let path = entity_path(entity)?;

        let record = PurlRecord {
            purl_path: format!("{domain}/{path}"),
            redirect_type: "301",
            target: format!("{}/{path}", target.as_str().trim_end_matches('/')),
            institution_code: institution.to_string(),
        };

        Ok(self
            .request(Method::Post, format!("{}/api/purl", binding.base()), apikey)
            .body(encode_record(&record)?))
    }

    fn parse_mint_response(
        &self,
        binding: &ServiceBinding,
        response: &ServiceResponse,
    ) -> Result<String, ActionError> {
        if !response.is_success() {
            return Err(self.classify_failure(response));
        }
        let parsed: PurlResponse = decode_response(&response.body)?;
        let purl_path = parsed
            .purl_path
            .ok_or_else(|| ActionError::Protocol("response carries no purlPath".to_string()))?;
        Ok(format!("{}{purl_path}", binding.base()))
    }

    fn build_lookup_request(
        &self,
        stored_value: &str,
        binding: &ServiceBinding,
    ) -> Result<Lookup, ActionError> {
        let (apikey, ..) = self.params(binding)?;
        match normalize_purl_path(stored_value) {
            None => Ok(Lookup::ShortCircuit),
            Some(path) => Ok(Lookup::Request(self.request(
                Method::Get,
                format!("{}/api/purl/{path}", binding.base()),
                apikey,
            ))),
        }
    }

    fn parse_lookup_response(&self, response: &ServiceResponse) -> i64 {
        if !response.is_success() {
            return 0;
        }
        serde_json::from_str::<PurlResponse>(&response.body)
            .ok()
            .and_then(|parsed| parsed.purl_id)
            .filter(|id| *id > 0)
            .unwrap_or(0)
    }

    fn build_update_request(
        &self,
        entity: &dyn Entity,
        binding: &ServiceBinding,
        stored: &StoredIdentifier,
    ) -> Result<Option<ServiceRequest>, ActionError> {
        let (apikey, _, institution, target) = self.params(binding)?;
        let entity_path = entity_path(entity)?;
        let purl_path = normalize_purl_path(&stored.value)
            .map(|path| format!("/{path}"))
            .unwrap_or_default();

        let record = PurlRecord {
            purl_path,
            redirect_type: "301",
            target: format!("{}/{entity_path}", target.as_str().trim_end_matches('/')),
            institution_code: institution.to_string(),
        };
        let body = encode_record(&record)?;

        // No record on the service yet: fall back to create.
        let request = if stored.remote_id > 0 {
            self.request(
                Method::Put,
                format!("{}/api/purl/{}", binding.base(), stored.remote_id),
                apikey,
            )
        } else {
            self.request(Method::Post, format!("{}/api/purl", binding.base()), apikey)
        };
        Ok(Some(request.body(body)))
    }

    fn parse_update_response(&self, response: &ServiceResponse) -> Result<(), ActionError> {
        if !response.is_success() {
            return Err(self.classify_failure(response));
        }
        decode_response(&response.body).map(|_: PurlResponse| ())
    }

    fn build_delete_request(
        &self,
        stored: &StoredIdentifier,
        binding: &ServiceBinding,
    ) -> Result<Option<ServiceRequest>, ActionError> {
        if stored.remote_id <= 0 {
            return Ok(None);
        }
        let (apikey, ..) = self.params(binding)?;
        Ok(Some(self.request(
            Method::Delete,
            format!("{}/api/purl/{}", binding.base(), stored.remote_id),
            apikey,
        )))
    }

    fn parse_delete_response(&self, response: &ServiceResponse) -> Result<(), ActionError> {
        if !response.is_success() {
            return Err(self.classify_failure(response));
        }
        let parsed: PurlResponse = decode_response(&response.body)?;
        match parsed.status {
            Some(STATUS_TOMBSTONED) => Ok(()),
            other => Err(ActionError::Service {
                status: response.status,
                message: format!(
                    "delete left the record live (status {})",
                    other.map_or_else(|| "absent".to_string(), |s| s.to_string())
                ),
            }),
        }
    }
}

fn encode_record(record: &PurlRecord) -> Result<String, ActionError> {
    serde_json::to_string(record).map_err(|e| ActionError::Protocol(e.to_string()))
}

fn decode_response(body: &str) -> Result<PurlResponse, ActionError> {
    serde_json::from_str(body)
        .map_err(|e| ActionError::Protocol(format!("unparsable PURL response: {e}")))
}

/// Canned messages for the service's application-level response codes.
fn map_response_code(code: i64) -> Option<&'static str> {
    match code {
        201 => Some("successful PURL request"),
        400 => Some("invalid PURL"),
        401 => Some("invalid API key"),
        404 => Some("PURL not found"),
        _ => None,
    }
}

/// Lookup key for a stored identifier: the URL path, stripped of one
/// leading and one trailing slash. `None` when nothing remains.
fn normalize_purl_path(value: &str) -> Option<String> {
    let path = match Url::parse(value) {
        Ok(url) => url.path().to_string(),
        Err(_) => value.to_string(),
    };
    let trimmed = path.strip_prefix('/').unwrap_or(&path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Path component of the entity's canonical URL, trimmed of slashes.
fn entity_path(entity: &dyn Entity) -> Result<String, ActionError> {
    let external_url = entity
        .external_url()
        .ok_or_else(|| ActionError::Protocol("entity has no canonical URL".to_string()))?;
    let path = match Url::parse(&external_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => external_url,
    };
    let trimmed = path.strip_prefix('/').unwrap_or(&path);
    Ok(trimmed.strip_suffix('/').unwrap_or(trimmed).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::MemoryEntity;

    fn binding() -> ServiceBinding {
        ServiceBinding {
            key: "purl".to_string(),
            host: Url::parse("https://purl.flvc.org").unwrap(),
            params: ServiceParams::Purl {
                apikey: "secret".to_string(),
                domain: "fsu".to_string(),
                institution: "FSU".to_string(),
                target: Url::parse("https://repository.fsu.edu").unwrap(),
            },
        }
    }

    fn entity() -> MemoryEntity {
        MemoryEntity::new("node", "islandora_object", "9")
            .with_field("field_purl", "")
            .with_external_url("https://repository.fsu.edu/islandora/object/9")
    }

    #[test]
    fn mint_request_posts_a_redirect_record() {
        let request = PurlDialect.build_mint_request(&entity(), &binding()).unwrap();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "https://purl.flvc.org/api/purl");
        assert!(request
            .headers
            .contains(&(API_KEY_HEADER.to_string(), "secret".to_string())));
        assert!(request
            .headers
            .contains(&("Content-Type".to_string(), CONTENT_TYPE.to_string())));

        let body: serde_json::Value = serde_json::from_str(&request.body.unwrap()).unwrap();
        assert_eq!(body["purlPath"], "fsu/islandora/object/9");
        assert_eq!(body["type"], "301");
        assert_eq!(
            body["target"],
            "https://repository.fsu.edu/islandora/object/9"
        );
        assert_eq!(body["institutionCode"], "FSU");
    }

    #[test]
    fn mint_response_prepends_the_host() {
        let response = ServiceResponse {
            status: 201,
            body: r#"{"purlPath":"/fsu/islandora/object/9","status":1}"#.to_string(),
        };
        let value = PurlDialect.parse_mint_response(&binding(), &response).unwrap();
        assert_eq!(value, "https://purl.flvc.org/fsu/islandora/object/9");
    }

    #[test]
    fn mint_failure_maps_known_response_codes() {
        let response = ServiceResponse {
            status: 401,
            body: r#"{"responseCode":401}"#.to_string(),
        };
        let err = PurlDialect
            .parse_mint_response(&binding(), &response)
            .unwrap_err();
        assert_eq!(
            err,
            ActionError::Service {
                status: 401,
                message: "401: invalid API key".to_string(),
            }
        );
    }

    #[test]
    fn unmapped_response_code_passes_through_opaquely() {
        let response = ServiceResponse {
            status: 500,
            body: r#"{"responseCode":418}"#.to_string(),
        };
        let err = PurlDialect
            .parse_mint_response(&binding(), &response)
            .unwrap_err();
        assert_eq!(
            err,
            ActionError::Service {
                status: 500,
                message: "unrecognized response code 418".to_string(),
            }
        );
    }

    #[test]
    fn garbled_success_body_is_a_protocol_error() {
        let response = ServiceResponse {
            status: 200,
            body: "<html>proxy error</html>".to_string(),
        };
        assert!(matches!(
            PurlDialect.parse_mint_response(&binding(), &response),
            Err(ActionError::Protocol(_))
        ));
    }

    #[test]
    fn lookup_normalizes_the_stored_path() {
        let lookup = PurlDialect
            .build_lookup_request("/a/b/", &binding())
            .unwrap();
        match lookup {
            Lookup::Request(request) => {
                assert_eq!(request.method, Method::Get);
                assert_eq!(request.url, "https://purl.flvc.org/api/purl/a/b");
            }
            other => panic!("expected a lookup request, got {other:?}"),
        }
    }

    #[test]
    fn lookup_short_circuits_on_empty_path() {
        assert!(matches!(
            PurlDialect.build_lookup_request("/", &binding()).unwrap(),
            Lookup::ShortCircuit
        ));
        assert!(matches!(
            PurlDialect.build_lookup_request("", &binding()).unwrap(),
            Lookup::ShortCircuit
        ));
    }

    #[test]
    fn lookup_uses_the_path_of_a_full_uri() {
        let lookup = PurlDialect
            .build_lookup_request("https://purl.flvc.org/fsu/etd123", &binding())
            .unwrap();
        match lookup {
            Lookup::Request(request) => {
                assert_eq!(request.url, "https://purl.flvc.org/api/purl/fsu/etd123");
            }
            other => panic!("expected a lookup request, got {other:?}"),
        }
    }

    #[test]
    fn lookup_response_yields_the_remote_id_or_zero() {
        let found = ServiceResponse {
            status: 200,
            body: r#"{"purlId":42,"purlPath":"/fsu/etd123"}"#.to_string(),
        };
        assert_eq!(PurlDialect.parse_lookup_response(&found), 42);

        let legacy = ServiceResponse {
            status: 200,
            body: r#"{"id":7}"#.to_string(),
        };
        assert_eq!(PurlDialect.parse_lookup_response(&legacy), 7);

        let missing = ServiceResponse {
            status: 404,
            body: r#"{"responseCode":404}"#.to_string(),
        };
        assert_eq!(PurlDialect.parse_lookup_response(&missing), 0);

        let garbled = ServiceResponse {
            status: 200,
            body: "not json".to_string(),
        };
        assert_eq!(PurlDialect.parse_lookup_response(&garbled), 0);
    }

    #[test]
    fn update_puts_to_the_existing_record() {
        let stored = StoredIdentifier {
            value: "https://purl.flvc.org/fsu/etd123".to_string(),
            remote_id: 42,
        };
        let request = PurlDialect
            .build_update_request(&entity(), &binding(), &stored)
            .unwrap()
            .unwrap();

        assert_eq!(request.method, Method::Put);
        assert_eq!(request.url, "https://purl.flvc.org/api/purl/42");
        let body: serde_json::Value = serde_json::from_str(&request.body.unwrap()).unwrap();
        assert_eq!(body["purlPath"], "/fsu/etd123");
    }

    #[test]
    fn update_falls_back_to_create_when_absent() {
        let stored = StoredIdentifier {
            value: "https://purl.flvc.org/fsu/etd123".to_string(),
            remote_id: 0,
        };
        let request = PurlDialect
            .build_update_request(&entity(), &binding(), &stored)
            .unwrap()
            .unwrap();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "https://purl.flvc.org/api/purl");
    }

    #[test]
    fn delete_skips_when_nothing_exists_remotely() {
        let stored = StoredIdentifier {
            value: "https://purl.flvc.org/fsu/etd123".to_string(),
            remote_id: 0,
        };
        assert!(PurlDialect
            .build_delete_request(&stored, &binding())
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_addresses_the_remote_id() {
        let stored = StoredIdentifier {
            value: "https://purl.flvc.org/fsu/etd123".to_string(),
            remote_id: 42,
        };
        let request = PurlDialect
            .build_delete_request(&stored, &binding())
            .unwrap()
            .unwrap();
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.url, "https://purl.flvc.org/api/purl/42");
    }

    #[test]
    fn delete_is_confirmed_only_by_a_tombstone() {
        let tombstoned = ServiceResponse {
            status: 200,
            body: r#"{"status":2,"purlPath":"/x/y"}"#.to_string(),
        };
        assert!(PurlDialect.parse_delete_response(&tombstoned).is_ok());

        let live = ServiceResponse {
            status: 200,
            body: r#"{"status":1,"purlPath":"/x/y"}"#.to_string(),
        };
        assert!(matches!(
            PurlDialect.parse_delete_response(&live),
            Err(ActionError::Service { .. })
        ));
    }
}
