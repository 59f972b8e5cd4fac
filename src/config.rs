//! Binding and record configuration
//!
//! A `ServiceBinding` holds the connection data for one identifier
//! service; an `IdentifierRecord` ties an entity field to a binding.
//! Both are declared in TOML and validated once at load time — action
//! execution never re-checks required fields.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use url::Url;

use crate::error::ConfigError;

/// Identifier service protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// CDL EZID (ARK identifiers, ANVL wire format).
    Ezid,
    /// Kiwi-style PURL service (JSON wire format).
    Purl,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Ezid => "ezid",
            ServiceKind::Purl => "purl",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-service connection parameters.
///
/// Required fields are carried per variant so a loaded binding can never
/// be missing the data its dialect needs.
#[derive(Debug, Clone)]
pub enum ServiceParams {
    /// HTTP basic auth plus the shoulder namespace new ids are minted
    /// under, e.g. `ark:/99999/fk4`.
    Ezid {
        username: String,
        password: String,
        namespace: String,
    },
    /// API key auth plus the domain prefix for minted paths, the
    /// institution code, and the redirect target host.
    Purl {
        apikey: String,
        domain: String,
        institution: String,
        target: Url,
    },
}

/// Connection data for one identifier service, identified by its
/// configuration key. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ServiceBinding {
    pub key: String,
    pub host: Url,
    pub params: ServiceParams,
}

impl ServiceBinding {
    pub fn kind(&self) -> ServiceKind {
        match self.params {
            ServiceParams::Ezid { .. } => ServiceKind::Ezid,
            ServiceParams::Purl { .. } => ServiceKind::Purl,
        }
    }

    /// Host base with no trailing slash, ready for path concatenation.
    pub fn base(&self) -> &str {
        self.host.as_str().trim_end_matches('/')
    }
}

/// Where an entity stores its identifier and which service mints it.
/// Read-only during action execution.
#[derive(Debug, Clone)]
pub struct IdentifierRecord {
    pub key: String,
    pub entity_type: String,
    pub bundle: String,
    /// Entity field the identifier value lives in.
    pub field: String,
    /// Configuration key of the service binding.
    pub binding: String,
}

/// Validated set of bindings and records, keyed by configuration key.
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    bindings: HashMap<String, ServiceBinding>,
    records: HashMap<String, IdentifierRecord>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a TOML document of `[bindings.*]` and
    /// `[records.*]` tables.
    pub fn from_toml(doc: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument = toml::from_str(doc)?;

        let mut registry = Self::new();
        for (key, binding) in raw.bindings {
            registry.add_binding(ServiceBinding::from_raw(key, binding)?);
        }
        for (key, record) in raw.records {
            registry.add_record(IdentifierRecord {
                key,
                entity_type: record.entity_type,
                bundle: record.bundle,
                field: record.field,
                binding: record.binding,
            })?;
        }
        Ok(registry)
    }

    pub fn add_binding(&mut self, binding: ServiceBinding) {
        self.bindings.insert(binding.key.clone(), binding);
    }

    /// Add a record; its binding key must already be registered.
    pub fn add_record(&mut self, record: IdentifierRecord) -> Result<(), ConfigError> {
        if !self.bindings.contains_key(&record.binding) {
            return Err(ConfigError::UnknownBinding {
                key: record.key,
                binding: record.binding,
            });
        }
        self.records.insert(record.key.clone(), record);
        Ok(())
    }

    pub fn binding(&self, key: &str) -> Option<&ServiceBinding> {
        self.bindings.get(key)
    }

    pub fn record(&self, key: &str) -> Option<&IdentifierRecord> {
        self.records.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.records.is_empty()
    }
}

impl ServiceBinding {
    fn from_raw(key: String, raw: RawBinding) -> Result<Self, ConfigError> {
        let params = match raw.service.as_str() {
            "ezid" => ServiceParams::Ezid {
                username: require(&key, "username", raw.username, raw.username_env)?,
                password: require(&key, "password", raw.password, raw.password_env)?,
                namespace: require(&key, "namespace", raw.namespace, None)?,
            },
            "purl" => ServiceParams::Purl {
                apikey: require(&key, "apikey", raw.apikey, raw.apikey_env)?,
                domain: require(&key, "domain", raw.domain, None)?,
                institution: require(&key, "institution", raw.institution, None)?,
                target: raw.target.ok_or_else(|| ConfigError::MissingField {
                    key: key.clone(),
                    field: "target".to_string(),
                })?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("unknown service kind `{other}`"),
                })
            }
        };
        Ok(ServiceBinding {
            key,
            host: raw.host,
            params,
        })
    }
}

/// Resolve a required value: an inline value wins, otherwise the named
/// environment variable is consulted. Empty values count as missing.
fn require(
    key: &str,
    field: &str,
    value: Option<String>,
    env_name: Option<String>,
) -> Result<String, ConfigError> {
    let resolved = value
        .filter(|v| !v.is_empty())
        .or_else(|| env_name.and_then(|name| std::env::var(name).ok()))
        .filter(|v| !v.is_empty());
    resolved.ok_or_else(|| ConfigError::MissingField {
        key: key.to_string(),
        field: field.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    bindings: HashMap<String, RawBinding>,
    #[serde(default)]
    records: HashMap<String, RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawBinding {
    service: String,
    host: Url,
    username: Option<String>,
    username_env: Option<String>,
    password: Option<String>,
    password_env: Option<String>,
    apikey: Option<String>,
    apikey_env: Option<String>,
    namespace: Option<String>,
    domain: Option<String>,
    institution: Option<String>,
    target: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    entity_type: String,
    bundle: String,
    field: String,
    binding: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EZID_DOC: &str = r#"
        [bindings.ark]
        service = "ezid"
        host = "https://ezid.cdlib.org"
        username = "apitest"
        password = "apitest"
        namespace = "ark:/99999/fk4"

        [records.thesis-ark]
        entity_type = "node"
        bundle = "islandora_object"
        field = "field_ark_identifier"
        binding = "ark"
    "#;

    #[test]
    fn loads_ezid_binding_and_record() {
        let registry = BindingRegistry::from_toml(EZID_DOC).unwrap();

        let binding = registry.binding("ark").unwrap();
        assert_eq!(binding.kind(), ServiceKind::Ezid);
        assert_eq!(binding.base(), "https://ezid.cdlib.org");
        match &binding.params {
            ServiceParams::Ezid { namespace, .. } => assert_eq!(namespace, "ark:/99999/fk4"),
            other => panic!("unexpected params: {other:?}"),
        }

        let record = registry.record("thesis-ark").unwrap();
        assert_eq!(record.field, "field_ark_identifier");
        assert_eq!(record.binding, "ark");
    }

    #[test]
    fn loads_purl_binding() {
        let registry = BindingRegistry::from_toml(
            r#"
            [bindings.purl]
            service = "purl"
            host = "https://purl.flvc.org"
            apikey = "secret"
            domain = "fsu"
            institution = "FSU"
            target = "https://repository.fsu.edu"
            "#,
        )
        .unwrap();

        let binding = registry.binding("purl").unwrap();
        assert_eq!(binding.kind(), ServiceKind::Purl);
        match &binding.params {
            ServiceParams::Purl { domain, target, .. } => {
                assert_eq!(domain, "fsu");
                assert_eq!(target.as_str(), "https://repository.fsu.edu/");
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn rejects_ezid_binding_without_namespace() {
        let err = BindingRegistry::from_toml(
            r#"
            [bindings.ark]
            service = "ezid"
            host = "https://ezid.cdlib.org"
            username = "apitest"
            password = "apitest"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { ref field, .. } if field == "namespace"
        ));
    }

    #[test]
    fn rejects_purl_binding_without_apikey() {
        let err = BindingRegistry::from_toml(
            r#"
            [bindings.purl]
            service = "purl"
            host = "https://purl.flvc.org"
            domain = "fsu"
            institution = "FSU"
            target = "https://repository.fsu.edu"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { ref field, .. } if field == "apikey"
        ));
    }

    #[test]
    fn rejects_unknown_service_kind() {
        let err = BindingRegistry::from_toml(
            r#"
            [bindings.handle]
            service = "handle"
            host = "https://hdl.handle.net"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_record_with_dangling_binding() {
        let err = BindingRegistry::from_toml(
            r#"
            [records.orphan]
            entity_type = "node"
            bundle = "islandora_object"
            field = "field_ark_identifier"
            binding = "nope"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownBinding { ref binding, .. } if binding == "nope"
        ));
    }

    #[test]
    fn credentials_fall_back_to_environment() {
        std::env::set_var("REGISTRAR_TEST_APIKEY", "from-env");
        let registry = BindingRegistry::from_toml(
            r#"
            [bindings.purl]
            service = "purl"
            host = "https://purl.flvc.org"
            apikey_env = "REGISTRAR_TEST_APIKEY"
            domain = "fsu"
            institution = "FSU"
            target = "https://repository.fsu.edu"
            "#,
        )
        .unwrap();
        match &registry.binding("purl").unwrap().params {
            ServiceParams::Purl { apikey, .. } => assert_eq!(apikey, "from-env"),
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn empty_inline_credential_counts_as_missing() {
        let err = BindingRegistry::from_toml(
            r#"
            [bindings.ark]
            service = "ezid"
            host = "https://ezid.cdlib.org"
            username = "apitest"
            password = ""
            namespace = "ark:/99999/fk4"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { ref field, .. } if field == "password"
        ));
    }
}
