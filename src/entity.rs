//! Entity collaborator seam
//!
//! The host system owns entity storage. The engine only needs to read and
//! write the identifier field, resolve the entity's canonical public URL,
//! and collect descriptive metadata for minting.

use std::collections::HashMap;

/// A repository entity, as seen by identifier actions.
pub trait Entity: Send {
    /// Machine name of the entity type, e.g. `node`.
    fn entity_type(&self) -> &str;

    /// Bundle within the entity type.
    fn bundle(&self) -> &str;

    /// Host-assigned entity id.
    fn id(&self) -> &str;

    /// Current value of the named field. `None` means the entity does not
    /// carry the field at all; an empty string means "not yet minted".
    fn field_value(&self, name: &str) -> Option<String>;

    /// Write the named field. Only called after a confirmed success.
    fn set_field(&mut self, name: &str, value: String);

    /// Canonical public URL the identifier should resolve to.
    fn external_url(&self) -> Option<String>;

    /// Descriptive metadata pairs submitted when minting.
    fn metadata(&self) -> Vec<(String, String)>;
}

/// In-memory entity for hosts without their own storage and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryEntity {
    entity_type: String,
    bundle: String,
    id: String,
    fields: HashMap<String, String>,
    external_url: Option<String>,
    metadata: Vec<(String, String)>,
}

impl MemoryEntity {
    pub fn new(
        entity_type: impl Into<String>,
        bundle: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            bundle: bundle.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

impl Entity for MemoryEntity {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn bundle(&self) -> &str {
        &self.bundle
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn field_value(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: String) {
        self.fields.insert(name.to_string(), value);
    }

    fn external_url(&self) -> Option<String> {
        self.external_url.clone()
    }

    fn metadata(&self) -> Vec<(String, String)> {
        self.metadata.clone()
    }
}
