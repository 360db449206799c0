//! Backing data models: the records an index mirrors.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::fields::FieldDecl;

/// The storage type of a model field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFieldKind {
    /// Auto-incrementing integer key.
    Auto,
    /// Short bounded string.
    Char,
    /// Unbounded string.
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Uuid,
    Email,
    Url,
    /// Anything without an obvious index counterpart.
    #[serde(untagged)]
    Other(String),
}

impl ModelFieldKind {
    /// Best-effort index field for a model field that was requested but
    /// not declared. A rough guess at likely intent, not a definition of
    /// what can be indexed.
    pub fn default_field(&self) -> Option<FieldDecl> {
        match self {
            ModelFieldKind::Auto => Some(FieldDecl::id().unique()),
            ModelFieldKind::Char => Some(FieldDecl::text().stored()),
            ModelFieldKind::DateTime => Some(FieldDecl::datetime()),
            ModelFieldKind::Date | ModelFieldKind::Uuid => {
                Some(FieldDecl::id())
            }
            ModelFieldKind::Email | ModelFieldKind::Url => {
                Some(FieldDecl::id().stored())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelField {
    pub name: String,
    pub kind: ModelFieldKind,
}

/// Field layout of a backing model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub name: String,
    /// Name of the primary key field.
    pub pk: String,
    pub fields: Vec<ModelField>,
}

impl ModelMeta {
    pub fn new(name: impl Into<String>, pk: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pk: pk.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        kind: ModelFieldKind,
    ) -> Self {
        self.fields.push(ModelField {
            name: name.into(),
            kind,
        });
        self
    }

    /// Map of field name to field kind.
    pub fn field_map(&self) -> HashMap<&str, &ModelFieldKind> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), &f.kind))
            .collect()
    }

    pub fn kind_of(&self, name: &str) -> Option<&ModelFieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.kind)
    }
}

/// A model instance that can be turned into an index document.
pub trait Record {
    /// The string form of `field`, or `None` when the record has no value.
    fn value(&self, field: &str) -> Option<String>;
}

impl Record for BTreeMap<String, String> {
    fn value(&self, field: &str) -> Option<String> {
        self.get(field).cloned()
    }
}

impl Record for HashMap<String, String> {
    fn value(&self, field: &str) -> Option<String> {
        self.get(field).cloned()
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn value(&self, field: &str) -> Option<String> {
        (**self).value(field)
    }
}
