use std::collections::BTreeMap;

use crate::{
    error::{Error, Result},
    model::Record,
};

/// A document to write: field name to string value.
///
/// Values are converted to each field's native type at write time. Keys
/// that are not in the index schema are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    values: BTreeMap<String, String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.values.insert(field.into(), value.into());
    }

    /// Build a document from a model record, pulling only `fields`.
    /// Fields the record has no value for are left out.
    pub fn from_record<'a, R, I>(record: &R, fields: I) -> Self
    where
        R: Record + ?Sized,
        I: IntoIterator<Item = &'a str>,
    {
        fields
            .into_iter()
            .filter_map(|name| {
                record.value(name).map(|value| (name.to_string(), value))
            })
            .collect()
    }

    /// Build a document from a JSON object. Strings are taken verbatim,
    /// numbers and booleans by their JSON text, nulls are skipped.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::Config(format!(
                "document must be a JSON object, got {value}"
            ))
        })?;

        let mut doc = Self::new();
        for (field, value) in object {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => doc.insert(field, s.as_str()),
                serde_json::Value::Number(_) | serde_json::Value::Bool(_) => {
                    doc.insert(field, value.to_string())
                }
                other => {
                    return Err(Error::InvalidValue {
                        field: field.clone(),
                        value: other.to_string(),
                        reason: "nested values are not supported".into(),
                    });
                }
            }
        }
        Ok(doc)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.values
    }
}

impl<K, V> FromIterator<(K, V)> for Document
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Record for Document {
    fn value(&self, field: &str) -> Option<String> {
        self.get(field).map(str::to_string)
    }
}
