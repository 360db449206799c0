//! Collection of field declarations along an inheritance chain.

use std::collections::BTreeMap;

use crate::fields::FieldDecl;

/// The fields declared by one index definition, merged with everything it
/// inherits.
///
/// Derived declarations are built with [`Declaration::extend`], which copies
/// the parents' effective fields. Later calls to [`Declaration::field`]
/// override inherited entries and [`Declaration::shadow`] removes them.
///
/// ```
/// use need::{Declaration, FieldDecl};
///
/// let base = Declaration::new("Base")
///     .field("title", FieldDecl::text())
///     .field("body", FieldDecl::text());
/// let paper = Declaration::extend("Paper", &[&base])
///     .field("title", FieldDecl::text().stored())
///     .shadow("body");
///
/// assert!(paper.get("title").unwrap().stored);
/// assert!(paper.get("body").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declaration {
    name: String,
    fields: BTreeMap<String, FieldDecl>,
}

impl Declaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Start a declaration that inherits from `parents`.
    ///
    /// When several parents declare the same name, the earlier parent
    /// wins.
    pub fn extend(name: impl Into<String>, parents: &[&Declaration]) -> Self {
        let mut fields = BTreeMap::new();
        for parent in parents.iter().rev() {
            fields.extend(
                parent
                    .fields
                    .iter()
                    .map(|(name, decl)| (name.clone(), decl.clone())),
            );
        }
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Declare `name`, replacing any inherited declaration.
    pub fn field(mut self, name: impl Into<String>, decl: FieldDecl) -> Self {
        self.fields.insert(name.into(), decl);
        self
    }

    /// Remove an inherited field. Unknown names are ignored.
    pub fn shadow(mut self, name: &str) -> Self {
        self.fields.remove(name);
        self
    }

    /// Apply one class-body entry: `Some` declares, `None` shadows.
    pub fn apply(
        self,
        name: impl Into<String>,
        decl: Option<FieldDecl>,
    ) -> Self {
        let name = name.into();
        match decl {
            Some(decl) => self.field(name, decl),
            None => self.shadow(&name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.get(name)
    }

    /// The effective fields, ordered by name.
    pub fn fields(&self) -> &BTreeMap<String, FieldDecl> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
