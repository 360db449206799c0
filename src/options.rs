//! Index definitions and their resolution into immutable options.

use std::{collections::BTreeMap, fmt, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    data_dir::Settings,
    declaration::Declaration,
    document::Document,
    error::{Error, Result},
    fields::FieldDecl,
    model::{ModelMeta, Record},
    schema::IndexSchema,
};

/// The requested field names of a definition.
///
/// A bare string deserializes into [`FieldList::One`] so the resolver can
/// reject it with a helpful message instead of treating each character as
/// a field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    Many(Vec<String>),
    One(String),
}

impl<S: Into<String>> FromIterator<S> for FieldList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        FieldList::Many(iter.into_iter().map(Into::into).collect())
    }
}

/// Everything needed to bind a declaration to an index.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    module: String,
    declaration: Declaration,
    index: Option<String>,
    app_label: Option<String>,
    fields: Option<FieldList>,
    model: Option<ModelMeta>,
}

impl IndexDefinition {
    /// Start a definition for `declaration`, which lives in `module`.
    pub fn new(module: impl Into<String>, declaration: Declaration) -> Self {
        Self {
            module: module.into(),
            declaration,
            index: None,
            app_label: None,
            fields: None,
            model: None,
        }
    }

    /// Explicit index name. Defaults to `{app_label}_{class_name}`.
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    pub fn app_label(mut self, label: impl Into<String>) -> Self {
        self.app_label = Some(label.into());
        self
    }

    /// The fields to put in the index schema.
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(names.into_iter().collect());
        self
    }

    /// Set the requested fields from an unchecked list, as read from a
    /// configuration file.
    pub fn field_list(mut self, fields: Option<FieldList>) -> Self {
        self.fields = fields;
        self
    }

    /// Link a backing model. Requested fields must then exist on the model
    /// and undeclared ones get defaults.
    pub fn model(mut self, model: ModelMeta) -> Self {
        self.model = Some(model);
        self
    }

    pub fn class_name(&self) -> &str {
        self.declaration.name()
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.module, self.class_name())
    }
}

/// Resolved, validated options of one index. Immutable once built.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub module: String,
    pub class_name: String,
    pub index_name: String,
    pub base: PathBuf,
    pub requested_fields: Vec<String>,
    pub declared_fields: BTreeMap<String, FieldDecl>,
    pub model: Option<ModelMeta>,
    pub pk_field: Option<String>,
    pub schema: Arc<IndexSchema>,
}

impl IndexOptions {
    /// Validate `def` and derive its schema. Performs no I/O.
    pub fn resolve(def: &IndexDefinition, settings: &Settings) -> Result<Self> {
        let qualified = def.qualified_name();

        let requested = match &def.fields {
            None => {
                return Err(Error::Config(format!(
                    "index class {qualified} doesn't declare a 'fields' \
                     attribute"
                )));
            }
            Some(FieldList::One(value)) => {
                return Err(Error::FieldsIsString {
                    class: qualified,
                    value: value.clone(),
                });
            }
            Some(FieldList::Many(names)) => dedup(names),
        };
        if requested.is_empty() && def.model.is_none() {
            return Err(Error::Config(format!(
                "index class {qualified} requests no fields"
            )));
        }

        let index_name = match (&def.index, &def.app_label) {
            (Some(index), _) => index.clone(),
            (None, Some(label)) => format!("{label}_{}", def.class_name()),
            (None, None) => {
                return Err(Error::Config(format!(
                    "index class {qualified} doesn't declare an explicit \
                     index or app_label"
                )));
            }
        };
        validate_index_name(&qualified, &index_name)?;

        let declared = def.declaration.fields();
        for (name, decl) in declared {
            decl.validate().map_err(|reason| {
                Error::Config(format!(
                    "index class {qualified} field '{name}': {reason}"
                ))
            })?;
        }

        let (schema_fields, pk_field) = match &def.model {
            Some(model) => {
                let fields = model_schema_fields(
                    &qualified, &requested, declared, model,
                )?;
                (fields, Some(model.pk.clone()))
            }
            None => {
                let fields =
                    declared_schema_fields(&qualified, &requested, declared)?;
                (fields, None)
            }
        };

        Ok(Self {
            module: def.module.clone(),
            class_name: def.class_name().to_string(),
            schema: Arc::new(IndexSchema::build(&index_name, schema_fields)),
            index_name,
            base: settings.base().to_path_buf(),
            requested_fields: requested,
            declared_fields: declared.clone(),
            model: def.model.clone(),
            pk_field,
        })
    }

    pub fn index_dir(&self) -> PathBuf {
        self.base.join(&self.index_name)
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.module, &self.class_name)
    }

    /// Build a document from a model record, pulling the schema fields.
    pub fn document<R: Record + ?Sized>(&self, record: &R) -> Document {
        Document::from_record(record, self.schema.names())
    }
}

impl fmt::Display for IndexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IndexOptions(index: {}, base: {}, class: {}, model: {}, \
             requested_fields: {:?}, declared_fields: {:?}, \
             schema_fields: {:?})",
            self.index_name,
            self.base.display(),
            self.qualified_name(),
            self.model.as_ref().map_or("-", |m| m.name.as_str()),
            self.requested_fields,
            self.declared_fields.keys().collect::<Vec<_>>(),
            self.schema.names().collect::<Vec<_>>(),
        )
    }
}

fn qualify(module: &str, class_name: &str) -> String {
    if module.is_empty() {
        class_name.to_string()
    } else {
        format!("{module}.{class_name}")
    }
}

fn dedup(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

fn validate_index_name(qualified: &str, name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "index class {qualified} has an invalid index name {name:?}"
        )))
    }
}

fn declared_schema_fields(
    qualified: &str,
    requested: &[String],
    declared: &BTreeMap<String, FieldDecl>,
) -> Result<BTreeMap<String, FieldDecl>> {
    requested
        .iter()
        .map(|name| {
            declared
                .get(name)
                .map(|decl| (name.clone(), decl.clone()))
                .ok_or_else(|| {
                    Error::Config(format!(
                        "index class {qualified} requested field '{name}' \
                         not declared"
                    ))
                })
        })
        .collect()
}

fn model_schema_fields(
    qualified: &str,
    requested: &[String],
    declared: &BTreeMap<String, FieldDecl>,
    model: &ModelMeta,
) -> Result<BTreeMap<String, FieldDecl>> {
    let model_fields = model.field_map();
    if !model_fields.contains_key(model.pk.as_str()) {
        return Err(Error::Config(format!(
            "model {} has no primary key field '{}'",
            model.name, model.pk
        )));
    }
    for name in requested {
        if !model_fields.contains_key(name.as_str()) {
            return Err(Error::Config(format!(
                "index class {qualified} requests a field '{name}' not in \
                 model {}",
                model.name
            )));
        }
    }

    let mut out = BTreeMap::new();
    let wanted = requested.iter().chain(
        (!requested.contains(&model.pk)).then_some(&model.pk),
    );
    for name in wanted {
        let mut decl = match declared.get(name) {
            Some(decl) => decl.clone(),
            None => model_fields[name.as_str()].default_field().ok_or_else(
                || {
                    Error::Config(format!(
                        "index class {qualified} requested field '{name}' \
                         not declared and can not be defaulted"
                    ))
                },
            )?,
        };
        if *name == model.pk {
            decl.stored = true;
        }
        out.insert(name.clone(), decl);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fields::FieldKind,
        model::ModelFieldKind,
    };

    fn settings() -> (Settings, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        (Settings::resolve(Some(tmp.path())).unwrap(), tmp)
    }

    fn paper_model() -> ModelMeta {
        ModelMeta::new("Paper", "id")
            .field("id", ModelFieldKind::Auto)
            .field("title", ModelFieldKind::Char)
            .field("published", ModelFieldKind::DateTime)
            .field("contact", ModelFieldKind::Email)
            .field("pages", ModelFieldKind::Integer)
    }

    fn config_message(err: Error) -> String {
        match err {
            Error::Config(msg) => msg,
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn resolves_declared_fields() {
        let (settings, _tmp) = settings();
        let decl = Declaration::new("Notes")
            .field("title", FieldDecl::text().stored())
            .field("body", FieldDecl::text());
        let def = IndexDefinition::new("notes.need", decl)
            .app_label("notes")
            .fields(["title"]);

        let opts = IndexOptions::resolve(&def, &settings).unwrap();
        assert_eq!(opts.index_name, "notes_Notes");
        assert_eq!(opts.index_dir(), settings.base().join("notes_Notes"));
        assert_eq!(opts.schema.names().collect::<Vec<_>>(), ["title"]);
        assert_eq!(opts.declared_fields.len(), 2);
        assert!(opts.pk_field.is_none());
        assert_eq!(opts.qualified_name(), "notes.need.Notes");
    }

    #[test]
    fn explicit_index_name_wins() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new(
            "m",
            Declaration::new("C").field("a", FieldDecl::id()),
        )
        .index("custom")
        .app_label("ignored")
        .fields(["a"]);

        let opts = IndexOptions::resolve(&def, &settings).unwrap();
        assert_eq!(opts.index_name, "custom");
    }

    #[test]
    fn missing_fields_attribute() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new("m", Declaration::new("C")).index("x");
        let msg = config_message(
            IndexOptions::resolve(&def, &settings).unwrap_err(),
        );
        assert!(msg.contains("'fields'"), "{msg}");
    }

    #[test]
    fn string_fields_are_rejected() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new(
            "m",
            Declaration::new("C").field("title", FieldDecl::text()),
        )
        .index("x")
        .field_list(Some(FieldList::One("title".into())));

        let err = IndexOptions::resolve(&def, &settings).unwrap_err();
        match err {
            Error::FieldsIsString { class, value } => {
                assert_eq!(class, "m.C");
                assert_eq!(value, "title");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn string_fields_from_json_are_rejected() {
        let list: FieldList = serde_json::from_str(r#""title""#).unwrap();
        assert_eq!(list, FieldList::One("title".into()));
        let list: FieldList = serde_json::from_str(r#"["title"]"#).unwrap();
        assert_eq!(list, FieldList::Many(vec!["title".into()]));
    }

    #[test]
    fn index_name_or_app_label_required() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new(
            "m",
            Declaration::new("C").field("a", FieldDecl::id()),
        )
        .fields(["a"]);
        let msg = config_message(
            IndexOptions::resolve(&def, &settings).unwrap_err(),
        );
        assert!(msg.contains("app_label"), "{msg}");
    }

    #[test]
    fn index_name_must_be_a_single_component() {
        let (settings, _tmp) = settings();
        for bad in ["", "..", "a/b"] {
            let def = IndexDefinition::new(
                "m",
                Declaration::new("C").field("a", FieldDecl::id()),
            )
            .index(bad)
            .fields(["a"]);
            assert!(IndexOptions::resolve(&def, &settings).is_err(), "{bad}");
        }
    }

    #[test]
    fn undeclared_field_without_model() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new(
            "m",
            Declaration::new("C").field("a", FieldDecl::id()),
        )
        .index("x")
        .fields(["a", "b"]);
        let msg = config_message(
            IndexOptions::resolve(&def, &settings).unwrap_err(),
        );
        assert!(msg.contains("'b' not declared"), "{msg}");
    }

    #[test]
    fn invalid_declaration_is_reported() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new(
            "m",
            Declaration::new("C").field("n", FieldDecl::numeric(7, true)),
        )
        .index("x")
        .fields(["n"]);
        let msg = config_message(
            IndexOptions::resolve(&def, &settings).unwrap_err(),
        );
        assert!(msg.contains("field 'n'"), "{msg}");
    }

    #[test]
    fn model_defaults_fill_undeclared_fields() {
        let (settings, _tmp) = settings();
        let def =
            IndexDefinition::new("paper.need", Declaration::new("PaperNeed"))
                .app_label("paper")
                .fields(["title", "published", "contact"])
                .model(paper_model());

        let opts = IndexOptions::resolve(&def, &settings).unwrap();
        let schema = &opts.schema;

        let id = schema.get("id").unwrap();
        assert_eq!(id.kind, FieldKind::Id);
        assert!(id.unique);
        assert!(id.stored, "primary key is always stored");

        assert!(matches!(
            schema.get("title").unwrap().kind,
            FieldKind::Text { .. }
        ));
        assert_eq!(schema.get("published").unwrap().kind, FieldKind::DateTime);
        assert!(schema.get("contact").unwrap().stored);
        assert_eq!(opts.pk_field.as_deref(), Some("id"));
    }

    #[test]
    fn declared_pk_is_forced_stored() {
        let (settings, _tmp) = settings();
        let decl = Declaration::new("PaperNeed").field("id", FieldDecl::id());
        let def = IndexDefinition::new("paper.need", decl)
            .index("papers")
            .fields(["id", "title"])
            .model(paper_model());

        let opts = IndexOptions::resolve(&def, &settings).unwrap();
        assert!(opts.schema.get("id").unwrap().stored);
        assert!(!opts.schema.get("id").unwrap().unique);
        // The declaration itself is left alone.
        assert!(!opts.declared_fields["id"].stored);
    }

    #[test]
    fn model_field_without_default_is_an_error() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new("paper.need", Declaration::new("P"))
            .index("papers")
            .fields(["pages"])
            .model(paper_model());
        let msg = config_message(
            IndexOptions::resolve(&def, &settings).unwrap_err(),
        );
        assert!(msg.contains("can not be defaulted"), "{msg}");

        let decl = Declaration::new("P").field("pages", FieldDecl::integer());
        let def = IndexDefinition::new("paper.need", decl)
            .index("papers")
            .fields(["pages"])
            .model(paper_model());
        assert!(IndexOptions::resolve(&def, &settings).is_ok());
    }

    #[test]
    fn requested_field_missing_from_model() {
        let (settings, _tmp) = settings();
        let decl = Declaration::new("P").field("extra", FieldDecl::text());
        let def = IndexDefinition::new("paper.need", decl)
            .index("papers")
            .fields(["extra"])
            .model(paper_model());
        let msg = config_message(
            IndexOptions::resolve(&def, &settings).unwrap_err(),
        );
        assert!(msg.contains("not in model Paper"), "{msg}");
    }

    #[test]
    fn model_alone_indexes_its_primary_key() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new("paper.need", Declaration::new("P"))
            .index("papers")
            .fields(Vec::<String>::new())
            .model(paper_model());
        let opts = IndexOptions::resolve(&def, &settings).unwrap();
        assert_eq!(opts.schema.names().collect::<Vec<_>>(), ["id"]);
    }

    #[test]
    fn duplicate_requests_collapse() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new(
            "m",
            Declaration::new("C").field("a", FieldDecl::id()),
        )
        .index("x")
        .fields(["a", "a"]);
        let opts = IndexOptions::resolve(&def, &settings).unwrap();
        assert_eq!(opts.requested_fields, ["a"]);
    }

    #[test]
    fn display_lists_schema_fields() {
        let (settings, _tmp) = settings();
        let def = IndexDefinition::new(
            "m",
            Declaration::new("C").field("a", FieldDecl::id()),
        )
        .index("x")
        .fields(["a"]);
        let shown = IndexOptions::resolve(&def, &settings).unwrap().to_string();
        assert!(shown.contains("index: x"), "{shown}");
        assert!(shown.contains("schema_fields: [\"a\"]"), "{shown}");
    }
}
