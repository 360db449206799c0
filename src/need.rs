use std::sync::Arc;

use crate::{
    blocking::{BlockingManager, IndexRegistry},
    data_dir::Settings,
    document::Document,
    error::Result,
    manager::{Actions, Manager},
    model::Record,
    options::{IndexDefinition, IndexOptions},
    tantivy_index,
};

/// A resolved index definition: its options and the manager bound to it.
///
/// Resolution validates the definition, derives the schema and creates the
/// on-disk index when it does not exist yet, so a misconfigured definition
/// fails here rather than on first use.
///
/// ```no_run
/// use need::{
///     Actions, Declaration, Document, FieldDecl, IndexDefinition, Need,
///     Settings,
/// };
///
/// let settings = Settings::resolve(None).unwrap();
/// let decl = Declaration::new("PaperNeed")
///     .field("id", FieldDecl::id().unique().stored())
///     .field("title", FieldDecl::text().stored());
/// let def = IndexDefinition::new("paper.need", decl)
///     .app_label("paper")
///     .fields(["id", "title"]);
///
/// let need = Need::resolve(&def, &settings).unwrap();
/// need.actions()
///     .add(&Document::new().with("id", "1").with("title", "Hello"))
///     .unwrap();
/// let titles: Vec<String> = need
///     .actions()
///     .read(&["title"], "hello", |hits| {
///         hits.iter()
///             .filter_map(|h| h.ok()?.get("title").map(str::to_string))
///             .collect()
///     })
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Need<M = Manager> {
    options: Arc<IndexOptions>,
    actions: M,
}

/// Validate `def` and create its index if missing.
fn prepare(
    def: &IndexDefinition,
    settings: &Settings,
) -> Result<Arc<IndexOptions>> {
    let options = IndexOptions::resolve(def, settings)?;
    tantivy_index::create_if_missing(&options.index_dir(), &options.schema)?;
    tracing::debug!(class = %options.qualified_name(), "resolved index");
    Ok(Arc::new(options))
}

impl Need<Manager> {
    /// Resolve `def` with an unlocked manager.
    pub fn resolve(def: &IndexDefinition, settings: &Settings) -> Result<Self> {
        let options = prepare(def, settings)?;
        let actions =
            Manager::new(Arc::clone(&options), settings.writer_memory());
        Ok(Self { options, actions })
    }
}

impl Need<BlockingManager> {
    /// Resolve `def` with a manager sharing `registry`'s open handle.
    pub fn resolve_blocking(
        def: &IndexDefinition,
        settings: &Settings,
        registry: &IndexRegistry,
    ) -> Result<Self> {
        let options = prepare(def, settings)?;
        let actions = BlockingManager::new(
            Arc::clone(&options),
            registry,
            settings.writer_memory(),
        )?;
        Ok(Self { options, actions })
    }
}

impl<M: Actions> Need<M> {
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn actions(&self) -> &M {
        &self.actions
    }

    /// Build a document for this index from a model record.
    pub fn document<R: Record + ?Sized>(&self, record: &R) -> Document {
        self.options.document(record)
    }
}
