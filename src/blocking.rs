//! Managers sharing one open index per path, with serialized writers.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tantivy::IndexWriter;

use crate::{
    document::Document,
    error::{Error, Result},
    manager::{Actions, primary_key},
    options::IndexOptions,
    tantivy_index::{Hits, SearchIndex},
};

/// An open index and the lock serializing its writers.
#[derive(Debug)]
pub struct RegistryEntry {
    index: SearchIndex,
    lock: Mutex<()>,
}

impl RegistryEntry {
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| Error::LockPoisoned)
    }
}

/// Open index handles keyed by (base directory, index name).
///
/// Lookups and first opens happen under one mutex, so each path is opened
/// at most once per registry. Later lookups must resolve to the same
/// fields as the first one.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    entries: Mutex<HashMap<(PathBuf, String), Arc<RegistryEntry>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared entry for `options`, opening the index on first use.
    pub fn entry(&self, options: &IndexOptions) -> Result<Arc<RegistryEntry>> {
        let key = (options.base.clone(), options.index_name.clone());
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned)?;
        if let Some(entry) = entries.get(&key) {
            if entry.index.schema().fields() != options.schema.fields() {
                return Err(Error::Config(format!(
                    "index class {} declares fields that differ from the \
                     ones index '{}' was opened with",
                    options.qualified_name(),
                    options.index_name
                )));
            }
            return Ok(Arc::clone(entry));
        }

        let index = SearchIndex::open(
            &options.index_dir(),
            Arc::clone(&options.schema),
        )?;
        let entry = Arc::new(RegistryEntry {
            index,
            lock: Mutex::new(()),
        });
        entries.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A manager holding its index open for the registry's lifetime.
///
/// Each write takes the entry's lock for the whole writer lifetime,
/// commit included: Tantivy refuses a second writer while one is alive.
#[derive(Debug, Clone)]
pub struct BlockingManager {
    options: Arc<IndexOptions>,
    entry: Arc<RegistryEntry>,
    writer_memory: usize,
}

impl BlockingManager {
    pub fn new(
        options: Arc<IndexOptions>,
        registry: &IndexRegistry,
        writer_memory: usize,
    ) -> Result<Self> {
        let entry = registry.entry(&options)?;
        Ok(Self {
            options,
            entry,
            writer_memory,
        })
    }

    fn write<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&SearchIndex, &IndexWriter) -> Result<()>,
    {
        let _guard = self.entry.lock()?;
        let index = &self.entry.index;
        let writer = index.writer(self.writer_memory)?;
        f(index, &writer)?;
        index.commit(writer)
    }
}

impl Actions for BlockingManager {
    fn options(&self) -> &IndexOptions {
        &self.options
    }

    fn add(&self, doc: &Document) -> Result<()> {
        self.write(|index, writer| index.add_document(writer, doc))
    }

    fn bulk_add<'a, I>(&self, docs: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        self.write(|index, writer| {
            for doc in docs {
                index.add_document(writer, doc)?;
            }
            Ok(())
        })
    }

    fn merge(&self, doc: &Document) -> Result<()> {
        self.write(|index, writer| index.update_document(writer, doc))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let pk = primary_key(&self.options)?;
        self.write(|index, writer| index.delete_term(writer, pk, key))
    }

    fn delete_when(&self, field: &str, value: &str) -> Result<()> {
        self.write(|index, writer| index.delete_term(writer, field, value))
    }

    fn read_limited<F, R>(
        &self,
        fieldnames: &[&str],
        query: &str,
        limit: usize,
        callback: F,
    ) -> Result<R>
    where
        F: FnOnce(Hits<'_>) -> R,
    {
        self.entry.index.search(fieldnames, query, limit, callback)
    }

    fn size(&self) -> Result<u64> {
        self.entry.index.num_docs()
    }

    fn clear(&self) -> Result<()> {
        self.write(|_, writer| {
            writer.delete_all_documents()?;
            Ok(())
        })
    }

    fn optimize(&self) -> Result<()> {
        let _guard = self.entry.lock()?;
        let index = &self.entry.index;
        index.optimize(index.writer(self.writer_memory)?)
    }
}
