//! Index managers: the write/read facade bound to a resolved index.

use std::{path::PathBuf, sync::Arc};

use crate::{
    document::Document,
    error::{Error, Result},
    model::Record,
    options::IndexOptions,
    tantivy_index::{DEFAULT_SEARCH_LIMIT, Hits, SearchIndex},
};

/// Operations every manager offers.
pub trait Actions {
    /// The resolved options this manager writes against.
    fn options(&self) -> &IndexOptions;

    /// Write one document. Keys outside the schema are ignored.
    fn add(&self, doc: &Document) -> Result<()>;

    /// Write several documents in one commit.
    fn bulk_add<'a, I>(&self, docs: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Document>;

    /// Replace documents matching any unique field of `doc`, or add `doc`
    /// when nothing matches.
    fn merge(&self, doc: &Document) -> Result<()>;

    /// Delete the document whose primary key is `key`.
    fn delete(&self, key: &str) -> Result<()>;

    /// Delete every document whose `field` holds exactly `value`.
    fn delete_when(&self, field: &str, value: &str) -> Result<()>;

    /// Search `fieldnames` for `query`, passing at most `limit` hits to
    /// `callback`.
    fn read_limited<F, R>(
        &self,
        fieldnames: &[&str],
        query: &str,
        limit: usize,
        callback: F,
    ) -> Result<R>
    where
        F: FnOnce(Hits<'_>) -> R;

    /// Search `fieldnames` for `query` with the default hit limit.
    fn read<F, R>(
        &self,
        fieldnames: &[&str],
        query: &str,
        callback: F,
    ) -> Result<R>
    where
        F: FnOnce(Hits<'_>) -> R,
    {
        self.read_limited(fieldnames, query, DEFAULT_SEARCH_LIMIT, callback)
    }

    /// Number of live documents.
    fn size(&self) -> Result<u64>;

    /// Empty the index.
    fn clear(&self) -> Result<()>;

    /// Merge the index down to a single segment.
    fn optimize(&self) -> Result<()>;

    /// Index model records in one commit, reading the schema fields from
    /// each.
    fn load<'a, R, I>(&self, records: I) -> Result<usize>
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let options = self.options();
        let docs: Vec<Document> = records
            .into_iter()
            .map(|record| options.document(record))
            .collect();
        self.bulk_add(&docs)?;
        tracing::info!(
            index = %options.index_name,
            count = docs.len(),
            "loaded records"
        );
        Ok(docs.len())
    }
}

/// Name of the primary key field, for key-based deletes.
pub(crate) fn primary_key(options: &IndexOptions) -> Result<&str> {
    options
        .pk_field
        .as_deref()
        .ok_or_else(|| Error::NoPrimaryKey(options.index_name.clone()))
}

/// A manager where every operation is self contained: it opens the index,
/// acts, commits and closes.
///
/// Writers from several threads are not coordinated. Tantivy allows a
/// single writer per index, so concurrent writes fail with its lock error.
#[derive(Debug, Clone)]
pub struct Manager {
    options: Arc<IndexOptions>,
    dir: PathBuf,
    writer_memory: usize,
}

impl Manager {
    pub fn new(options: Arc<IndexOptions>, writer_memory: usize) -> Self {
        let dir = options.index_dir();
        Self {
            options,
            dir,
            writer_memory,
        }
    }

    fn open(&self) -> Result<SearchIndex> {
        SearchIndex::open(&self.dir, Arc::clone(&self.options.schema))
    }

    fn write<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&SearchIndex, &tantivy::IndexWriter) -> Result<()>,
    {
        let index = self.open()?;
        let writer = index.writer(self.writer_memory)?;
        f(&index, &writer)?;
        index.commit(writer)
    }
}

impl Actions for Manager {
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
        self.open()?.search(fieldnames, query, limit, callback)
    }

    fn size(&self) -> Result<u64> {
        self.open()?.num_docs()
    }

    fn clear(&self) -> Result<()> {
        self.write(|_, writer| {
            writer.delete_all_documents()?;
            Ok(())
        })
    }

    fn optimize(&self) -> Result<()> {
        let index = self.open()?;
        let writer = index.writer(self.writer_memory)?;
        index.optimize(writer)
    }
}
