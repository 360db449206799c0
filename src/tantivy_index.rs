use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use tantivy::{
    DocAddress,
    Index,
    IndexReader,
    IndexWriter,
    Score,
    Searcher,
    TantivyDocument,
    Term,
    collector::TopDocs,
    directory::MmapDirectory,
    query::{
        BooleanQuery,
        BoostQuery,
        Occur,
        Query,
        QueryParser,
        TermQuery,
    },
    schema::{Field, IndexRecordOption},
};

use crate::{
    document::Document,
    error::{Error, Result},
    fields::FieldKind,
    schema::IndexSchema,
};

/// Maximum hits handed to a read callback unless a limit is given.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

fn open_mmap(dir: &Path) -> Result<MmapDirectory> {
    MmapDirectory::open(dir).map_err(|e| {
        tantivy::TantivyError::SystemError(e.to_string()).into()
    })
}

fn exists(dir: &MmapDirectory) -> Result<bool> {
    Index::exists(dir).map_err(|e| {
        tantivy::TantivyError::SystemError(e.to_string()).into()
    })
}

/// Create the index at `dir` unless one is already there. Returns whether
/// an index was created.
pub fn create_if_missing(dir: &Path, schema: &IndexSchema) -> Result<bool> {
    std::fs::create_dir_all(dir)?;
    let mmap_dir = open_mmap(dir)?;
    if exists(&mmap_dir)? {
        return Ok(false);
    }

    Index::create(
        mmap_dir,
        schema.tantivy_schema().clone(),
        tantivy::IndexSettings::default(),
    )?;
    tracing::info!(
        index = schema.index(),
        path = %dir.display(),
        "created index"
    );
    Ok(true)
}

/// An opened on-disk index bound to its resolved schema.
pub struct SearchIndex {
    dir: PathBuf,
    index: Index,
    reader: IndexReader,
    schema: Arc<IndexSchema>,
}

impl SearchIndex {
    /// Open an existing index. Fails with [`Error::IndexMissing`] when
    /// nothing has been created at `dir`.
    pub fn open(dir: &Path, schema: Arc<IndexSchema>) -> Result<Self> {
        let start = Instant::now();
        if !dir.exists() {
            return Err(Error::IndexMissing(dir.to_path_buf()));
        }
        let mmap_dir = open_mmap(dir)?;
        if !exists(&mmap_dir)? {
            return Err(Error::IndexMissing(dir.to_path_buf()));
        }

        let index = Index::open(mmap_dir)?;
        if index.schema() != *schema.tantivy_schema() {
            tracing::warn!(
                index = schema.index(),
                "on-disk schema differs from the declared one; \
                 using the on-disk schema"
            );
        }
        schema.register_tokenizers(&index)?;
        let reader = index.reader()?;
        tracing::debug!(
            index = schema.index(),
            elapsed = ?start.elapsed(),
            "opened index"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            index,
            reader,
            schema,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Create a writer with the given memory budget (in bytes). Only one
    /// writer may exist per index at a time; a second one fails with
    /// Tantivy's lock error.
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        let start = Instant::now();
        let writer = self.index.writer(memory_budget)?;
        tracing::debug!(
            index = self.schema.index(),
            elapsed = ?start.elapsed(),
            "acquired writer"
        );
        Ok(writer)
    }

    /// Add a document via the given writer.
    pub fn add_document(
        &self,
        writer: &IndexWriter,
        doc: &Document,
    ) -> Result<()> {
        let doc = self.schema.to_tantivy(&self.index.schema(), doc)?;
        writer.add_document(doc)?;
        Ok(())
    }

    /// Replace any document sharing a unique field value with `doc`, or
    /// simply add it when nothing matches.
    pub fn update_document(
        &self,
        writer: &IndexWriter,
        doc: &Document,
    ) -> Result<()> {
        let schema = self.index.schema();
        for name in self.schema.unique_fields() {
            if let Some(value) = doc.get(name) {
                writer.delete_term(self.schema.term(&schema, name, value)?);
            }
        }
        self.add_document(writer, doc)
    }

    /// Delete every document whose `field` holds exactly `value`.
    pub fn delete_term(
        &self,
        writer: &IndexWriter,
        field: &str,
        value: &str,
    ) -> Result<()> {
        let term = self.schema.term(&self.index.schema(), field, value)?;
        writer.delete_term(term);
        Ok(())
    }

    /// Commit pending changes, consuming the writer.
    pub fn commit(&self, mut writer: IndexWriter) -> Result<()> {
        let start = Instant::now();
        writer.commit()?;
        tracing::debug!(
            index = self.schema.index(),
            elapsed = ?start.elapsed(),
            "committed"
        );
        Ok(())
    }

    /// Merge all searchable segments into one and wait for the merge.
    pub fn optimize(&self, mut writer: IndexWriter) -> Result<()> {
        let segments = self.index.searchable_segment_ids()?;
        if segments.len() > 1 {
            writer.merge(&segments).wait()?;
        }
        writer.wait_merging_threads()?;
        tracing::debug!(
            index = self.schema.index(),
            segments = segments.len(),
            "optimized"
        );
        Ok(())
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// Parse `query` leniently against `fieldnames`, collect the top
    /// `limit` hits and hand them to `callback`. The searcher is released
    /// once the callback returns.
    ///
    /// N-gram fields bypass the query parser: each query word is split into
    /// grams by the field's analyzer and a document must hold every gram
    /// of a word to match it.
    pub fn search<F, R>(
        &self,
        fieldnames: &[&str],
        query: &str,
        limit: usize,
        callback: F,
    ) -> Result<R>
    where
        F: FnOnce(Hits<'_>) -> R,
    {
        let schema = self.index.schema();
        let mut parsed_fields = Vec::with_capacity(fieldnames.len());
        let mut gram_fields = Vec::new();
        for name in fieldnames {
            let decl = self.schema.decl(name)?;
            let field = self.schema.field(&schema, name)?;
            if matches!(decl.kind, FieldKind::NGram { .. }) {
                gram_fields.push((field, decl.boost));
            } else {
                parsed_fields.push((field, decl.boost));
            }
        }

        self.reader.reload()?;
        let searcher = self.reader.searcher();
        if limit == 0 {
            return Ok(callback(Hits {
                searcher: &searcher,
                index_schema: &self.schema,
                schema,
                top: Vec::new(),
            }));
        }

        let start = Instant::now();
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        if !parsed_fields.is_empty() {
            clauses.push((Occur::Should, self.parse(&parsed_fields, query)));
        }
        for (field, boost) in gram_fields {
            if let Some(grams) = self.gram_query(field, query)? {
                clauses.push((Occur::Should, boosted(grams, boost)));
            }
        }
        let parsed: Box<dyn Query> = if clauses.len() == 1 {
            clauses.remove(0).1
        } else {
            Box::new(BooleanQuery::new(clauses))
        };
        tracing::debug!(
            index = self.schema.index(),
            elapsed = ?start.elapsed(),
            "parsed query"
        );

        let top = searcher.search(&parsed, &TopDocs::with_limit(limit))?;
        Ok(callback(Hits {
            searcher: &searcher,
            index_schema: &self.schema,
            schema,
            top,
        }))
    }

    fn parse(&self, fields: &[(Field, Score)], query: &str) -> Box<dyn Query> {
        let mut parser = QueryParser::for_index(
            &self.index,
            fields.iter().map(|(field, _)| *field).collect(),
        );
        for (field, boost) in fields {
            if *boost != 1.0 {
                parser.set_field_boost(*field, *boost);
            }
        }
        let (parsed, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::warn!(
                index = self.schema.index(),
                query,
                errors = ?errors,
                "query parsed leniently"
            );
        }
        parsed
    }

    /// Grams of every query word, all required per word. `None` when no
    /// word is long enough to produce a gram.
    fn gram_query(
        &self,
        field: Field,
        query: &str,
    ) -> Result<Option<Box<dyn Query>>> {
        let mut analyzer = self.index.tokenizer_for_field(field)?;
        let mut words: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for word in query.split_whitespace() {
            let mut grams: Vec<(Occur, Box<dyn Query>)> = Vec::new();
            analyzer.token_stream(word).process(&mut |token| {
                let term = Term::from_field_text(field, &token.text);
                let gram =
                    TermQuery::new(term, IndexRecordOption::WithFreqs);
                grams.push((Occur::Must, Box::new(gram)));
            });
            if !grams.is_empty() {
                words.push((Occur::Should, Box::new(BooleanQuery::new(grams))));
            }
        }
        Ok(match words.len() {
            0 => None,
            1 => Some(words.remove(0).1),
            _ => Some(Box::new(BooleanQuery::new(words))),
        })
    }
}

fn boosted(query: Box<dyn Query>, boost: Score) -> Box<dyn Query> {
    if boost == 1.0 {
        query
    } else {
        Box::new(BoostQuery::new(query, boost))
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// Search results, valid only while the read callback runs.
pub struct Hits<'a> {
    searcher: &'a Searcher,
    index_schema: &'a IndexSchema,
    schema: tantivy::schema::Schema,
    top: Vec<(Score, DocAddress)>,
}

impl Hits<'_> {
    pub fn len(&self) -> usize {
        self.top.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_empty()
    }

    /// Load hit `i` (best first).
    pub fn get(&self, i: usize) -> Option<Result<Hit>> {
        self.top
            .get(i)
            .map(|&(score, address)| self.load(score, address))
    }

    /// Load every hit lazily, best first.
    pub fn iter(&self) -> impl Iterator<Item = Result<Hit>> + '_ {
        self.top
            .iter()
            .map(|&(score, address)| self.load(score, address))
    }

    /// Load all hits at once.
    pub fn to_vec(&self) -> Result<Vec<Hit>> {
        self.iter().collect()
    }

    fn load(&self, score: Score, address: DocAddress) -> Result<Hit> {
        let doc: TantivyDocument = self.searcher.doc(address)?;
        let fields = self
            .index_schema
            .fields()
            .iter()
            .filter(|(_, decl)| decl.stored)
            .filter_map(|(name, _)| {
                self.index_schema
                    .render(&self.schema, &doc, name)
                    .map(|value| (name.clone(), value))
            })
            .collect();
        Ok(Hit { score, fields })
    }
}

impl std::fmt::Debug for Hits<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hits").field("len", &self.top.len()).finish()
    }
}

/// One search hit: its score and stored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub score: Score,
    pub fields: Document,
}

impl Hit {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field)
    }
}
