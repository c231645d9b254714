use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{
    Mutex,
    PoisonError,
    RwLock,
    RwLockReadGuard,
    RwLockWriteGuard,
};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tantivy::{
    DocAddress,
    IndexReader,
    IndexWriter,
    ReloadPolicy,
    TantivyDocument,
    Term,
    collector::{Count, TopDocs},
    query::{Query as TantivyQuery, TermQuery},
    schema::*,
    snippet::SnippetGenerator,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::index::{DocumentSource, Index, IndexStats, IndexStatus};
use crate::options::{FindOpts, SortDirection, SortField};
use crate::results::{Results, SearchResult, Snippet};
use crate::translate::{Translator, meta_entry};

/// Memory budget handed to the tantivy writer.
pub const WRITER_MEMORY_BUDGET: usize = 15_000_000;

const SNIPPET_MAX_CHARS: usize = 160;

/// Lower-cased words without stemming.
const RAW_TOKENIZER: &str = "raw_lower";

/// Field names used in the schema.
pub mod fields {
    pub const PATH: &str = "path";
    pub const PATH_LC: &str = "path_lc";
    pub const TITLE: &str = "title";
    pub const LEAD: &str = "lead";
    pub const BODY: &str = "body";
    pub const TITLE_RAW: &str = "title_raw";
    pub const LEAD_RAW: &str = "lead_raw";
    pub const BODY_RAW: &str = "body_raw";
    pub const TAGS: &str = "tags";
    pub const META: &str = "meta";
    pub const METADATA_JSON: &str = "metadata_json";
    pub const CREATED: &str = "created";
    pub const MODIFIED: &str = "modified";
    pub const CHECKSUM: &str = "checksum";
    pub const PRESENT: &str = "present";
}

/// Resolved field handles for the schema.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SchemaFields {
    pub path: Field,
    pub path_lc: Field,
    pub title: Field,
    pub lead: Field,
    pub body: Field,
    pub title_raw: Field,
    pub lead_raw: Field,
    pub body_raw: Field,
    pub tags: Field,
    pub meta: Field,
    pub metadata_json: Field,
    pub created: Field,
    pub modified: Field,
    pub checksum: Field,
    pub present: Field,
}

impl SchemaFields {
    fn from_schema(schema: &Schema) -> Result<Self> {
        let f = |name: &str| schema.get_field(name);
        Ok(Self {
            path: f(fields::PATH)?,
            path_lc: f(fields::PATH_LC)?,
            title: f(fields::TITLE)?,
            lead: f(fields::LEAD)?,
            body: f(fields::BODY)?,
            title_raw: f(fields::TITLE_RAW)?,
            lead_raw: f(fields::LEAD_RAW)?,
            body_raw: f(fields::BODY_RAW)?,
            tags: f(fields::TAGS)?,
            meta: f(fields::META)?,
            metadata_json: f(fields::METADATA_JSON)?,
            created: f(fields::CREATED)?,
            modified: f(fields::MODIFIED)?,
            checksum: f(fields::CHECKSUM)?,
            present: f(fields::PRESENT)?,
        })
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::PATH, STRING | STORED);
    builder.add_text_field(fields::PATH_LC, STRING);

    let text_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("en_stem")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    builder.add_text_field(fields::TITLE, text_opts.clone());
    builder.add_text_field(fields::LEAD, text_opts.clone());
    builder.add_text_field(fields::BODY, text_opts);

    // Unstemmed copies for wildcard matching.
    let raw_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(RAW_TOKENIZER)
            .set_index_option(IndexRecordOption::Basic),
    );
    builder.add_text_field(fields::TITLE_RAW, raw_opts.clone());
    builder.add_text_field(fields::LEAD_RAW, raw_opts.clone());
    builder.add_text_field(fields::BODY_RAW, raw_opts);

    builder.add_text_field(fields::TAGS, STRING | STORED);
    builder.add_text_field(fields::META, STRING);
    builder.add_text_field(fields::METADATA_JSON, STORED);

    let date_opts = DateOptions::default()
        .set_indexed()
        .set_stored()
        .set_fast();
    builder.add_date_field(fields::CREATED, date_opts.clone());
    builder.add_date_field(fields::MODIFIED, date_opts);

    builder.add_text_field(fields::CHECKSUM, STRING | STORED);
    builder.add_text_field(fields::PRESENT, STRING);

    builder.build()
}

fn register_tokenizers(index: &tantivy::Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);

    let raw = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(RAW_TOKENIZER, raw);
}

/// The open tantivy handles. Dropped on close.
struct Backend {
    index: tantivy::Index,
    reader: IndexReader,
    // Created by the first write; holds the directory's writer lock.
    writer: Option<IndexWriter>,
    fields: SchemaFields,
}

impl Backend {
    fn writer(&mut self) -> Result<&mut IndexWriter> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            // One indexing thread keeps documents in insertion order.
            None => self
                .index
                .writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?,
        };
        Ok(self.writer.insert(writer))
    }
}

#[derive(Debug, Default)]
struct State {
    status: IndexStatus,
    last_indexed: Option<DateTime<Utc>>,
}

/// [`Index`] backed by a tantivy index, on disk or in memory.
///
/// Reads share the backend lock, writes hold it exclusively and commit
/// before returning.
pub struct TantivyIndex {
    backend: RwLock<Option<Backend>>,
    // Kept outside the backend lock so stats can report a reindex that is
    // still reading its source.
    state: Mutex<State>,
    dir: Option<PathBuf>,
    source: Option<Box<dyn DocumentSource>>,
}

impl TantivyIndex {
    /// Open or create an index in the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)?;
        let exists = tantivy::Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if exists {
            tantivy::Index::open(mmap_dir)?
        } else {
            tantivy::Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )?
        };
        tracing::debug!(dir = %dir.display(), "opened index");
        Self::from_index(index, Some(dir.to_path_buf()))
    }

    /// Create an in-memory index (for tests and one-shot use).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(tantivy::Index::create_in_ram(build_schema()), None)
    }

    fn from_index(
        index: tantivy::Index,
        dir: Option<PathBuf>,
    ) -> Result<Self> {
        register_tokenizers(&index);
        let fields = SchemaFields::from_schema(&index.schema())?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            backend: RwLock::new(Some(Backend {
                index,
                reader,
                writer: None,
                fields,
            })),
            state: Mutex::new(State {
                status: IndexStatus::Ready,
                last_indexed: None,
            }),
            dir,
            source: None,
        })
    }

    /// The source [`Index::reindex`] rebuilds from.
    pub fn with_source(
        mut self,
        source: impl DocumentSource + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<Backend>>> {
        self.backend
            .read()
            .map_err(|_| Error::IndexCorrupted("index lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<Backend>>> {
        self.backend
            .write()
            .map_err(|_| Error::IndexCorrupted("index lock poisoned".into()))
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: IndexStatus) {
        self.state().status = status;
    }

    fn search(
        backend: &Backend,
        opts: &FindOpts,
        cancel: &CancelToken,
    ) -> Result<Results> {
        let started = Instant::now();
        let f = &backend.fields;
        let query = Translator::new(&backend.index, f, Utc::now())
            .find_opts(opts)?;
        let searcher = backend.reader.searcher();
        let limit = opts.effective_limit();

        let (page, total) = match (opts.sort.field, opts.sort.direction) {
            (SortField::Relevance, SortDirection::Desc) => {
                let collector = (
                    TopDocs::with_limit(limit).and_offset(opts.offset),
                    Count,
                );
                let (top, total) = searcher.search(&*query, &collector)?;
                let mut page = Vec::with_capacity(top.len());
                for (score, address) in top {
                    cancel.check()?;
                    page.push((score, load(backend, address)?));
                }
                (page, total)
            }
            (field, direction) => {
                let everything = usize::try_from(searcher.num_docs())
                    .unwrap_or(usize::MAX)
                    .max(1);
                let hits = searcher
                    .search(&*query, &TopDocs::with_limit(everything))?;
                let total = hits.len();
                let mut all = Vec::with_capacity(total);
                for (score, address) in hits {
                    cancel.check()?;
                    all.push((score, load(backend, address)?));
                }
                all.sort_by(|a, b| compare(a, b, field, direction));
                let page =
                    all.into_iter().skip(opts.offset).take(limit).collect();
                (page, total)
            }
        };

        let snippets = snippet_generator(backend, &*query)?;
        let items = page
            .into_iter()
            .map(|(score, document)| SearchResult {
                snippets: body_snippet(&snippets, &document),
                document,
                score,
            })
            .collect();

        Ok(Results {
            items,
            total: total as u64,
            query: opts.clone(),
            elapsed: started.elapsed(),
        })
    }
}

impl Index for TantivyIndex {
    fn add(&self, doc: Document, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        let path = doc.path.clone();
        let run = || -> Result<()> {
            let mut guard = self.write()?;
            let backend = guard.as_mut().ok_or(Error::IndexClosed)?;
            let f = backend.fields;
            let writer = backend.writer()?;
            writer.delete_term(Term::from_field_text(f.path, &doc.path));
            writer.add_document(to_tantivy(&f, &doc)?)?;
            writer.commit()?;
            backend.reader.reload()?;
            Ok(())
        };
        run().map_err(|e| Error::during("add", path, e))
    }

    fn remove(&self, path: &str, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        let run = || -> Result<()> {
            let mut guard = self.write()?;
            let backend = guard.as_mut().ok_or(Error::IndexClosed)?;
            let f = backend.fields;
            let writer = backend.writer()?;
            writer.delete_term(Term::from_field_text(f.path, path));
            writer.commit()?;
            backend.reader.reload()?;
            Ok(())
        };
        run().map_err(|e| Error::during("remove", path, e))
    }

    fn find(&self, opts: &FindOpts, cancel: &CancelToken) -> Result<Results> {
        cancel.check()?;
        let guard = self.read()?;
        let backend = guard.as_ref().ok_or(Error::IndexClosed)?;
        let results = Self::search(backend, opts, cancel)
            .map_err(|e| Error::during("find", "", e))?;
        tracing::debug!(
            total = results.total,
            returned = results.items.len(),
            elapsed_ms = results.elapsed.as_millis() as u64,
            "find"
        );
        Ok(results)
    }

    fn find_by_path(
        &self,
        path: &str,
        cancel: &CancelToken,
    ) -> Result<Document> {
        cancel.check()?;
        let guard = self.read()?;
        let backend = guard.as_ref().ok_or(Error::IndexClosed)?;
        let query = TermQuery::new(
            Term::from_field_text(backend.fields.path, path),
            IndexRecordOption::Basic,
        );
        let searcher = backend.reader.searcher();
        let top = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(|e| Error::during("find_by_path", path, e.into()))?;
        match top.first() {
            Some((_, address)) => load(backend, *address)
                .map_err(|e| Error::during("find_by_path", path, e)),
            None => Err(Error::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn count(&self, opts: &FindOpts, cancel: &CancelToken) -> Result<u64> {
        cancel.check()?;
        let guard = self.read()?;
        let backend = guard.as_ref().ok_or(Error::IndexClosed)?;
        let searcher = backend.reader.searcher();
        if opts.is_empty() {
            return Ok(searcher.num_docs());
        }
        let query =
            Translator::new(&backend.index, &backend.fields, Utc::now())
                .find_opts(opts)?;
        let total = searcher
            .search(&*query, &Count)
            .map_err(|e| Error::during("count", "", e.into()))?;
        Ok(total as u64)
    }

    fn reindex(&self, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        let source = self.source.as_ref().ok_or_else(|| {
            Error::Config("no document source configured for reindex".into())
        })?;
        if self.read()?.is_none() {
            return Err(Error::IndexClosed);
        }

        let started = Instant::now();
        self.set_status(IndexStatus::Indexing);
        tracing::info!("reindexing");

        let result = source.load(cancel).and_then(|docs| {
            let mut guard = self.write()?;
            let backend = guard.as_mut().ok_or(Error::IndexClosed)?;
            let written = rebuild(backend, &docs, cancel);
            if written.is_err() {
                // Keep the previous commit intact.
                if let Some(writer) = backend.writer.as_mut() {
                    let _ = writer.rollback();
                }
            }
            written
        });

        let mut state = self.state();
        match &result {
            Ok(count) => {
                state.status = IndexStatus::Ready;
                state.last_indexed = Some(Utc::now());
                tracing::info!(
                    documents = count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "reindex complete"
                );
            }
            Err(Error::Cancelled) => state.status = IndexStatus::Ready,
            Err(Error::IndexClosed) => state.status = IndexStatus::Unopened,
            Err(e) => {
                state.status = IndexStatus::Error;
                tracing::warn!(error = %e, "reindex failed");
            }
        }
        drop(state);
        result
            .map(|_| ())
            .map_err(|e| Error::during("reindex", "", e))
    }

    fn stats(&self, cancel: &CancelToken) -> Result<IndexStats> {
        cancel.check()?;
        let guard = self.read()?;
        let backend = guard.as_ref().ok_or(Error::IndexClosed)?;
        let document_count = backend.reader.searcher().num_docs();
        let index_size = match &self.dir {
            Some(dir) => dir_size(dir)?,
            None => 0,
        };
        let state = self.state();
        Ok(IndexStats {
            document_count,
            index_size,
            last_indexed: state.last_indexed,
            index_path: self.dir.clone(),
            status: state.status,
        })
    }

    fn close(&self) -> Result<()> {
        let backend = self.write()?.take();
        self.set_status(IndexStatus::Unopened);
        if let Some(writer) = backend.and_then(|b| b.writer) {
            writer.wait_merging_threads()?;
        }
        tracing::debug!("closed index");
        Ok(())
    }
}

impl std::fmt::Debug for TantivyIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyIndex")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

fn rebuild(
    backend: &mut Backend,
    docs: &[Document],
    cancel: &CancelToken,
) -> Result<usize> {
    let f = backend.fields;
    let writer = backend.writer()?;
    writer.delete_all_documents()?;
    for doc in docs {
        cancel.check()?;
        writer.add_document(to_tantivy(&f, doc)?)?;
    }
    writer.commit()?;
    backend.reader.reload()?;
    Ok(docs.len())
}

fn to_tantivy(f: &SchemaFields, doc: &Document) -> Result<TantivyDocument> {
    let mut out = TantivyDocument::default();
    out.add_text(f.path, &doc.path);
    out.add_text(f.path_lc, doc.path.to_lowercase());
    out.add_text(f.title, &doc.title);
    out.add_text(f.lead, &doc.lead);
    out.add_text(f.body, &doc.body);
    out.add_text(f.title_raw, &doc.title);
    out.add_text(f.lead_raw, &doc.lead);
    out.add_text(f.body_raw, &doc.body);
    for tag in &doc.tags {
        out.add_text(f.tags, tag.to_lowercase());
    }
    for key in doc.metadata.keys() {
        for value in doc.metadata_values(key) {
            out.add_text(f.meta, meta_entry(key, &value));
        }
    }
    out.add_text(f.metadata_json, serde_json::to_string(&doc.metadata)?);
    if let Some(created) = doc.created {
        out.add_date(f.created, to_tantivy_date(created));
    }
    if let Some(modified) = doc.modified {
        out.add_date(f.modified, to_tantivy_date(modified));
    }
    out.add_text(f.checksum, &doc.checksum);
    for key in doc.present_fields() {
        out.add_text(f.present, key);
    }
    Ok(out)
}

fn to_tantivy_date(t: DateTime<Utc>) -> tantivy::DateTime {
    tantivy::DateTime::from_timestamp_secs(t.timestamp())
}

fn load(backend: &Backend, address: DocAddress) -> Result<Document> {
    let doc: TantivyDocument = backend.reader.searcher().doc(address)?;
    from_tantivy(&backend.fields, &doc)
}

fn from_tantivy(f: &SchemaFields, doc: &TantivyDocument) -> Result<Document> {
    let metadata_json = extract_text(doc, f.metadata_json);
    let metadata = if metadata_json.is_empty() {
        Default::default()
    } else {
        serde_json::from_str(&metadata_json)?
    };
    Ok(Document {
        path: extract_text(doc, f.path),
        title: extract_text(doc, f.title),
        body: extract_text(doc, f.body),
        lead: extract_text(doc, f.lead),
        tags: doc
            .get_all(f.tags)
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        metadata,
        created: extract_date(doc, f.created),
        modified: extract_date(doc, f.modified),
        checksum: extract_text(doc, f.checksum),
    })
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_date(doc: &TantivyDocument, field: Field) -> Option<DateTime<Utc>> {
    doc.get_first(field)
        .and_then(|v| v.as_datetime())
        .and_then(|t| DateTime::from_timestamp(t.into_timestamp_secs(), 0))
}

fn compare(
    a: &(f32, Document),
    b: &(f32, Document),
    field: SortField,
    direction: SortDirection,
) -> Ordering {
    let primary = match field {
        SortField::Relevance => a.0.total_cmp(&b.0),
        SortField::Created => a.1.created.cmp(&b.1.created),
        SortField::Modified => a.1.modified.cmp(&b.1.modified),
        SortField::Title => {
            a.1.title.to_lowercase().cmp(&b.1.title.to_lowercase())
        }
        SortField::Path => a.1.path.cmp(&b.1.path),
    };
    let primary = match direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| a.1.path.cmp(&b.1.path))
}

fn snippet_generator(
    backend: &Backend,
    query: &dyn TantivyQuery,
) -> Result<SnippetGenerator> {
    let searcher = backend.reader.searcher();
    let mut generator =
        SnippetGenerator::create(&searcher, query, backend.fields.body)?;
    generator.set_max_num_chars(SNIPPET_MAX_CHARS);
    Ok(generator)
}

fn body_snippet(generator: &SnippetGenerator, doc: &Document) -> Vec<Snippet> {
    let snippet = generator.snippet(&doc.body);
    if snippet.fragment().is_empty() || snippet.highlighted().is_empty() {
        return Vec::new();
    }
    vec![Snippet {
        field: fields::BODY.to_string(),
        text: snippet.fragment().to_string(),
        ranges: snippet.highlighted().to_vec(),
    }]
}

fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(dir)? {
        let meta = entry?.metadata()?;
        if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::index::StaticSource;
    use crate::parser::parse;

    fn cancel() -> CancelToken {
        CancelToken::new()
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn index_with(docs: Vec<Document>) -> TantivyIndex {
        let idx = TantivyIndex::open_in_ram().unwrap();
        for doc in docs {
            idx.add(doc, &cancel()).unwrap();
        }
        idx
    }

    fn find_paths(idx: &TantivyIndex, query: &str) -> Vec<String> {
        let opts = FindOpts::new()
            .with_query(parse(query).unwrap())
            .with_sort(SortField::Path, SortDirection::Asc);
        idx.find(&opts, &cancel())
            .unwrap()
            .items
            .into_iter()
            .map(|r| r.document.path)
            .collect()
    }

    #[test]
    fn add_and_find_by_path_round_trips_fields() {
        let doc = Document::new("notes/a.md")
            .with_title("Alpha")
            .with_body("Alpha body text")
            .with_lead("Alpha body text")
            .with_tags(["Work"])
            .with_metadata("status", "todo")
            .with_created(day(2024, 1, 2))
            .with_checksum("abc");
        let idx = index_with(vec![doc.clone()]);

        let found = idx.find_by_path("notes/a.md", &cancel()).unwrap();
        assert_eq!(found.title, "Alpha");
        assert!(found.tags.contains("work"));
        assert_eq!(found.metadata_values("status"), vec!["todo"]);
        assert_eq!(found.created, Some(day(2024, 1, 2)));
        assert_eq!(found.modified, None);
        assert_eq!(found.checksum, "abc");
    }

    #[test]
    fn find_by_path_missing_is_not_found() {
        let idx = index_with(vec![]);
        let err = idx.find_by_path("nope.md", &cancel()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn add_is_an_upsert() {
        let idx = index_with(vec![
            Document::new("a.md").with_title("Old"),
            Document::new("b.md").with_title("Other"),
        ]);
        idx.add(Document::new("a.md").with_title("New"), &cancel())
            .unwrap();
        assert_eq!(idx.count(&FindOpts::new(), &cancel()).unwrap(), 2);
        let found = idx.find_by_path("a.md", &cancel()).unwrap();
        assert_eq!(found.title, "New");
    }

    #[test]
    fn remove_is_idempotent() {
        let idx = index_with(vec![Document::new("a.md")]);
        idx.remove("a.md", &cancel()).unwrap();
        idx.remove("a.md", &cancel()).unwrap();
        assert_eq!(idx.count(&FindOpts::new(), &cancel()).unwrap(), 0);
    }

    #[test]
    fn tag_inclusion_and_exclusion() {
        let idx = index_with(vec![
            Document::new("a.md").with_tags(["work"]),
            Document::new("b.md").with_tags(["work", "archived"]),
            Document::new("c.md").with_tags(["personal"]),
        ]);
        assert_eq!(find_paths(&idx, "tag:work -tag:archived"), vec!["a.md"]);
        assert_eq!(find_paths(&idx, "tag:WORK"), vec!["a.md", "b.md"]);
    }

    #[test]
    fn exclusive_date_bound() {
        let idx = index_with(vec![
            Document::new("a.md").with_created(day(2023, 12, 31)),
            Document::new("b.md").with_created(day(2024, 1, 1)),
            Document::new("c.md").with_created(day(2024, 1, 2)),
        ]);
        assert_eq!(find_paths(&idx, "created:>2024-01-01"), vec!["c.md"]);
        assert_eq!(
            find_paths(&idx, "created:>=2024-01-01"),
            vec!["b.md", "c.md"]
        );
        assert_eq!(find_paths(&idx, "created:2024-01-01"), vec!["b.md"]);
        assert_eq!(
            find_paths(&idx, "created:2023-12-31..2024-01-01"),
            vec!["a.md", "b.md"]
        );
    }

    #[test]
    fn day_bounds_cover_times_within_the_day() {
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0);
        let idx = index_with(vec![
            Document::new("a.md").with_created(at(1, 10).unwrap()),
            Document::new("b.md").with_created(at(2, 0).unwrap()),
            Document::new("c.md").with_created(at(2, 15).unwrap()),
        ]);
        assert_eq!(
            find_paths(&idx, "created:>2024-01-01"),
            vec!["b.md", "c.md"]
        );
        assert_eq!(find_paths(&idx, "created:<=2024-01-01"), vec!["a.md"]);
        assert_eq!(find_paths(&idx, "created:<2024-01-02"), vec!["a.md"]);
        assert_eq!(
            find_paths(&idx, "created:>=2024-01-02"),
            vec!["b.md", "c.md"]
        );
        assert_eq!(
            find_paths(&idx, "created:>2024-01-02T00:00:00Z"),
            vec!["c.md"]
        );
    }

    #[test]
    fn title_hits_outrank_body_hits() {
        let idx = index_with(vec![
            Document::new("body.md")
                .with_title("Notes")
                .with_body("rust rust rust rust rust rust"),
            Document::new("title.md")
                .with_title("Rust")
                .with_body("unrelated words here"),
        ]);
        let opts = FindOpts::new().with_query(parse("rust").unwrap());
        let results = idx.find(&opts, &cancel()).unwrap();
        assert_eq!(results.paths(), vec!["title.md", "body.md"]);
        assert_eq!(results.total, 2);
    }

    #[test]
    fn or_and_negation() {
        let idx = index_with(vec![
            Document::new("a.md").with_body("apples"),
            Document::new("b.md").with_body("bananas"),
            Document::new("c.md").with_body("cherries"),
        ]);
        assert_eq!(find_paths(&idx, "apples OR bananas"), vec!["a.md", "b.md"]);
        assert_eq!(find_paths(&idx, "-apples"), vec!["b.md", "c.md"]);
    }

    #[test]
    fn exists_and_missing_partition_the_index() {
        let idx = index_with(vec![
            Document::new("a.md").with_metadata("status", "todo"),
            Document::new("b.md"),
            Document::new("c.md").with_metadata("status", "done"),
        ]);
        let has = find_paths(&idx, "has:status");
        let missing = find_paths(&idx, "missing:status");
        assert_eq!(has, vec!["a.md", "c.md"]);
        assert_eq!(missing, vec!["b.md"]);
        assert_eq!(find_paths(&idx, "status:todo"), vec!["a.md"]);
    }

    #[test]
    fn wildcards_and_path_prefixes() {
        let idx = index_with(vec![
            Document::new("Projects/a.md").with_body("javascript tips"),
            Document::new("projects/b.md").with_body("java tips"),
            Document::new("daily/c.md").with_body("python"),
        ]);
        assert_eq!(
            find_paths(&idx, "java*"),
            vec!["Projects/a.md", "projects/b.md"]
        );
        assert_eq!(find_paths(&idx, "*script"), vec!["Projects/a.md"]);
        assert_eq!(
            find_paths(&idx, "path:projects/"),
            vec!["Projects/a.md", "projects/b.md"]
        );
        assert_eq!(find_paths(&idx, "path:daily/*"), vec!["daily/c.md"]);
    }

    #[test]
    fn wildcards_match_unstemmed_words() {
        let idx = index_with(vec![
            Document::new("m.md").with_body("the weekly meeting"),
            Document::new("c.md").with_body("fresh cherries"),
        ]);
        assert_eq!(find_paths(&idx, "meeting*"), vec!["m.md"]);
        assert_eq!(find_paths(&idx, "*ting"), vec!["m.md"]);
        assert_eq!(find_paths(&idx, "*ries"), vec!["c.md"]);
        assert_eq!(find_paths(&idx, "body:cherr*"), vec!["c.md"]);
        // Plain words still match through stemming.
        assert_eq!(find_paths(&idx, "meetings"), vec!["m.md"]);
    }

    #[test]
    fn convenience_filters() {
        let idx = index_with(vec![
            Document::new("work/a.md")
                .with_tags(["work"])
                .with_modified(day(2024, 3, 1)),
            Document::new("work/b.md")
                .with_tags(["work", "draft"])
                .with_modified(day(2024, 5, 1)),
            Document::new("home/c.md").with_tags(["work"]),
        ]);
        let opts = FindOpts::new()
            .with_tags(["work"])
            .excluding_tags(["draft"])
            .with_path("work/");
        assert_eq!(
            idx.find(&opts, &cancel()).unwrap().paths(),
            vec!["work/a.md"]
        );
        let opts = FindOpts::new().with_modified_after(day(2024, 4, 1));
        assert_eq!(
            idx.find(&opts, &cancel()).unwrap().paths(),
            vec!["work/b.md"]
        );
        let opts = FindOpts::new().excluding_paths(["work/"]);
        assert_eq!(idx.count(&opts, &cancel()).unwrap(), 1);
    }

    #[test]
    fn sorting_and_paging() {
        let idx = index_with(vec![
            Document::new("b.md").with_title("Beta"),
            Document::new("a.md").with_title("alpha"),
            Document::new("c.md").with_title("Gamma"),
        ]);
        let opts = FindOpts::new()
            .with_sort(SortField::Title, SortDirection::Desc)
            .with_limit(2)
            .with_offset(1);
        let results = idx.find(&opts, &cancel()).unwrap();
        assert_eq!(results.paths(), vec!["b.md", "a.md"]);
        assert_eq!(results.total, 3);
    }

    #[test]
    fn comparison_on_text_field_is_a_translation_error() {
        let idx = index_with(vec![Document::new("a.md")]);
        let opts = FindOpts::new().with_query(parse("title:>b").unwrap());
        let err = idx.find(&opts, &cancel()).unwrap_err();
        assert!(matches!(err, Error::Translate { .. }));
    }

    #[test]
    fn unresolvable_date_is_a_translation_error() {
        let idx = index_with(vec![]);
        let opts = FindOpts::new().with_query(parse("created:soon").unwrap());
        let err = idx.find(&opts, &cancel()).unwrap_err();
        assert!(err.to_string().contains("created:soon"));
    }

    #[test]
    fn snippets_highlight_body_matches() {
        let idx = index_with(vec![
            Document::new("a.md").with_body("the weekly meeting went well"),
        ]);
        let opts = FindOpts::new().with_query(parse("meeting").unwrap());
        let results = idx.find(&opts, &cancel()).unwrap();
        let snippet = &results.items[0].snippets[0];
        assert_eq!(snippet.field, "body");
        assert!(snippet.text.contains("meeting"));
        assert!(!snippet.ranges.is_empty());
    }

    #[test]
    fn reindex_replaces_contents_from_source() {
        let idx = TantivyIndex::open_in_ram()
            .unwrap()
            .with_source(StaticSource(vec![
                Document::new("x.md"),
                Document::new("y.md"),
            ]));
        idx.add(Document::new("stale.md"), &cancel()).unwrap();
        idx.reindex(&cancel()).unwrap();

        let stats = idx.stats(&cancel()).unwrap();
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.status, IndexStatus::Ready);
        assert!(stats.last_indexed.is_some());
        assert!(idx.find_by_path("stale.md", &cancel()).is_err());
    }

    #[test]
    fn cancelled_reindex_keeps_previous_contents() {
        let idx = TantivyIndex::open_in_ram()
            .unwrap()
            .with_source(StaticSource(vec![Document::new("x.md")]));
        idx.add(Document::new("kept.md"), &cancel()).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(idx.reindex(&token), Err(Error::Cancelled)));
        assert!(idx.find_by_path("kept.md", &cancel()).is_ok());
    }

    #[test]
    fn reindex_without_source_is_a_config_error() {
        let idx = index_with(vec![]);
        let err = idx.reindex(&cancel()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn closed_index_rejects_operations() {
        let idx = index_with(vec![Document::new("a.md")]);
        idx.close().unwrap();
        assert!(matches!(
            idx.find(&FindOpts::new(), &cancel()),
            Err(Error::IndexClosed)
        ));
        assert!(matches!(
            idx.add(Document::new("b.md"), &cancel()),
            Err(Error::IndexClosed)
        ));
        assert!(matches!(idx.stats(&cancel()), Err(Error::IndexClosed)));
        idx.close().unwrap();
    }

    #[test]
    fn on_disk_index_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let idx = TantivyIndex::open(tmp.path()).unwrap();
            idx.add(Document::new("a.md").with_title("Kept"), &cancel())
                .unwrap();
            idx.close().unwrap();
        }
        let idx = TantivyIndex::open(tmp.path()).unwrap();
        let doc = idx.find_by_path("a.md", &cancel()).unwrap();
        assert_eq!(doc.title, "Kept");
        assert!(idx.stats(&cancel()).unwrap().index_size > 0);
    }

    #[test]
    fn readers_share_a_directory_with_a_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = TantivyIndex::open(tmp.path()).unwrap();
        writer
            .add(Document::new("a.md").with_title("Shared"), &cancel())
            .unwrap();

        let first = TantivyIndex::open(tmp.path()).unwrap();
        let second = TantivyIndex::open(tmp.path()).unwrap();
        let doc = first.find_by_path("a.md", &cancel()).unwrap();
        assert_eq!(doc.title, "Shared");
        assert_eq!(second.count(&FindOpts::new(), &cancel()).unwrap(), 1);

        // Only one handle may write at a time.
        let err = first.add(Document::new("b.md"), &cancel()).unwrap_err();
        assert!(err.to_string().contains("locked"), "{err}");

        writer.close().unwrap();
        first.add(Document::new("b.md"), &cancel()).unwrap();
        assert_eq!(first.count(&FindOpts::new(), &cancel()).unwrap(), 2);
    }

    #[test]
    fn concurrent_reads_during_writes() {
        use std::sync::Arc;
        use std::thread;

        let idx = Arc::new(index_with(vec![
            Document::new("seed.md").with_body("shared words"),
        ]));

        let writer = {
            let idx = Arc::clone(&idx);
            thread::spawn(move || -> Result<()> {
                for i in 0..20 {
                    let doc = Document::new(format!("note-{i}.md"))
                        .with_body("shared words");
                    idx.add(doc, &cancel())?;
                }
                // Upserts of paths already present.
                for i in 0..5 {
                    let doc = Document::new(format!("note-{i}.md"))
                        .with_body("shared words again");
                    idx.add(doc, &cancel())?;
                }
                Ok(())
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let idx = Arc::clone(&idx);
                thread::spawn(move || -> Result<()> {
                    let opts =
                        FindOpts::new().with_query(parse("shared").unwrap());
                    for _ in 0..25 {
                        let found = idx.find(&opts, &cancel())?;
                        assert!(found.total >= 1);
                        let total = idx.count(&FindOpts::new(), &cancel())?;
                        assert!((1..=21).contains(&total), "{total}");
                    }
                    Ok(())
                })
            })
            .collect();

        writer.join().unwrap().unwrap();
        for reader in readers {
            reader.join().unwrap().unwrap();
        }
        assert_eq!(idx.count(&FindOpts::new(), &cancel()).unwrap(), 21);
        let again = parse("again").unwrap();
        let opts = FindOpts::new().with_query(again);
        assert_eq!(idx.count(&opts, &cancel()).unwrap(), 5);
    }
}
