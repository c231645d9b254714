//! notesearch - query parsing, translation and hybrid retrieval for
//! personal markdown notebooks.
//!
//! Notes are indexed with [Tantivy](https://github.com/quickwit-oss/tantivy)
//! and searched through a small query language (`tag:work -archived
//! created:>2024-01-01`). Keyword results can be fused with a semantic
//! backend using reciprocal rank fusion.
//!
//! # Quick start
//!
//! ```no_run
//! use notesearch::{
//!     CancelToken, DataDir, FindOpts, Index, NotebookSource, TantivyIndex,
//! };
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let index = TantivyIndex::open(&data_dir.index_dir().unwrap())
//!     .unwrap()
//!     .with_source(NotebookSource::new("/home/me/notes"));
//! let cancel = CancelToken::new();
//! index.reindex(&cancel).unwrap();
//!
//! let query = notesearch::parse("meeting tag:work").unwrap();
//! let results = index
//!     .find(&FindOpts::new().with_query(query).with_limit(10), &cancel)
//!     .unwrap();
//! for r in &results.items {
//!     println!("{} (score: {:.3})", r.document.path, r.score);
//! }
//! ```

pub mod cancel;
pub mod conditions;
pub mod data_dir;
pub mod dates;
pub mod document;
pub mod error;
pub mod fusion;
pub mod index;
pub mod ingestion;
pub mod matcher;
pub mod options;
pub mod parser;
pub mod query;
pub mod results;
pub mod retrieval;
pub mod semantic;
pub mod tantivy_index;
pub mod text_util;
pub mod translate;
pub mod walker;

pub use cancel::CancelToken;
pub use data_dir::DataDir;
pub use document::Document;
pub use error::{Error, Result};
pub use fusion::{HybridResult, MatchType, merge_hybrid};
pub use index::{DocumentSource, Index, IndexStats, IndexStatus};
pub use ingestion::NotebookSource;
pub use options::{FindOpts, SortDirection, SortField};
pub use parser::{ParseError, Parser, parse};
pub use query::{CompareOp, Expr, Query};
pub use results::{Results, SearchResult};
pub use retrieval::{
    RetrievalMode, Retriever, SearchHit, SearchRequest, SearchResponse,
};
pub use semantic::{NoopSemanticIndex, SemanticIndex, SemanticResult};
pub use tantivy_index::TantivyIndex;
