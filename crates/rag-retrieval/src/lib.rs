//! Historical-document retrieval: turns financial timelines into short
//! natural-language documents and ranks them against a query with TF-IDF.

pub mod cache;
pub mod document;
pub mod error;
pub mod index;
pub mod synthesizer;
pub mod tokenizer;

pub use cache::{snapshot_version, IndexCache, DEFAULT_CACHE_TTL_SECS};
pub use document::{
    Document, DocumentCorpus, DocumentFacts, DocumentKind, DocumentMetadata, GrowthOutlook,
    TrendDirection,
};
pub use error::{RetrievalError, RetrievalResult};
pub use index::{RetrievalConfig, RetrievalHits, RetrievalIndex, ScoredDocument};
pub use synthesizer::DocumentSynthesizer;
pub use tokenizer::Tokenizer;
