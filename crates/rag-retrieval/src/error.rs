use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("No financial data available")]
    EmptyCorpus,

    #[error("Vectorization failed: empty vocabulary, documents contain only stop words")]
    EmptyVocabulary,
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
