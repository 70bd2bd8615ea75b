use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("internal: {0}.")]
    InternalError(#[from] InternalError),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    UserError(#[from] UserError),
}

#[derive(Error, Debug)]
pub enum InternalError {
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error(
        "Invalid value for tokenizerType: `{0}`. \
Expected one of `Splitter`, `Compress` or `CompressNbr`."
    )]
    InvalidTokenizerType(String),
    #[error(
        "Invalid value for comparator: `{0}`. \
Expected one of `Cosine`, `MongeElkan`, `ScoringMatrixStd` or `ScoringMatrixKris`."
    )]
    InvalidComparator(String),
    #[error("The input reference file `{path}` cannot be read: {error}")]
    InputFileUnreadable { path: String, error: io::Error },
}

impl Error {
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::UserError(_))
    }
}
