use strum::EnumIs;
use thiserror::Error;
use zedcore::error::ZedError;

#[derive(Debug, Error, EnumIs)]
pub enum IndexError {
    #[error("microindex exceeds {max} levels: use a larger frame threshold")]
    TooManyLevels { max: usize },

    #[error("frame of {size} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    #[error("not a microindex: {0}")]
    NotIndex(String),

    #[error("microindex trailer not found")]
    TrailerNotFound,

    #[error("microindex version {found} found while expecting version {expected}")]
    BadVersion { found: i64, expected: i64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("bad key: {0}")]
    BadKey(String),

    #[error("malformed stream: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zed(#[from] ZedError),
}

pub type IndexResult<T> = Result<T, IndexError>;
