use strum::EnumIs;
use thiserror::Error;

#[derive(Debug, Error, EnumIs)]
pub enum ZedError {
    #[error("unterminated container: builder closed with {depth} open container(s)")]
    Unterminated { depth: usize },

    #[error("end_container called without a matching begin_container")]
    Unbalanced,

    #[error("primitive operation applied to a container body")]
    NotPrimitive,

    #[error("container operation applied to a primitive body")]
    NotContainer,

    #[error("record body has more elements than its type has fields ({fields})")]
    ExtraField { fields: usize },

    #[error("duplicate field name '{name}' in record type")]
    DuplicateField { name: String },

    #[error("unknown type ID {0}")]
    UnknownTypeId(u32),

    #[error("malformed type value: {0}")]
    MalformedTypeValue(String),

    #[error("malformed encoded bytes: {0}")]
    MalformedBytes(&'static str),

    #[error("incompatible types {lhs} and {rhs}")]
    IncompatibleTypes { lhs: String, rhs: String },

    #[error("integer overflow: uint64 value too large for int64")]
    Overflow,

    #[error("bad value: {0}")]
    BadValue(String),

    #[error("ZSON syntax error: {0}")]
    ZsonSyntax(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file '{file}': {source}")]
    ConfigParse {
        source: toml::de::Error,
        file: String,
    },

    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type ZedResult<T> = Result<T, ZedError>;
