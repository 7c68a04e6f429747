use strum::EnumIs;
use thiserror::Error;
use zedcore::error::ZedError;

/// Errors raised while assembling an expression tree.
///
/// Evaluation itself never fails: runtime problems are reported as error
/// values.
#[derive(Debug, Error, EnumIs)]
pub enum ExprError {
    #[error("no such function: {0}")]
    NoSuchFunction(String),

    #[error("too few arguments to {name}: expected at least {min}, got {got}")]
    TooFewArgs { name: String, min: usize, got: usize },

    #[error("too many arguments to {name}: expected at most {max}, got {got}")]
    TooManyArgs { name: String, max: usize, got: usize },

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("invalid regular expression: {0}")]
    BadRegexp(#[from] regex::Error),

    #[error(transparent)]
    Zed(#[from] ZedError),
}

pub type ExprResult<T> = Result<T, ExprError>;
