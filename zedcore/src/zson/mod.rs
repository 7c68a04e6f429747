//! ZSON, the human-readable text form of ZED values.
//!
//! [`format_value`] always works; parsing needs the `chumsky` feature.
pub mod format;

#[cfg(feature = "chumsky")]
pub mod build;
#[cfg(feature = "chumsky")]
pub mod parser;

pub use format::{format_bare, format_value, write_value};

#[cfg(feature = "chumsky")]
mod parse {
    use chumsky::{Parser, error::Rich};

    use super::{build, parser};
    use crate::{
        error::{ZedError, ZedResult},
        types::{Type, TypeContext},
        value::Value,
    };

    fn syntax_error(src: &str, errs: Vec<Rich<'_, char>>) -> ZedError {
        let msg = errs
            .into_iter()
            .map(|e| format!("at offset {}: {} in `{}`", e.span().start, e, src))
            .collect::<Vec<_>>()
            .join("; ");
        ZedError::ZsonSyntax(msg)
    }

    /// Parse one ZSON value, interning its types in `ctx`.
    pub fn parse_value(ctx: &TypeContext, src: &str) -> ZedResult<Value> {
        let ast = parser::value_parser()
            .padded()
            .parse(src)
            .into_result()
            .map_err(|errs| syntax_error(src, errs))?;
        build::build(ctx, &ast)
    }

    /// Parse a ZSON type expression such as `{a:int64,b:[string]}`.
    pub fn parse_type(ctx: &TypeContext, src: &str) -> ZedResult<Type> {
        let ast = parser::type_parser()
            .padded()
            .parse(src)
            .into_result()
            .map_err(|errs| syntax_error(src, errs))?;
        build::resolve_type(ctx, &ast)
    }
}

#[cfg(feature = "chumsky")]
pub use parse::{parse_type, parse_value};
