//! Grammar of the ZSON text form.
//!
//! Parsing produces an [`Ast`]; turning it into a [`Value`](crate::value::Value)
//! needs a type context and happens in [`build`](super::build). Bare words
//! (`1`, `-2.5`, `10.0.0.1`, `1h`, `2021-01-01T00:00:00Z`, `0xbeef`, `true`,
//! `null`, ...) are kept as text here and classified when the value is built,
//! since the same characters can spell several primitive kinds.
use chumsky::{prelude::*, text::digits};

/// Syntax tree of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeAst {
    /// A primitive type name or a reference to a named type.
    Name(String),
    Record(Vec<(String, TypeAst)>),
    Array(Box<TypeAst>),
    Set(Box<TypeAst>),
    Map(Box<TypeAst>, Box<TypeAst>),
    Union(Vec<TypeAst>),
    Enum(Vec<String>),
    Error(Box<TypeAst>),
    Named(String, Box<TypeAst>),
}

/// Syntax tree of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Word(String),
    Str(String),
    TypeVal(TypeAst),
    Enum(String),
    Record(Vec<(String, Ast)>),
    Array(Vec<Ast>),
    Set(Vec<Ast>),
    Map(Vec<(Ast, Ast)>),
    Error(Box<Ast>),
    Decorated(Box<Ast>, TypeAst),
}

pub fn string_parser<'src>()
-> impl Parser<'src, &'src str, String, extra::Err<Rich<'src, char>>> + Clone {
    let unicode = just('u').ignore_then(digits(16).exactly(4).to_slice().try_map(
        |digits: &str, span| {
            u32::from_str_radix(digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Rich::custom(span, format!("invalid unicode escape: \\u{digits}")))
        },
    ));
    let escape = just('\\').ignore_then(choice((
        just('"'),
        just('\\'),
        just('/'),
        just('b').to('\u{8}'),
        just('f').to('\u{c}'),
        just('n').to('\n'),
        just('r').to('\r'),
        just('t').to('\t'),
        unicode,
    )));
    none_of("\"\\")
        .or(escape)
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .labelled("string")
}

/// Field names, symbols and type names: identifiers or quoted strings.
pub fn name_parser<'src>()
-> impl Parser<'src, &'src str, String, extra::Err<Rich<'src, char>>> + Clone {
    let ident = any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_' || *c == '$')
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || *c == '_' || *c == '$')
                .repeated(),
        )
        .to_slice()
        .map(str::to_string);
    choice((ident, string_parser())).labelled("name")
}

fn word_parser<'src>(
    allow_colon: bool,
) -> impl Parser<'src, &'src str, String, extra::Err<Rich<'src, char>>> + Clone {
    any()
        .filter(move |c: &char| {
            c.is_alphanumeric() || matches!(c, '.' | '-' | '+' | '/' | '_') || (allow_colon && *c == ':')
        })
        .repeated()
        .at_least(1)
        .to_slice()
        .map(str::to_string)
        .labelled("primitive literal")
}

pub fn type_parser<'src>()
-> impl Parser<'src, &'src str, TypeAst, extra::Err<Rich<'src, char>>> + Clone {
    recursive(|tree| {
        let field = name_parser()
            .padded()
            .then_ignore(just(':'))
            .then(tree.clone().padded());

        let record = field
            .separated_by(just(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just('{'), just('}'))
            .map(TypeAst::Record)
            .labelled("record type");

        let array = tree
            .clone()
            .padded()
            .delimited_by(just('['), just(']'))
            .map(|t| TypeAst::Array(Box::new(t)))
            .labelled("array type");

        let set = tree
            .clone()
            .padded()
            .delimited_by(just("|["), just("]|"))
            .map(|t| TypeAst::Set(Box::new(t)))
            .labelled("set type");

        let map = tree
            .clone()
            .padded()
            .then_ignore(just(':'))
            .then(tree.clone().padded())
            .delimited_by(just("|{"), just("}|"))
            .map(|(k, v)| TypeAst::Map(Box::new(k), Box::new(v)))
            .labelled("map type");

        let union = tree
            .clone()
            .padded()
            .separated_by(just(','))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just('('), just(')'))
            .map(TypeAst::Union)
            .labelled("union type");

        let enumeration = just("enum")
            .ignore_then(
                name_parser()
                    .padded()
                    .separated_by(just(','))
                    .collect::<Vec<_>>()
                    .delimited_by(just('(').padded(), just(')')),
            )
            .map(TypeAst::Enum)
            .labelled("enum type");

        let error = just("error")
            .ignore_then(tree.clone().padded().delimited_by(just('(').padded(), just(')')))
            .map(|t| TypeAst::Error(Box::new(t)))
            .labelled("error type");

        let named = name_parser()
            .then(just('=').padded().ignore_then(tree.clone()).or_not())
            .map(|(name, def)| match def {
                Some(def) => TypeAst::Named(name, Box::new(def)),
                None => TypeAst::Name(name),
            });

        choice((record, array, set, map, union, enumeration, error, named)).labelled("type")
    })
}

pub fn value_parser<'src>()
-> impl Parser<'src, &'src str, Ast, extra::Err<Rich<'src, char>>> + Clone {
    recursive(|value| {
        let field = name_parser()
            .padded()
            .then_ignore(just(':'))
            .then(value.clone().padded());

        let record = field
            .separated_by(just(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just('{'), just('}'))
            .map(Ast::Record)
            .labelled("record");

        let elems = value
            .clone()
            .padded()
            .separated_by(just(','))
            .allow_trailing()
            .collect::<Vec<_>>();

        let array = elems
            .clone()
            .delimited_by(just('[').padded(), just(']'))
            .map(Ast::Array)
            .labelled("array");

        let set = elems
            .delimited_by(just("|[").padded(), just("]|"))
            .map(Ast::Set)
            .labelled("set");

        // Map keys are read without ':' so the key/value separator is
        // unambiguous; quote or decorate keys that need one.
        let map_key = recursive_key(value.clone());
        let entry = map_key
            .padded()
            .then_ignore(just(':'))
            .then(value.clone().padded());
        let map = entry
            .separated_by(just(','))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just("|{").padded(), just("}|"))
            .map(Ast::Map)
            .labelled("map");

        let type_value = type_parser()
            .padded()
            .delimited_by(just('<'), just('>'))
            .map(Ast::TypeVal)
            .labelled("type value");

        let enumeration = just('%').ignore_then(name_parser()).map(Ast::Enum);

        let error = just("error")
            .ignore_then(value.clone().padded().delimited_by(just('(').padded(), just(')')))
            .map(|v| Ast::Error(Box::new(v)))
            .labelled("error");

        let base = choice((
            record,
            set,
            map,
            array,
            type_value,
            enumeration,
            error,
            string_parser().map(Ast::Str),
            word_parser(true).map(Ast::Word),
        ));

        decorated(base)
    })
}

fn decorated<'src>(
    base: impl Parser<'src, &'src str, Ast, extra::Err<Rich<'src, char>>> + Clone,
) -> impl Parser<'src, &'src str, Ast, extra::Err<Rich<'src, char>>> + Clone {
    let decorator = type_parser()
        .padded()
        .delimited_by(just('('), just(')'))
        .labelled("type decorator");
    base.then(decorator.repeated().collect::<Vec<_>>())
        .map(|(v, decorators)| {
            decorators
                .into_iter()
                .fold(v, |v, t| Ast::Decorated(Box::new(v), t))
        })
}

fn recursive_key<'src>(
    value: impl Parser<'src, &'src str, Ast, extra::Err<Rich<'src, char>>> + Clone,
) -> impl Parser<'src, &'src str, Ast, extra::Err<Rich<'src, char>>> + Clone {
    let plain_word = word_parser(false).map(Ast::Word);
    let word_key = decorated(plain_word);
    // Anything that does not start as a bare word (strings, containers, ...)
    // uses the full value grammar.
    choice((word_key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Ast {
        value_parser().padded().parse(src).into_result().unwrap()
    }

    fn parse_ty(src: &str) -> TypeAst {
        type_parser().padded().parse(src).into_result().unwrap()
    }

    #[test]
    fn records_and_words() {
        assert_eq!(
            parse(r#"{a:1,"b c":"x",t:2021-01-01T00:00:00Z}"#),
            Ast::Record(vec![
                ("a".into(), Ast::Word("1".into())),
                ("b c".into(), Ast::Str("x".into())),
                ("t".into(), Ast::Word("2021-01-01T00:00:00Z".into())),
            ])
        );
    }

    #[test]
    fn decorators_chain() {
        assert_eq!(
            parse("1(int32)((int32,string))"),
            Ast::Decorated(
                Box::new(Ast::Decorated(
                    Box::new(Ast::Word("1".into())),
                    TypeAst::Name("int32".into())
                )),
                TypeAst::Union(vec![
                    TypeAst::Name("int32".into()),
                    TypeAst::Name("string".into())
                ])
            )
        );
    }

    #[test]
    fn containers() {
        assert_eq!(
            parse("|[1, 2]|"),
            Ast::Set(vec![Ast::Word("1".into()), Ast::Word("2".into())])
        );
        assert_eq!(
            parse(r#"|{"a":[1],b:[]}|"#),
            Ast::Map(vec![
                (Ast::Str("a".into()), Ast::Array(vec![Ast::Word("1".into())])),
                (Ast::Word("b".into()), Ast::Array(vec![])),
            ])
        );
        assert_eq!(parse(r#"error("x")"#), Ast::Error(Box::new(Ast::Str("x".into()))));
        assert_eq!(parse("%red"), Ast::Enum("red".into()));
    }

    #[test]
    fn types() {
        assert_eq!(
            parse_ty("port=uint16"),
            TypeAst::Named("port".into(), Box::new(TypeAst::Name("uint16".into())))
        );
        assert_eq!(
            parse_ty("|{string:[ip]}|"),
            TypeAst::Map(
                Box::new(TypeAst::Name("string".into())),
                Box::new(TypeAst::Array(Box::new(TypeAst::Name("ip".into()))))
            )
        );
        assert_eq!(
            parse_ty("enum(a, b)"),
            TypeAst::Enum(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            parse("<error(string)>"),
            Ast::TypeVal(TypeAst::Error(Box::new(TypeAst::Name("string".into()))))
        );
    }

    #[test]
    fn escapes() {
        assert_eq!(parse(r#""a\"bA\n""#), Ast::Str("a\"bA\n".into()));
        assert!(value_parser().parse("{a:}").into_result().is_err());
    }
}
