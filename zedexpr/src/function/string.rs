//! String functions.
use parking_lot::Mutex;
use regex::Regex;
use zedcore::{
    types::{PrimitiveId, Type, TypeDef},
    value::{Value, construct::array_of},
};

use crate::{
    expr::{EvalContext, Expr, Search},
    function::{Function, fail, fail_on, string_arg},
};

/// Apply `f` to a string argument; null strings stay null.
fn map_string(ectx: &EvalContext, name: &str, v: &Value, f: impl FnOnce(&str) -> String) -> Value {
    match string_arg(v) {
        Some(Some(s)) => Value::string(&f(&s)),
        Some(None) => Value::null_of(Type::string()),
        None => fail_on(ectx, name, "string arg required", v),
    }
}

pub fn lower(ectx: &mut EvalContext, args: &[Value]) -> Value {
    map_string(ectx, "lower", &args[0], str::to_lowercase)
}

pub fn upper(ectx: &mut EvalContext, args: &[Value]) -> Value {
    map_string(ectx, "upper", &args[0], str::to_uppercase)
}

pub fn trim(ectx: &mut EvalContext, args: &[Value]) -> Value {
    map_string(ectx, "trim", &args[0], |s| s.trim().to_string())
}

pub fn replace(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let (Some(s), Some(old), Some(new)) = (
        string_arg(&args[0]),
        string_arg(&args[1]),
        string_arg(&args[2]),
    ) else {
        return fail(ectx, "replace", "string arg required");
    };
    let Some(s) = s else {
        return Value::null_of(Type::string());
    };
    match (old, new) {
        (Some(old), Some(new)) => Value::string(&s.replace(&old, &new)),
        _ => fail(ectx, "replace", "an input arg is null"),
    }
}

pub fn rune_len(ectx: &mut EvalContext, args: &[Value]) -> Value {
    match string_arg(&args[0]) {
        Some(s) => Value::int64(s.map_or(0, |s| s.chars().count() as i64)),
        None => fail_on(ectx, "rune_len", "string arg required", &args[0]),
    }
}

fn string_array(ectx: &EvalContext, name: &str, parts: impl Iterator<Item = String>) -> Value {
    let values: Vec<Value> = parts.map(|s| Value::string(&s)).collect();
    if values.is_empty() {
        return Value::new(ectx.zctx().lookup_type_array(Type::string()), Some(Vec::new()));
    }
    array_of(ectx.zctx(), &values).unwrap_or_else(|e| fail(ectx, name, e))
}

pub fn split(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let (Some(s), Some(sep)) = (string_arg(&args[0]), string_arg(&args[1])) else {
        return fail(ectx, "split", "string args required");
    };
    let (Some(s), Some(sep)) = (s, sep) else {
        return Value::null_of(ectx.zctx().lookup_type_array(Type::string()));
    };
    string_array(ectx, "split", s.split(sep.as_str()).map(str::to_string))
}

pub fn join(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let arr = args[0].under();
    if !matches!(arr.ty().under().def(), TypeDef::Array(t) if t.is(PrimitiveId::String)) {
        return fail_on(ectx, "join", "array of string args required", &args[0]);
    }
    let sep = match args.get(1).map(string_arg) {
        None => String::new(),
        Some(Some(sep)) => sep.unwrap_or_default(),
        Some(None) => return fail_on(ectx, "join", "separator must be string", &args[1]),
    };
    match arr.elements() {
        Ok(elems) => {
            let parts: Vec<&str> = elems.iter().map(Value::as_str).collect();
            Value::string(&parts.join(&sep))
        }
        Err(e) => fail(ectx, "join", e),
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = diag + usize::from(ca != *cb);
            diag = row[j + 1];
            row[j + 1] = sub.min(row[j] + 1).min(diag + 1);
        }
    }
    row[b.len()]
}

pub fn levenshtein(ectx: &mut EvalContext, args: &[Value]) -> Value {
    for v in &args[..2] {
        if string_arg(v).is_none() {
            return fail_on(ectx, "levenshtein", "string args required", v);
        }
    }
    let a = args[0].under();
    let b = args[1].under();
    Value::int64(edit_distance(a.as_str(), b.as_str()) as i64)
}

/// Compiled regular expression of the most recent pattern.
#[derive(Debug, Default)]
struct RegexCache(Mutex<Option<(String, Regex)>>);

impl RegexCache {
    fn get(&self, pattern: &str) -> Result<Regex, regex::Error> {
        let mut cached = self.0.lock();
        if let Some((p, re)) = cached.as_ref()
            && p == pattern
        {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern)?;
        *cached = Some((pattern.to_string(), re.clone()));
        Ok(re)
    }
}

/// `regexp(re, s)`: the match of `re` in `s` followed by its capture groups,
/// or a null array when there is no match.
#[derive(Debug, Default)]
pub struct Regexp {
    cache: RegexCache,
}

impl Function for Regexp {
    fn call(&self, ectx: &mut EvalContext, args: &[Value]) -> Value {
        let (Some(Some(pattern)), Some(s)) = (string_arg(&args[0]), string_arg(&args[1])) else {
            return fail(ectx, "regexp", "string args required");
        };
        let re = match self.cache.get(&pattern) {
            Ok(re) => re,
            Err(e) => return fail(ectx, "regexp", e),
        };
        let null = || Value::null_of(ectx.zctx().lookup_type_array(Type::string()));
        let Some(s) = s else { return null() };
        match re.captures(&s) {
            Some(caps) => string_array(
                ectx,
                "regexp",
                caps.iter()
                    .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string())),
            ),
            None => null(),
        }
    }
}

/// `regexp_replace(s, re, new)`, with `$1` / `${name}` expansion in `new`.
#[derive(Debug, Default)]
pub struct RegexpReplace {
    cache: RegexCache,
}

impl Function for RegexpReplace {
    fn call(&self, ectx: &mut EvalContext, args: &[Value]) -> Value {
        let (Some(s), Some(Some(pattern)), Some(Some(new))) = (
            string_arg(&args[0]),
            string_arg(&args[1]),
            string_arg(&args[2]),
        ) else {
            return fail(ectx, "regexp_replace", "string args required");
        };
        let re = match self.cache.get(&pattern) {
            Ok(re) => re,
            Err(e) => return fail(ectx, "regexp_replace", e),
        };
        match s {
            Some(s) => Value::string(&re.replace_all(&s, new.as_str())),
            None => Value::null_of(Type::string()),
        }
    }
}

/// `grep(pattern, v)`: case-insensitive search for `pattern` in the strings
/// and field names of `v`.
#[derive(Debug, Default)]
pub struct Grep {
    search: Mutex<Option<(String, Search)>>,
}

impl Function for Grep {
    fn call(&self, ectx: &mut EvalContext, args: &[Value]) -> Value {
        let Some(Some(pattern)) = string_arg(&args[0]) else {
            return fail_on(ectx, "grep", "pattern must be a string", &args[0]);
        };
        let mut search = self.search.lock();
        if search.as_ref().is_none_or(|(p, _)| *p != pattern) {
            let s = Search::text(&pattern, Expr::This);
            *search = Some((pattern, s));
        }
        let found = search.as_ref().is_some_and(|(_, s)| s.matches(&args[1]));
        Value::bool(found)
    }
}

#[cfg(test)]
mod tests {
    use super::edit_distance;
    use crate::{expr::testing::ectx, function::testing::call};

    #[test]
    fn case_and_trim() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "lower", &["\"HeLLo\""]), "\"hello\"");
        assert_eq!(call(&mut ectx, "upper", &["\"HeLLo\""]), "\"HELLO\"");
        assert_eq!(call(&mut ectx, "trim", &["\"  x \""]), "\"x\"");
        assert_eq!(call(&mut ectx, "lower", &["null(string)"]), "null(string)");
        assert!(call(&mut ectx, "lower", &["1"]).contains("string arg required"));
    }

    #[test]
    fn replace_split_join() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "replace", &["\"a-b-c\"", "\"-\"", "\"+\""]), "\"a+b+c\"");
        assert_eq!(call(&mut ectx, "split", &["\"a,b\"", "\",\""]), r#"["a","b"]"#);
        assert_eq!(call(&mut ectx, "join", &[r#"["a","b"]"#, "\"-\""]), "\"a-b\"");
        assert_eq!(call(&mut ectx, "join", &[r#"["a","b"]"#]), "\"ab\"");
        assert!(call(&mut ectx, "join", &["[1,2]"]).starts_with("error("));
        assert_eq!(call(&mut ectx, "rune_len", &["\"héllo\""]), "5");
    }

    #[test]
    fn distances() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "levenshtein", &["\"flaw\"", "\"lawn\""]), "2");
    }

    #[test]
    fn regular_expressions() {
        let mut ectx = ectx();
        assert_eq!(
            call(&mut ectx, "regexp", &[r#""(\\w+)@(\\w+)""#, "\"joe@example\""]),
            r#"["joe@example","joe","example"]"#
        );
        assert_eq!(call(&mut ectx, "regexp", &["\"z+\"", "\"abc\""]), "null([string])");
        assert_eq!(
            call(&mut ectx, "regexp_replace", &["\"ab12cd\"", "\"[0-9]+\"", "\"#\""]),
            "\"ab#cd\""
        );
        assert!(call(&mut ectx, "regexp", &["\"(\"", "\"x\""]).starts_with("error("));
    }

    #[test]
    fn grep_searches_values_and_names() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "grep", &["\"ERR\"", r#"{msg:"an error"}"#]), "true");
        assert_eq!(call(&mut ectx, "grep", &["\"msg\"", r#"{msg:"x"}"#]), "true");
        assert_eq!(call(&mut ectx, "grep", &["\"nope\"", r#"{msg:"x"}"#]), "false");
    }
}
