//! `grok(pattern, s[, definitions])`: match `s` against a pattern written
//! with `%{NAME}` and `%{NAME:field}` references and return the captured
//! fields as a record of strings.
//!
//! `definitions` adds or overrides named patterns, one `NAME regex` per line.
use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use zedcore::{record::RecordTree, value::Value};

use crate::{
    expr::EvalContext,
    function::{Function, fail, fail_on, string_arg},
};

/// Nested references deeper than this are taken to be cyclic.
const MAX_EXPANSION_DEPTH: usize = 32;

const BASE_PATTERNS: &str = r#"
USERNAME [a-zA-Z0-9._-]+
USER %{USERNAME}
EMAILLOCALPART [a-zA-Z][a-zA-Z0-9_.+=:-]+
EMAILADDRESS %{EMAILLOCALPART}@%{HOSTNAME}
INT (?:[+-]?(?:[0-9]+))
BASE10NUM [+-]?(?:[0-9]+(?:\.[0-9]+)?|\.[0-9]+)
NUMBER (?:%{BASE10NUM})
BASE16NUM (?:0[xX])?[0-9A-Fa-f]+
POSINT \b(?:[1-9][0-9]*)\b
NONNEGINT \b(?:[0-9]+)\b
WORD \b\w+\b
NOTSPACE \S+
SPACE \s*
DATA .*?
GREEDYDATA .*
QUOTEDSTRING (?:"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')
UUID [A-Fa-f0-9]{8}-(?:[A-Fa-f0-9]{4}-){3}[A-Fa-f0-9]{12}
CISCOMAC (?:(?:[A-Fa-f0-9]{4}\.){2}[A-Fa-f0-9]{4})
WINDOWSMAC (?:(?:[A-Fa-f0-9]{2}-){5}[A-Fa-f0-9]{2})
COMMONMAC (?:(?:[A-Fa-f0-9]{2}:){5}[A-Fa-f0-9]{2})
MAC (?:%{CISCOMAC}|%{WINDOWSMAC}|%{COMMONMAC})
IPV4 (?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)
IPV6 (?:[0-9A-Fa-f]{0,4}:){2,7}(?:[0-9A-Fa-f]{1,4}|%{IPV4})?
IP (?:%{IPV6}|%{IPV4})
HOSTNAME \b(?:[0-9A-Za-z][0-9A-Za-z-]{0,62})(?:\.(?:[0-9A-Za-z][0-9A-Za-z-]{0,62}))*\.?
IPORHOST (?:%{IP}|%{HOSTNAME})
HOSTPORT %{IPORHOST}:%{POSINT}
UNIXPATH (?:/[\w_%!$@:.,+~-]*)+
WINPATH (?:[A-Za-z]+:|\\)(?:\\[^\\?*]*)+
PATH (?:%{UNIXPATH}|%{WINPATH})
URIPROTO [A-Za-z][A-Za-z0-9+\-.]+
MONTHNUM (?:0?[1-9]|1[0-2])
MONTHDAY (?:(?:0[1-9])|(?:[12][0-9])|(?:3[01])|[1-9])
YEAR (?:\d\d){1,2}
HOUR (?:2[0123]|[01]?[0-9])
MINUTE (?:[0-5][0-9])
SECOND (?:(?:[0-5]?[0-9]|60)(?:[:.,][0-9]+)?)
TIME %{HOUR}:%{MINUTE}(?::%{SECOND})?
ISO8601_TIMEZONE (?:Z|[+-]%{HOUR}(?::?%{MINUTE}))
TIMESTAMP_ISO8601 %{YEAR}-%{MONTHNUM}-%{MONTHDAY}[T ]%{HOUR}:?%{MINUTE}(?::?%{SECOND})?%{ISO8601_TIMEZONE}?
DATE_US %{MONTHNUM}[/-]%{MONTHDAY}[/-]%{YEAR}
DATE_EU %{MONTHDAY}[./-]%{MONTHNUM}[./-]%{YEAR}
DATE (?:%{DATE_US}|%{DATE_EU})
LOGLEVEL (?:[Aa]lert|ALERT|[Tt]race|TRACE|[Dd]ebug|DEBUG|[Nn]otice|NOTICE|[Ii]nfo|INFO|[Ww]arn(?:ing)?|WARN(?:ING)?|[Ee]rr(?:or)?|ERR(?:OR)?|[Cc]rit(?:ical)?|CRIT(?:ICAL)?|[Ff]atal|FATAL|[Ss]evere|SEVERE|EMERG(?:ENCY)?|[Ee]merg(?:ency)?)
"#;

static DEFINITION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\s+(.+)$").expect("static regex"));

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\{(\w+)(?::([\w\[\]\.]+))?(?::\w+)?\}").expect("static regex")
});

fn parse_definitions(text: &str, into: &mut HashMap<String, String>) {
    for line in text.lines() {
        if let Some(caps) = DEFINITION.captures(line.trim()) {
            into.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
}

static BASE: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let mut patterns = HashMap::new();
    parse_definitions(BASE_PATTERNS, &mut patterns);
    patterns
});

/// A grok pattern compiled to a regular expression. Capture group `gN`
/// holds field `fields[N]`.
#[derive(Debug, Clone)]
pub struct GrokPattern {
    re: Regex,
    fields: Vec<String>,
}

impl GrokPattern {
    pub fn compile(pattern: &str, definitions: &str) -> Result<Self, String> {
        let mut library = BASE.clone();
        parse_definitions(definitions, &mut library);
        let mut fields = Vec::new();
        let expanded = expand(pattern, &library, &mut fields, 0)?;
        let re = Regex::new(&expanded).map_err(|e| e.to_string())?;
        Ok(Self { re, fields })
    }

    /// Captured fields in pattern order, or `None` if `s` does not match.
    /// Optional groups that did not participate capture "".
    pub fn captures<'a>(&'a self, s: &'a str) -> Option<Vec<(&'a str, &'a str)>> {
        let caps = self.re.captures(s)?;
        Some(
            self.fields
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let text = caps.name(&format!("g{i}")).map_or("", |m| m.as_str());
                    (name.as_str(), text)
                })
                .collect(),
        )
    }
}

fn expand(
    pattern: &str,
    library: &HashMap<String, String>,
    fields: &mut Vec<String>,
    depth: usize,
) -> Result<String, String> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err("pattern references are nested too deeply".to_string());
    }
    let mut out = String::with_capacity(pattern.len());
    let mut last = 0;
    for caps in REFERENCE.captures_iter(pattern) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&pattern[last..whole.start()]);
        last = whole.end();
        let name = &caps[1];
        let body = library
            .get(name)
            .ok_or_else(|| format!("the '{name}' pattern doesn't exist"))?;
        // Fields named inside referenced patterns are not captured.
        let inner = expand(body, library, &mut Vec::new(), depth + 1)?;
        match caps.get(2) {
            Some(field) => {
                out.push_str(&format!("(?P<g{}>{inner})", fields.len()));
                fields.push(field.as_str().to_string());
            }
            None => out.push_str(&format!("(?:{inner})")),
        }
    }
    out.push_str(&pattern[last..]);
    Ok(out)
}

#[derive(Debug, Default)]
pub struct Grok {
    cache: Mutex<Option<((String, String), GrokPattern)>>,
}

impl Grok {
    fn pattern(&self, pattern: String, definitions: String) -> Result<GrokPattern, String> {
        let mut cache = self.cache.lock();
        let key = (pattern, definitions);
        if let Some((k, p)) = cache.as_ref()
            && *k == key
        {
            return Ok(p.clone());
        }
        let p = GrokPattern::compile(&key.0, &key.1)?;
        *cache = Some((key, p.clone()));
        Ok(p)
    }
}

impl Function for Grok {
    fn call(&self, ectx: &mut EvalContext, args: &[Value]) -> Value {
        let Some(Some(pattern)) = string_arg(&args[0]) else {
            return fail_on(ectx, "grok", "pattern argument must be a string", &args[0]);
        };
        let definitions = match args.get(2).map(string_arg) {
            None => String::new(),
            Some(Some(defs)) => defs.unwrap_or_default(),
            Some(None) => return fail_on(ectx, "grok", "definitions argument must be a string", &args[2]),
        };
        let Some(input) = string_arg(&args[1]) else {
            return fail_on(ectx, "grok", "input argument must be a string", &args[1]);
        };
        let grok = match self.pattern(pattern, definitions) {
            Ok(p) => p,
            Err(e) => return fail(ectx, "grok", e),
        };
        let input = input.unwrap_or_default();
        let Some(found) = grok.captures(&input) else {
            return fail_on(ectx, "grok", "value does not match pattern", &args[1]);
        };
        let mut tree = RecordTree::new();
        for (name, text) in found {
            let path: Vec<&str> = name.split('.').collect();
            if let Err(e) = tree.insert(&path, Value::string(text), true) {
                return fail(ectx, "grok", e);
            }
        }
        tree.build(ectx.zctx())
            .unwrap_or_else(|e| fail(ectx, "grok", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::testing::ectx, function::testing::call};

    #[test]
    fn base_patterns_compile() {
        for name in BASE.keys() {
            let p = GrokPattern::compile(&format!("%{{{name}}}"), "");
            assert!(p.is_ok(), "{name}: {:?}", p.err());
        }
    }

    #[test]
    fn captures_fields_in_order() {
        let p = GrokPattern::compile("%{IP:client} %{WORD:method} %{NUMBER:bytes}", "").unwrap();
        assert_eq!(
            p.captures("55.3.244.1 GET 15824").unwrap(),
            vec![("client", "55.3.244.1"), ("method", "GET"), ("bytes", "15824")]
        );
        assert!(p.captures("nothing here").is_none());
        assert!(GrokPattern::compile("%{NOPE:x}", "").unwrap_err().contains("NOPE"));
        assert!(GrokPattern::compile("%{LOOP}", "LOOP a%{LOOP}").is_err());
    }

    #[test]
    fn grok_records() {
        let mut ectx = ectx();
        assert_eq!(
            call(
                &mut ectx,
                "grok",
                &[
                    r#""%{TIMESTAMP_ISO8601:ts} %{LOGLEVEL:level} %{GREEDYDATA:msg}""#,
                    r#""2021-03-04T05:06:07Z WARN disk almost full""#,
                ]
            ),
            r#"{ts:"2021-03-04T05:06:07Z",level:"WARN",msg:"disk almost full"}"#
        );
        assert_eq!(
            call(
                &mut ectx,
                "grok",
                &[r#""%{PAIR:kv}""#, r#""a=1""#, r#""PAIR %{WORD}=%{INT}""#]
            ),
            r#"{kv:"a=1"}"#
        );
        assert!(call(&mut ectx, "grok", &[r#""%{INT:n}""#, r#""abc""#]).contains("does not match"));
    }
}
