//! Identifiers and parsers: `ksuid`, `parse_uri` and `parse_zson`.
use std::time::{SystemTime, UNIX_EPOCH};

use zedcore::{
    record::RecordTree,
    types::{PrimitiveId, Type},
    value::{
        Value,
        construct::{array_of, map_of},
    },
    zson,
};

use crate::{
    expr::EvalContext,
    function::{fail, fail_on, string_arg},
};

/// Seconds between the Unix epoch and the KSUID epoch.
const KSUID_EPOCH: u64 = 1_400_000_000;
const KSUID_LEN: usize = 20;
const KSUID_STRING_LEN: usize = 27;
const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A new KSUID: a 32-bit big-endian timestamp followed by 16 random bytes.
pub fn new_ksuid() -> [u8; KSUID_LEN] {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let ts = secs.saturating_sub(KSUID_EPOCH) as u32;
    let payload: [u8; 16] = rand::random();
    let mut id = [0u8; KSUID_LEN];
    id[..4].copy_from_slice(&ts.to_be_bytes());
    id[4..].copy_from_slice(&payload);
    id
}

fn words(id: &[u8; KSUID_LEN]) -> [u32; 5] {
    let mut w = [0u32; 5];
    for (i, chunk) in id.chunks_exact(4).enumerate() {
        w[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    w
}

pub fn encode_ksuid(id: &[u8; KSUID_LEN]) -> String {
    let mut num = words(id);
    let mut out = [b'0'; KSUID_STRING_LEN];
    let mut pos = KSUID_STRING_LEN;
    while pos > 0 && num.iter().any(|w| *w != 0) {
        let mut rem = 0u64;
        for w in num.iter_mut() {
            let acc = (rem << 32) | u64::from(*w);
            *w = (acc / 62) as u32;
            rem = acc % 62;
        }
        pos -= 1;
        out[pos] = BASE62[rem as usize];
    }
    out.iter().map(|b| *b as char).collect()
}

pub fn decode_ksuid(s: &str) -> Option<[u8; KSUID_LEN]> {
    if s.len() != KSUID_STRING_LEN {
        return None;
    }
    let mut num = [0u32; 5];
    for c in s.bytes() {
        let mut carry = BASE62.iter().position(|b| *b == c)? as u64;
        for w in num.iter_mut().rev() {
            let acc = u64::from(*w) * 62 + carry;
            *w = acc as u32;
            carry = acc >> 32;
        }
        if carry != 0 {
            return None;
        }
    }
    let mut id = [0u8; KSUID_LEN];
    for (i, w) in num.iter().enumerate() {
        id[i * 4..i * 4 + 4].copy_from_slice(&w.to_be_bytes());
    }
    Some(id)
}

/// `ksuid()` makes a new id as bytes; `ksuid(b)` encodes bytes as a
/// string and `ksuid(s)` decodes a string back to bytes.
pub fn ksuid(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let Some(arg) = args.first() else {
        return Value::bytes_value(&new_ksuid());
    };
    let u = arg.under();
    match u.ty().primitive_id() {
        Some(PrimitiveId::Bytes) => match <&[u8; KSUID_LEN]>::try_from(u.as_bytes()) {
            Ok(id) => Value::string(&encode_ksuid(id)),
            Err(_) => fail_on(ectx, "ksuid", "bytes arg must be 20 bytes", arg),
        },
        Some(PrimitiveId::String) => match decode_ksuid(u.as_str()) {
            Some(id) => Value::bytes_value(&id),
            None => fail_on(ectx, "ksuid", "malformed ksuid string", arg),
        },
        _ => fail_on(ectx, "ksuid", "argument must a bytes or string type", arg),
    }
}

fn percent_decode(s: &str, plus_as_space: bool) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = s.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

/// Components of a URI reference, split as in RFC 3986.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Uri {
    pub scheme: Option<String>,
    pub opaque: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    /// Query parameters in order of appearance, decoded.
    pub query: Vec<(String, String)>,
    pub fragment: Option<String>,
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

impl Uri {
    pub fn parse(s: &str) -> Result<Uri, String> {
        let mut uri = Uri::default();
        let (rest, fragment) = match s.split_once('#') {
            Some((rest, frag)) => (rest, Some(frag)),
            None => (s, None),
        };
        uri.fragment = fragment
            .and_then(non_empty)
            .map(|f| percent_decode(f, false).ok_or("invalid fragment escape"))
            .transpose()?;
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };
        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = percent_decode(k, true).ok_or("invalid query escape")?;
            let v = percent_decode(v, true).ok_or("invalid query escape")?;
            uri.query.push((k, v));
        }
        let mut rest = rest;
        let scheme_end = rest.find(':').filter(|&i| {
            let scheme = &rest[..i];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        });
        if let Some(i) = scheme_end {
            uri.scheme = Some(rest[..i].to_ascii_lowercase());
            rest = &rest[i + 1..];
            if !rest.starts_with('/') {
                uri.opaque = non_empty(rest).map(str::to_string);
                return Ok(uri);
            }
        }
        if let Some(after) = rest.strip_prefix("//") {
            let end = after.find('/').unwrap_or(after.len());
            uri.parse_authority(&after[..end])?;
            rest = &after[end..];
        }
        uri.path = non_empty(rest)
            .map(|p| percent_decode(p, false).ok_or("invalid path escape"))
            .transpose()?;
        Ok(uri)
    }

    fn parse_authority(&mut self, authority: &str) -> Result<(), String> {
        let hostport = match authority.rsplit_once('@') {
            Some((userinfo, hostport)) => {
                let (user, password) = match userinfo.split_once(':') {
                    Some((u, p)) => (u, Some(p)),
                    None => (userinfo, None),
                };
                self.user = Some(percent_decode(user, false).ok_or("invalid user escape")?);
                self.password = password
                    .map(|p| percent_decode(p, false).ok_or("invalid password escape"))
                    .transpose()?;
                hostport
            }
            None => authority,
        };
        let (host, port) = if let Some(v6) = hostport.strip_prefix('[') {
            let (host, tail) = v6.split_once(']').ok_or("missing ']' in host")?;
            (host, tail.strip_prefix(':'))
        } else {
            match hostport.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (hostport, None),
            }
        };
        self.host = non_empty(host).map(str::to_string);
        self.port = match port.and_then(non_empty) {
            Some(p) => Some(p.parse().map_err(|_| format!("invalid port \"{p}\""))?),
            None => None,
        };
        Ok(())
    }
}

/// `parse_uri(s)`: a record of the components of `s`, with nulls for the
/// parts that are absent.
pub fn parse_uri(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let Some(s) = string_arg(&args[0]) else {
        return fail_on(ectx, "parse_uri", "string argument required", &args[0]);
    };
    let Some(s) = s else {
        return fail_on(ectx, "parse_uri", "non-null string argument required", &args[0]);
    };
    let uri = match Uri::parse(&s) {
        Ok(uri) => uri,
        Err(e) => return fail_on(ectx, "parse_uri", e, &args[0]),
    };
    match uri_record(ectx, uri) {
        Ok(v) => v,
        Err(e) => fail(ectx, "parse_uri", e),
    }
}

fn uri_record(ectx: &EvalContext, uri: Uri) -> zedcore::error::ZedResult<Value> {
    let zctx = ectx.zctx();
    let string = |s: Option<String>| match s {
        Some(s) => Value::string(&s),
        None => Value::null_of(Type::string()),
    };
    let strings = zctx.lookup_type_array(Type::string());
    let query_type = zctx.lookup_type_map(Type::string(), strings.clone());
    let query = if uri.query.is_empty() {
        Value::null_of(query_type)
    } else {
        let mut keys: Vec<String> = Vec::new();
        let mut vals: Vec<Vec<Value>> = Vec::new();
        for (k, v) in uri.query {
            match keys.iter().position(|key| *key == k) {
                Some(i) => vals[i].push(Value::string(&v)),
                None => {
                    keys.push(k);
                    vals.push(vec![Value::string(&v)]);
                }
            }
        }
        let keys: Vec<Value> = keys.iter().map(|k| Value::string(k)).collect();
        let vals = vals
            .iter()
            .map(|vs| array_of(zctx, vs))
            .collect::<zedcore::error::ZedResult<Vec<_>>>()?;
        map_of(zctx, &keys, &vals)?
    };
    let port = match uri.port {
        Some(p) => Value::uint(Type::primitive(PrimitiveId::Uint16), u64::from(p)),
        None => Value::null_of(Type::primitive(PrimitiveId::Uint16)),
    };
    let mut tree = RecordTree::new();
    for (name, v) in [
        ("scheme", string(uri.scheme)),
        ("opaque", string(uri.opaque)),
        ("user", string(uri.user)),
        ("password", string(uri.password)),
        ("host", string(uri.host)),
        ("port", port),
        ("path", string(uri.path)),
        ("query", query),
        ("fragment", string(uri.fragment)),
    ] {
        tree.insert(&[name], v, false)?;
    }
    tree.build(zctx)
}

/// `parse_zson(s)`: the value `s` spells in ZSON.
pub fn parse_zson(ectx: &mut EvalContext, args: &[Value]) -> Value {
    match string_arg(&args[0]) {
        Some(Some(s)) => match zson::parse_value(ectx.zctx(), &s) {
            Ok(v) => v,
            Err(e) => fail_on(ectx, "parse_zson", e, &args[0]),
        },
        Some(None) => Value::null(),
        None => fail_on(ectx, "parse_zson", "string argument required", &args[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::testing::ectx, function::testing::call};

    #[test]
    fn ksuid_strings() {
        let id = new_ksuid();
        let s = encode_ksuid(&id);
        assert_eq!(s.len(), 27);
        assert_eq!(decode_ksuid(&s), Some(id));
        assert_eq!(encode_ksuid(&[0; 20]), "000000000000000000000000000");
        assert_eq!(encode_ksuid(&[0xff; 20]), "aWgEPTl1tmebfsQzFP4bxwgy80V");
        assert_eq!(decode_ksuid("zzzzzzzzzzzzzzzzzzzzzzzzzzz"), None);

        let mut ectx = ectx();
        let text = call(&mut ectx, "ksuid", &["0x0000000000000000000000000000000000000000"]);
        assert_eq!(text, "\"000000000000000000000000000\"");
        assert!(call(&mut ectx, "ksuid", &[]).starts_with("0x"));
        assert!(call(&mut ectx, "ksuid", &["0x01"]).starts_with("error("));
    }

    #[test]
    fn uri_components() {
        let uri = Uri::parse("https://bob:pw@example.com:8443/a%20b?x=1&y=2&x=3#top").unwrap();
        assert_eq!(uri.scheme.as_deref(), Some("https"));
        assert_eq!(uri.user.as_deref(), Some("bob"));
        assert_eq!(uri.password.as_deref(), Some("pw"));
        assert_eq!(uri.host.as_deref(), Some("example.com"));
        assert_eq!(uri.port, Some(8443));
        assert_eq!(uri.path.as_deref(), Some("/a b"));
        assert_eq!(uri.query.len(), 3);
        assert_eq!(uri.fragment.as_deref(), Some("top"));

        let opaque = Uri::parse("mailto:joe@example.com").unwrap();
        assert_eq!(opaque.opaque.as_deref(), Some("joe@example.com"));
        assert_eq!(Uri::parse("http://[::1]:80/").unwrap().host.as_deref(), Some("::1"));
        assert!(Uri::parse("http://h:99999/").is_err());
    }

    #[test]
    fn uri_as_record() {
        let mut ectx = ectx();
        assert_eq!(
            call(&mut ectx, "parse_uri", &["\"http://h:80/p?k=v&k=w\""]),
            "{scheme:\"http\",opaque:null(string),user:null(string),password:null(string),\
             host:\"h\",port:80(uint16),path:\"/p\",query:|{\"k\":[\"v\",\"w\"]}|,fragment:null(string)}"
        );
    }

    #[test]
    fn zson_text() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "parse_zson", &[r#""{a:[1,2]}""#]), "{a:[1,2]}");
        assert!(call(&mut ectx, "parse_zson", &[r#""{a:""#]).starts_with("error("));
    }
}
