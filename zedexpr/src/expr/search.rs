use std::collections::HashMap;

use ipnetwork::IpNetwork;
use parking_lot::Mutex;
use zedcore::{
    types::{PrimitiveId, Type, TypeDef},
    value::{Value, WalkSignal},
};

use crate::expr::{EvalContext, Expr, logic::values_equal};

/// What a [`Search`] looks for.
#[derive(Debug)]
pub enum Needle {
    /// Case-insensitive substring of any string value or record field name.
    Text(String),
    /// Any value equal to the want under comparison rules.
    Typed(Value),
    /// Any ip inside the network, or a net equal to it.
    Cidr(IpNetwork),
}

/// Search of every value reachable from a target.
#[derive(Debug)]
pub struct Search {
    needle: Needle,
    target: Box<Expr>,
    /// Per record type, whether one of its field names matches a text needle.
    names: Mutex<HashMap<Type, bool>>,
}

impl Search {
    pub fn text(pattern: &str, target: Expr) -> Self {
        Self::new(Needle::Text(pattern.to_lowercase()), target)
    }

    pub fn typed(want: Value, target: Expr) -> Self {
        Self::new(Needle::Typed(want), target)
    }

    pub fn cidr(net: IpNetwork, target: Expr) -> Self {
        Self::new(Needle::Cidr(net), target)
    }

    fn new(needle: Needle, target: Expr) -> Self {
        Self {
            needle,
            target: Box::new(target),
            names: Mutex::new(HashMap::new()),
        }
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        let v = self.target.eval(ectx, this);
        if v.is_error() {
            return Value::bool(false);
        }
        Value::bool(self.matches(&v))
    }

    /// Walk `v` looking for the needle. Malformed bodies end the search
    /// without a match.
    pub fn matches(&self, v: &Value) -> bool {
        let mut found = false;
        let result = v.walk(&mut |ty, body| {
            if self.visit(ty, body) {
                found = true;
                return Ok(WalkSignal::Stop);
            }
            Ok(WalkSignal::Continue)
        });
        result.is_ok() && found
    }

    fn visit(&self, ty: &Type, body: Option<&[u8]>) -> bool {
        match &self.needle {
            Needle::Text(pattern) => match ty.under().def() {
                TypeDef::Record(fields) => *self
                    .names
                    .lock()
                    .entry(ty.clone())
                    .or_insert_with(|| fields.iter().any(|f| f.name.to_lowercase().contains(pattern))),
                TypeDef::Primitive(PrimitiveId::String) => body.is_some_and(|b| {
                    String::from_utf8_lossy(b).to_lowercase().contains(pattern.as_str())
                }),
                _ => false,
            },
            Needle::Typed(want) => {
                !ty.is_union() && values_equal(&Value::from_slice(ty.clone(), body), want)
            }
            Needle::Cidr(net) => {
                let v = Value::from_slice(ty.under().clone(), body);
                match ty.under().primitive_id() {
                    Some(PrimitiveId::Ip) => v.as_ip().is_some_and(|ip| net.contains(ip)),
                    Some(PrimitiveId::Net) => v.as_net() == Some(*net),
                    _ => false,
                }
            }
        }
    }
}
