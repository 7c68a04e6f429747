use crate::{
    encoding::{Iter, integer::decode_counted_uvarint},
    error::{ZedError, ZedResult},
    types::{Type, TypeDef},
};

/// What a [`walk`] visitor wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkSignal {
    /// Descend into the children of the current node.
    Continue,
    /// Do not descend into the current node, but keep walking its siblings.
    Skip,
    /// Abandon the walk.
    Stop,
}

/// Depth-first pre-order traversal of a value.
///
/// `visit` sees every node, including containers, before their children.
/// Union nodes are visited with the union type and then descended into with
/// the selected member type. Returns `true` if the visitor stopped the walk.
pub fn walk<F>(ty: &Type, body: Option<&[u8]>, visit: &mut F) -> ZedResult<bool>
where
    F: FnMut(&Type, Option<&[u8]>) -> ZedResult<WalkSignal>,
{
    match visit(ty, body)? {
        WalkSignal::Stop => return Ok(true),
        WalkSignal::Skip => return Ok(false),
        WalkSignal::Continue => {}
    }
    let Some(body) = body else {
        return Ok(false);
    };
    match ty.under().def() {
        TypeDef::Record(fields) => {
            let mut it = Iter::new(body);
            for f in fields {
                let Some(elem) = it.next() else { break };
                if walk(&f.ty, elem?.body, visit)? {
                    return Ok(true);
                }
            }
            if !it.done() {
                return Err(ZedError::ExtraField {
                    fields: fields.len(),
                });
            }
        }
        TypeDef::Array(inner) | TypeDef::Set(inner) => {
            for elem in Iter::new(body) {
                if walk(inner, elem?.body, visit)? {
                    return Ok(true);
                }
            }
        }
        TypeDef::Map(kt, vt) => {
            for (i, elem) in Iter::new(body).enumerate() {
                let t = if i % 2 == 0 { kt } else { vt };
                if walk(t, elem?.body, visit)? {
                    return Ok(true);
                }
            }
        }
        TypeDef::Union(members) => {
            let mut it = Iter::new(body);
            let (Some(tag), Some(payload)) = (it.next(), it.next()) else {
                return Err(ZedError::MalformedBytes("union body needs a tag and a payload"));
            };
            let tag = decode_counted_uvarint(tag?.body.unwrap_or_default()) as usize;
            let member = members
                .get(tag)
                .ok_or(ZedError::MalformedBytes("union tag out of range"))?;
            return walk(member, payload?.body, visit);
        }
        TypeDef::Error(inner) => {
            return walk(inner, Some(body), visit);
        }
        _ => {}
    }
    Ok(false)
}
