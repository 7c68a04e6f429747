use crate::{
    encoding::Builder,
    error::{ZedError, ZedResult},
    types::{Field, Type, TypeContext},
    value::Value,
};

#[derive(Debug, Clone)]
enum Node {
    Leaf(Value),
    Tree(RecordTree),
}

/// Leaf paths and their types in field order. Trees with equal shapes build
/// records of the same type.
pub type RecordShape = Vec<(Vec<String>, Type)>;

/// Builds nested records from `(path, value)` pairs.
///
/// Fields appear in the order their first component was inserted, so
/// inserting `a.x`, `b`, `a.y` yields `{a:{x,y},b}`.
#[derive(Debug, Clone, Default)]
pub struct RecordTree {
    nodes: Vec<(String, Node)>,
}

impl RecordTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Insert `value` at `path`. With `overwrite` unset, inserting twice at
    /// the same leaf, or below an existing leaf, is an error.
    pub fn insert<S: AsRef<str>>(&mut self, path: &[S], value: Value, overwrite: bool) -> ZedResult<()> {
        let Some((head, rest)) = path.split_first() else {
            return Err(ZedError::BadValue("cannot insert at an empty path".into()));
        };
        let head = head.as_ref();
        let pos = self.nodes.iter().position(|(name, _)| name == head);
        if rest.is_empty() {
            match pos {
                Some(i) if overwrite => self.nodes[i].1 = Node::Leaf(value),
                Some(_) => {
                    return Err(ZedError::DuplicateField {
                        name: head.to_string(),
                    });
                }
                None => self.nodes.push((head.to_string(), Node::Leaf(value))),
            }
            return Ok(());
        }
        let i = match pos {
            Some(i) => i,
            None => {
                self.nodes.push((head.to_string(), Node::Tree(RecordTree::new())));
                self.nodes.len() - 1
            }
        };
        if let Node::Leaf(_) = self.nodes[i].1 {
            if !overwrite {
                return Err(ZedError::BadValue(format!(
                    "field '{head}' is not a record"
                )));
            }
            self.nodes[i].1 = Node::Tree(RecordTree::new());
        }
        match &mut self.nodes[i].1 {
            Node::Tree(tree) => tree.insert(rest, value, overwrite),
            Node::Leaf(_) => Ok(()),
        }
    }

    pub fn shape(&self) -> RecordShape {
        let mut out = Vec::new();
        self.collect_shape(&mut Vec::new(), &mut out);
        out
    }

    fn collect_shape(&self, prefix: &mut Vec<String>, out: &mut RecordShape) {
        for (name, node) in &self.nodes {
            prefix.push(name.clone());
            match node {
                Node::Leaf(v) => out.push((prefix.clone(), v.ty().clone())),
                Node::Tree(tree) => tree.collect_shape(prefix, out),
            }
            prefix.pop();
        }
    }

    /// Body of the record [`RecordTree::build`] would produce, without
    /// interning any type. Callers that already know the resulting type use
    /// this for every value after the first.
    pub fn body(&self) -> ZedResult<Vec<u8>> {
        let mut b = Builder::new();
        for (_, node) in &self.nodes {
            match node {
                Node::Leaf(v) => b.append(v.bytes(), v.ty().is_container()),
                Node::Tree(tree) => b.append_container(Some(&tree.body()?)),
            }
        }
        b.finish()
    }

    /// Build the record value, interning every record type involved.
    pub fn build(&self, ctx: &TypeContext) -> ZedResult<Value> {
        let mut fields = Vec::with_capacity(self.nodes.len());
        let mut b = Builder::new();
        for (name, node) in &self.nodes {
            let v = match node {
                Node::Leaf(v) => v.clone(),
                Node::Tree(tree) => tree.build(ctx)?,
            };
            b.append(v.bytes(), v.ty().is_container());
            fields.push(Field::new(name.clone(), v.ty().clone()));
        }
        let ty = ctx.lookup_type_record(fields)?;
        Ok(Value::new(ty, Some(b.finish()?)))
    }
}
