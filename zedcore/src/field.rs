use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ZedError, ZedResult};

/// A dotted path of record field names, e.g. `id.src`. The empty path
/// denotes the value itself (`this`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path(pub Vec<String>);

impl Path {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Path(names.into_iter().map(Into::into).collect())
    }

    pub fn this() -> Self {
        Path(Vec::new())
    }

    pub fn is_this(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Everything but the leaf.
    pub fn parent(&self) -> Path {
        Path(self.0[..self.0.len().saturating_sub(1)].to_vec())
    }

    pub fn has_prefix(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Whether one path is a prefix of the other.
    pub fn overlaps(&self, other: &Path) -> bool {
        self.has_prefix(other) || other.has_prefix(self)
    }

    pub fn child(&self, name: impl Into<String>) -> Path {
        let mut names = self.0.clone();
        names.push(name.into());
        Path(names)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("this");
        }
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for Path {
    type Err = ZedError;

    fn from_str(s: &str) -> ZedResult<Self> {
        if s.is_empty() || s == "this" {
            return Ok(Path::this());
        }
        let names: Vec<String> = s.split('.').map(str::to_string).collect();
        if names.iter().any(String::is_empty) {
            return Err(ZedError::BadValue(format!("invalid field path '{s}'")));
        }
        Ok(Path(names))
    }
}

impl TryFrom<String> for Path {
    type Error = ZedError;

    fn try_from(s: String) -> ZedResult<Self> {
        s.parse()
    }
}

impl From<Path> for String {
    fn from(p: Path) -> String {
        p.to_string()
    }
}

impl From<&str> for Path {
    /// Malformed input becomes a single-name path.
    fn from(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| Path(vec![s.to_string()]))
    }
}
