use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIs, EnumString};

use crate::{
    error::ZedError,
    field::Path,
};

/// Sort direction of a keyed stream.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, EnumIs, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    /// Apply the direction to an ascending comparison result.
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        }
    }
}

/// Direction plus the key paths a stream is sorted by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub order: Order,
    pub keys: Vec<Path>,
}

impl Layout {
    pub fn new(order: Order, keys: Vec<Path>) -> Self {
        Self { order, keys }
    }

    pub fn is_nil(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn primary(&self) -> Option<&Path> {
        self.keys.first()
    }
}

impl fmt::Display for Layout {
    /// `key1,key2:asc`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.keys.iter().map(Path::to_string).collect();
        write!(f, "{}:{}", keys.join(","), self.order)
    }
}

impl FromStr for Layout {
    type Err = ZedError;

    fn from_str(s: &str) -> Result<Self, ZedError> {
        let (keys, order) = match s.rsplit_once(':') {
            Some((keys, order)) => (
                keys,
                order
                    .parse()
                    .map_err(|_| ZedError::BadValue(format!("invalid order '{order}'")))?,
            ),
            None => (s, Order::Asc),
        };
        let keys = keys
            .split(',')
            .filter(|k| !k.trim().is_empty())
            .map(|k| k.trim().parse())
            .collect::<Result<Vec<Path>, _>>()?;
        Ok(Layout { order, keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_text() {
        let l: Layout = "ts,id.src:desc".parse().unwrap();
        assert_eq!(l.order, Order::Desc);
        assert_eq!(l.keys.len(), 2);
        assert_eq!(l.to_string(), "ts,id.src:desc");
        let l: Layout = "k".parse().unwrap();
        assert!(l.order.is_asc());
        assert!("k:sideways".parse::<Layout>().is_err());
    }

    #[test]
    fn apply_direction() {
        assert_eq!(Order::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Order::Asc.apply(Ordering::Less), Ordering::Less);
    }
}
