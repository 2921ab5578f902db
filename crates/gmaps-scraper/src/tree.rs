//! Tagged-union view of the positional JSON that Maps embeds in its pages.
//!
//! The embedded data has no schema: a field is identified only by its
//! position in a stack of nested arrays, and any level may be missing, `null`,
//! or a different type in another application build. [`resolve`] walks a
//! [`PathKey`] sequence and returns `None` at the first mismatch, so callers
//! treat "not there" and "not the expected shape" identically.

use indexmap::IndexMap;

/// A decoded node.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValue {
    List(Vec<TreeValue>),
    /// Keys keep their document order.
    Map(IndexMap<String, TreeValue>),
    Scalar(Scalar),
}

/// Leaf values. `Null` is kept distinct from "missing" so a present-but-null
/// slot still occupies its index in a list.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

/// One step of a path: a list index or a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKey<'a> {
    Index(usize),
    Key(&'a str),
}

impl From<usize> for PathKey<'_> {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

impl<'a> From<&'a str> for PathKey<'a> {
    fn from(key: &'a str) -> Self {
        PathKey::Key(key)
    }
}

/// Walks `path` from `tree`, returning the node it lands on.
///
/// An index only descends into a `List` and a key only into a `Map`; every
/// other combination, and any out-of-range index or missing key, yields
/// `None`. An empty path returns `tree` itself.
#[must_use]
pub fn resolve<'t>(tree: &'t TreeValue, path: &[PathKey<'_>]) -> Option<&'t TreeValue> {
    let mut current = tree;
    for key in path {
        current = match (current, key) {
            (TreeValue::List(items), PathKey::Index(i)) => items.get(*i)?,
            (TreeValue::Map(entries), PathKey::Key(k)) => entries.get(*k)?,
            _ => return None,
        };
    }
    Some(current)
}

impl TreeValue {
    /// Parses JSON text into a tree.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when `text` is not valid JSON.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<serde_json::Value>(text).map(Self::from)
    }

    /// Index-only shorthand for [`resolve`]; most positional paths never
    /// touch a map.
    #[must_use]
    pub fn at(&self, indices: &[usize]) -> Option<&TreeValue> {
        let mut current = self;
        for &i in indices {
            current = match current {
                TreeValue::List(items) => items.get(i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TreeValue::Scalar(Scalar::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    /// Non-negative whole number, accepting integral floats such as `12.0`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TreeValue::Scalar(Scalar::Number(n)) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[TreeValue]> {
        match self {
            TreeValue::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, TreeValue>> {
        match self {
            TreeValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, TreeValue::Scalar(Scalar::Null))
    }

    /// Depth-first, left-to-right search that stops at the first node for
    /// which `visit` returns `Some`.
    ///
    /// A node is offered to `visit` before its children. Map children are
    /// visited in document order. Uses an explicit stack, so arbitrarily deep
    /// trees cannot overflow the call stack.
    pub fn find_map<T, F>(&self, mut visit: F) -> Option<T>
    where
        F: FnMut(&TreeValue) -> Option<T>,
    {
        let mut stack: Vec<&TreeValue> = vec![self];
        while let Some(node) = stack.pop() {
            if let Some(found) = visit(node) {
                return Some(found);
            }
            match node {
                TreeValue::List(items) => stack.extend(items.iter().rev()),
                TreeValue::Map(entries) => stack.extend(entries.values().rev()),
                TreeValue::Scalar(_) => {}
            }
        }
        None
    }
}

impl From<serde_json::Value> for TreeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items) => {
                TreeValue::List(items.into_iter().map(TreeValue::from).collect())
            }
            serde_json::Value::Object(entries) => TreeValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, TreeValue::from(v)))
                    .collect(),
            ),
            serde_json::Value::String(s) => TreeValue::Scalar(Scalar::Text(s)),
            serde_json::Value::Number(n) => TreeValue::Scalar(Scalar::Number(n)),
            serde_json::Value::Bool(b) => TreeValue::Scalar(Scalar::Bool(b)),
            serde_json::Value::Null => TreeValue::Scalar(Scalar::Null),
        }
    }
}
