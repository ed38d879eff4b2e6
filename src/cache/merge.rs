//! Structured Value Module
//!
//! Capability trait for values that support field-wise merging and removal by
//! path, plus the path syntax used to address nested fields.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Result, StoreError};

// == Structured Trait ==
/// A value with named fields that the store can patch in place.
///
/// Types that do not implement this are opaque: the store only ever replaces
/// them wholesale (see `Store::add_with` for a caller-supplied merge instead).
pub trait Structured: Clone {
    /// Whether this particular value is object-like.
    fn is_structured(&self) -> bool;

    /// Applies `patch` on top of `self`.
    ///
    /// When both sides are structured, fields of the patch overwrite fields of
    /// `self` and nested structured fields merge recursively. Otherwise the
    /// patch replaces `self`.
    fn merge(&mut self, patch: Self);

    /// Removes the field addressed by `path`. Returns true if something was removed.
    fn remove_path(&mut self, path: &ValuePath) -> bool;
}

// == Value Path ==
/// One step of a [`ValuePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object field (`a` in `a.b`)
    Key(String),
    /// Array position (`0` in `a[0]`)
    Index(usize),
}

impl PathSegment {
    /// Segment as an object field name.
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            Self::Key(key) => Cow::Borrowed(key),
            Self::Index(idx) => Cow::Owned(idx.to_string()),
        }
    }

    /// Segment as an array position; numeric dotted segments (`a.0`) qualify.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Key(key) => key.parse().ok(),
            Self::Index(idx) => Some(*idx),
        }
    }
}

/// Parsed dotted/indexed path such as `profile.tags[1]` or `profile.tags.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePath {
    segments: Vec<PathSegment>,
}

impl ValuePath {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| StoreError::InvalidPath(format!("'{}': {}", raw, reason));

        if raw.trim().is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }

            let (name, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if name.contains(']') {
                return Err(invalid("unexpected ']'"));
            }
            if !name.is_empty() {
                segments.push(PathSegment::Key(name.to_string()));
            }

            while !rest.is_empty() {
                let Some(inner) = rest.strip_prefix('[') else {
                    return Err(invalid("expected '[' after index"));
                };
                let Some(close) = inner.find(']') else {
                    return Err(invalid("unclosed '['"));
                };
                let idx = inner[..close]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("index must be a non-negative integer"))?;
                segments.push(PathSegment::Index(idx));
                rest = &inner[close + 1..];
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl FromStr for ValuePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

// == JSON Implementation ==
impl Structured for Value {
    fn is_structured(&self) -> bool {
        self.is_object()
    }

    fn merge(&mut self, patch: Self) {
        match (self, patch) {
            (Value::Object(target), Value::Object(fields)) => {
                for (key, value) in fields {
                    match target.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            target.insert(key, value);
                        }
                    }
                }
            }
            (slot, replacement) => *slot = replacement,
        }
    }

    fn remove_path(&mut self, path: &ValuePath) -> bool {
        let Some((last, parents)) = path.segments().split_last() else {
            return false;
        };

        let mut current = self;
        for segment in parents {
            current = match child_mut(current, segment) {
                Some(child) => child,
                None => return false,
            };
        }

        match current {
            Value::Object(fields) => fields.remove(last.as_key().as_ref()).is_some(),
            Value::Array(items) => match last.as_index() {
                Some(idx) if idx < items.len() => {
                    items.remove(idx);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &PathSegment) -> Option<&'a mut Value> {
    match value {
        Value::Object(fields) => fields.get_mut(segment.as_key().as_ref()),
        Value::Array(items) => segment.as_index().and_then(move |idx| items.get_mut(idx)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> ValuePath {
        ValuePath::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_dotted_and_indexed() {
        assert_eq!(
            path("a.b[2].c").segments(),
            &[
                PathSegment::Key("a".to_string()),
                PathSegment::Key("b".to_string()),
                PathSegment::Index(2),
                PathSegment::Key("c".to_string()),
            ]
        );
        assert_eq!(
            path("grid[1][0]").segments(),
            &[
                PathSegment::Key("grid".to_string()),
                PathSegment::Index(1),
                PathSegment::Index(0),
            ]
        );
        assert_eq!(path("a.b[2].c").to_string(), "a.b[2].c");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["", "  ", "a..b", ".a", "a.", "a[", "a[x]", "a[-1]", "a]b", "a[0]b"] {
            assert!(
                matches!(ValuePath::parse(raw), Err(StoreError::InvalidPath(_))),
                "'{}' should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_merge_nested_objects() {
        let mut value = json!({
            "name": "ada",
            "settings": { "theme": "dark", "font": { "size": 12, "family": "mono" } },
            "tags": ["a", "b"]
        });

        value.merge(json!({
            "settings": { "font": { "size": 14 } },
            "tags": ["c"],
            "active": true
        }));

        assert_eq!(
            value,
            json!({
                "name": "ada",
                "settings": { "theme": "dark", "font": { "size": 14, "family": "mono" } },
                "tags": ["c"],
                "active": true
            })
        );
    }

    #[test]
    fn test_merge_empty_patch_is_noop() {
        let original = json!({ "a": 1, "b": { "c": [1, 2] } });
        let mut value = original.clone();
        value.merge(json!({}));
        assert_eq!(value, original);
    }

    #[test]
    fn test_merge_replaces_non_structured() {
        let mut scalar = json!(5);
        scalar.merge(json!({ "a": 1 }));
        assert_eq!(scalar, json!({ "a": 1 }));

        let mut object = json!({ "a": 1 });
        object.merge(json!("text"));
        assert_eq!(object, json!("text"));

        let mut nested = json!({ "a": { "b": 1 } });
        nested.merge(json!({ "a": 7 }));
        assert_eq!(nested, json!({ "a": 7 }));
    }

    #[test]
    fn test_remove_path_object_and_array() {
        let mut value = json!({
            "user": { "name": "ada", "roles": ["admin", "dev", "ops"] },
            "count": 3
        });

        assert!(value.remove_path(&path("user.roles[1]")));
        assert!(value.remove_path(&path("count")));
        assert_eq!(value, json!({ "user": { "name": "ada", "roles": ["admin", "ops"] } }));

        assert!(value.remove_path(&path("user.roles.0")));
        assert_eq!(value["user"]["roles"], json!(["ops"]));
    }

    #[test]
    fn test_remove_missing_path_is_noop() {
        let original = json!({ "a": { "b": 1 } });
        let mut value = original.clone();

        assert!(!value.remove_path(&path("a.c")));
        assert!(!value.remove_path(&path("x.y.z")));
        assert!(!value.remove_path(&path("a.b.c")));
        assert!(!value.remove_path(&path("a[4]")));
        assert_eq!(value, original);
    }

    #[test]
    fn test_is_structured() {
        assert!(json!({}).is_structured());
        assert!(!json!([1]).is_structured());
        assert!(!json!("s").is_structured());
        assert!(!Value::Null.is_structured());
    }
}
