use std::fmt;
use std::sync::Arc;

use super::{Attrs, ModelError, schema::AttrSpec, schema::compute_attrs};

/// Spec for a mark type.
#[derive(Debug, Clone)]
pub struct MarkSpec {
    pub attrs: Vec<(String, AttrSpec)>,
    /// Whether the mark extends to text typed at its end.
    pub inclusive: bool,
}

impl MarkSpec {
    pub fn new() -> Self {
        Self {
            attrs: Vec::new(),
            inclusive: true,
        }
    }

    pub fn attr(mut self, name: &str, default: Option<serde_json::Value>) -> Self {
        self.attrs.push((name.to_string(), AttrSpec { default }));
        self
    }

    pub fn not_inclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }
}

impl Default for MarkSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct MarkTypeInner {
    name: String,
    rank: usize,
    spec: MarkSpec,
}

/// Handle to a mark type registered in a [`Schema`](super::Schema).
#[derive(Clone)]
pub struct MarkType(Arc<MarkTypeInner>);

impl MarkType {
    pub(crate) fn new(name: &str, rank: usize, spec: MarkSpec) -> Self {
        Self(Arc::new(MarkTypeInner {
            name: name.to_string(),
            rank,
            spec,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Position of the type in the schema; mark sets are ordered by rank.
    pub fn rank(&self) -> usize {
        self.0.rank
    }

    pub fn is_inclusive(&self) -> bool {
        self.0.spec.inclusive
    }

    pub fn create(&self, attrs: Option<&Attrs>) -> Result<Mark, ModelError> {
        Ok(Mark {
            ty: self.clone(),
            attrs: compute_attrs(self.name(), &self.0.spec.attrs, attrs)?,
        })
    }

    /// The mark of this type in `set`, if any.
    pub fn is_in_set<'a>(&self, set: &'a [Mark]) -> Option<&'a Mark> {
        set.iter().find(|mark| mark.ty == *self)
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|mark| mark.ty != *self).cloned().collect()
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for MarkType {}

impl fmt::Debug for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkType({})", self.0.name)
    }
}

/// An inline style annotation (strong, link, ...) with its attributes.
#[derive(Clone, PartialEq)]
pub struct Mark {
    ty: MarkType,
    attrs: Attrs,
}

impl Mark {
    pub fn ty(&self) -> &MarkType {
        &self.ty
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Add this mark to a set, replacing any mark of the same type and
    /// keeping the set ordered by rank.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        if set.contains(self) {
            return set.to_vec();
        }
        let mut result: Vec<Mark> = set.iter().filter(|m| m.ty != self.ty).cloned().collect();
        let at = result
            .iter()
            .position(|m| m.ty.rank() > self.ty.rank())
            .unwrap_or(result.len());
        result.insert(at, self.clone());
        result
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|m| *m != self).cloned().collect()
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.contains(self)
    }

    pub fn same_set(a: &[Mark], b: &[Mark]) -> bool {
        a == b
    }
}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs.is_empty() {
            write!(f, "{}", self.ty.name())
        } else {
            write!(f, "{}{:?}", self.ty.name(), self.attrs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Schema;
    use serde_json::json;

    #[test]
    fn test_add_to_set_orders_by_rank() {
        let schema = Schema::cozy();
        let strong = schema.mark("strong", None).unwrap();
        let em = schema.mark("em", None).unwrap();

        let set = strong.add_to_set(&[]);
        let set = em.add_to_set(&set);
        let names: Vec<_> = set.iter().map(|m| m.ty().name()).collect();
        assert_eq!(names, vec!["em", "strong"]);
    }

    #[test]
    fn test_add_to_set_replaces_same_type() {
        let schema = Schema::cozy();
        let mut attrs = Attrs::new();
        attrs.insert("href".into(), json!("a"));
        let a = schema.mark("link", Some(&attrs)).unwrap();
        attrs.insert("href".into(), json!("b"));
        let b = schema.mark("link", Some(&attrs)).unwrap();

        let set = b.add_to_set(&a.add_to_set(&[]));
        assert_eq!(set, vec![b]);
    }

    #[test]
    fn test_link_requires_href() {
        let schema = Schema::cozy();
        let err = schema.mark("link", None).unwrap_err();
        assert!(matches!(err, ModelError::MissingAttr { .. }));
    }
}
