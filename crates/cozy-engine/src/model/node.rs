use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::content::ContentMatch;
use super::replace::replace;
use super::{Attrs, Fragment, Mark, ModelError, NodeType, ResolvedPos, Slice};

/// An immutable document tree node.
///
/// Sizes are measured in position units: a text node counts its chars, any
/// other leaf counts one, and every other node counts its content plus one
/// unit for each of its opening and closing boundaries.
#[derive(Clone, PartialEq)]
pub struct Node {
    ty: NodeType,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<Arc<str>>,
}

/// A child found at a position, as returned by [`Node::child_after`] and
/// [`Node::child_before`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChildInfo<'a> {
    pub node: Option<&'a Node>,
    pub index: usize,
    pub offset: usize,
}

impl Node {
    pub(crate) fn new(ty: NodeType, attrs: Attrs, content: Fragment, marks: Vec<Mark>) -> Self {
        Self {
            ty,
            attrs,
            content,
            marks,
            text: None,
        }
    }

    pub(crate) fn new_text(ty: NodeType, text: &str, marks: Vec<Mark>) -> Self {
        Self {
            ty,
            attrs: Attrs::new(),
            content: Fragment::empty(),
            marks,
            text: Some(Arc::from(text)),
        }
    }

    pub fn ty(&self) -> &NodeType {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn node_size(&self) -> usize {
        match &self.text {
            Some(text) => text.chars().count(),
            None if self.is_leaf() => 1,
            None => self.content.size() + 2,
        }
    }

    pub fn content_size(&self) -> usize {
        self.content.size()
    }

    pub fn child_count(&self) -> usize {
        self.content.child_count()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn child(&self, index: usize) -> &Node {
        self.content.child(index)
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.content.maybe_child(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.content.first_child()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.content.last_child()
    }

    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.ty.is_leaf()
    }

    pub fn is_atom(&self) -> bool {
        self.ty.is_atom()
    }

    pub fn is_inline(&self) -> bool {
        self.ty.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.ty.is_block()
    }

    pub fn is_textblock(&self) -> bool {
        self.ty.is_textblock()
    }

    pub fn inline_content(&self) -> bool {
        self.ty.inline_content()
    }

    /// Same type, attributes and marks.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.ty == other.ty && self.attrs == other.attrs && self.marks == other.marks
    }

    /// A node with the same markup and the given content.
    pub fn copy(&self, content: Fragment) -> Node {
        Node {
            ty: self.ty.clone(),
            attrs: self.attrs.clone(),
            content,
            marks: self.marks.clone(),
            text: self.text.clone(),
        }
    }

    pub fn with_marks(&self, marks: Vec<Mark>) -> Node {
        Node {
            marks,
            ..self.clone()
        }
    }

    pub fn with_text(&self, text: &str) -> Node {
        Node {
            text: Some(Arc::from(text)),
            ..self.clone()
        }
    }

    /// The part of this node between two content offsets.
    pub fn cut(&self, from: usize, to: usize) -> Node {
        if let Some(text) = &self.text {
            if from == 0 && to == self.node_size() {
                return self.clone();
            }
            let cut: String = text.chars().skip(from).take(to.saturating_sub(from)).collect();
            return self.with_text(&cut);
        }
        if from == 0 && to == self.content.size() {
            return self.clone();
        }
        self.copy(self.content.cut(from, to))
    }

    /// Everything between two positions as a slice, open on the sides where
    /// the positions sit inside nodes.
    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, ModelError> {
        if from == to {
            return Ok(Slice::empty());
        }
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        let depth = from.shared_depth(to.pos);
        let start = from.start(depth);
        let content = from.node(depth).content().cut(from.pos - start, to.pos - start);
        Ok(Slice::new(content, from.depth - depth, to.depth - depth))
    }

    /// Replace `from..to` with a slice. The slice's open depths must line up
    /// with the depths of the two positions.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ModelError> {
        replace(&self.resolve(from)?, &self.resolve(to)?, slice)
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ModelError> {
        ResolvedPos::resolve(self, pos)
    }

    /// The node directly after `pos`, if any.
    pub fn node_at(&self, mut pos: usize) -> Option<&Node> {
        let mut node = self;
        loop {
            let (index, offset) = node.content.find_index(pos);
            let child = node.maybe_child(index)?;
            if offset == pos || child.is_text() {
                return Some(child);
            }
            pos -= offset + 1;
            node = child;
        }
    }

    pub fn child_after(&self, pos: usize) -> ChildInfo<'_> {
        let (index, offset) = self.content.find_index(pos);
        ChildInfo {
            node: self.maybe_child(index),
            index,
            offset,
        }
    }

    pub fn child_before(&self, pos: usize) -> ChildInfo<'_> {
        if pos == 0 {
            return ChildInfo {
                node: None,
                index: 0,
                offset: 0,
            };
        }
        let (index, offset) = self.content.find_index(pos);
        if offset < pos {
            return ChildInfo {
                node: self.maybe_child(index),
                index,
                offset,
            };
        }
        let node = self.child(index - 1);
        ChildInfo {
            node: Some(node),
            index: index - 1,
            offset: offset - node.node_size(),
        }
    }

    pub fn nodes_between<F>(&self, from: usize, to: usize, mut f: F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.content.nodes_between(from, to, &mut f, 0, Some(self));
    }

    pub fn text_content(&self) -> String {
        match &self.text {
            Some(text) => text.to_string(),
            None => self.content.text_between(0, self.content.size()),
        }
    }

    pub fn content_match_at(&self, index: usize) -> Option<ContentMatch> {
        self.ty
            .content_match()
            .match_fragment_range(&self.content, 0, index)
    }

    /// Whether replacing the children `from..to` with `replacement` keeps
    /// this node valid.
    pub fn can_replace(&self, from: usize, to: usize, replacement: &Fragment) -> bool {
        let Some(one) = self.content_match_at(from) else {
            return false;
        };
        let Some(two) = one.match_fragment(replacement) else {
            return false;
        };
        let Some(end) = two.match_fragment_range(&self.content, to, self.child_count()) else {
            return false;
        };
        end.valid_end()
            && replacement
                .iter()
                .all(|child| self.ty.allows_marks(child.marks()))
    }

    /// Whether replacing the children `from..to` with one node of type `ty`
    /// keeps this node valid.
    pub fn can_replace_with(&self, from: usize, to: usize, ty: &NodeType) -> bool {
        let Some(start) = self.content_match_at(from) else {
            return false;
        };
        let Some(after) = start.match_type(ty) else {
            return false;
        };
        after
            .match_fragment_range(&self.content, to, self.child_count())
            .is_some_and(|end| end.valid_end())
    }

    pub fn can_append(&self, other: &Node) -> bool {
        self.can_replace(self.child_count(), self.child_count(), other.content())
    }

    /// Validate this node and all its descendants against their types.
    pub fn check(&self) -> Result<(), ModelError> {
        self.ty.check_content(&self.content)?;
        if self.text.as_deref() == Some("") {
            return Err(ModelError::InvalidContent("empty text node".into()));
        }
        let mut seen = Vec::new();
        for mark in &self.marks {
            if seen.contains(&mark.ty().name()) {
                return Err(ModelError::InvalidContent(format!(
                    "duplicate {} mark on {}",
                    mark.ty().name(),
                    self.type_name()
                )));
            }
            seen.push(mark.ty().name());
        }
        self.content.iter().try_for_each(Node::check)
    }
}

fn wrap_marks(marks: &[Mark], inner: String) -> String {
    marks
        .iter()
        .rev()
        .fold(inner, |acc, mark| format!("{}({acc})", mark.ty().name()))
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = match &self.text {
            Some(text) => serde_json::to_string(text.as_ref()).map_err(|_| fmt::Error)?,
            None if self.content.size() > 0 => format!("{}({})", self.type_name(), self.content),
            None => self.type_name().to_string(),
        };
        write!(f, "{}", wrap_marks(&self.marks, inner))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, li, p, strong, ul};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sizes() {
        let d = doc!(ul!(li!(p!("text"))), p!("here")).doc;
        assert_eq!(d.child(0).node_size(), 10);
        assert_eq!(d.child(1).node_size(), 6);
        assert_eq!(d.content_size(), 16);
        assert_eq!(d.child(1).child(0).node_size(), 4);
    }

    #[test]
    fn test_display_wraps_marks() {
        let d = doc!(p!("a", strong!("b"), "c")).doc;
        assert_eq!(d.to_string(), r#"doc(paragraph("a", strong("b"), "c"))"#);
    }

    #[test]
    fn test_node_at_and_child_after() {
        let d = doc!(ul!(li!(p!("text"))), p!("here")).doc;
        assert_eq!(d.node_at(0).map(Node::type_name), Some("bullet_list"));
        assert_eq!(d.node_at(2).map(Node::type_name), Some("paragraph"));
        assert_eq!(d.node_at(10).map(Node::type_name), Some("paragraph"));
        assert_eq!(d.node_at(4).and_then(Node::text), Some("text"));
        assert_eq!(d.node_at(16), None);

        let after = d.child_after(10);
        assert_eq!(after.index, 1);
        assert_eq!(after.node.map(Node::type_name), Some("paragraph"));
        let before = d.child_before(10);
        assert_eq!(before.index, 0);
        assert_eq!(before.offset, 0);
    }

    #[test]
    fn test_slice_and_cut() {
        let d = doc!(p!("hello"), p!("world")).doc;
        let slice = d.slice(3, 10).unwrap();
        assert_eq!(slice.open_start, 1);
        assert_eq!(slice.open_end, 1);
        assert_eq!(slice.content.to_string(), r#"paragraph("llo"), paragraph("wo")"#);
        assert_eq!(slice.size(), 7);
    }

    #[test]
    fn test_can_replace() {
        let d = doc!(ul!(li!(p!("a")), li!(p!("b")))).doc;
        let list = d.child(0);
        assert!(list.can_replace(0, 1, &Fragment::empty()));
        assert!(!list.can_replace(0, 2, &Fragment::empty()));
        let para = list.child(0).child(0).clone();
        assert!(!list.can_replace(0, 0, &Fragment::from_node(para)));
    }

    #[test]
    fn test_text_content() {
        let d = doc!(ul!(li!(p!("text"))), p!("here")).doc;
        assert_eq!(d.text_content(), "texthere");
    }

    #[test]
    fn test_check_rejects_invalid_tree() {
        let schema = crate::model::Schema::cozy();
        let para = schema.node("paragraph", None, Vec::new()).unwrap();
        let bad = schema
            .node_type("list_item")
            .unwrap()
            .create(None, Fragment::empty(), Vec::new())
            .unwrap();
        let list = schema
            .node_type("bullet_list")
            .unwrap()
            .create(None, Fragment::from_vec(vec![bad]), Vec::new())
            .unwrap();
        assert!(list.check().is_err());
        assert!(para.check().is_ok());
    }
}
