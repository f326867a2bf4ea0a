//! Document builders for tests, benches and examples.
//!
//! ```
//! use cozy_engine::builders::*;
//! use cozy_engine::{doc, li, p, ul};
//!
//! let tagged = doc!(ul!(li!(p!("te<a>xt"))));
//! assert_eq!(tagged.tag("a"), Some(5));
//! ```
//!
//! Text arguments may contain `<name>` tags (lowercase letters only). They
//! are removed from the text and their positions recorded, so a test can
//! point at a place in the document without counting. The builders use
//! [`Schema::cozy`] and panic on content the schema rejects.

use std::collections::BTreeMap;
use std::sync::Arc;

pub use serde_json::json;

use crate::model::{Attrs, Fragment, Node, Schema};
use crate::state::{EditorState, Selection};

/// Nodes built so far, with the tags found inside them.
#[derive(Debug, Clone)]
pub struct Built {
    nodes: Vec<Node>,
    tags: BTreeMap<String, usize>,
}

/// One argument to a builder macro.
#[derive(Debug, Clone)]
pub enum Piece {
    Text(String),
    Built(Built),
}

impl From<&str> for Piece {
    fn from(text: &str) -> Self {
        Piece::Text(text.to_string())
    }
}

impl From<String> for Piece {
    fn from(text: String) -> Self {
        Piece::Text(text)
    }
}

impl From<Built> for Piece {
    fn from(built: Built) -> Self {
        Piece::Built(built)
    }
}

/// A built document and the positions of its tags.
#[derive(Debug, Clone)]
pub struct TaggedDoc {
    pub doc: Node,
    pub tags: BTreeMap<String, usize>,
}

impl TaggedDoc {
    pub fn tag(&self, name: &str) -> Option<usize> {
        self.tags.get(name).copied()
    }

    /// The selection the tags describe: `<a>` (to `<b>`) as a text
    /// selection inside inline content, `<a>` as a node selection elsewhere,
    /// or the start of the document without tags.
    pub fn selection(&self) -> Selection {
        let Some(anchor) = self.tag("a") else {
            return Selection::at_start(&self.doc);
        };
        let inline = self
            .doc
            .resolve(anchor)
            .is_ok_and(|rpos| rpos.parent().inline_content());
        if inline {
            Selection::text(anchor, self.tag("b").unwrap_or(anchor))
        } else {
            Selection::node(anchor)
        }
    }

    /// An editor state holding the document and its tagged selection.
    ///
    /// # Panics
    ///
    /// Panics if the tags do not describe a valid selection.
    pub fn state(&self) -> EditorState {
        EditorState::new(Arc::new(Schema::cozy()), self.doc.clone(), Some(self.selection()))
            .unwrap_or_else(|e| panic!("tagged selection in {}: {e}", self.doc))
    }
}

fn split_tags(text: &str) -> (String, Vec<(String, usize)>) {
    let mut plain = String::new();
    let mut tags = Vec::new();
    let mut chars = 0;
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !c.is_ascii_lowercase())
            .unwrap_or(after.len());
        if name_len == 0 || !after[name_len..].starts_with('>') {
            plain.push_str(&rest[..=open]);
            chars += rest[..=open].chars().count();
            rest = after;
            continue;
        }
        plain.push_str(&rest[..open]);
        chars += rest[..open].chars().count();
        tags.push((after[..name_len].to_string(), chars));
        rest = &after[name_len + 1..];
    }
    plain.push_str(rest);
    (plain, tags)
}

fn flatten(schema: &Schema, pieces: Vec<Piece>) -> Built {
    let mut nodes = Vec::new();
    let mut tags = BTreeMap::new();
    let mut pos = 0;
    for piece in pieces {
        match piece {
            Piece::Text(text) => {
                let (plain, found) = split_tags(&text);
                for (name, offset) in found {
                    tags.insert(name, pos + offset);
                }
                if !plain.is_empty() {
                    let node = schema.text(&plain, Vec::new());
                    pos += node.node_size();
                    nodes.push(node);
                }
            }
            Piece::Built(built) => {
                for (name, offset) in built.tags {
                    tags.insert(name, pos + offset);
                }
                for node in built.nodes {
                    pos += node.node_size();
                    nodes.push(node);
                }
            }
        }
    }
    Built { nodes, tags }
}

/// Build a node of type `name` around `pieces`.
///
/// # Panics
///
/// Panics on unknown types, missing attributes or invalid content.
pub fn node(name: &str, attrs: Option<Attrs>, pieces: Vec<Piece>) -> Built {
    let schema = Schema::cozy();
    let inner = flatten(&schema, pieces);
    let node = schema
        .node(name, attrs.as_ref(), inner.nodes)
        .unwrap_or_else(|e| panic!("building {name}: {e}"));
    let offset = usize::from(!node.is_leaf());
    let tags = inner
        .tags
        .into_iter()
        .map(|(tag, pos)| (tag, pos + offset))
        .collect();
    Built {
        nodes: vec![node],
        tags,
    }
}

/// Apply mark `name` to the inline nodes in `pieces`.
///
/// # Panics
///
/// Panics on unknown marks or missing attributes.
pub fn mark(name: &str, attrs: Option<Attrs>, pieces: Vec<Piece>) -> Built {
    let schema = Schema::cozy();
    let mark = schema
        .mark(name, attrs.as_ref())
        .unwrap_or_else(|e| panic!("building {name} mark: {e}"));
    let inner = flatten(&schema, pieces);
    let nodes = inner
        .nodes
        .into_iter()
        .map(|node| {
            if node.is_inline() {
                node.with_marks(mark.add_to_set(node.marks()))
            } else {
                node
            }
        })
        .collect();
    Built {
        nodes,
        tags: inner.tags,
    }
}

/// Build a checked document.
///
/// # Panics
///
/// Panics if the document is not valid for the schema.
pub fn doc(pieces: Vec<Piece>) -> TaggedDoc {
    let schema = Schema::cozy();
    let inner = flatten(&schema, pieces);
    let doc = schema
        .top_node_type()
        .create(None, Fragment::from_vec(inner.nodes), Vec::new())
        .unwrap_or_else(|e| panic!("building doc: {e}"));
    if let Err(e) = doc.check() {
        panic!("invalid document {doc}: {e}");
    }
    TaggedDoc {
        doc,
        tags: inner.tags,
    }
}

pub fn attrs(pairs: &[(&str, serde_json::Value)]) -> Attrs {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

pub fn heading_attrs(level: u8) -> Attrs {
    attrs(&[("level", json!(level))])
}

#[macro_export]
macro_rules! doc {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::doc(vec![$($crate::builders::Piece::from($piece)),*])
    };
}

#[macro_export]
macro_rules! p {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::node("paragraph", None, vec![$($crate::builders::Piece::from($piece)),*])
    };
}

#[macro_export]
macro_rules! ul {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::node(
            "bullet_list",
            None,
            vec![$($crate::builders::Piece::from($piece)),*],
        )
    };
}

#[macro_export]
macro_rules! ol {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::node(
            "ordered_list",
            None,
            vec![$($crate::builders::Piece::from($piece)),*],
        )
    };
}

#[macro_export]
macro_rules! li {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::node("list_item", None, vec![$($crate::builders::Piece::from($piece)),*])
    };
}

#[macro_export]
macro_rules! blockquote {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::node("blockquote", None, vec![$($crate::builders::Piece::from($piece)),*])
    };
}

#[macro_export]
macro_rules! h1 {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::node(
            "heading",
            Some($crate::builders::heading_attrs(1)),
            vec![$($crate::builders::Piece::from($piece)),*],
        )
    };
}

#[macro_export]
macro_rules! code_block {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::node("code_block", None, vec![$($crate::builders::Piece::from($piece)),*])
    };
}

#[macro_export]
macro_rules! hr {
    () => {
        $crate::builders::node("horizontal_rule", None, vec![])
    };
}

#[macro_export]
macro_rules! br {
    () => {
        $crate::builders::node("hard_break", None, vec![])
    };
}

#[macro_export]
macro_rules! img {
    ($src:expr) => {
        $crate::builders::node(
            "image",
            Some($crate::builders::attrs(&[("src", $crate::builders::json!($src))])),
            vec![],
        )
    };
}

#[macro_export]
macro_rules! external {
    ($id:expr, $ty:expr) => {
        $crate::builders::node(
            "external_item",
            Some($crate::builders::attrs(&[
                ("id", $crate::builders::json!($id)),
                ("type", $crate::builders::json!($ty)),
            ])),
            vec![],
        )
    };
}

#[macro_export]
macro_rules! em {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::mark("em", None, vec![$($crate::builders::Piece::from($piece)),*])
    };
}

#[macro_export]
macro_rules! strong {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::mark("strong", None, vec![$($crate::builders::Piece::from($piece)),*])
    };
}

#[macro_export]
macro_rules! code {
    ($($piece:expr),* $(,)?) => {
        $crate::builders::mark("code", None, vec![$($crate::builders::Piece::from($piece)),*])
    };
}

#[macro_export]
macro_rules! link {
    ($href:expr; $($piece:expr),* $(,)?) => {
        $crate::builders::mark(
            "link",
            Some($crate::builders::attrs(&[("href", $crate::builders::json!($href))])),
            vec![$($crate::builders::Piece::from($piece)),*],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain", vec![])]
    #[case("te<a>xt", "text", vec![("a", 2)])]
    #[case("<a>x<b>", "x", vec![("a", 0), ("b", 1)])]
    #[case("a < b", "a < b", vec![])]
    #[case("<B>", "<B>", vec![])]
    fn test_split_tags(#[case] input: &str, #[case] plain: &str, #[case] tags: Vec<(&str, usize)>) {
        let (text, found) = split_tags(input);
        assert_eq!(text, plain);
        let expected: Vec<(String, usize)> =
            tags.into_iter().map(|(n, p)| (n.to_string(), p)).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_tags_are_absolute_positions() {
        let tagged = doc!(p!("one"), ul!(li!(p!("t<a>wo")), li!(p!("<b>"))));
        assert_eq!(tagged.tag("a"), Some(9));
        assert_eq!(tagged.tag("b"), Some(15));
    }

    #[test]
    fn test_marks_wrap_text() {
        let tagged = doc!(p!("a", em!("b<a>")));
        assert_eq!(tagged.doc.to_string(), r#"doc(paragraph("a", em("b")))"#);
        assert_eq!(tagged.tag("a"), Some(3));
    }

    #[test]
    fn test_selection_kinds() {
        assert_eq!(doc!(p!("a<a>b<b>")).selection(), Selection::text(2, 3));
        assert_eq!(doc!("<a>", hr!()).selection(), Selection::node(0));
        assert_eq!(doc!(p!("x")).selection(), Selection::cursor(1));
    }

    #[test]
    #[should_panic(expected = "building bullet_list")]
    fn test_rejects_invalid_content() {
        let _ = doc!(ul!(p!("x")));
    }
}
