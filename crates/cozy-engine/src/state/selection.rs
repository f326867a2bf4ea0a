use serde::{Deserialize, Serialize};

use crate::model::{Node, ResolvedPos};
use crate::transform::{Assoc, Mapping};

/// Search direction for selections and textblock edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Backward => Direction::Forward,
            Direction::Forward => Direction::Backward,
        }
    }
}

/// The current selection: a text range between two inline positions, or a
/// single selected node identified by the position before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    Text { anchor: usize, head: usize },
    Node { from: usize },
}

impl Selection {
    pub fn text(anchor: usize, head: usize) -> Self {
        Selection::Text { anchor, head }
    }

    pub fn cursor(pos: usize) -> Self {
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    pub fn node(from: usize) -> Self {
        Selection::Node { from }
    }

    pub fn from(&self) -> usize {
        match *self {
            Selection::Text { anchor, head } => anchor.min(head),
            Selection::Node { from } => from,
        }
    }

    pub fn to(&self, doc: &Node) -> usize {
        match *self {
            Selection::Text { anchor, head } => anchor.max(head),
            Selection::Node { from } => {
                from + self.selected_node(doc).map_or(0, |node| node.node_size())
            }
        }
    }

    pub fn anchor(&self) -> usize {
        match *self {
            Selection::Text { anchor, .. } => anchor,
            Selection::Node { from } => from,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Text { anchor, head } if anchor == head)
    }

    /// The cursor position of an empty text selection.
    pub fn cursor_pos(&self) -> Option<usize> {
        match *self {
            Selection::Text { anchor, head } if anchor == head => Some(head),
            _ => None,
        }
    }

    pub fn selected_node(&self, doc: &Node) -> Option<Node> {
        let Selection::Node { from } = *self else {
            return None;
        };
        doc.resolve(from)
            .ok()?
            .node_after()
            .filter(|node| !node.is_text())
    }

    /// Whether the selection can exist in `doc`: text endpoints sit in
    /// inline content, and a node selection points at a selectable node.
    pub fn is_valid(&self, doc: &Node) -> bool {
        let in_inline = |pos: usize| {
            doc.resolve(pos)
                .is_ok_and(|rpos| rpos.parent().inline_content())
        };
        match *self {
            Selection::Text { anchor, head } => in_inline(anchor) && in_inline(head),
            Selection::Node { .. } => {
                self.selected_node(doc).is_some_and(|node| is_selectable(&node))
            }
        }
    }

    /// Carry the selection through `mapping` into `doc`, the mapped
    /// document. Endpoints that end up outside inline content, and selected
    /// nodes that were deleted, fall back to the nearest valid selection.
    pub fn map(&self, doc: &Node, mapping: &Mapping) -> Selection {
        match *self {
            Selection::Text { anchor, head } => {
                let head = mapping.map(head, Assoc::After);
                let Ok(rhead) = doc.resolve(head) else {
                    return Selection::at_start(doc);
                };
                if !rhead.parent().inline_content() {
                    return Selection::near(&rhead, Direction::Forward);
                }
                let anchor = mapping.map(anchor, Assoc::After);
                let anchor_ok = doc
                    .resolve(anchor)
                    .is_ok_and(|r| r.parent().inline_content());
                Selection::Text {
                    anchor: if anchor_ok { anchor } else { head },
                    head,
                }
            }
            Selection::Node { from } => {
                let result = mapping.map_result(from, Assoc::After);
                let Ok(rpos) = doc.resolve(result.pos) else {
                    return Selection::at_start(doc);
                };
                let mapped = Selection::node(result.pos);
                if result.deleted || !mapped.is_valid(doc) {
                    Selection::near(&rpos, Direction::Forward)
                } else {
                    mapped
                }
            }
        }
    }

    /// The closest valid selection to `rpos`, searching in `bias` first.
    pub fn near(rpos: &ResolvedPos, bias: Direction) -> Selection {
        Selection::find_from(rpos, bias, false)
            .or_else(|| Selection::find_from(rpos, bias.reverse(), false))
            .unwrap_or_else(|| {
                log::warn!("no valid selection near {}", rpos.pos);
                Selection::cursor(0)
            })
    }

    /// The first valid selection at or beyond `rpos` in `dir`, optionally
    /// only text selections.
    pub fn find_from(rpos: &ResolvedPos, dir: Direction, text_only: bool) -> Option<Selection> {
        if rpos.parent().inline_content() {
            return Some(Selection::cursor(rpos.pos));
        }
        if let Some(found) =
            find_in(rpos.parent(), rpos.pos, rpos.index(rpos.depth), dir, text_only)
        {
            return Some(found);
        }
        (0..rpos.depth).rev().find_map(|depth| match dir {
            Direction::Backward => find_in(
                rpos.node(depth),
                rpos.before(depth + 1),
                rpos.index(depth),
                dir,
                text_only,
            ),
            Direction::Forward => find_in(
                rpos.node(depth),
                rpos.after(depth + 1),
                rpos.index(depth) + 1,
                dir,
                text_only,
            ),
        })
    }

    pub fn at_start(doc: &Node) -> Selection {
        find_in(doc, 0, 0, Direction::Forward, false).unwrap_or_else(|| {
            log::warn!("document has no selectable start");
            Selection::cursor(0)
        })
    }

    pub fn at_end(doc: &Node) -> Selection {
        find_in(doc, doc.content_size(), doc.child_count(), Direction::Backward, false)
            .unwrap_or_else(|| {
                log::warn!("document has no selectable end");
                Selection::cursor(0)
            })
    }
}

pub(crate) fn is_selectable(node: &Node) -> bool {
    !node.is_text() && node.ty().is_selectable()
}

/// Search the children of `node` from `index` in `dir`. `pos` is the
/// position at that child boundary.
fn find_in(
    node: &Node,
    pos: usize,
    index: usize,
    dir: Direction,
    text_only: bool,
) -> Option<Selection> {
    if node.inline_content() {
        return Some(Selection::cursor(pos));
    }
    let mut pos = pos;
    match dir {
        Direction::Forward => {
            for child in node.content().iter().skip(index) {
                if !child.is_atom() {
                    if let Some(inner) = find_in(child, pos + 1, 0, dir, text_only) {
                        return Some(inner);
                    }
                } else if !text_only && is_selectable(child) {
                    return Some(Selection::node(pos));
                }
                pos += child.node_size();
            }
        }
        Direction::Backward => {
            for child in node.content().iter().take(index).rev() {
                if !child.is_atom() {
                    if let Some(inner) =
                        find_in(child, pos - 1, child.child_count(), dir, text_only)
                    {
                        return Some(inner);
                    }
                } else if !text_only && is_selectable(child) {
                    return Some(Selection::node(pos - child.node_size()));
                }
                pos -= child.node_size();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Slice;
    use crate::transform::Transform;
    use crate::{blockquote, doc, hr, li, p, ul};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    // ==== searching ====

    #[test]
    fn test_at_start_and_end() {
        let doc = doc!(ul!(li!(p!("ab"))), p!("cd")).doc;
        assert_eq!(Selection::at_start(&doc), Selection::cursor(3));
        assert_eq!(Selection::at_end(&doc), Selection::cursor(11));
    }

    #[test]
    fn test_at_start_selects_leading_rule() {
        let doc = doc!(hr!(), p!("a")).doc;
        assert_eq!(Selection::at_start(&doc), Selection::node(0));
    }

    #[rstest]
    #[case(Direction::Forward, Selection::cursor(5))]
    #[case(Direction::Backward, Selection::cursor(3))]
    fn test_near_between_blocks(#[case] dir: Direction, #[case] expected: Selection) {
        let doc = doc!(p!("ab"), p!("cd")).doc;
        let rpos = doc.resolve(4).unwrap();
        assert_eq!(Selection::near(&rpos, dir), expected);
    }

    #[test]
    fn test_find_from_skips_to_next_textblock() {
        let doc = doc!(blockquote!(p!("a")), p!("b")).doc;
        let rpos = doc.resolve(4).unwrap();
        assert_eq!(
            Selection::find_from(&rpos, Direction::Forward, true),
            Some(Selection::cursor(6))
        );
    }

    #[test]
    fn test_text_only_search_skips_rules() {
        let doc = doc!(p!("a"), hr!(), p!("b")).doc;
        let rpos = doc.resolve(3).unwrap();
        assert_eq!(
            Selection::find_from(&rpos, Direction::Forward, false),
            Some(Selection::node(3))
        );
        assert_eq!(
            Selection::find_from(&rpos, Direction::Forward, true),
            Some(Selection::cursor(5))
        );
    }

    // ==== validity ====

    #[test]
    fn test_validity() {
        let doc = doc!(p!("a"), hr!()).doc;
        assert!(Selection::cursor(1).is_valid(&doc));
        assert!(!Selection::cursor(0).is_valid(&doc));
        assert!(Selection::node(3).is_valid(&doc));
        assert!(Selection::node(0).is_valid(&doc));
        assert!(!Selection::node(1).is_valid(&doc));
        assert!(!Selection::cursor(99).is_valid(&doc));
    }

    #[test]
    fn test_node_selection_bounds() {
        let doc = doc!(p!("a"), hr!()).doc;
        let sel = Selection::node(3);
        assert_eq!((sel.from(), sel.to(&doc)), (3, 4));
        assert!(!sel.is_empty());
        assert_eq!(sel.cursor_pos(), None);
    }

    // ==== mapping ====

    #[test]
    fn test_cursor_maps_through_insertion() {
        let doc = doc!(p!("ab")).doc;
        let mut tr = Transform::new(doc);
        tr.insert(1, crate::model::Schema::cozy().text("xy", vec![]))
            .unwrap();
        let mapped = Selection::cursor(2).map(tr.doc(), tr.mapping());
        assert_eq!(mapped, Selection::cursor(4));
    }

    #[test]
    fn test_deleted_node_selection_falls_back() {
        let doc = doc!(p!("a"), hr!(), p!("b")).doc;
        let mut tr = Transform::new(doc);
        tr.replace(3, 4, Slice::empty()).unwrap();
        let mapped = Selection::node(3).map(tr.doc(), tr.mapping());
        assert_eq!(mapped, Selection::cursor(4));
        assert!(mapped.is_valid(tr.doc()));
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let json = serde_json::to_string(&Selection::text(1, 3)).unwrap();
        assert_eq!(json, r#"{"type":"text","anchor":1,"head":3}"#);
        let back: Selection = serde_json::from_str(r#"{"type":"node","from":2}"#).unwrap();
        assert_eq!(back, Selection::node(2));
    }
}
