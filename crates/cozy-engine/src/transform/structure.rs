//! Queries that decide whether a structural change is possible before a
//! step is attempted.

use crate::model::{Attrs, Fragment, Node, NodeRange, NodeType};

/// A node type plus optional attributes, used when a transform has to
/// create wrapper or split-off nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTemplate {
    pub ty: NodeType,
    pub attrs: Option<Attrs>,
}

impl NodeTemplate {
    pub fn new(ty: NodeType) -> Self {
        Self { ty, attrs: None }
    }
}

/// The depth the content of `range` could be lifted to, if any.
pub fn lift_target(range: &NodeRange) -> Option<usize> {
    let content = range
        .parent()
        .content()
        .cut_by_index(range.start_index(), range.end_index());
    let mut depth = range.depth;
    loop {
        let node = range.from.node(depth);
        let index = range.from.index(depth);
        let end_index = range.to.index_after(depth);
        if depth < range.depth && node.can_replace(index, end_index, &content) {
            return Some(depth);
        }
        if depth == 0 || node.ty().is_isolating() || !can_cut(node, index, end_index) {
            return None;
        }
        depth -= 1;
    }
}

fn can_cut(node: &Node, start: usize, end: usize) -> bool {
    (start == 0 || node.can_replace(start, node.child_count(), &Fragment::empty()))
        && (end == node.child_count() || node.can_replace(0, end, &Fragment::empty()))
}

/// Whether splitting at `pos`, `depth` levels deep, yields valid nodes.
/// `types_after` optionally overrides the type of the split-off node at each
/// level, outermost first.
pub fn can_split(
    doc: &Node,
    pos: usize,
    depth: usize,
    types_after: &[Option<NodeTemplate>],
) -> bool {
    let Ok(rpos) = doc.resolve(pos) else {
        return false;
    };
    if depth == 0 || depth > rpos.depth {
        return false;
    }
    let base = rpos.depth - depth;
    let parent = rpos.parent();
    let inner_type = types_after
        .last()
        .and_then(Option::as_ref)
        .map(|t| &t.ty)
        .unwrap_or(parent.ty());
    let index = rpos.index(rpos.depth);
    if parent.ty().is_isolating()
        || !parent.can_replace(index, parent.child_count(), &Fragment::empty())
        || !inner_type.valid_content(&parent.content().cut_by_index(index, parent.child_count()))
    {
        return false;
    }
    for d in (base + 1..rpos.depth).rev() {
        let node = rpos.node(d);
        let index = rpos.index(d);
        if node.ty().is_isolating() {
            return false;
        }
        let i = d - base - 1;
        let mut rest = node.content().cut_by_index(index, node.child_count());
        if let Some(Some(over)) = types_after.get(i + 1) {
            let Ok(child) = over.ty.create(over.attrs.as_ref(), Fragment::empty(), vec![]) else {
                return false;
            };
            rest = rest.replace_child(0, child);
        }
        let after = types_after
            .get(i)
            .and_then(Option::as_ref)
            .map(|t| &t.ty)
            .unwrap_or(node.ty());
        if !node.can_replace(index + 1, node.child_count(), &Fragment::empty())
            || !after.valid_content(&rest)
        {
            return false;
        }
    }
    let index = rpos.index_after(base);
    let base_type = match types_after.first().and_then(Option::as_ref) {
        Some(t) => &t.ty,
        None => rpos.node(base + 1).ty(),
    };
    rpos.node(base).can_replace_with(index, index, base_type)
}

/// Whether the nodes before and after `pos` can be joined.
pub fn can_join(doc: &Node, pos: usize) -> bool {
    let Ok(rpos) = doc.resolve(pos) else {
        return false;
    };
    let index = rpos.index(rpos.depth);
    joinable(rpos.node_before().as_ref(), rpos.node_after().as_ref())
        && rpos.parent().can_replace(index, index + 1, &Fragment::empty())
}

/// Whether `b`'s content can be appended to `a`.
pub fn joinable(a: Option<&Node>, b: Option<&Node>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => !a.is_leaf() && a.can_append(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Schema;
    use crate::{blockquote, doc, li, p, ul};
    use rstest::rstest;

    fn range_at(doc: &Node, from: usize, to: usize) -> NodeRange {
        let from = doc.resolve(from).unwrap();
        let to = doc.resolve(to).unwrap();
        from.block_range(&to, None).unwrap()
    }

    // ==== lift ====

    #[test]
    fn test_lift_target_out_of_blockquote() {
        let doc = doc!(blockquote!(p!("one"), p!("two"))).doc;
        assert_eq!(lift_target(&range_at(&doc, 2, 2)), Some(0));
    }

    #[test]
    fn test_no_lift_target_for_top_level_paragraph() {
        let doc = doc!(p!("one")).doc;
        assert_eq!(lift_target(&range_at(&doc, 1, 1)), None);
    }

    #[test]
    fn test_lift_target_skips_list_levels() {
        // A paragraph cannot sit directly in a bullet list, so it goes to the top.
        let doc = doc!(ul!(li!(p!("one")))).doc;
        assert_eq!(lift_target(&range_at(&doc, 3, 3)), Some(0));
    }

    #[test]
    fn test_no_lift_target_for_item_outside_list() {
        let doc = doc!(ul!(li!(p!("one")))).doc;
        let from = doc.resolve(3).unwrap();
        let range = from
            .block_range(&from, Some(&|node: &Node| node.type_name() == "bullet_list"))
            .unwrap();
        assert_eq!(lift_target(&range), None);
    }

    // ==== split ====

    #[rstest]
    #[case(4, 1, true)]
    #[case(3, 1, true)]
    #[case(0, 1, false)]
    #[case(4, 2, true)]
    #[case(4, 3, true)]
    #[case(4, 4, false)]
    fn test_can_split(#[case] pos: usize, #[case] depth: usize, #[case] expected: bool) {
        let doc = doc!(ul!(li!(p!("ab")))).doc;
        assert_eq!(can_split(&doc, pos, depth, &[]), expected);
    }

    #[test]
    fn test_can_split_with_type_override() {
        let schema = Schema::cozy();
        let doc = doc!(p!("ab")).doc;
        let heading = NodeTemplate::new(schema.node_type("heading").unwrap().clone());
        assert!(can_split(&doc, 2, 1, &[Some(heading)]));
        let list = NodeTemplate::new(schema.node_type("bullet_list").unwrap().clone());
        assert!(!can_split(&doc, 2, 1, &[Some(list)]));
    }

    // ==== join ====

    #[test]
    fn test_can_join_adjacent_lists_and_items() {
        let lists = doc!(ul!(li!(p!("a"))), ul!(li!(p!("b")))).doc;
        assert!(can_join(&lists, 7));
        assert!(!can_join(&lists, 0));

        let items = doc!(ul!(li!(p!("a")), li!(p!("b")))).doc;
        assert!(can_join(&items, 6));
        assert!(!can_join(&items, 5));
    }

    #[test]
    fn test_cannot_join_paragraph_into_list() {
        let doc = doc!(ul!(li!(p!("a"))), p!("b")).doc;
        assert!(!can_join(&doc, 7));
    }
}
