use super::{Mark, ModelError, Node};

#[derive(Debug, Clone)]
struct PathLevel {
    node: Node,
    /// Index of the child the position falls in (or before).
    index: usize,
    /// Absolute position where that child starts.
    offset: usize,
}

/// A position in a document together with the chain of ancestors it sits
/// in, from the root (depth 0) down to the innermost node containing it.
///
/// Built by one descent from the root; nothing is cached between
/// resolutions, so a `ResolvedPos` is only meaningful for the document it
/// was resolved against.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pub pos: usize,
    path: Vec<PathLevel>,
    /// Depth of the innermost node containing the position.
    pub depth: usize,
    /// Offset of the position inside its parent's content.
    pub parent_offset: usize,
}

impl ResolvedPos {
    pub(crate) fn resolve(doc: &Node, pos: usize) -> Result<Self, ModelError> {
        if pos > doc.content_size() {
            return Err(ModelError::PositionOutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.content().find_index(parent_offset);
            let rem = parent_offset - offset;
            path.push(PathLevel {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let child = node.child(index).clone();
            if child.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
            node = child;
        }
        Ok(Self {
            pos,
            depth: path.len() - 1,
            path,
            parent_offset,
        })
    }

    /// The innermost node containing the position.
    pub fn parent(&self) -> &Node {
        &self.path[self.depth].node
    }

    pub fn doc(&self) -> &Node {
        &self.path[0].node
    }

    /// The ancestor at `depth`.
    ///
    /// # Panics
    ///
    /// Panics if `depth > self.depth`; use [`ResolvedPos::ancestor_at`] for a
    /// checked lookup.
    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].node
    }

    /// The ancestor at `depth`, or `OutOfRange` past the position's depth.
    pub fn ancestor_at(&self, depth: usize) -> Result<&Node, ModelError> {
        self.path
            .get(depth)
            .map(|level| &level.node)
            .ok_or(ModelError::OutOfRange {
                depth,
                max: self.depth,
            })
    }

    /// Index of the ancestor at `depth` within its own parent.
    pub fn index_in_parent(&self, depth: usize) -> Result<usize, ModelError> {
        if depth == 0 || depth > self.depth {
            return Err(ModelError::OutOfRange {
                depth,
                max: self.depth,
            });
        }
        Ok(self.index(depth - 1))
    }

    /// Index into the ancestor at `depth` of the child the position points
    /// into or before.
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    /// Index of the child after the position in the ancestor at `depth`.
    pub fn index_after(&self, depth: usize) -> usize {
        let index = self.index(depth);
        if depth == self.depth && self.text_offset() == 0 {
            index
        } else {
            index + 1
        }
    }

    /// Absolute position where the content of the ancestor at `depth` starts.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    /// Absolute position where the content of the ancestor at `depth` ends.
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position directly before the ancestor at `depth`.
    ///
    /// # Panics
    ///
    /// Panics for depth 0, which has no position before it.
    pub fn before(&self, depth: usize) -> usize {
        assert!(depth > 0, "there is no position before the top-level node");
        self.path[depth - 1].offset
    }

    /// Position directly after the ancestor at `depth`.
    ///
    /// # Panics
    ///
    /// Panics for depth 0, which has no position after it.
    pub fn after(&self, depth: usize) -> usize {
        assert!(depth > 0, "there is no position after the top-level node");
        self.path[depth - 1].offset + self.node(depth).node_size()
    }

    /// Checked form of [`ResolvedPos::after`].
    pub fn position_after_ancestor(&self, depth: usize) -> Result<usize, ModelError> {
        if depth == 0 || depth > self.depth {
            return Err(ModelError::OutOfRange {
                depth,
                max: self.depth,
            });
        }
        Ok(self.after(depth))
    }

    /// True when no cursor position inside the ancestor at `depth` comes
    /// before this one. Boundaries of first children between that ancestor
    /// and the position do not count.
    pub fn is_at_start_of_ancestor(&self, depth: usize) -> bool {
        depth <= self.depth
            && (depth..self.depth).all(|d| self.index(d) == 0)
            && self.parent_offset == 0
    }

    /// True when no cursor position inside the ancestor at `depth` comes
    /// after this one.
    pub fn is_at_end_of_ancestor(&self, depth: usize) -> bool {
        depth <= self.depth
            && (depth..self.depth).all(|d| self.index(d) + 1 == self.node(d).child_count())
            && self.parent_offset == self.parent().content_size()
    }

    /// Distance from the start of the text node the position points into.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth].offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth);
        let child = parent.maybe_child(index)?;
        let offset = self.text_offset();
        if offset > 0 {
            Some(child.cut(offset, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth);
        let offset = self.text_offset();
        if offset > 0 {
            return Some(self.parent().child(index).cut(0, offset));
        }
        if index == 0 {
            None
        } else {
            Some(self.parent().child(index - 1).clone())
        }
    }

    /// Position of the child at `index` of the ancestor at `depth`.
    pub fn pos_at_index(&self, index: usize, depth: usize) -> usize {
        let node = self.node(depth);
        let mut pos = self.start(depth);
        for i in 0..index {
            pos += node.child(i).node_size();
        }
        pos
    }

    /// Marks that text inserted here would get.
    pub fn marks(&self) -> Vec<Mark> {
        let parent = self.parent();
        let index = self.index(self.depth);
        if parent.content_size() == 0 {
            return Vec::new();
        }
        if self.text_offset() > 0 {
            return parent.child(index).marks().to_vec();
        }
        let (main, other) = match index.checked_sub(1).and_then(|i| parent.maybe_child(i)) {
            Some(before) => (Some(before), parent.maybe_child(index)),
            None => (parent.maybe_child(index), None),
        };
        let Some(main) = main else {
            return Vec::new();
        };
        main.marks()
            .iter()
            .filter(|mark| {
                mark.ty().is_inclusive() || other.is_some_and(|o| mark.is_in_set(o.marks()))
            })
            .cloned()
            .collect()
    }

    /// Depth of the deepest ancestor that also contains `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        (0..=self.depth)
            .rev()
            .find(|&d| self.start(d) <= pos && self.end(d) >= pos)
            .unwrap_or(0)
    }

    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.pos - self.parent_offset == other.pos - other.parent_offset
    }

    /// The range of sibling blocks around this position and `other`,
    /// optionally restricted to a parent matching `pred`.
    pub fn block_range(
        &self,
        other: &ResolvedPos,
        pred: Option<&dyn Fn(&Node) -> bool>,
    ) -> Option<NodeRange> {
        if other.pos < self.pos {
            return other.block_range(self, pred);
        }
        let top = if self.parent().inline_content() || self.pos == other.pos {
            self.depth.checked_sub(1)?
        } else {
            self.depth
        };
        (0..=top).rev().find_map(|d| {
            (other.pos <= self.end(d) && pred.is_none_or(|p| p(self.node(d)))).then(|| NodeRange {
                from: self.clone(),
                to: other.clone(),
                depth: d,
            })
        })
    }
}

/// A flat range of siblings: the children of the node at `depth` between
/// two resolved positions.
#[derive(Debug, Clone)]
pub struct NodeRange {
    pub from: ResolvedPos,
    pub to: ResolvedPos,
    pub depth: usize,
}

impl NodeRange {
    pub fn start(&self) -> usize {
        self.from.before(self.depth + 1)
    }

    pub fn end(&self) -> usize {
        self.to.after(self.depth + 1)
    }

    pub fn parent(&self) -> &Node {
        self.from.node(self.depth)
    }

    pub fn start_index(&self) -> usize {
        self.from.index(self.depth)
    }

    pub fn end_index(&self) -> usize {
        self.to.index_after(self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, li, p, ul};
    use rstest::rstest;

    fn list_doc() -> Node {
        // 0 <ul> 1 <li> 2 <p> 3 text 7 </p> 8 </li> 9 <li> 10 <p> 11 here 15 ...
        doc!(ul!(li!(p!("text")), li!(p!("here")))).doc
    }

    #[test]
    fn test_resolve_inside_second_item() {
        let d = list_doc();
        let pos = d.resolve(11).unwrap();
        assert_eq!(pos.depth, 3);
        assert_eq!(pos.parent().type_name(), "paragraph");
        assert_eq!(pos.node(2).type_name(), "list_item");
        assert_eq!(pos.index(1), 1);
        assert_eq!(pos.index_in_parent(2).unwrap(), 1);
        assert_eq!(pos.start(3), 11);
        assert_eq!(pos.end(3), 15);
        assert_eq!(pos.before(2), 9);
        assert_eq!(pos.after(2), 17);
        assert_eq!(pos.position_after_ancestor(1).unwrap(), 18);
        assert!(pos.is_at_start_of_ancestor(3));
        assert!(pos.is_at_start_of_ancestor(2));
        assert!(!pos.is_at_start_of_ancestor(1));
    }

    #[test]
    fn test_ancestor_at_out_of_range() {
        let d = list_doc();
        let pos = d.resolve(11).unwrap();
        assert_eq!(pos.ancestor_at(3).unwrap().type_name(), "paragraph");
        assert_eq!(
            pos.ancestor_at(4).unwrap_err(),
            ModelError::OutOfRange { depth: 4, max: 3 }
        );
        assert!(pos.position_after_ancestor(0).is_err());
        assert!(pos.index_in_parent(0).is_err());
    }

    #[test]
    fn test_resolve_past_end_fails() {
        let d = list_doc();
        assert_eq!(
            d.resolve(19).unwrap_err(),
            ModelError::PositionOutOfRange { pos: 19, size: 18 }
        );
    }

    #[rstest]
    #[case(3, true, false)]
    #[case(5, false, false)]
    #[case(7, false, true)]
    #[case(11, true, false)]
    #[case(15, false, true)]
    fn test_textblock_boundaries(#[case] pos: usize, #[case] at_start: bool, #[case] at_end: bool) {
        let d = list_doc();
        let pos = d.resolve(pos).unwrap();
        assert_eq!(pos.is_at_start_of_ancestor(pos.depth), at_start);
        assert_eq!(pos.is_at_end_of_ancestor(pos.depth), at_end);
    }

    #[test]
    fn test_end_of_list_item_is_end_of_list() {
        let d = list_doc();
        let pos = d.resolve(15).unwrap();
        assert!(pos.is_at_end_of_ancestor(1));
        assert!(!d.resolve(7).unwrap().is_at_end_of_ancestor(1));
    }

    #[test]
    fn test_node_before_and_after_in_text() {
        let d = list_doc();
        let pos = d.resolve(5).unwrap();
        assert_eq!(pos.text_offset(), 2);
        assert_eq!(pos.node_before().unwrap().text(), Some("te"));
        assert_eq!(pos.node_after().unwrap().text(), Some("xt"));

        let between = d.resolve(9).unwrap();
        assert_eq!(between.depth, 1);
        assert_eq!(between.node_before().unwrap().type_name(), "list_item");
        assert_eq!(between.node_after().unwrap().type_name(), "list_item");
    }

    #[test]
    fn test_block_range_and_shared_depth() {
        let d = list_doc();
        let a = d.resolve(4).unwrap();
        let b = d.resolve(12).unwrap();
        assert_eq!(a.shared_depth(12), 1);
        let range = a.block_range(&b, None).unwrap();
        assert_eq!(range.depth, 1);
        assert_eq!(range.start(), 1);
        assert_eq!(range.end(), 17);
        assert_eq!(range.start_index(), 0);
        assert_eq!(range.end_index(), 2);

        let cursor = d.resolve(12).unwrap();
        let own = cursor.block_range(&cursor, None).unwrap();
        assert_eq!(own.depth, 2);
        let is_list = |n: &Node| n.type_name() == "bullet_list";
        let list_range = cursor.block_range(&cursor, Some(&is_list)).unwrap();
        assert_eq!(list_range.depth, 1);
        assert_eq!(list_range.start_index(), 1);
    }
}
