use std::fmt;
use std::sync::Arc;

use super::Node;

/// An immutable sequence of sibling nodes, with its size in position units
/// cached. Adjacent text nodes with the same marks are always merged.
#[derive(Clone, PartialEq, Default)]
pub struct Fragment {
    nodes: Arc<Vec<Node>>,
    size: usize,
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_node(node: Node) -> Self {
        let size = node.node_size();
        Self {
            nodes: Arc::new(vec![node]),
            size,
        }
    }

    /// Build a fragment, merging adjacent text nodes that share marks.
    pub fn from_vec(nodes: Vec<Node>) -> Self {
        let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            push_node(&mut merged, node);
        }
        let size = merged.iter().map(Node::node_size).sum();
        Self {
            nodes: Arc::new(merged),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn child_count(&self) -> usize {
        self.nodes.len()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn child(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.nodes.as_ref().clone()
    }

    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.size == 0 {
            return self.clone();
        }
        if self.size == 0 {
            return other.clone();
        }
        let mut nodes = self.to_vec();
        for node in other.iter() {
            push_node(&mut nodes, node.clone());
        }
        Fragment {
            nodes: Arc::new(nodes),
            size: self.size + other.size,
        }
    }

    pub fn add_to_start(&self, node: Node) -> Fragment {
        Fragment::from_node(node).append(self)
    }

    pub fn add_to_end(&self, node: Node) -> Fragment {
        self.append(&Fragment::from_node(node))
    }

    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut nodes = self.to_vec();
        nodes[index] = node;
        Fragment::from_vec(nodes)
    }

    /// Cut out the part of the fragment between two positions, cutting
    /// partially covered children.
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        if from == 0 && to == self.size {
            return self.clone();
        }
        let mut result = Vec::new();
        if to > from {
            let mut pos = 0;
            for child in self.iter() {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let child = if pos < from || end > to {
                        if child.is_text() {
                            child.cut(from.saturating_sub(pos), (to - pos).min(child.node_size()))
                        } else {
                            child.cut(
                                from.saturating_sub(pos + 1),
                                (to - pos - 1).min(child.content_size()),
                            )
                        }
                    } else {
                        child.clone()
                    };
                    result.push(child);
                }
                pos = end;
            }
        }
        Fragment::from_vec(result)
    }

    pub fn cut_by_index(&self, from: usize, to: usize) -> Fragment {
        if from == to {
            return Fragment::empty();
        }
        if from == 0 && to == self.nodes.len() {
            return self.clone();
        }
        Fragment::from_vec(self.nodes[from..to].to_vec())
    }

    /// Find the child containing `pos`. Returns the child index and the
    /// position where that child starts. A position at a child boundary
    /// yields the child after it.
    pub fn find_index(&self, pos: usize) -> (usize, usize) {
        if pos == 0 {
            return (0, 0);
        }
        if pos >= self.size {
            return (self.nodes.len(), self.size);
        }
        let mut cur = 0;
        for (i, child) in self.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                return if end == pos { (i + 1, end) } else { (i, cur) };
            }
            cur = end;
        }
        (self.nodes.len(), self.size)
    }

    /// Call `f` for every node that overlaps `from..to`, descending into
    /// children while `f` returns true. `f` receives the node, its absolute
    /// position, its parent and its index in the parent.
    pub fn nodes_between<F>(
        &self,
        from: usize,
        to: usize,
        f: &mut F,
        node_start: usize,
        parent: Option<&Node>,
    ) where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        let mut pos = 0;
        for (i, child) in self.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, i) && child.content_size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    child.content_size().min(to.saturating_sub(start)),
                    f,
                    node_start + start,
                    Some(child),
                );
            }
            pos = end;
        }
    }

    /// Concatenated text of the nodes in `from..to`.
    pub fn text_between(&self, from: usize, to: usize) -> String {
        let mut text = String::new();
        self.nodes_between(
            from,
            to,
            &mut |node, pos, _, _| {
                if let Some(t) = node.text() {
                    let start = from.saturating_sub(pos);
                    let end = (to - pos).min(node.node_size());
                    text.extend(t.chars().skip(start).take(end - start));
                }
                true
            },
            0,
            None,
        );
        text
    }
}

fn push_node(nodes: &mut Vec<Node>, node: Node) {
    if let Some(last) = nodes.last_mut()
        && let (Some(a), Some(b)) = (last.text(), node.text())
        && last.same_markup(&node)
    {
        let joined = format!("{a}{b}");
        *last = last.with_text(&joined);
        return;
    }
    nodes.push(node);
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{self}>")
    }
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
