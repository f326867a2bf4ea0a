use thiserror::Error;

use super::map::StepMap;
use crate::model::{Fragment, Mark, ModelError, Node, Slice};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("structure replace would overwrite content")]
    OverwritesContent,

    #[error("gap is not a flat range")]
    GapNotFlat,

    #[error("content does not fit in gap")]
    GapMismatch,

    #[error("no node at position {0}")]
    NoNodeAt(usize),

    #[error("invalid {operation}: {reason}")]
    Invalid {
        operation: &'static str,
        reason: String,
    },
}

/// One atomic document change.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace `from..to` with a slice. With `structure` set the step only
    /// moves node boundaries and fails if it would delete content.
    Replace {
        from: usize,
        to: usize,
        slice: Slice,
        structure: bool,
    },
    /// Replace `from..to` with a slice while keeping `gap_from..gap_to`,
    /// which is re-inserted into the slice at offset `insert`.
    ReplaceAround {
        from: usize,
        to: usize,
        gap_from: usize,
        gap_to: usize,
        slice: Slice,
        insert: usize,
        structure: bool,
    },
    AddMark {
        from: usize,
        to: usize,
        mark: Mark,
    },
    RemoveMark {
        from: usize,
        to: usize,
        mark: Mark,
    },
}

impl Step {
    pub fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        match self {
            Step::Replace {
                from,
                to,
                slice,
                structure,
            } => {
                if *structure && content_between(doc, *from, *to)? {
                    return Err(StepError::OverwritesContent);
                }
                Ok(doc.replace(*from, *to, slice)?)
            }
            Step::ReplaceAround {
                from,
                to,
                gap_from,
                gap_to,
                slice,
                insert,
                structure,
            } => {
                if *structure
                    && (content_between(doc, *from, *gap_from)?
                        || content_between(doc, *gap_to, *to)?)
                {
                    return Err(StepError::OverwritesContent);
                }
                let gap = doc.slice(*gap_from, *gap_to)?;
                if gap.open_start > 0 || gap.open_end > 0 {
                    return Err(StepError::GapNotFlat);
                }
                let inserted = slice
                    .insert_at(*insert, &gap.content)
                    .ok_or(StepError::GapMismatch)?;
                Ok(doc.replace(*from, *to, &inserted)?)
            }
            Step::AddMark { from, to, mark } => {
                map_marks(doc, *from, *to, |node| mark.add_to_set(node.marks()), mark)
            }
            Step::RemoveMark { from, to, mark } => {
                map_marks(doc, *from, *to, |node| mark.remove_from_set(node.marks()), mark)
            }
        }
    }

    pub fn map(&self) -> StepMap {
        match self {
            Step::Replace {
                from, to, slice, ..
            } => StepMap::new(vec![(*from, to - from, slice.size())]),
            Step::ReplaceAround {
                from,
                to,
                gap_from,
                gap_to,
                slice,
                insert,
                ..
            } => StepMap::new(vec![
                (*from, gap_from - from, *insert),
                (*gap_to, to - gap_to, slice.size() - insert),
            ]),
            Step::AddMark { .. } | Step::RemoveMark { .. } => StepMap::empty(),
        }
    }
}

/// Rewrite the marks of every inline node in `from..to` whose parent
/// allows `mark`.
fn map_marks(
    doc: &Node,
    from: usize,
    to: usize,
    marks_for: impl Fn(&Node) -> Vec<Mark>,
    mark: &Mark,
) -> Result<Node, StepError> {
    let old = doc.slice(from, to)?;
    let rfrom = doc.resolve(from)?;
    let parent = rfrom.node(rfrom.shared_depth(to));
    let content = map_fragment(&old.content, parent, &|node, parent| {
        if !node.is_atom() || !parent.ty().allows_mark_type(mark.ty()) {
            node.clone()
        } else {
            node.with_marks(marks_for(node))
        }
    });
    let slice = Slice::new(content, old.open_start, old.open_end);
    Ok(doc.replace(from, to, &slice)?)
}

fn map_fragment(fragment: &Fragment, parent: &Node, f: &dyn Fn(&Node, &Node) -> Node) -> Fragment {
    let mapped = fragment
        .iter()
        .map(|child| {
            let child = if child.content_size() > 0 {
                child.copy(map_fragment(child.content(), child, f))
            } else {
                child.clone()
            };
            if child.is_inline() { f(&child, parent) } else { child }
        })
        .collect();
    Fragment::from_vec(mapped)
}

/// Whether `from..to` holds anything besides node boundaries.
fn content_between(doc: &Node, from: usize, to: usize) -> Result<bool, ModelError> {
    let rfrom = doc.resolve(from)?;
    let mut dist = to.saturating_sub(from);
    let mut depth = rfrom.depth;
    while dist > 0 && depth > 0 && rfrom.index_after(depth) == rfrom.node(depth).child_count() {
        depth -= 1;
        dist -= 1;
    }
    if dist > 0 {
        let mut next = rfrom.node(depth).maybe_child(rfrom.index_after(depth));
        while dist > 0 {
            match next {
                Some(node) if !node.is_leaf() => next = node.first_child(),
                _ => return Ok(true),
            }
            dist -= 1;
        }
    }
    Ok(false)
}
