use super::map::Mapping;
use super::step::{Step, StepError};
use super::structure::NodeTemplate;
use crate::model::{Attrs, Fragment, Mark, MarkType, Node, NodeRange, NodeType, ResolvedPos, Slice};

/// An ordered list of steps applied to a starting document.
///
/// Builder methods take positions in the coordinate space of the current
/// document ([`Transform::doc`]). A step that fails leaves the transform
/// exactly as it was.
#[derive(Debug, Clone)]
pub struct Transform {
    before: Node,
    doc: Node,
    steps: Vec<Step>,
    mapping: Mapping,
}

impl Transform {
    pub fn new(doc: Node) -> Self {
        Self {
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            mapping: Mapping::new(),
        }
    }

    /// The starting document.
    pub fn before(&self) -> &Node {
        &self.before
    }

    /// The document after all steps so far.
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn step(&mut self, step: Step) -> Result<&mut Self, StepError> {
        let doc = step.apply(&self.doc)?;
        self.mapping.push(step.map());
        self.steps.push(step);
        self.doc = doc;
        Ok(self)
    }

    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
    ) -> Result<&mut Self, StepError> {
        if from == to && slice.size() == 0 {
            return Ok(self);
        }
        self.step(Step::Replace {
            from,
            to,
            slice,
            structure: false,
        })
    }

    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        content: Fragment,
    ) -> Result<&mut Self, StepError> {
        self.replace(from, to, Slice::new(content, 0, 0))
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, StepError> {
        self.replace(from, to, Slice::empty())
    }

    pub fn insert(&mut self, pos: usize, node: Node) -> Result<&mut Self, StepError> {
        self.replace_with(pos, pos, Fragment::from_node(node))
    }

    /// Delete `from..to`, widening the range to whole nodes when that is what
    /// the range covers, so that no empty shells are left behind.
    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<&mut Self, StepError> {
        let rfrom = self.doc.resolve(from)?;
        let rto = self.doc.resolve(to)?;
        let covered = covered_depths(&rfrom, &rto);
        for (i, &depth) in covered.iter().enumerate() {
            let last = i + 1 == covered.len();
            if (last && depth == 0) || rfrom.node(depth).ty().content_match().valid_end() {
                return self.delete(rfrom.start(depth), rto.end(depth));
            }
            if depth > 0
                && (last
                    || rfrom.node(depth - 1).can_replace(
                        rfrom.index(depth - 1),
                        rto.index_after(depth - 1),
                        &Fragment::empty(),
                    ))
            {
                return self.delete(rfrom.before(depth), rto.after(depth));
            }
        }
        for d in 1..=rfrom.depth.min(rto.depth) {
            if from - rfrom.start(d) == rfrom.depth - d
                && to > rfrom.end(d)
                && rto.end(d) - to != rto.depth - d
                && rfrom.start(d - 1) == rto.start(d - 1)
                && rfrom.node(d - 1).can_replace(
                    rfrom.index(d - 1),
                    rto.index(d - 1),
                    &Fragment::empty(),
                )
            {
                return self.delete(rfrom.before(d), to);
            }
        }
        self.delete(from, to)
    }

    /// Join the blocks around `pos`, removing `depth` levels of boundaries
    /// on each side.
    pub fn join(&mut self, pos: usize, depth: usize) -> Result<&mut Self, StepError> {
        if depth > pos {
            return Err(StepError::Invalid {
                operation: "join",
                reason: format!("depth {depth} at position {pos}"),
            });
        }
        self.step(Step::Replace {
            from: pos - depth,
            to: pos + depth,
            slice: Slice::empty(),
            structure: true,
        })
    }

    /// Move the content of `range` up to `target` depth, splitting the
    /// ancestors in between where the range does not cover them.
    pub fn lift(&mut self, range: &NodeRange, target: usize) -> Result<&mut Self, StepError> {
        let (rfrom, rto, depth) = (&range.from, &range.to, range.depth);
        let gap_start = rfrom.before(depth + 1);
        let gap_end = rto.after(depth + 1);
        let mut start = gap_start;
        let mut end = gap_end;

        let mut before = Fragment::empty();
        let mut open_start = 0;
        let mut splitting = false;
        for d in (target + 1..=depth).rev() {
            if splitting || rfrom.index(d) > 0 {
                splitting = true;
                before = Fragment::from_node(rfrom.node(d).copy(before));
                open_start += 1;
            } else {
                start -= 1;
            }
        }

        let mut after = Fragment::empty();
        let mut open_end = 0;
        let mut splitting = false;
        for d in (target + 1..=depth).rev() {
            if splitting || rto.after(d + 1) < rto.end(d) {
                splitting = true;
                after = Fragment::from_node(rto.node(d).copy(after));
                open_end += 1;
            } else {
                end += 1;
            }
        }

        let insert = before.size() - open_start;
        self.step(Step::ReplaceAround {
            from: start,
            to: end,
            gap_from: gap_start,
            gap_to: gap_end,
            slice: Slice::new(before.append(&after), open_start, open_end),
            insert,
            structure: true,
        })
    }

    /// Wrap the content of `range` in the given wrappers, outermost first.
    pub fn wrap(
        &mut self,
        range: &NodeRange,
        wrappers: &[NodeTemplate],
    ) -> Result<&mut Self, StepError> {
        let mut content = Fragment::empty();
        for wrapper in wrappers.iter().rev() {
            if content.size() > 0 {
                let fits = wrapper
                    .ty
                    .content_match()
                    .match_fragment(&content)
                    .is_some_and(|m| m.valid_end());
                if !fits {
                    return Err(StepError::Invalid {
                        operation: "wrap",
                        reason: format!("{} cannot hold {content}", wrapper.ty.name()),
                    });
                }
            }
            content =
                Fragment::from_node(wrapper.ty.create(wrapper.attrs.as_ref(), content, vec![])?);
        }
        let (start, end) = (range.start(), range.end());
        self.step(Step::ReplaceAround {
            from: start,
            to: end,
            gap_from: start,
            gap_to: end,
            slice: Slice::new(content, 0, 0),
            insert: wrappers.len(),
            structure: true,
        })
    }

    /// Split the node at `pos`, `depth` levels deep. `types_after` gives the
    /// type of the split-off node per level, outermost first; `None` copies
    /// the original node.
    pub fn split(
        &mut self,
        pos: usize,
        depth: usize,
        types_after: &[Option<NodeTemplate>],
    ) -> Result<&mut Self, StepError> {
        let rpos = self.doc.resolve(pos)?;
        if depth == 0 || depth > rpos.depth {
            return Err(StepError::Invalid {
                operation: "split",
                reason: format!("depth {depth} at position {pos}"),
            });
        }
        let base = rpos.depth - depth;
        let mut before = Fragment::empty();
        let mut after = Fragment::empty();
        for d in (base + 1..=rpos.depth).rev() {
            let node = rpos.node(d);
            before = Fragment::from_node(node.copy(before));
            let split_off = match types_after.get(d - base - 1).and_then(Option::as_ref) {
                Some(t) => t.ty.create(t.attrs.as_ref(), after, vec![])?,
                None => node.copy(after),
            };
            after = Fragment::from_node(split_off);
        }
        self.step(Step::Replace {
            from: pos,
            to: pos,
            slice: Slice::new(before.append(&after), depth, depth),
            structure: true,
        })
    }

    /// Change the type and attributes of the node at `pos`, keeping its
    /// content and marks. Attributes fall back to the type's defaults.
    pub fn set_node_markup(
        &mut self,
        pos: usize,
        ty: Option<&NodeType>,
        attrs: Option<&Attrs>,
    ) -> Result<&mut Self, StepError> {
        let node = self.doc.node_at(pos).ok_or(StepError::NoNodeAt(pos))?.clone();
        let ty = ty.unwrap_or(node.ty());
        let new_node = ty.create(attrs, Fragment::empty(), node.marks().to_vec())?;
        if node.is_leaf() {
            return self.replace_with(pos, pos + node.node_size(), Fragment::from_node(new_node));
        }
        if !ty.valid_content(node.content()) {
            return Err(StepError::Invalid {
                operation: "set_node_markup",
                reason: format!("{} cannot hold {}", ty.name(), node.content()),
            });
        }
        let end = pos + node.node_size();
        self.step(Step::ReplaceAround {
            from: pos,
            to: end,
            gap_from: pos + 1,
            gap_to: end - 1,
            slice: Slice::new(Fragment::from_node(new_node), 0, 0),
            insert: 1,
            structure: true,
        })
    }

    /// Add `mark` to the inline content in `from..to` that allows it.
    pub fn add_mark(
        &mut self,
        from: usize,
        to: usize,
        mark: &Mark,
    ) -> Result<&mut Self, StepError> {
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        self.doc.nodes_between(from, to, |node, pos, parent, _| {
            if !node.is_inline() {
                return true;
            }
            let allowed = parent.is_some_and(|p| p.ty().allows_mark_type(mark.ty()));
            if allowed && !mark.is_in_set(node.marks()) {
                let start = pos.max(from);
                let end = (pos + node.node_size()).min(to);
                match ranges.last_mut() {
                    Some(last) if last.1 == start => last.1 = end,
                    _ => ranges.push((start, end)),
                }
            }
            true
        });
        for (from, to) in ranges {
            self.step(Step::AddMark {
                from,
                to,
                mark: mark.clone(),
            })?;
        }
        Ok(self)
    }

    /// Remove marks of `mark_type` from the inline content in `from..to`.
    pub fn remove_mark(
        &mut self,
        from: usize,
        to: usize,
        mark_type: &MarkType,
    ) -> Result<&mut Self, StepError> {
        struct Run {
            mark: Mark,
            from: usize,
            to: usize,
            step: usize,
        }
        let mut runs: Vec<Run> = Vec::new();
        let mut step = 0;
        self.doc.nodes_between(from, to, |node, pos, _, _| {
            if !node.is_inline() {
                return true;
            }
            step += 1;
            let end = (pos + node.node_size()).min(to);
            for mark in node.marks().iter().filter(|m| m.ty() == mark_type) {
                match runs.iter_mut().find(|r| r.step + 1 == step && &r.mark == mark) {
                    Some(run) => {
                        run.to = end;
                        run.step = step;
                    }
                    None => runs.push(Run {
                        mark: mark.clone(),
                        from: pos.max(from),
                        to: end,
                        step,
                    }),
                }
            }
            true
        });
        for run in runs {
            self.step(Step::RemoveMark {
                from: run.from,
                to: run.to,
                mark: run.mark,
            })?;
        }
        Ok(self)
    }
}

/// Depths at which `from..to` spans the whole content of the ancestor.
fn covered_depths(rfrom: &ResolvedPos, rto: &ResolvedPos) -> Vec<usize> {
    let mut result = Vec::new();
    for d in (0..=rfrom.depth.min(rto.depth)).rev() {
        let start = rfrom.start(d);
        if start < rfrom.pos - (rfrom.depth - d)
            || rto.end(d) > rto.pos + (rto.depth - d)
            || rfrom.node(d).ty().is_isolating()
            || rto.node(d).ty().is_isolating()
        {
            break;
        }
        if start == rto.start(d)
            || (d == rfrom.depth
                && d == rto.depth
                && rfrom.parent().inline_content()
                && rto.parent().inline_content()
                && d > 0
                && rto.start(d - 1) + 1 == start)
        {
            result.push(d);
        }
    }
    result
}
