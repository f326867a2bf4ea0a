use std::sync::Arc;

use super::selection::{Direction, Selection};
use crate::model::{Attrs, Fragment, Mark, MarkType, Node, NodeRange, NodeType, Schema, Slice};
use crate::transform::{Mapping, NodeTemplate, Step, StepError, Transform};

/// A [`Transform`] on an editor state's document, plus the selection and
/// stored marks the state should have once it is applied.
///
/// The selection is tracked against the step it was set at and mapped
/// forward through later steps on demand, so document changes never leave
/// it pointing into the wrong place.
#[derive(Debug, Clone)]
pub struct Transaction {
    schema: Arc<Schema>,
    transform: Transform,
    selection: Selection,
    selection_for: usize,
    selection_set: bool,
    stored_marks: Option<Vec<Mark>>,
    stored_marks_for: usize,
    stored_marks_set: bool,
    scroll_into_view: bool,
}

macro_rules! delegate_steps {
    ($($(#[$meta:meta])* $name:ident($($arg:ident: $ty:ty),*);)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self, $($arg: $ty),*) -> Result<&mut Self, StepError> {
                self.transform.$name($($arg),*)?;
                Ok(self)
            }
        )*
    };
}

impl Transaction {
    pub(crate) fn new(
        schema: Arc<Schema>,
        doc: Node,
        selection: Selection,
        stored_marks: Option<Vec<Mark>>,
    ) -> Self {
        Self {
            schema,
            transform: Transform::new(doc),
            selection,
            selection_for: 0,
            selection_set: false,
            stored_marks,
            stored_marks_for: 0,
            stored_marks_set: false,
            scroll_into_view: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn doc(&self) -> &Node {
        self.transform.doc()
    }

    pub fn before(&self) -> &Node {
        self.transform.before()
    }

    pub fn steps(&self) -> &[Step] {
        self.transform.steps()
    }

    pub fn mapping(&self) -> &Mapping {
        self.transform.mapping()
    }

    pub fn doc_changed(&self) -> bool {
        self.transform.doc_changed()
    }

    delegate_steps! {
        step(step: Step);
        insert(pos: usize, node: Node);
        replace(from: usize, to: usize, slice: Slice);
        replace_with(from: usize, to: usize, content: Fragment);
        delete(from: usize, to: usize);
        delete_range(from: usize, to: usize);
        join(pos: usize, depth: usize);
        lift(range: &NodeRange, target: usize);
        wrap(range: &NodeRange, wrappers: &[NodeTemplate]);
        split(pos: usize, depth: usize, types_after: &[Option<NodeTemplate>]);
        set_node_markup(pos: usize, ty: Option<&NodeType>, attrs: Option<&Attrs>);
        add_mark(from: usize, to: usize, mark: &Mark);
        remove_mark(from: usize, to: usize, mark_type: &MarkType);
    }

    /// The selection, mapped through any steps added since it was set.
    pub fn selection(&self) -> Selection {
        if self.selection_for < self.steps().len() {
            self.selection
                .map(self.doc(), &self.mapping().slice(self.selection_for))
        } else {
            self.selection
        }
    }

    pub fn selection_set(&self) -> bool {
        self.selection_set
    }

    /// Set the selection. Stored marks are cleared.
    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = selection;
        self.selection_for = self.steps().len();
        self.selection_set = true;
        self.stored_marks = None;
        self.stored_marks_for = self.steps().len();
        self.stored_marks_set = false;
        self
    }

    /// Stored marks apply to the next typed text. Any document change made
    /// after they were set clears them.
    pub fn stored_marks(&self) -> Option<&[Mark]> {
        if self.stored_marks_for < self.steps().len() {
            None
        } else {
            self.stored_marks.as_deref()
        }
    }

    pub fn stored_marks_set(&self) -> bool {
        self.stored_marks_set
    }

    pub fn set_stored_marks(&mut self, marks: Option<Vec<Mark>>) -> &mut Self {
        self.stored_marks = marks;
        self.stored_marks_for = self.steps().len();
        self.stored_marks_set = true;
        self
    }

    pub fn add_stored_mark(&mut self, mark: &Mark) -> &mut Self {
        let current = self.current_marks();
        let marks = mark.add_to_set(&current);
        self.ensure_marks(marks)
    }

    pub fn remove_stored_mark(&mut self, mark_type: &MarkType) -> &mut Self {
        let current = self.current_marks();
        let marks = mark_type.remove_from_set(&current);
        self.ensure_marks(marks)
    }

    fn current_marks(&self) -> Vec<Mark> {
        match self.stored_marks() {
            Some(marks) => marks.to_vec(),
            None => self.marks_at_selection(),
        }
    }

    fn marks_at_selection(&self) -> Vec<Mark> {
        self.doc()
            .resolve(self.selection().from())
            .map(|rpos| rpos.marks())
            .unwrap_or_default()
    }

    fn ensure_marks(&mut self, marks: Vec<Mark>) -> &mut Self {
        if !Mark::same_set(&self.current_marks(), &marks) {
            self.set_stored_marks(Some(marks));
        }
        self
    }

    pub fn scroll_into_view(&mut self) -> &mut Self {
        self.scroll_into_view = true;
        self
    }

    pub fn is_scroll_into_view(&self) -> bool {
        self.scroll_into_view
    }

    /// Delete the selected content, placing the cursor where it was.
    pub fn delete_selection(&mut self) -> Result<&mut Self, StepError> {
        let selection = self.selection();
        let (from, to) = (selection.from(), selection.to(self.doc()));
        if from == to {
            return Ok(self);
        }
        let start = self.steps().len();
        self.transform.delete_range(from, to)?;
        self.selection_to_insertion_end(start, Direction::Forward);
        Ok(self)
    }

    /// Replace the selection with `node`. Inline nodes take the stored marks,
    /// or the marks at the selection, when `inherit_marks` is set.
    pub fn replace_selection_with(
        &mut self,
        node: Node,
        inherit_marks: bool,
    ) -> Result<&mut Self, StepError> {
        let node = if inherit_marks && node.is_inline() {
            let marks = self.current_marks();
            node.with_marks(marks)
        } else {
            node
        };
        let selection = self.selection();
        let (from, to) = (selection.from(), selection.to(self.doc()));
        let start = self.steps().len();
        let bias = if node.is_inline() {
            Direction::Backward
        } else {
            Direction::Forward
        };
        let mut working = self.transform.clone();
        if from < to {
            working.delete_range(from, to)?;
        }
        let at = working.mapping().slice(start).map(from, Default::default());
        working.insert(at, node)?;
        self.transform = working;
        self.selection_to_insertion_end(start, bias);
        Ok(self)
    }

    /// Replace the selection with text carrying the current marks.
    pub fn insert_text(&mut self, text: &str) -> Result<&mut Self, StepError> {
        if text.is_empty() {
            return self.delete_selection();
        }
        let node = self.schema.text(text, Vec::new());
        self.replace_selection_with(node, true)
    }

    /// Append the steps of `other`, which must have been built against this
    /// transaction's current document. Its selection and stored marks win
    /// when it set them.
    pub fn extend(&mut self, other: Transaction) -> Result<&mut Self, StepError> {
        if other.before() != self.doc() {
            return Err(StepError::Invalid {
                operation: "extend",
                reason: "transaction starts from a different document".into(),
            });
        }
        let mut working = self.transform.clone();
        for step in other.steps() {
            working.step(step.clone())?;
        }
        self.transform = working;
        if other.selection_set {
            self.set_selection(other.selection());
        }
        if other.stored_marks_set {
            self.set_stored_marks(other.stored_marks().map(<[Mark]>::to_vec));
        }
        self.scroll_into_view |= other.scroll_into_view;
        Ok(self)
    }

    /// Put the cursor at the end of the content inserted by the last step,
    /// if that step was added after `start_len`.
    fn selection_to_insertion_end(&mut self, start_len: usize, bias: Direction) {
        let steps = self.steps().len();
        if steps <= start_len {
            return;
        }
        if !matches!(
            self.steps()[steps - 1],
            Step::Replace { .. } | Step::ReplaceAround { .. }
        ) {
            return;
        }
        let mut end = None;
        self.mapping().maps()[steps - 1].for_each(|_, _, _, new_to| {
            end.get_or_insert(new_to);
        });
        let Some(end) = end else {
            return;
        };
        let selection = match self.doc().resolve(end) {
            Ok(rpos) => Selection::near(&rpos, bias),
            Err(_) => Selection::at_end(self.doc()),
        };
        self.set_selection(selection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, hr, li, p, strong, ul};
    use pretty_assertions::assert_eq;

    // ==== selection tracking ====

    #[test]
    fn test_selection_maps_through_steps() {
        let state = doc!(p!("ab<a>c")).state();
        let mut tr = state.tr();
        tr.insert(1, state.schema().text("xy", vec![])).unwrap();
        assert_eq!(tr.selection(), Selection::cursor(5));
        assert!(!tr.selection_set());
    }

    #[test]
    fn test_delete_selection_places_cursor() {
        let state = doc!(p!("a<a>bc<b>d")).state();
        let mut tr = state.tr();
        tr.delete_selection().unwrap();
        assert_eq!(tr.doc(), &doc!(p!("ad")).doc);
        assert_eq!(tr.selection(), Selection::cursor(2));
    }

    #[test]
    fn test_delete_selection_across_items() {
        let state = doc!(ul!(li!(p!("o<a>ne")), li!(p!("tw<b>o")))).state();
        let mut tr = state.tr();
        tr.delete_selection().unwrap();
        assert_eq!(tr.doc(), &doc!(ul!(li!(p!("oo")))).doc);
        assert_eq!(tr.selection(), Selection::cursor(4));
    }

    #[test]
    fn test_insert_text_uses_stored_marks() {
        let state = doc!(p!("a<a>")).state();
        let strong = state.schema().mark("strong", None).unwrap();
        let mut tr = state.tr();
        tr.add_stored_mark(&strong);
        assert_eq!(tr.stored_marks(), Some(&[strong.clone()][..]));
        tr.insert_text("b").unwrap();
        assert_eq!(tr.doc(), &doc!(p!("a", strong!("b"))).doc);
        assert_eq!(tr.selection(), Selection::cursor(3));
        assert_eq!(tr.stored_marks(), None);
    }

    #[test]
    fn test_insert_text_inherits_marks() {
        let state = doc!(p!(strong!("a<a>"))).state();
        let mut tr = state.tr();
        tr.insert_text("b").unwrap();
        assert_eq!(tr.doc(), &doc!(p!(strong!("ab"))).doc);
    }

    #[test]
    fn test_replace_selection_with_block_node() {
        let state = doc!(p!("a"), p!("<a>b")).state();
        let rule = state
            .schema()
            .node_type("horizontal_rule")
            .unwrap()
            .create(None, Fragment::empty(), vec![])
            .unwrap();
        let mut tr = state.tr();
        tr.set_selection(Selection::node(3));
        tr.replace_selection_with(rule, false).unwrap();
        assert_eq!(tr.doc(), &doc!(p!("a"), hr!()).doc);
    }

    // ==== extend ====

    #[test]
    fn test_extend_appends_steps_and_selection() {
        let state = doc!(p!("ab<a>")).state();
        let mut first = state.tr();
        first.insert_text("c").unwrap();
        let next_state = state.apply(first.clone()).unwrap();
        let mut second = next_state.tr();
        second.insert_text("d").unwrap();
        first.extend(second).unwrap();
        assert_eq!(first.doc(), &doc!(p!("abcd")).doc);
        assert_eq!(first.selection(), Selection::cursor(5));
        assert_eq!(first.steps().len(), 2);
    }

    #[test]
    fn test_extend_rejects_unrelated_transaction() {
        let state = doc!(p!("ab")).state();
        let mut first = state.tr();
        first.insert_text("c").unwrap();
        let mut other = state.tr();
        other.insert_text("d").unwrap();
        assert!(first.extend(other).is_err());
        assert_eq!(first.steps().len(), 1);
    }
}
