//! List-aware Enter, Backspace and Delete.
//!
//! Enter and Backspace are [`Rules`]: ordered guard and command pairs where
//! the first rule whose guard holds and whose command applies wins. Delete
//! is the generic delete followed by a fixed [`Pipeline`] of transaction
//! post-processors.

use crate::state::{EditorState, Selection, Transaction};
use crate::transform::{Assoc, can_join};

use super::base::{
    at_block_end, at_block_start, base_backspace, base_delete, exit_code, split_block,
};
use super::list::{lift_item, split_item};
use super::{BoxedCommand, Chain, Command, TextblockView, boxed, chain, declined};

const PARAGRAPH: &str = "paragraph";
const LIST_ITEM: &str = "list_item";
const HARD_BREAK: &str = "hard_break";

pub type Guard = fn(&EditorState, Option<&dyn TextblockView>) -> bool;

/// A named guard and the command it unlocks.
#[derive(Clone)]
pub struct Rule {
    pub name: &'static str,
    pub when: Guard,
    pub then: BoxedCommand,
}

impl Rule {
    pub fn new(name: &'static str, when: Guard, then: BoxedCommand) -> Self {
        Self { name, when, then }
    }

    /// The rule's transaction, when its guard holds and its command applies.
    pub fn fire(
        &self,
        state: &EditorState,
        view: Option<&dyn TextblockView>,
    ) -> Option<Transaction> {
        if !(self.when)(state, view) {
            return None;
        }
        self.then.apply(state, view)
    }
}

/// Rules tried in priority order; only the first that fires produces a
/// transaction.
#[derive(Clone)]
pub struct Rules {
    rules: Vec<Rule>,
}

impl Rules {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The name of the rule that would fire.
    pub fn firing(
        &self,
        state: &EditorState,
        view: Option<&dyn TextblockView>,
    ) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.fire(state, view).is_some())
            .map(|rule| rule.name)
    }
}

impl Command for Rules {
    fn apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> Option<Transaction> {
        self.rules.iter().find_map(|rule| {
            let tr = rule.fire(state, view)?;
            log::trace!("rule {} fired", rule.name);
            Some(tr)
        })
    }
}

/// Rewrites a transaction before it is dispatched. Receives the state the
/// transaction was built from.
pub type PostProcess = fn(&EditorState, Option<&dyn TextblockView>, Transaction) -> Transaction;

/// A command whose transaction passes through post-processors in order.
/// Applicability is the command's own.
#[derive(Clone)]
pub struct Pipeline {
    command: BoxedCommand,
    stages: Vec<(&'static str, PostProcess)>,
}

impl Pipeline {
    pub fn new(command: BoxedCommand, stages: Vec<(&'static str, PostProcess)>) -> Self {
        Self { command, stages }
    }
}

impl Command for Pipeline {
    fn apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> Option<Transaction> {
        let tr = self.command.apply(state, view)?;
        Some(self.stages.iter().fold(tr, |tr, (name, stage)| {
            log::trace!("post-processing with {name}");
            stage(state, view, tr)
        }))
    }

    fn can_apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> bool {
        self.command.can_apply(state, view)
    }
}

fn always(_: &EditorState, _: Option<&dyn TextblockView>) -> bool {
    true
}

// ==== Enter ====

fn in_list_item(state: &EditorState, _view: Option<&dyn TextblockView>) -> bool {
    state
        .resolved_from()
        .is_ok_and(|rpos| rpos.depth >= 1 && rpos.node(rpos.depth - 1).type_name() == LIST_ITEM)
}

/// An empty textblock that is the last child of a list item.
fn in_empty_item_tail(state: &EditorState, _view: Option<&dyn TextblockView>) -> bool {
    let Some(cursor) = state.cursor() else {
        return false;
    };
    if cursor.depth < 1 || cursor.parent().content_size() > 0 {
        return false;
    }
    let item = cursor.node(cursor.depth - 1);
    item.type_name() == LIST_ITEM && cursor.index_after(cursor.depth - 1) == item.child_count()
}

/// A selected non-textblock node that sits among blocks.
fn on_block_node(state: &EditorState, _view: Option<&dyn TextblockView>) -> bool {
    let Some(node) = state.selected_node() else {
        return false;
    };
    !node.is_textblock() && state.resolved_from().is_ok_and(|rpos| !rpos.parent().inline_content())
}

fn split_list_item_rule(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let item_type = declined("enter", state.schema().node_type(LIST_ITEM))?;
    split_item(state, item_type)
}

fn lift_list_item_rule(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let item_type = declined("enter", state.schema().node_type(LIST_ITEM))?;
    lift_item(state, item_type)
}

fn paragraph_after_node(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let to = state.selection().to(state.doc());
    paragraph_at(state, to)
}

/// Enter: split the list item, lift an empty trailing item block out of
/// its list, open a paragraph after a selected block node, or split the
/// block.
pub fn enter() -> Rules {
    Rules::new(vec![
        Rule::new("split_list_item", in_list_item, boxed(split_list_item_rule)),
        Rule::new("lift_empty_list_item", in_empty_item_tail, boxed(lift_list_item_rule)),
        Rule::new("paragraph_after_node", on_block_node, boxed(paragraph_after_node)),
        Rule::new("split_block", always, boxed(split_block)),
    ])
}

// ==== Backspace ====

/// At the start of the first block of a list item that has a previous
/// sibling item.
fn follows_sibling_item(state: &EditorState, view: Option<&dyn TextblockView>) -> bool {
    let Some(cursor) = at_block_start(state, view) else {
        return false;
    };
    if cursor.depth < 2 {
        return false;
    }
    let item_depth = cursor.depth - 1;
    cursor.node(item_depth).type_name() == LIST_ITEM
        && cursor.index(item_depth) == 0
        && cursor.index(item_depth - 1) > 0
}

fn join_with_previous_item(
    state: &EditorState,
    view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let cursor = at_block_start(state, view)?;
    let mut tr = state.tr();
    declined("backspace", tr.join(cursor.before(cursor.depth - 1), 2))?;
    tr.scroll_into_view();
    Some(tr)
}

/// Backspace: merge a list item into the one before it, otherwise the
/// generic Backspace.
pub fn backspace() -> Rules {
    Rules::new(vec![
        Rule::new("join_list_item", follows_sibling_item, boxed(join_with_previous_item)),
        Rule::new("base", always, boxed(base_backspace())),
    ])
}

// ==== Delete ====

/// When the cursor started in an empty textblock and the delete left a leaf
/// node selected, remove that node too.
fn drop_selected_leaf(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
    mut tr: Transaction,
) -> Transaction {
    let started_empty = state
        .resolved_from()
        .is_ok_and(|rpos| rpos.parent().child_count() == 0);
    let leaf_selected = tr
        .selection()
        .selected_node(tr.doc())
        .is_some_and(|node| node.is_leaf());
    if started_empty
        && leaf_selected
        && let Err(e) = tr.delete_selection()
    {
        log::debug!("drop_selected_leaf skipped: {e}");
    }
    tr
}

/// The position after the top-level list when the cursor ends a paragraph
/// in the list's last item and a paragraph follows the list.
fn list_tail_cut(state: &EditorState, view: Option<&dyn TextblockView>) -> Option<usize> {
    let cursor = at_block_end(state, view)?;
    if cursor.parent().type_name() != PARAGRAPH || cursor.depth < 2 {
        return None;
    }
    let item_depth = cursor.depth - 1;
    let list = cursor.node(item_depth - 1);
    if cursor.node(item_depth).type_name() != LIST_ITEM
        || cursor.index_after(item_depth - 1) != list.child_count()
    {
        return None;
    }
    let cut = cursor.after(1);
    state
        .doc()
        .child_after(cut)
        .node
        .is_some_and(|node| node.type_name() == PARAGRAPH)
        .then_some(cut)
}

/// Pull the paragraph that followed the list into the last item's
/// paragraph, once the delete has wrapped it into an item.
fn join_list_tail(
    state: &EditorState,
    view: Option<&dyn TextblockView>,
    mut tr: Transaction,
) -> Transaction {
    let Some(cut) = list_tail_cut(state, view) else {
        return tr;
    };
    let at = tr.mapping().map(cut - 1, Assoc::After);
    if can_join(tr.doc(), at)
        && let Err(e) = tr.join(at, 2)
    {
        log::debug!("join_list_tail skipped: {e}");
    }
    tr
}

/// Delete: the generic Delete, then leaf cleanup, then the list tail join.
pub fn delete() -> Pipeline {
    Pipeline::new(
        boxed(base_delete()),
        vec![
            ("drop_selected_leaf", drop_selected_leaf as PostProcess),
            ("join_list_tail", join_list_tail as PostProcess),
        ],
    )
}

// ==== paragraph insertion ====

fn paragraph_at(state: &EditorState, pos: usize) -> Option<Transaction> {
    let schema = state.schema();
    let paragraph =
        declined("insert_paragraph_at", schema.node_type(PARAGRAPH))?.create_and_fill(schema)?;
    let mut tr = state.tr();
    declined("insert_paragraph_at", tr.insert(pos, paragraph))?;
    tr.set_selection(Selection::cursor(pos + 1));
    Some(tr)
}

/// Insert an empty paragraph at `pos` and put the cursor in it.
pub fn insert_paragraph_at(pos: usize) -> impl Command + Clone + Send + Sync {
    move |state: &EditorState, _view: Option<&dyn TextblockView>| paragraph_at(state, pos)
}

pub fn insert_paragraph_at_end(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    paragraph_at(state, state.doc().content_size())
}

/// With a non-textblock node selected at the very end of the document,
/// append a paragraph.
pub fn add_paragraph_if_at_end(
    state: &EditorState,
    view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let node = state.selected_node()?;
    if node.is_textblock() || state.selection().to(state.doc()) != state.doc().content_size() {
        return None;
    }
    insert_paragraph_at_end(state, view)
}

/// A click at `pos`: at the end of a document whose last block is not a
/// textblock, append a paragraph to put the cursor in.
pub fn click_at(pos: usize) -> impl Command + Clone + Send + Sync {
    move |state: &EditorState, view: Option<&dyn TextblockView>| {
        let doc = state.doc();
        if pos != doc.content_size() || doc.last_child().is_none_or(|last| last.is_textblock()) {
            return None;
        }
        insert_paragraph_at_end(state, view)
    }
}

fn replace_with_hard_break(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let hard_break =
        declined("insert_hard_break", state.schema().node(HARD_BREAK, None, Vec::new()))?;
    let mut tr = state.tr();
    declined("insert_hard_break", tr.replace_selection_with(hard_break, true))?;
    tr.scroll_into_view();
    Some(tr)
}

/// Leave a code block, or replace the selection with a hard break.
pub fn insert_hard_break() -> Chain {
    chain(vec![boxed(exit_code), boxed(replace_with_hard_break)])
}
