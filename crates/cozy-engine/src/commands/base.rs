//! Generic editing commands: deleting and joining across block
//! boundaries, splitting blocks, node selection and mark toggling.
//!
//! Each command takes the state and optional view and returns the
//! transaction it would dispatch. They know nothing about lists beyond
//! what the schema says; the list-aware behaviour lives in
//! [`super::structural`].

use crate::model::{ContentMatch, Fragment, MarkType, Node, NodeType, ResolvedPos, Schema, Slice};
use crate::state::selection::is_selectable;
use crate::state::{Direction, EditorState, Selection, Transaction};
use crate::transform::{Assoc, NodeTemplate, Step, can_join, can_split, lift_target};

use super::{Chain, Command, TextblockView, boxed, chain, declined};

// ==== boundary helpers ====

/// The cursor, if the selection is empty and sits at the start of its
/// textblock. The view decides when one is given.
pub(crate) fn at_block_start(
    state: &EditorState,
    view: Option<&dyn TextblockView>,
) -> Option<ResolvedPos> {
    let cursor = state.cursor()?;
    let at_start = match view {
        Some(view) => view.end_of_textblock(Direction::Backward, state),
        None => cursor.is_at_start_of_ancestor(cursor.depth),
    };
    at_start.then_some(cursor)
}

pub(crate) fn at_block_end(
    state: &EditorState,
    view: Option<&dyn TextblockView>,
) -> Option<ResolvedPos> {
    let cursor = state.cursor()?;
    let at_end = match view {
        Some(view) => view.end_of_textblock(Direction::Forward, state),
        None => cursor.is_at_end_of_ancestor(cursor.depth),
    };
    at_end.then_some(cursor)
}

/// The nearest block boundary before `rpos` that has a sibling on its
/// left, without crossing an isolating node.
pub(crate) fn find_cut_before(rpos: &ResolvedPos) -> Option<ResolvedPos> {
    if rpos.parent().ty().is_isolating() {
        return None;
    }
    for depth in (0..rpos.depth).rev() {
        if rpos.index(depth) > 0 {
            return rpos.doc().resolve(rpos.before(depth + 1)).ok();
        }
        if rpos.node(depth).ty().is_isolating() {
            break;
        }
    }
    None
}

pub(crate) fn find_cut_after(rpos: &ResolvedPos) -> Option<ResolvedPos> {
    if rpos.parent().ty().is_isolating() {
        return None;
    }
    for depth in (0..rpos.depth).rev() {
        let parent = rpos.node(depth);
        if rpos.index(depth) + 1 < parent.child_count() {
            return rpos.doc().resolve(rpos.after(depth + 1)).ok();
        }
        if parent.ty().is_isolating() {
            break;
        }
    }
    None
}

/// Whether `node` leads to a textblock along its first (`at_start`) or
/// last children. With `only`, every node on the way must have exactly
/// one child.
fn textblock_at(node: &Node, at_start: bool, only: bool) -> bool {
    let mut node = Some(node);
    while let Some(current) = node {
        if current.is_textblock() {
            return true;
        }
        if only && current.child_count() != 1 {
            return false;
        }
        node = if at_start {
            current.first_child()
        } else {
            current.last_child()
        };
    }
    false
}

/// The first textblock type allowed at `content_match` that can be created
/// without attributes.
pub(crate) fn default_block_at(content_match: &ContentMatch, schema: &Schema) -> Option<NodeType> {
    content_match
        .edges(schema)
        .into_iter()
        .find(|ty| ty.is_textblock() && !ty.has_required_attrs())
}

/// Resolved anchor and head. A node selection runs from its start to its end.
fn anchor_and_head(state: &EditorState) -> Option<(ResolvedPos, ResolvedPos)> {
    let doc = state.doc();
    let (anchor, head) = match state.selection() {
        Selection::Text { anchor, head } => (anchor, head),
        selection @ Selection::Node { from } => (from, selection.to(doc)),
    };
    Some((doc.resolve(anchor).ok()?, doc.resolve(head).ok()?))
}

fn finish(mut tr: Transaction) -> Option<Transaction> {
    tr.scroll_into_view();
    Some(tr)
}

// ==== joining across a boundary ====

/// Join the blocks on either side of `cut` when their content is
/// compatible, or delete the left one when it is empty.
fn join_maybe_clear(state: &EditorState, cut: &ResolvedPos) -> Option<Transaction> {
    let before = cut.node_before()?;
    let after = cut.node_after()?;
    let index = cut.index(cut.depth);
    if !before.ty().compatible_content(after.ty()) {
        return None;
    }
    let parent = cut.parent();
    if before.content_size() == 0
        && index > 0
        && parent.can_replace(index - 1, index, &Fragment::empty())
    {
        let mut tr = state.tr();
        declined("join", tr.delete(cut.pos - before.node_size(), cut.pos))?;
        return finish(tr);
    }
    if !parent.can_replace(index, index + 1, &Fragment::empty())
        || !(after.is_textblock() || can_join(state.doc(), cut.pos))
    {
        return None;
    }
    let mut tr = state.tr();
    declined("join", tr.join(cut.pos, 1))?;
    finish(tr)
}

/// Remove the boundary at `cut` between two blocks, trying in order: a
/// plain join, wrapping the right block into the left one, lifting the
/// right block's content out, and pulling the right textblock's content
/// into the left's deepest last textblock.
pub(crate) fn delete_barrier(
    state: &EditorState,
    cut: &ResolvedPos,
    dir: Direction,
) -> Option<Transaction> {
    let schema = state.schema();
    let before = cut.node_before()?;
    let after = cut.node_after()?;
    let isolated = before.ty().is_isolating() || after.ty().is_isolating();
    if !isolated && let Some(tr) = join_maybe_clear(state, cut) {
        return Some(tr);
    }

    let index = cut.index(cut.depth);
    let can_del_after = !isolated && cut.parent().can_replace(index, index + 1, &Fragment::empty());
    if can_del_after
        && let Some(end_match) = before.content_match_at(before.child_count())
        && let Some(conn) = end_match.find_wrapping(after.ty(), schema)
        && end_match
            .match_type(conn.first().unwrap_or(after.ty()))
            .is_some_and(|m| m.valid_end())
    {
        let end = cut.pos + after.node_size();
        let mut wrap = Fragment::empty();
        for ty in conn.iter().rev() {
            wrap = Fragment::from_node(declined("wrap", ty.create(None, wrap, Vec::new()))?);
        }
        wrap = Fragment::from_node(before.copy(wrap));
        let mut tr = state.tr();
        declined(
            "wrap",
            tr.step(Step::ReplaceAround {
                from: cut.pos - 1,
                to: end,
                gap_from: cut.pos,
                gap_to: end,
                slice: Slice::new(wrap, 1, 0),
                insert: conn.len(),
                structure: true,
            }),
        )?;
        let join_at = end + 2 * conn.len();
        let follows = tr
            .doc()
            .resolve(join_at)
            .ok()
            .and_then(|rjoin| rjoin.node_after())
            .is_some_and(|node| node.ty() == before.ty());
        if follows && can_join(tr.doc(), join_at) {
            declined("wrap", tr.join(join_at, 1))?;
        }
        return finish(tr);
    }

    let sel_after = if after.ty().is_isolating() || (dir == Direction::Forward && isolated) {
        None
    } else {
        Selection::find_from(cut, Direction::Forward, false)
    };
    if let Some(sel) = sel_after {
        let doc = state.doc();
        if let (Ok(rfrom), Ok(rto)) = (doc.resolve(sel.from()), doc.resolve(sel.to(doc)))
            && let Some(range) = rfrom.block_range(&rto, None)
            && let Some(target) = lift_target(&range)
            && target >= cut.depth
        {
            let mut tr = state.tr();
            declined("lift", tr.lift(&range, target))?;
            return finish(tr);
        }
    }

    if can_del_after && textblock_at(&after, true, true) && textblock_at(&before, false, false) {
        let mut wrap = Vec::new();
        let mut at = before.clone();
        loop {
            wrap.push(at.clone());
            if at.is_textblock() {
                break;
            }
            at = at.last_child()?.clone();
        }
        let mut after_text = after.clone();
        let mut after_depth = 1;
        while !after_text.is_textblock() {
            after_text = after_text.first_child()?.clone();
            after_depth += 1;
        }
        if at.can_replace(at.child_count(), at.child_count(), after_text.content()) {
            let mut end = Fragment::empty();
            for node in wrap.iter().rev() {
                end = Fragment::from_node(node.copy(end));
            }
            let mut tr = state.tr();
            declined(
                "join",
                tr.step(Step::ReplaceAround {
                    from: cut.pos - wrap.len(),
                    to: cut.pos + after.node_size(),
                    gap_from: cut.pos + after_depth,
                    gap_to: cut.pos + after.node_size() - after_depth,
                    slice: Slice::new(end, wrap.len(), 0),
                    insert: 0,
                    structure: true,
                }),
            )?;
            return finish(tr);
        }
    }
    None
}

/// Drop the empty textblock at `cursor` (and any ancestors left empty),
/// if the parent allows it.
fn delete_empty_block(
    state: &EditorState,
    cursor: &ResolvedPos,
    select: impl FnOnce(&Transaction) -> Option<Selection>,
) -> Option<Transaction> {
    let mut depth = cursor.depth;
    loop {
        let index = cursor.index(depth - 1);
        if cursor.node(depth - 1).can_replace(index, index + 1, &Fragment::empty()) {
            let mut tr = state.tr();
            declined("join", tr.delete(cursor.before(depth), cursor.after(depth)))?;
            if let Some(selection) = select(&tr) {
                tr.set_selection(selection);
            }
            return finish(tr);
        }
        if depth == 1 || cursor.node(depth - 1).child_count() > 1 {
            return None;
        }
        depth -= 1;
    }
}

// ==== commands ====

pub fn delete_selection(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    if state.selection().is_empty() {
        return None;
    }
    let mut tr = state.tr();
    declined("delete_selection", tr.delete_selection())?;
    finish(tr)
}

/// At the start of a textblock, join it with the block before it, or lift
/// it out of its parent when there is nothing before.
pub fn join_backward(state: &EditorState, view: Option<&dyn TextblockView>) -> Option<Transaction> {
    let cursor = at_block_start(state, view)?;
    let Some(cut) = find_cut_before(&cursor) else {
        let range = cursor.block_range(&cursor, None)?;
        let target = lift_target(&range)?;
        let mut tr = state.tr();
        declined("join_backward", tr.lift(&range, target))?;
        return finish(tr);
    };
    let before = cut.node_before()?;
    if let Some(tr) = delete_barrier(state, &cut, Direction::Backward) {
        return Some(tr);
    }

    let before_textblock = textblock_at(&before, false, false);
    if cursor.parent().content_size() == 0 && (before_textblock || is_selectable(&before)) {
        let cut_pos = cut.pos;
        let before_size = before.node_size();
        let found = delete_empty_block(state, &cursor, |tr| {
            if before_textblock {
                let mapped = tr.mapping().map(cut_pos, Assoc::Before);
                let rpos = tr.doc().resolve(mapped).ok()?;
                Selection::find_from(&rpos, Direction::Backward, false)
            } else {
                Some(Selection::node(cut_pos - before_size))
            }
        });
        if found.is_some() {
            return found;
        }
    }

    if before.is_atom() && cut.depth + 1 == cursor.depth {
        let mut tr = state.tr();
        declined("join_backward", tr.delete(cut.pos - before.node_size(), cut.pos))?;
        return finish(tr);
    }
    None
}

/// At the end of a textblock, join the block after it into it.
pub fn join_forward(state: &EditorState, view: Option<&dyn TextblockView>) -> Option<Transaction> {
    let cursor = at_block_end(state, view)?;
    let cut = find_cut_after(&cursor)?;
    let after = cut.node_after()?;
    if let Some(tr) = delete_barrier(state, &cut, Direction::Forward) {
        return Some(tr);
    }

    if cursor.parent().content_size() == 0
        && (textblock_at(&after, true, false) || is_selectable(&after))
    {
        let cut_pos = cut.pos;
        let after_textblock = textblock_at(&after, true, false);
        let found = delete_empty_block(state, &cursor, |tr| {
            let mapped = tr.mapping().map(cut_pos, Assoc::After);
            if after_textblock {
                let rpos = tr.doc().resolve(mapped).ok()?;
                Selection::find_from(&rpos, Direction::Forward, false)
            } else {
                Some(Selection::node(mapped))
            }
        });
        if found.is_some() {
            return found;
        }
    }

    if after.is_atom() && cut.depth + 1 == cursor.depth {
        let mut tr = state.tr();
        declined("join_forward", tr.delete(cut.pos, cut.pos + after.node_size()))?;
        return finish(tr);
    }
    None
}

/// Select the selectable node just before the cursor's textblock.
pub fn select_node_backward(
    state: &EditorState,
    view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let cursor = state.cursor()?;
    let cut = if cursor.parent().is_textblock() {
        find_cut_before(&at_block_start(state, view)?)?
    } else {
        cursor
    };
    let node = cut.node_before()?;
    if !is_selectable(&node) {
        return None;
    }
    let mut tr = state.tr();
    tr.set_selection(Selection::node(cut.pos - node.node_size()));
    finish(tr)
}

pub fn select_node_forward(
    state: &EditorState,
    view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let cursor = state.cursor()?;
    let cut = if cursor.parent().is_textblock() {
        find_cut_after(&at_block_end(state, view)?)?
    } else {
        cursor
    };
    let node = cut.node_after()?;
    if !is_selectable(&node) {
        return None;
    }
    let mut tr = state.tr();
    tr.set_selection(Selection::node(cut.pos));
    finish(tr)
}

/// Split the parent block at the selection, deleting selected text first.
/// Splitting at the end of a block creates the default block type.
pub fn split_block(state: &EditorState, _view: Option<&dyn TextblockView>) -> Option<Transaction> {
    let schema = state.schema();
    let rfrom = state.resolved_from().ok()?;

    if state.selected_node().is_some_and(|node| node.is_block()) {
        if rfrom.parent_offset == 0 || !can_split(state.doc(), rfrom.pos, 1, &[]) {
            return None;
        }
        let mut tr = state.tr();
        declined("split_block", tr.split(rfrom.pos, 1, &[]))?;
        return finish(tr);
    }
    if rfrom.depth == 0 {
        return None;
    }

    let mut types: Vec<Option<NodeTemplate>> = Vec::new();
    let mut depth = rfrom.depth;
    let (split_depth, default_type, at_end, at_start) = loop {
        if rfrom.node(depth).is_block() {
            let at_end = rfrom.end(depth) == rfrom.pos + (rfrom.depth - depth);
            let at_start = rfrom.start(depth) + (rfrom.depth - depth) == rfrom.pos;
            let default_type = rfrom
                .node(depth - 1)
                .content_match_at(rfrom.index_after(depth - 1))
                .and_then(|m| default_block_at(&m, schema));
            let first = if at_end {
                default_type.clone().map(NodeTemplate::new)
            } else {
                None
            };
            types.insert(0, first);
            break (depth, default_type, at_end, at_start);
        }
        if depth == 1 {
            return None;
        }
        types.insert(0, None);
        depth -= 1;
    };

    let mut tr = state.tr();
    declined("split_block", tr.delete_selection())?;
    let split_pos = tr.mapping().map(rfrom.pos, Assoc::After);
    if !can_split(tr.doc(), split_pos, types.len(), &types) {
        types[0] = default_type.clone().map(NodeTemplate::new);
        if !can_split(tr.doc(), split_pos, types.len(), &types) {
            return None;
        }
    }
    declined("split_block", tr.split(split_pos, types.len(), &types))?;

    if !at_end
        && at_start
        && let Some(default_type) = &default_type
        && rfrom.node(split_depth).ty() != default_type
    {
        let first = tr.mapping().map(rfrom.before(split_depth), Assoc::After);
        if let Ok(rfirst) = tr.doc().resolve(first) {
            let index = rfirst.index(rfirst.depth);
            if rfrom.node(split_depth - 1).can_replace_with(index, index + 1, default_type) {
                declined("split_block", tr.set_node_markup(first, Some(default_type), None))?;
            }
        }
    }
    finish(tr)
}

/// With a block node selected, insert an empty default textblock next to
/// it: before it when it starts its parent, after it otherwise.
pub fn create_paragraph_near(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let rfrom = state.resolved_from().ok()?;
    let rto = state.resolved_to().ok()?;
    if rfrom.parent().inline_content() || rto.parent().inline_content() {
        return None;
    }
    let ty = rto
        .parent()
        .content_match_at(rto.index_after(rto.depth))
        .and_then(|m| default_block_at(&m, state.schema()))?;
    if !ty.is_textblock() {
        return None;
    }
    let side = if rfrom.parent_offset == 0 && rto.index(rto.depth) < rto.parent().child_count() {
        rfrom.pos
    } else {
        rto.pos
    };
    let node = ty.create_and_fill(state.schema())?;
    let mut tr = state.tr();
    declined("create_paragraph_near", tr.insert(side, node))?;
    tr.set_selection(Selection::cursor(side + 1));
    finish(tr)
}

/// In an empty textblock, split the parent around it or lift it out.
pub fn lift_empty_block(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let cursor = state.cursor()?;
    if cursor.parent().content_size() > 0 {
        return None;
    }
    if cursor.depth > 1 && cursor.after(cursor.depth) != cursor.end(cursor.depth - 1) {
        let before = cursor.before(cursor.depth);
        if can_split(state.doc(), before, 1, &[]) {
            let mut tr = state.tr();
            declined("lift_empty_block", tr.split(before, 1, &[]))?;
            return finish(tr);
        }
    }
    let range = cursor.block_range(&cursor, None)?;
    let target = lift_target(&range)?;
    let mut tr = state.tr();
    declined("lift_empty_block", tr.lift(&range, target))?;
    finish(tr)
}

/// Inside a code block, replace the selection with a newline.
pub fn new_line_in_code(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    let (ranchor, rhead) = anchor_and_head(state)?;
    if !rhead.parent().ty().is_code() || !rhead.same_parent(&ranchor) {
        return None;
    }
    let mut tr = state.tr();
    declined("new_line_in_code", tr.insert_text("\n"))?;
    finish(tr)
}

/// Leave a code block by creating a default textblock after it.
pub fn exit_code(state: &EditorState, _view: Option<&dyn TextblockView>) -> Option<Transaction> {
    let (ranchor, rhead) = anchor_and_head(state)?;
    if !rhead.parent().ty().is_code() || !rhead.same_parent(&ranchor) || rhead.depth == 0 {
        return None;
    }
    let above = rhead.node(rhead.depth - 1);
    let after = rhead.index_after(rhead.depth - 1);
    let ty = above
        .content_match_at(after)
        .and_then(|m| default_block_at(&m, state.schema()))?;
    if !above.can_replace_with(after, after, &ty) {
        return None;
    }
    let pos = rhead.after(rhead.depth);
    let node = ty.create_and_fill(state.schema())?;
    let mut tr = state.tr();
    declined("exit_code", tr.insert(pos, node))?;
    if let Ok(rpos) = tr.doc().resolve(pos) {
        tr.set_selection(Selection::near(&rpos, Direction::Forward));
    }
    finish(tr)
}

/// Select from the first to the last text position of the document.
pub fn select_all(state: &EditorState, _view: Option<&dyn TextblockView>) -> Option<Transaction> {
    let doc = state.doc();
    let start = Selection::find_from(&doc.resolve(0).ok()?, Direction::Forward, true)?;
    let end =
        Selection::find_from(&doc.resolve(doc.content_size()).ok()?, Direction::Backward, true)?;
    let mut tr = state.tr();
    tr.set_selection(Selection::text(start.from(), end.from()));
    Some(tr)
}

fn select_textblock_side(state: &EditorState, dir: Direction) -> Option<Transaction> {
    let rpos = match dir {
        Direction::Backward => state.resolved_from(),
        Direction::Forward => state.resolved_to(),
    }
    .ok()?;
    let mut depth = rpos.depth;
    while rpos.node(depth).is_inline() {
        depth = depth.checked_sub(1)?;
    }
    if !rpos.node(depth).is_textblock() {
        return None;
    }
    let pos = match dir {
        Direction::Backward => rpos.start(depth),
        Direction::Forward => rpos.end(depth),
    };
    let mut tr = state.tr();
    tr.set_selection(Selection::cursor(pos));
    finish(tr)
}

pub fn select_textblock_start(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    select_textblock_side(state, Direction::Backward)
}

pub fn select_textblock_end(
    state: &EditorState,
    _view: Option<&dyn TextblockView>,
) -> Option<Transaction> {
    select_textblock_side(state, Direction::Forward)
}

// ==== generic key commands ====

/// Enter outside lists: a newline in code, a paragraph next to a selected
/// block, lifting an empty block, or a block split.
pub fn base_enter() -> Chain {
    chain(vec![
        boxed(new_line_in_code),
        boxed(create_paragraph_near),
        boxed(lift_empty_block),
        boxed(split_block),
    ])
}

/// Delete the selection, join backward, or select the node before.
pub fn base_backspace() -> Chain {
    chain(vec![boxed(delete_selection), boxed(join_backward), boxed(select_node_backward)])
}

/// Delete the selection, join forward, or select the node after.
pub fn base_delete() -> Chain {
    chain(vec![boxed(delete_selection), boxed(join_forward), boxed(select_node_forward)])
}

// ==== marks ====

fn mark_applies(doc: &Node, from: usize, to: usize, mark_type: &MarkType) -> bool {
    let mut applies = false;
    doc.nodes_between(from, to, |node, _, _, _| {
        if applies {
            return false;
        }
        applies = node.inline_content() && node.ty().allows_mark_type(mark_type);
        true
    });
    applies
}

fn range_has_mark(doc: &Node, from: usize, to: usize, mark_type: &MarkType) -> bool {
    let mut found = false;
    if to > from {
        doc.nodes_between(from, to, |node, _, _, _| {
            if mark_type.is_in_set(node.marks()).is_some() {
                found = true;
            }
            !found
        });
    }
    found
}

/// Toggle the named mark. With a cursor this only changes the stored marks;
/// with a range it adds the mark, trimming surrounding whitespace, unless
/// the range already carries it anywhere.
pub fn toggle_mark(mark_name: &'static str) -> impl Command + Clone + Send + Sync {
    move |state: &EditorState, _view: Option<&dyn TextblockView>| toggle_mark_in(state, mark_name)
}

fn toggle_mark_in(state: &EditorState, mark_name: &str) -> Option<Transaction> {
    let mark_type = declined("toggle_mark", state.schema().mark_type(mark_name))?.clone();
    let doc = state.doc();
    let selection = state.selection();
    let (from, to) = (selection.from(), selection.to(doc));
    if !mark_applies(doc, from, to, &mark_type) {
        return None;
    }

    let mut tr = state.tr();
    if let Some(cursor) = state.cursor() {
        let current = state
            .stored_marks()
            .map(<[_]>::to_vec)
            .unwrap_or_else(|| cursor.marks());
        if mark_type.is_in_set(&current).is_some() {
            tr.remove_stored_mark(&mark_type);
        } else {
            let mark = declined("toggle_mark", mark_type.create(None))?;
            tr.add_stored_mark(&mark);
        }
        return Some(tr);
    }

    if range_has_mark(doc, from, to, &mark_type) {
        declined("toggle_mark", tr.remove_mark(from, to, &mark_type))?;
    } else {
        let (mut from, mut to) = (from, to);
        let space_start = doc
            .resolve(from)
            .ok()
            .and_then(|rpos| rpos.node_after())
            .and_then(|node| {
                node.text()
                    .map(|text| text.chars().take_while(|c| c.is_whitespace()).count())
            })
            .unwrap_or(0);
        let space_end = doc
            .resolve(to)
            .ok()
            .and_then(|rpos| rpos.node_before())
            .and_then(|node| {
                node.text()
                    .map(|text| text.chars().rev().take_while(|c| c.is_whitespace()).count())
            })
            .unwrap_or(0);
        if from + space_start < to {
            from += space_start;
            to -= space_end;
        }
        let mark = declined("toggle_mark", mark_type.create(None))?;
        declined("toggle_mark", tr.add_mark(from, to, &mark))?;
    }
    finish(tr)
}
