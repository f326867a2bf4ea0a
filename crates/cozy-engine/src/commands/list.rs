//! List item commands.
//!
//! Both take the name of the item node type and resolve it against the
//! state's schema, so they work for any list whose items have that type.

use crate::model::{Fragment, Node, NodeRange, NodeType, Slice};
use crate::state::{EditorState, Transaction};
use crate::transform::{Assoc, NodeTemplate, Step, can_join, can_split, lift_target};

use super::{Command, TextblockView, declined};

/// Split the list item around the selection into two items. At the end of
/// an item the new item gets a fresh default first block.
///
/// Declines in the empty last block of an item, leaving that case to
/// [`lift_list_item`].
pub fn split_list_item(item_name: &'static str) -> impl Command + Clone + Send + Sync {
    move |state: &EditorState, _view: Option<&dyn TextblockView>| {
        let item_type = declined("split_list_item", state.schema().node_type(item_name))?;
        split_item(state, item_type)
    }
}

pub(crate) fn split_item(state: &EditorState, item_type: &NodeType) -> Option<Transaction> {
    if state.selected_node().is_some_and(|node| node.is_block()) {
        return None;
    }
    let rfrom = state.resolved_from().ok()?;
    let rto = state.resolved_to().ok()?;
    if rfrom.depth < 2 || !rfrom.same_parent(&rto) {
        return None;
    }
    let grand_parent = rfrom.node(rfrom.depth - 1);
    if grand_parent.ty() != item_type {
        return None;
    }
    if rfrom.parent().content_size() == 0
        && grand_parent.child_count() == rfrom.index_after(rfrom.depth - 1)
    {
        return None;
    }

    let next_type = if rto.pos == rfrom.end(rfrom.depth) {
        grand_parent
            .content_match_at(0)
            .and_then(|m| m.default_type(state.schema()))
    } else {
        None
    };
    let types = match next_type {
        Some(next_type) => vec![None, Some(NodeTemplate::new(next_type))],
        None => Vec::new(),
    };

    let mut tr = state.tr();
    declined("split_list_item", tr.delete(rfrom.pos, rto.pos))?;
    if !can_split(tr.doc(), rfrom.pos, 2, &types) {
        return None;
    }
    declined("split_list_item", tr.split(rfrom.pos, 2, &types))?;
    tr.scroll_into_view();
    Some(tr)
}

/// Lift the list items around the selection one level: into the enclosing
/// list when nested, out of the list otherwise.
pub fn lift_list_item(item_name: &'static str) -> impl Command + Clone + Send + Sync {
    move |state: &EditorState, _view: Option<&dyn TextblockView>| {
        let item_type = declined("lift_list_item", state.schema().node_type(item_name))?;
        lift_item(state, item_type)
    }
}

pub(crate) fn lift_item(state: &EditorState, item_type: &NodeType) -> Option<Transaction> {
    let rfrom = state.resolved_from().ok()?;
    let rto = state.resolved_to().ok()?;
    let is_list: &dyn Fn(&Node) -> bool =
        &|node| node.first_child().is_some_and(|child| child.ty() == item_type);
    let range = rfrom.block_range(&rto, Some(is_list))?;
    if range.depth > 0 && rfrom.node(range.depth - 1).ty() == item_type {
        lift_to_outer_list(state, item_type, range)
    } else {
        lift_out_of_list(state, &range)
    }
}

fn lift_to_outer_list(
    state: &EditorState,
    item_type: &NodeType,
    mut range: NodeRange,
) -> Option<Transaction> {
    let mut tr = state.tr();
    let end = range.end();
    let end_of_list = range.to.end(range.depth);
    if end < end_of_list {
        // Siblings after the lifted items become children of the last one.
        let rest = declined(
            "lift_list_item",
            item_type.create(
                None,
                Fragment::from_node(range.parent().copy(Fragment::empty())),
                Vec::new(),
            ),
        )?;
        declined(
            "lift_list_item",
            tr.step(Step::ReplaceAround {
                from: end - 1,
                to: end_of_list,
                gap_from: end,
                gap_to: end_of_list,
                slice: Slice::new(Fragment::from_node(rest), 1, 0),
                insert: 1,
                structure: true,
            }),
        )?;
        range = NodeRange {
            from: declined("lift_list_item", tr.doc().resolve(range.from.pos))?,
            to: declined("lift_list_item", tr.doc().resolve(end_of_list))?,
            depth: range.depth,
        };
    }
    let target = lift_target(&range)?;
    declined("lift_list_item", tr.lift(&range, target))?;
    let after = tr.mapping().map(end, Assoc::Before).checked_sub(1)?;
    if can_join(tr.doc(), after) {
        declined("lift_list_item", tr.join(after, 1))?;
    }
    tr.scroll_into_view();
    Some(tr)
}

fn lift_out_of_list(state: &EditorState, range: &NodeRange) -> Option<Transaction> {
    let mut tr = state.tr();
    let list = range.parent();

    // Merge the lifted items into one.
    let mut pos = range.end();
    for i in (range.start_index() + 1..range.end_index()).rev() {
        pos -= list.child(i).node_size();
        declined("lift_list_item", tr.delete(pos - 1, pos + 1))?;
    }

    let rstart = declined("lift_list_item", tr.doc().resolve(range.start()))?;
    let item = rstart.node_after()?;
    if tr.mapping().map(range.end(), Assoc::After) != range.start() + item.node_size() {
        return None;
    }
    let at_start = range.start_index() == 0;
    let at_end = range.end_index() == list.child_count();
    let parent = rstart.node(rstart.depth.checked_sub(1)?);
    let index_before = rstart.index(rstart.depth - 1);
    let trailing = if at_end {
        Fragment::empty()
    } else {
        Fragment::from_node(list.clone())
    };
    let replace_from = index_before + usize::from(!at_start);
    if !parent.can_replace(replace_from, index_before + 1, &item.content().append(&trailing)) {
        return None;
    }

    let start = rstart.pos;
    let end = start + item.node_size();
    let closed = |open: bool| {
        if open {
            Fragment::empty()
        } else {
            Fragment::from_node(list.copy(Fragment::empty()))
        }
    };
    declined(
        "lift_list_item",
        tr.step(Step::ReplaceAround {
            from: start - usize::from(at_start),
            to: end + usize::from(at_end),
            gap_from: start + 1,
            gap_to: end - 1,
            slice: Slice::new(
                closed(at_start).append(&closed(at_end)),
                usize::from(!at_start),
                usize::from(!at_end),
            ),
            insert: usize::from(!at_start),
            structure: true,
        }),
    )?;
    tr.scroll_into_view();
    Some(tr)
}
