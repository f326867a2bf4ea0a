/*!
# Commands

A command looks at an [`EditorState`] and either declines (`None`) or
produces the [`Transaction`] it would dispatch. Asking whether a command
applies and applying it are separate operations:

- [`Command::can_apply`] answers "would this do anything" and never
  dispatches.
- [`Command::apply`] builds the transaction without committing it.
- [`run`] is the callback form used by key handling: with a dispatch
  function the transaction is handed over, without one it is a dry run.

Commands never fail. When a step is rejected by the document model the
command logs it at debug level and declines, leaving the state untouched.

## Module Structure

- [`base`] - generic editing commands (joins, splits, node selection, marks)
- [`list`] - list item splitting and lifting
- [`structural`] - the list-aware Enter, Backspace and Delete, built from
  ordered rules and transaction post-processors
*/

use std::fmt::Display;
use std::sync::Arc;

use crate::state::{Direction, EditorState, Transaction};

pub mod base;
pub mod list;
pub mod structural;

pub use base::*;
pub use list::{lift_list_item, split_list_item};
pub use structural::{
    Pipeline, Rule, Rules, add_paragraph_if_at_end, backspace, click_at, delete, enter,
    insert_hard_break, insert_paragraph_at, insert_paragraph_at_end,
};

/// Rendering-layer knowledge a command may use: whether the cursor sits at
/// the visual start or end of its textblock, which can differ from the
/// structural boundary when lines wrap.
pub trait TextblockView {
    fn end_of_textblock(&self, dir: Direction, state: &EditorState) -> bool;
}

pub trait Command {
    /// The transaction this command would dispatch, or `None` when it does
    /// not apply.
    fn apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> Option<Transaction>;

    fn can_apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> bool {
        self.apply(state, view).is_some()
    }
}

impl<F> Command for F
where
    F: Fn(&EditorState, Option<&dyn TextblockView>) -> Option<Transaction>,
{
    fn apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> Option<Transaction> {
        self(state, view)
    }
}

pub type BoxedCommand = Arc<dyn Command + Send + Sync>;

pub fn boxed(command: impl Command + Send + Sync + 'static) -> BoxedCommand {
    Arc::new(command)
}

/// Run `command` the callback way. Without `dispatch` this only reports
/// whether the command applies.
pub fn run(
    command: &dyn Command,
    state: &EditorState,
    view: Option<&dyn TextblockView>,
    dispatch: Option<&mut dyn FnMut(Transaction)>,
) -> bool {
    match dispatch {
        None => command.can_apply(state, view),
        Some(dispatch) => match command.apply(state, view) {
            Some(tr) => {
                dispatch(tr);
                true
            }
            None => false,
        },
    }
}

/// Tries each command in order; the first that applies wins.
#[derive(Clone)]
pub struct Chain {
    commands: Vec<BoxedCommand>,
}

pub fn chain(commands: Vec<BoxedCommand>) -> Chain {
    Chain { commands }
}

impl Command for Chain {
    fn apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> Option<Transaction> {
        self.commands.iter().find_map(|command| command.apply(state, view))
    }

    fn can_apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> bool {
        self.commands.iter().any(|command| command.can_apply(state, view))
    }
}

/// Runs `first`, then `second` on the state `first` produced, as one
/// transaction. Applies when either part does.
#[derive(Clone)]
pub struct Sequence {
    first: BoxedCommand,
    second: BoxedCommand,
}

pub fn sequence(first: BoxedCommand, second: BoxedCommand) -> Sequence {
    Sequence { first, second }
}

impl Command for Sequence {
    fn apply(&self, state: &EditorState, view: Option<&dyn TextblockView>) -> Option<Transaction> {
        let Some(mut tr) = self.first.apply(state, view) else {
            return self.second.apply(state, view);
        };
        let middle = declined("sequence", state.apply(tr.clone()))?;
        if let Some(next) = self.second.apply(&middle, view) {
            declined("sequence", tr.extend(next))?;
        }
        Some(tr)
    }
}

/// Log a rejected step and turn it into a declined command.
pub(crate) fn declined<T, E: Display>(command: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("{command} declined: {e}");
            None
        }
    }
}

/// Look a command up by the name used in configuration files.
pub fn named(name: &str) -> Option<BoxedCommand> {
    let command = match name {
        "enter" => boxed(enter()),
        "backspace" => boxed(backspace()),
        "delete" => boxed(delete()),
        "base_enter" => boxed(base_enter()),
        "base_backspace" => boxed(base_backspace()),
        "base_delete" => boxed(base_delete()),
        "delete_selection" => boxed(delete_selection),
        "join_backward" => boxed(join_backward),
        "join_forward" => boxed(join_forward),
        "select_node_backward" => boxed(select_node_backward),
        "select_node_forward" => boxed(select_node_forward),
        "split_block" => boxed(split_block),
        "create_paragraph_near" => boxed(create_paragraph_near),
        "lift_empty_block" => boxed(lift_empty_block),
        "new_line_in_code" => boxed(new_line_in_code),
        "exit_code" => boxed(exit_code),
        "select_all" => boxed(select_all),
        "select_textblock_start" => boxed(select_textblock_start),
        "select_textblock_end" => boxed(select_textblock_end),
        "toggle_strong" => boxed(toggle_mark("strong")),
        "toggle_em" => boxed(toggle_mark("em")),
        "toggle_code" => boxed(toggle_mark("code")),
        "split_list_item" => boxed(split_list_item("list_item")),
        "lift_list_item" => boxed(lift_list_item("list_item")),
        "insert_hard_break" => boxed(insert_hard_break()),
        "insert_paragraph_at_end" => boxed(insert_paragraph_at_end),
        "add_paragraph_if_at_end" => boxed(add_paragraph_if_at_end),
        _ => return None,
    };
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Selection;
    use crate::{doc, p};
    use pretty_assertions::assert_eq;

    fn never(_: &EditorState, _: Option<&dyn TextblockView>) -> Option<Transaction> {
        None
    }

    fn type_x(state: &EditorState, _: Option<&dyn TextblockView>) -> Option<Transaction> {
        let mut tr = state.tr();
        tr.insert_text("x").ok()?;
        Some(tr)
    }

    fn type_y(state: &EditorState, _: Option<&dyn TextblockView>) -> Option<Transaction> {
        let mut tr = state.tr();
        tr.insert_text("y").ok()?;
        Some(tr)
    }

    // ==== run ====

    #[test]
    fn test_dry_run_never_dispatches() {
        let state = doc!(p!("a<a>")).state();
        assert!(run(&type_x, &state, None, None));
        assert!(!run(&never, &state, None, None));

        let mut dispatched = Vec::new();
        let mut dispatch = |tr: Transaction| dispatched.push(tr);
        assert!(!run(&never, &state, None, Some(&mut dispatch)));
        assert!(dispatched.is_empty());
    }

    #[test]
    fn test_run_dispatches_once() {
        let state = doc!(p!("a<a>")).state();
        let mut dispatched = Vec::new();
        let mut dispatch = |tr: Transaction| dispatched.push(tr);
        assert!(run(&type_x, &state, None, Some(&mut dispatch)));
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].doc(), &doc!(p!("ax")).doc);
    }

    // ==== combinators ====

    #[test]
    fn test_chain_stops_at_first_applicable() {
        let state = doc!(p!("a<a>")).state();
        let command = chain(vec![boxed(never), boxed(type_x), boxed(type_y)]);
        let tr = command.apply(&state, None).unwrap();
        assert_eq!(tr.doc(), &doc!(p!("ax")).doc);
        assert!(command.can_apply(&state, None));
        assert!(!chain(vec![boxed(never)]).can_apply(&state, None));
    }

    #[test]
    fn test_sequence_runs_both_on_threaded_state() {
        let state = doc!(p!("a<a>")).state();
        let command = sequence(boxed(type_x), boxed(type_y));
        let tr = command.apply(&state, None).unwrap();
        assert_eq!(tr.doc(), &doc!(p!("axy")).doc);
        assert_eq!(tr.selection(), Selection::cursor(4));
        let next = state.apply(tr).unwrap();
        assert_eq!(next.doc(), &doc!(p!("axy")).doc);
    }

    #[test]
    fn test_sequence_applies_when_either_part_does() {
        let state = doc!(p!("a<a>")).state();
        assert!(sequence(boxed(never), boxed(type_y)).can_apply(&state, None));
        assert!(sequence(boxed(type_x), boxed(never)).can_apply(&state, None));
        assert!(!sequence(boxed(never), boxed(never)).can_apply(&state, None));
    }

    #[test]
    fn test_named_lookup() {
        assert!(named("enter").is_some());
        assert!(named("toggle_strong").is_some());
        assert!(named("launch_rockets").is_none());
    }
}
