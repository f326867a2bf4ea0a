//! The editor key bindings driven the way a view drives them: a chord comes
//! in, the keymap picks a command, and the transaction is committed.

use cozy_engine::builders::*;
use cozy_engine::{EditorState, Keymap, Platform, cozy_keymap};
use cozy_engine::{doc, li, p, ul};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn keymap() -> Keymap {
    cozy_keymap(Platform::Other, None)
}

fn press(state: &EditorState, chord: &str) -> EditorState {
    match keymap().handle(state, chord, None) {
        Some(tr) => state.apply(tr).expect("transaction applies to its own state"),
        None => state.clone(),
    }
}

/// Press each chord in turn and compare with `expected`. The selection is
/// compared when `expected` carries an `<a>` tag.
fn assert_keys(start: TaggedDoc, chords: &[&str], expected: TaggedDoc) {
    start.doc.check().unwrap();
    expected.doc.check().unwrap();
    let mut state = start.state();
    for chord in chords {
        state = press(&state, chord);
    }
    assert_eq!(state.doc(), &expected.doc);
    if expected.tag("a").is_some() {
        assert_eq!(state.selection(), expected.selection());
    }
}

// ==== Backspace ====

#[test]
fn test_backspace_wraps_paragraph_after_list_in_list_item() {
    assert_keys(
        doc!(ul!(li!(p!("text"))), p!("<a>here")),
        &["Backspace"],
        doc!(ul!(li!(p!("text")), li!(p!("<a>here")))),
    );
}

#[test]
fn test_backspace_wraps_empty_paragraph_after_list_in_list_item() {
    assert_keys(
        doc!(ul!(li!(p!("text"))), p!("<a>"), p!("more")),
        &["Backspace"],
        doc!(ul!(li!(p!("text")), li!(p!("<a>"))), p!("more")),
    );
}

#[test]
fn test_backspace_removes_a_list() {
    assert_keys(
        doc!(ul!(li!(p!("<a>text"))), p!("here")),
        &["Backspace"],
        doc!(p!("<a>text"), p!("here")),
    );
}

#[test]
fn test_backspace_joins_item_at_start_of_list() {
    assert_keys(
        doc!(ul!(li!(p!("<a>text")), li!(p!("here")))),
        &["Backspace"],
        doc!(p!("<a>text"), ul!(li!(p!("here")))),
    );
}

#[test]
fn test_backspace_joins_item_in_middle_of_list() {
    assert_keys(
        doc!(ul!(li!(p!("a")), li!(p!("<a>text")), li!(p!("here")))),
        &["Backspace"],
        doc!(ul!(li!(p!("a<a>text")), li!(p!("here")))),
    );
}

#[test]
fn test_backspace_joins_item_at_end_of_list() {
    assert_keys(
        doc!(ul!(li!(p!("a")), li!(p!("<a>text")))),
        &["Backspace"],
        doc!(ul!(li!(p!("a<a>text")))),
    );
}

#[test]
fn test_backspace_joins_empty_list_items() {
    assert_keys(
        doc!(ul!(li!(p!("text")), li!(p!("<a>")))),
        &["Backspace"],
        doc!(ul!(li!(p!("text<a>")))),
    );
}

#[rstest]
#[case::inside_item_text(doc!(ul!(li!(p!("t<a>ext"))), p!("here")))]
#[case::end_of_item(doc!(ul!(li!(p!("text<a>"))), p!("here")))]
#[case::inside_paragraph(doc!(ul!(li!(p!("text"))), p!("h<a>ere")))]
#[case::end_of_paragraph(doc!(ul!(li!(p!("text"))), p!("here<a>")))]
fn test_backspace_does_not_act_within_text(#[case] start: TaggedDoc) {
    let state = start.state();
    assert!(keymap().handle(&state, "Backspace", None).is_none());
    assert_keys(start.clone(), &["Backspace"], start);
}

// ==== Delete ====

#[test]
fn test_delete_joins_paragraph_into_last_list_item() {
    assert_keys(
        doc!(ul!(li!(p!("text<a>"))), p!("here")),
        &["Delete"],
        doc!(ul!(li!(p!("text<a>here")))),
    );
}

#[test]
fn test_delete_does_not_jump_over_empty_list_items() {
    assert_keys(
        doc!(ul!(li!(p!("text<a>")), li!(p!("")), li!(p!("here")))),
        &["Delete"],
        doc!(ul!(li!(p!("text<a>"), p!("")), li!(p!("here")))),
    );
}

#[test]
fn test_delete_removes_a_list() {
    assert_keys(
        doc!(p!("here<a>"), ul!(li!(p!("text"))), p!("here")),
        &["Delete"],
        doc!(p!("here<a>"), p!("text"), p!("here")),
    );
}

#[rstest]
#[case::inside_item_text(doc!(ul!(li!(p!("t<a>ext"))), p!("here")))]
#[case::start_of_item(doc!(ul!(li!(p!("<a>text"))), p!("here")))]
#[case::inside_paragraph(doc!(ul!(li!(p!("text"))), p!("h<a>ere")))]
#[case::start_of_paragraph(doc!(ul!(li!(p!("text"))), p!("<a>here")))]
fn test_delete_does_not_act_within_text(#[case] start: TaggedDoc) {
    let state = start.state();
    assert!(keymap().handle(&state, "Delete", None).is_none());
    assert_keys(start.clone(), &["Delete"], start);
}

// ==== Enter ====

#[test]
fn test_enter_creates_empty_list_items() {
    assert_keys(
        doc!(ul!(li!(p!("text<a>")))),
        &["Enter"],
        doc!(ul!(li!(p!("text")), li!(p!("<a>")))),
    );
}

#[test]
fn test_enter_twice_lifts_empty_list_item() {
    assert_keys(
        doc!(ul!(li!(p!("text<a>")))),
        &["Enter", "Enter"],
        doc!(ul!(li!(p!("text"))), p!("<a>")),
    );
}

#[test]
fn test_enter_splits_item_text() {
    let start = doc!(ul!(li!(p!("te<a>xt"))));
    let state = press(&start.state(), "Enter");
    insta::assert_snapshot!(
        state.doc().to_string(),
        @r#"doc(bullet_list(list_item(paragraph("te")), list_item(paragraph("xt"))))"#
    );
}

// ==== formatting and hard breaks ====

#[test]
fn test_shift_enter_inserts_hard_break() {
    let start = doc!(p!("a<a>b"));
    let state = press(&start.state(), "Shift-Enter");
    insta::assert_snapshot!(state.doc().to_string(), @r#"doc(paragraph("a", hard_break, "b"))"#);
}

#[test]
fn test_mod_b_then_typing_uses_stored_mark() {
    let start = doc!(p!("a<a>"));
    let state = press(&start.state(), "Mod-b");
    let mut tr = state.tr();
    tr.insert_text("b").unwrap();
    let state = state.apply(tr).unwrap();
    insta::assert_snapshot!(state.doc().to_string(), @r#"doc(paragraph("a", strong("b")))"#);
}

#[test]
fn test_arrow_down_on_trailing_rule_appends_paragraph() {
    let start = doc!(p!("a"), "<a>", cozy_engine::hr!());
    let state = press(&start.state(), "ArrowDown");
    insta::assert_snapshot!(
        state.doc().to_string(),
        @"doc(paragraph(\"a\"), horizontal_rule, paragraph)"
    );
    assert_eq!(state.selection(), cozy_engine::Selection::cursor(5));
}
