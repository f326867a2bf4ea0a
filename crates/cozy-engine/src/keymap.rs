/*!
# Key bindings

A [`Keymap`] maps normalised key chords to named commands. Chords are
written the way users write them (`"Mod-b"`, `"Shift-Enter"`, `"Ctrl--"`)
and normalised once when bound and again when looked up, so
`"Shift-Ctrl-a"` and `"Ctrl-Shift-a"` are the same binding.

[`base_keymap`] holds the generic editing commands. [`cozy_keymap`] puts
the list-aware commands and formatting shortcuts over it: the base binding
survives only for chords the editor does not bind itself.
*/

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::commands::{
    BoxedCommand, TextblockView, add_paragraph_if_at_end, backspace, base_backspace, base_delete,
    base_enter, boxed, delete, enter, exit_code, insert_hard_break, named, select_all,
    select_textblock_end, select_textblock_start, toggle_mark,
};
use crate::state::{EditorState, Transaction};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum KeymapError {
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("invalid key chord `{0}`")]
    InvalidChord(String),
}

/// Decides what `Mod` means and which extra bindings exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Mac,
    #[default]
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }
}

/// Normalise a chord: `Mod` resolves per platform, modifier aliases are
/// expanded, and modifiers are ordered `Alt-Ctrl-Meta-Shift-`.
pub fn normalize_chord(chord: &str, platform: Platform) -> Result<String, KeymapError> {
    let invalid = || KeymapError::InvalidChord(chord.to_string());
    let (modifiers, key) = if chord == "-" {
        ("", "-")
    } else if let Some(rest) = chord.strip_suffix("--") {
        (rest, "-")
    } else {
        chord.rsplit_once('-').unwrap_or(("", chord))
    };
    let key = if key == "Space" { " " } else { key };
    if key.is_empty() {
        return Err(invalid());
    }

    let (mut alt, mut ctrl, mut meta, mut shift) = (false, false, false, false);
    for modifier in modifiers.split('-').filter(|m| !m.is_empty()) {
        match modifier.to_ascii_lowercase().as_str() {
            "alt" | "a" => alt = true,
            "ctrl" | "control" | "c" => ctrl = true,
            "meta" | "cmd" | "m" => meta = true,
            "shift" | "s" => shift = true,
            "mod" => match platform {
                Platform::Mac => meta = true,
                Platform::Other => ctrl = true,
            },
            _ => return Err(invalid()),
        }
    }

    let mut normalized = String::new();
    for (set, name) in [(alt, "Alt-"), (ctrl, "Ctrl-"), (meta, "Meta-"), (shift, "Shift-")] {
        if set {
            normalized.push_str(name);
        }
    }
    normalized.push_str(key);
    Ok(normalized)
}

#[derive(Clone)]
struct Binding {
    name: String,
    command: BoxedCommand,
}

/// Undo and redo, supplied by whatever keeps the history.
#[derive(Clone)]
pub struct History {
    pub undo: BoxedCommand,
    pub redo: BoxedCommand,
}

#[derive(Clone, Default)]
pub struct Keymap {
    platform: Platform,
    bindings: BTreeMap<String, Binding>,
}

impl fmt::Debug for Keymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.bindings.iter().map(|(chord, binding)| (chord, &binding.name)))
            .finish()
    }
}

impl Keymap {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            bindings: BTreeMap::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn bind(
        &mut self,
        chord: &str,
        name: &str,
        command: BoxedCommand,
    ) -> Result<(), KeymapError> {
        let chord = normalize_chord(chord, self.platform)?;
        self.bindings.insert(
            chord,
            Binding {
                name: name.to_string(),
                command,
            },
        );
        Ok(())
    }

    /// Bind a chord to a command by name. Names come from the command
    /// registry or from bindings already in this keymap (such as `undo`).
    pub fn rebind(&mut self, chord: &str, name: &str) -> Result<(), KeymapError> {
        let command = named(name)
            .or_else(|| {
                self.bindings
                    .values()
                    .find(|binding| binding.name == name)
                    .map(|binding| binding.command.clone())
            })
            .ok_or_else(|| KeymapError::UnknownCommand(name.to_string()))?;
        self.bind(chord, name, command)
    }

    pub fn unbind(&mut self, chord: &str) -> Result<bool, KeymapError> {
        let chord = normalize_chord(chord, self.platform)?;
        Ok(self.bindings.remove(&chord).is_some())
    }

    /// This keymap with `base` filling in the chords it leaves unbound.
    pub fn over(mut self, base: Keymap) -> Keymap {
        for (chord, binding) in base.bindings {
            self.bindings.entry(chord).or_insert(binding);
        }
        self
    }

    /// The command name bound to `chord`.
    pub fn binding(&self, chord: &str) -> Option<&str> {
        let chord = normalize_chord(chord, self.platform).ok()?;
        self.bindings.get(&chord).map(|binding| binding.name.as_str())
    }

    /// Normalised chords and their command names, in chord order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(chord, binding)| (chord.as_str(), binding.name.as_str()))
    }

    /// The transaction the command bound to `chord` produces, if any.
    pub fn handle(
        &self,
        state: &EditorState,
        chord: &str,
        view: Option<&dyn TextblockView>,
    ) -> Option<Transaction> {
        let normalized = normalize_chord(chord, self.platform).ok()?;
        let binding = self.bindings.get(&normalized)?;
        let tr = binding.command.apply(state, view);
        log::trace!(
            "{normalized} -> {} ({})",
            binding.name,
            if tr.is_some() { "applied" } else { "declined" }
        );
        tr
    }

    fn insert(&mut self, chord: &str, name: &str, command: BoxedCommand) {
        if let Err(e) = self.bind(chord, name, command) {
            log::warn!("skipping binding: {e}");
        }
    }
}

/// The generic editing bindings.
pub fn base_keymap(platform: Platform) -> Keymap {
    let mut keymap = Keymap::new(platform);
    keymap.insert("Enter", "base_enter", boxed(base_enter()));
    keymap.insert("Mod-Enter", "exit_code", boxed(exit_code));
    for chord in ["Backspace", "Mod-Backspace", "Shift-Backspace"] {
        keymap.insert(chord, "base_backspace", boxed(base_backspace()));
    }
    for chord in ["Delete", "Mod-Delete"] {
        keymap.insert(chord, "base_delete", boxed(base_delete()));
    }
    keymap.insert("Mod-a", "select_all", boxed(select_all));

    if platform == Platform::Mac {
        for chord in ["Ctrl-h", "Alt-Backspace"] {
            keymap.insert(chord, "base_backspace", boxed(base_backspace()));
        }
        for chord in ["Ctrl-d", "Ctrl-Alt-Backspace", "Alt-Delete", "Alt-d"] {
            keymap.insert(chord, "base_delete", boxed(base_delete()));
        }
        keymap.insert("Ctrl-a", "select_textblock_start", boxed(select_textblock_start));
        keymap.insert("Ctrl-e", "select_textblock_end", boxed(select_textblock_end));
    }
    keymap
}

/// The editor's bindings over [`base_keymap`].
pub fn cozy_keymap(platform: Platform, history: Option<History>) -> Keymap {
    let mut keymap = Keymap::new(platform);
    keymap.insert("Enter", "enter", boxed(enter()));
    keymap.insert("Backspace", "backspace", boxed(backspace()));
    keymap.insert("Delete", "delete", boxed(delete()));
    keymap.insert("Mod-b", "toggle_strong", boxed(toggle_mark("strong")));
    keymap.insert("Mod-i", "toggle_em", boxed(toggle_mark("em")));
    for chord in ["ArrowRight", "ArrowDown"] {
        keymap.insert(chord, "add_paragraph_if_at_end", boxed(add_paragraph_if_at_end));
    }
    let mut break_chords = vec!["Mod-Enter", "Shift-Enter"];
    if platform == Platform::Mac {
        break_chords.push("Ctrl-Enter");
    }
    for chord in break_chords {
        keymap.insert(chord, "insert_hard_break", boxed(insert_hard_break()));
    }
    if let Some(history) = history {
        keymap.insert("Mod-z", "undo", history.undo.clone());
        keymap.insert("Mod-y", "redo", history.redo.clone());
        keymap.insert("Mod-Z", "redo", history.redo);
    }
    keymap.over(base_keymap(platform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, em, li, p, ul};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn never(_: &EditorState, _: Option<&dyn TextblockView>) -> Option<Transaction> {
        None
    }

    // ==== chord normalisation ====

    #[rstest]
    #[case("Mod-b", Platform::Other, "Ctrl-b")]
    #[case("Mod-b", Platform::Mac, "Meta-b")]
    #[case("Shift-Ctrl-a", Platform::Other, "Ctrl-Shift-a")]
    #[case("Cmd-Alt-x", Platform::Other, "Alt-Meta-x")]
    #[case("Ctrl--", Platform::Other, "Ctrl--")]
    #[case("-", Platform::Other, "-")]
    #[case("Space", Platform::Other, " ")]
    #[case("s-Enter", Platform::Other, "Shift-Enter")]
    #[case("Mod-Z", Platform::Other, "Ctrl-Z")]
    fn test_normalize_chord(
        #[case] chord: &str,
        #[case] platform: Platform,
        #[case] expected: &str,
    ) {
        assert_eq!(normalize_chord(chord, platform).unwrap(), expected);
    }

    #[rstest]
    #[case("Hyper-a")]
    #[case("")]
    #[case("Ctrl-")]
    fn test_normalize_rejects(#[case] chord: &str) {
        assert_eq!(
            normalize_chord(chord, Platform::Other),
            Err(KeymapError::InvalidChord(chord.to_string()))
        );
    }

    // ==== tables ====

    #[test]
    fn test_base_keymap_mac_extras() {
        let mac = base_keymap(Platform::Mac);
        let other = base_keymap(Platform::Other);
        assert_eq!(mac.binding("Ctrl-a"), Some("select_textblock_start"));
        assert_eq!(other.binding("Ctrl-a"), Some("select_all"));
        assert_eq!(mac.binding("Mod-a"), Some("select_all"));
        assert_eq!(other.binding("Alt-d"), None);
    }

    #[test]
    fn test_cozy_keymap_overrides_base_only_where_bound() {
        let keymap = cozy_keymap(Platform::Other, None);
        assert_eq!(keymap.binding("Enter"), Some("enter"));
        assert_eq!(keymap.binding("Backspace"), Some("backspace"));
        assert_eq!(keymap.binding("Mod-Backspace"), Some("base_backspace"));
        assert_eq!(keymap.binding("Mod-Enter"), Some("insert_hard_break"));
        assert_eq!(keymap.binding("Ctrl-Enter"), Some("insert_hard_break"));
        assert_eq!(keymap.binding("Mod-z"), None);
    }

    #[test]
    fn test_cozy_keymap_mac_ctrl_enter() {
        let keymap = cozy_keymap(Platform::Mac, None);
        assert_eq!(keymap.binding("Ctrl-Enter"), Some("insert_hard_break"));
        assert_eq!(keymap.binding("Meta-Enter"), Some("insert_hard_break"));
    }

    #[test]
    fn test_history_bindings() {
        let history = History {
            undo: boxed(never),
            redo: boxed(never),
        };
        let keymap = cozy_keymap(Platform::Other, Some(history));
        assert_eq!(keymap.binding("Mod-z"), Some("undo"));
        assert_eq!(keymap.binding("Mod-y"), Some("redo"));
        assert_eq!(keymap.binding("Shift-Mod-z"), None);
        assert_eq!(keymap.binding("Mod-Z"), Some("redo"));
    }

    // ==== dispatch ====

    #[test]
    fn test_handle_runs_bound_command() {
        let keymap = cozy_keymap(Platform::Other, None);
        let state = doc!(ul!(li!(p!("text<a>")))).state();
        let tr = keymap.handle(&state, "Enter", None).unwrap();
        assert_eq!(tr.doc(), &doc!(ul!(li!(p!("text")), li!(p!()))).doc);
        assert!(keymap.handle(&state, "F13", None).is_none());
    }

    #[test]
    fn test_toggle_em_through_keymap() {
        let keymap = cozy_keymap(Platform::Mac, None);
        let state = doc!(p!("<a>ab<b>")).state();
        let tr = keymap.handle(&state, "Meta-i", None).unwrap();
        assert_eq!(tr.doc(), &doc!(p!(em!("ab"))).doc);
    }

    #[test]
    fn test_rebind() {
        let mut keymap = cozy_keymap(Platform::Other, None);
        keymap.rebind("Mod-e", "toggle_code").unwrap();
        assert_eq!(keymap.binding("Ctrl-e"), Some("toggle_code"));
        assert_eq!(
            keymap.rebind("Mod-e", "launch_rockets"),
            Err(KeymapError::UnknownCommand("launch_rockets".to_string()))
        );
        assert!(keymap.unbind("Mod-e").unwrap());
        assert_eq!(keymap.binding("Mod-e"), None);
    }

    #[test]
    fn test_rebind_reuses_existing_binding_by_name() {
        let history = History {
            undo: boxed(never),
            redo: boxed(never),
        };
        let mut keymap = cozy_keymap(Platform::Other, Some(history));
        keymap.rebind("Alt-Backspace", "undo").unwrap();
        assert_eq!(keymap.binding("Alt-Backspace"), Some("undo"));
    }
}
