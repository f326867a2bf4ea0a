pub mod builders;
pub mod commands;
pub mod keymap;
pub mod model;
pub mod state;
pub mod transform;

// Re-export key types for easier usage
pub use commands::{Command, TextblockView, chain, run, sequence};
pub use keymap::{History, Keymap, KeymapError, Platform, base_keymap, cozy_keymap};
pub use model::{Fragment, Mark, ModelError, Node, NodeType, ResolvedPos, Schema, Slice};
pub use state::{Direction, EditorState, Selection, StateError, StateJson, Transaction};
pub use transform::{Step, StepError, Transform};
