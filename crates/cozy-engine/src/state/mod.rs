//! Editor state: an immutable snapshot plus the transactions that produce
//! the next one.

mod editor_state;
pub mod selection;
mod transaction;

pub use editor_state::{EditorState, StateError, StateJson};
pub use selection::{Direction, Selection};
pub use transaction::Transaction;
