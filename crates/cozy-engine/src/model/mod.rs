/*!
 * # Document Model
 *
 * Immutable tree documents and the position arithmetic the editing commands
 * are written against.
 *
 * ## Positions
 *
 * Every node occupies a number of position units: a text node one per char,
 * any other leaf one, and every container its content plus an opening and a
 * closing boundary. A position is an integer offset into this space, counted
 * from the start of the document's content. [`ResolvedPos`] turns an offset
 * into the chain of ancestors around it.
 *
 * ```text
 *  0   1    2   3 t e x t 7    8     9    10  11 h e r e 15
 *  <ul><li><p>  text         </p></li></ul> <p>  here       </p>
 * ```
 *
 * ## Module Structure
 *
 * - **`schema`**: `Schema`, `NodeType`, `NodeSpec` and the default `cozy` vocabulary
 * - **`content`**: content expressions and the `ContentMatch` automaton
 * - **`node`** / **`fragment`** / **`mark`**: the tree values
 * - **`resolved_pos`**: `ResolvedPos` and `NodeRange`
 * - **`slice`** / **`replace`**: open slices and the structural replace algorithm
 * - **`json`**: serde representation compatible with ProseMirror JSON
 */

pub mod content;
pub mod error;
pub mod fragment;
pub mod json;
pub mod mark;
pub mod node;
mod replace;
pub mod resolved_pos;
pub mod schema;
pub mod slice;

pub use content::{ContentExpr, ContentMatch};
pub use error::ModelError;
pub use fragment::Fragment;
pub use json::{MarkJson, NodeJson};
pub use mark::{Mark, MarkSpec, MarkType};
pub use node::{ChildInfo, Node};
pub use resolved_pos::{NodeRange, ResolvedPos};
pub use schema::{AttrSpec, Attrs, NodeSpec, NodeType, Schema};
pub use slice::Slice;
