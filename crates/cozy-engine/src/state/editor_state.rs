use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::selection::Selection;
use super::transaction::Transaction;
use crate::model::{Mark, ModelError, Node, NodeJson, ResolvedPos, Schema};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("transaction was built against a different document")]
    StaleTransaction,

    #[error("selection {0:?} is not valid in the document")]
    InvalidSelection(Selection),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// An immutable snapshot of the editor: document, selection and the marks
/// stored for the next typed text.
#[derive(Debug, Clone)]
pub struct EditorState {
    schema: Arc<Schema>,
    doc: Node,
    selection: Selection,
    stored_marks: Option<Vec<Mark>>,
}

/// Serialized form of a state, as read and written by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateJson {
    pub doc: NodeJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

impl EditorState {
    /// Create a state. Without a selection the cursor goes to the start of
    /// the document.
    pub fn new(
        schema: Arc<Schema>,
        doc: Node,
        selection: Option<Selection>,
    ) -> Result<Self, StateError> {
        let selection = match selection {
            Some(selection) if selection.is_valid(&doc) => selection,
            Some(selection) => return Err(StateError::InvalidSelection(selection)),
            None => Selection::at_start(&doc),
        };
        Ok(Self {
            schema,
            doc,
            selection,
            stored_marks: None,
        })
    }

    pub fn from_json(schema: Arc<Schema>, json: &StateJson) -> Result<Self, StateError> {
        let doc = Node::from_json(&schema, &json.doc)?;
        Self::new(schema, doc, json.selection)
    }

    pub fn to_json(&self) -> StateJson {
        StateJson {
            doc: self.doc.to_json(),
            selection: Some(self.selection),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn stored_marks(&self) -> Option<&[Mark]> {
        self.stored_marks.as_deref()
    }

    /// Start a transaction against this state.
    pub fn tr(&self) -> Transaction {
        Transaction::new(
            self.schema.clone(),
            self.doc.clone(),
            self.selection,
            self.stored_marks.clone(),
        )
    }

    /// The state that results from committing `tr`. Only transactions built
    /// against this state's document are accepted.
    pub fn apply(&self, tr: Transaction) -> Result<EditorState, StateError> {
        if tr.before() != &self.doc {
            return Err(StateError::StaleTransaction);
        }
        let selection = tr.selection();
        let stored_marks = if selection.is_empty() {
            tr.stored_marks().map(<[Mark]>::to_vec)
        } else {
            None
        };
        log::trace!("applying {} step(s), selection {selection:?}", tr.steps().len());
        Ok(EditorState {
            schema: self.schema.clone(),
            doc: tr.doc().clone(),
            selection,
            stored_marks,
        })
    }

    /// The selection start, resolved.
    pub fn resolved_from(&self) -> Result<ResolvedPos, ModelError> {
        self.doc.resolve(self.selection.from())
    }

    /// The selection end, resolved.
    pub fn resolved_to(&self) -> Result<ResolvedPos, ModelError> {
        self.doc.resolve(self.selection.to(&self.doc))
    }

    /// The cursor of an empty text selection, resolved.
    pub fn cursor(&self) -> Option<ResolvedPos> {
        self.doc.resolve(self.selection.cursor_pos()?).ok()
    }

    pub fn selected_node(&self) -> Option<Node> {
        self.selection.selected_node(&self.doc)
    }
}
