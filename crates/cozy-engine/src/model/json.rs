//! ProseMirror-compatible JSON for documents:
//! `{"type": "paragraph", "attrs": {...}, "content": [...], "marks": [...], "text": "..."}`.

use serde::{Deserialize, Serialize};

use super::{Attrs, Fragment, ModelError, Node, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<NodeJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<MarkJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkJson {
    #[serde(rename = "type")]
    pub mark_type: String,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

impl Node {
    pub fn to_json(&self) -> NodeJson {
        NodeJson {
            node_type: self.type_name().to_string(),
            attrs: self.attrs().clone(),
            content: self.content().iter().map(Node::to_json).collect(),
            marks: self
                .marks()
                .iter()
                .map(|mark| MarkJson {
                    mark_type: mark.ty().name().to_string(),
                    attrs: mark.attrs().clone(),
                })
                .collect(),
            text: self.text().map(str::to_string),
        }
    }

    /// Build a node from JSON and validate the whole tree against `schema`.
    pub fn from_json(schema: &Schema, json: &NodeJson) -> Result<Node, ModelError> {
        let node = node_from_json(schema, json)?;
        node.check()?;
        Ok(node)
    }
}

fn node_from_json(schema: &Schema, json: &NodeJson) -> Result<Node, ModelError> {
    let marks = json
        .marks
        .iter()
        .map(|mark| schema.mark(&mark.mark_type, Some(&mark.attrs)))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(text) = &json.text {
        if json.node_type != "text" {
            return Err(ModelError::InvalidContent(format!(
                "{} node with text",
                json.node_type
            )));
        }
        if text.is_empty() {
            return Err(ModelError::InvalidContent("empty text node".into()));
        }
        return Ok(schema.text(text, marks));
    }
    let children = json
        .content
        .iter()
        .map(|child| node_from_json(schema, child))
        .collect::<Result<Vec<_>, _>>()?;
    schema
        .node_type(&json.node_type)?
        .create(Some(&json.attrs), Fragment::from_vec(children), marks)
}
