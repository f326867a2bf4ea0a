//! The registry of node and mark types a document is built from.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::{Value, json};

use super::content::{ContentExpr, ContentMatch};
use super::{Fragment, Mark, MarkSpec, MarkType, ModelError, Node};

/// Attribute values, keyed by attribute name.
pub type Attrs = BTreeMap<String, Value>;

/// Declaration of one attribute. `default: None` makes the attribute required.
#[derive(Debug, Clone, Default)]
pub struct AttrSpec {
    pub default: Option<Value>,
}

pub(crate) fn compute_attrs(
    type_name: &str,
    specs: &[(String, AttrSpec)],
    given: Option<&Attrs>,
) -> Result<Attrs, ModelError> {
    let mut attrs = Attrs::new();
    for (name, spec) in specs {
        let value = given
            .and_then(|g| g.get(name))
            .cloned()
            .or_else(|| spec.default.clone())
            .ok_or_else(|| ModelError::MissingAttr {
                type_name: type_name.to_string(),
                attr: name.clone(),
            })?;
        attrs.insert(name.clone(), value);
    }
    Ok(attrs)
}

/// Declaration of a node type.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// Content expression, empty for leaf nodes.
    pub content: String,
    /// Space-separated groups the type belongs to.
    pub group: String,
    /// Allowed marks: `"_"` for all, `""` for none, or space-separated names.
    /// Defaults to all for inline content and none otherwise.
    pub marks: Option<String>,
    pub attrs: Vec<(String, AttrSpec)>,
    pub inline: bool,
    pub atom: bool,
    pub code: bool,
    pub defining: bool,
    pub isolating: bool,
    pub selectable: bool,
}

impl NodeSpec {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            group: String::new(),
            marks: None,
            attrs: Vec::new(),
            inline: false,
            atom: false,
            code: false,
            defining: false,
            isolating: false,
            selectable: true,
        }
    }

    pub fn leaf() -> Self {
        Self::new("")
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn marks(mut self, marks: &str) -> Self {
        self.marks = Some(marks.to_string());
        self
    }

    pub fn attr(mut self, name: &str, default: Option<Value>) -> Self {
        self.attrs.push((name.to_string(), AttrSpec { default }));
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn atom(mut self) -> Self {
        self.atom = true;
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    pub fn defining(mut self) -> Self {
        self.defining = true;
        self
    }

    pub fn isolating(mut self) -> Self {
        self.isolating = true;
        self
    }

    pub fn not_selectable(mut self) -> Self {
        self.selectable = false;
        self
    }
}

#[derive(Debug)]
struct NodeTypeInner {
    name: String,
    groups: Vec<String>,
    spec: NodeSpec,
    content: Arc<ContentExpr>,
    inline_content: bool,
    allowed_marks: Option<Vec<String>>,
}

/// Handle to a node type registered in a [`Schema`]. Cheap to clone;
/// equality is by name.
#[derive(Clone)]
pub struct NodeType(Arc<NodeTypeInner>);

impl NodeType {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn groups(&self) -> &[String] {
        &self.0.groups
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.0.spec
    }

    pub fn is_text(&self) -> bool {
        self.0.name == "text"
    }

    pub fn is_inline(&self) -> bool {
        self.0.spec.inline || self.is_text()
    }

    pub fn is_block(&self) -> bool {
        !self.is_inline()
    }

    /// A block whose content is inline: paragraphs, headings, code blocks.
    pub fn is_textblock(&self) -> bool {
        self.is_block() && self.0.inline_content
    }

    pub fn inline_content(&self) -> bool {
        self.0.inline_content
    }

    pub fn is_leaf(&self) -> bool {
        self.0.content.is_empty()
    }

    pub fn is_atom(&self) -> bool {
        self.is_leaf() || self.0.spec.atom
    }

    pub fn is_code(&self) -> bool {
        self.0.spec.code
    }

    pub fn is_isolating(&self) -> bool {
        self.0.spec.isolating
    }

    pub fn is_defining(&self) -> bool {
        self.0.spec.defining
    }

    pub fn is_selectable(&self) -> bool {
        self.0.spec.selectable && !self.is_text()
    }

    pub fn has_required_attrs(&self) -> bool {
        self.0.spec.attrs.iter().any(|(_, spec)| spec.default.is_none())
    }

    pub fn content_expr(&self) -> &ContentExpr {
        &self.0.content
    }

    /// Match state at the start of this type's content.
    pub fn content_match(&self) -> ContentMatch {
        ContentMatch::start(self.0.content.clone())
    }

    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self == other || self.content_match().compatible(&other.content_match())
    }

    pub fn allows_mark_type(&self, mark: &MarkType) -> bool {
        match &self.0.allowed_marks {
            None => true,
            Some(names) => names.iter().any(|name| name == mark.name()),
        }
    }

    pub fn allows_marks(&self, marks: &[Mark]) -> bool {
        marks.iter().all(|mark| self.allows_mark_type(mark.ty()))
    }

    pub fn valid_content(&self, content: &Fragment) -> bool {
        self.content_match()
            .match_fragment(content)
            .is_some_and(|m| m.valid_end())
            && content.iter().all(|child| self.allows_marks(child.marks()))
    }

    pub fn check_content(&self, content: &Fragment) -> Result<(), ModelError> {
        if self.valid_content(content) {
            Ok(())
        } else {
            Err(ModelError::InvalidContent(self.name().to_string()))
        }
    }

    pub fn compute_attrs(&self, given: Option<&Attrs>) -> Result<Attrs, ModelError> {
        compute_attrs(self.name(), &self.0.spec.attrs, given)
    }

    /// Create a node without checking its content.
    pub fn create(
        &self,
        attrs: Option<&Attrs>,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Result<Node, ModelError> {
        Ok(Node::new(self.clone(), self.compute_attrs(attrs)?, content, marks))
    }

    /// Create a node, rejecting content the type does not allow.
    pub fn create_checked(
        &self,
        attrs: Option<&Attrs>,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Result<Node, ModelError> {
        self.check_content(&content)?;
        self.create(attrs, content, marks)
    }

    /// Create a node, adding whatever default children its content
    /// expression requires around `content`.
    pub fn create_and_fill_with(
        &self,
        attrs: Option<&Attrs>,
        content: Fragment,
        schema: &Schema,
    ) -> Option<Node> {
        let attrs = self.compute_attrs(attrs).ok()?;
        let start = self.content_match();
        let content = if content.size() > 0 {
            start.fill_before(&content, false, schema)?.append(&content)
        } else {
            content
        };
        let after = start
            .match_fragment(&content)?
            .fill_before(&Fragment::empty(), true, schema)?;
        Some(Node::new(self.clone(), attrs, content.append(&after), Vec::new()))
    }

    pub fn create_and_fill(&self, schema: &Schema) -> Option<Node> {
        self.create_and_fill_with(None, Fragment::empty(), schema)
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for NodeType {}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({})", self.0.name)
    }
}

/// A set of node and mark types. The first node type is the document type.
#[derive(Debug, Clone)]
pub struct Schema {
    nodes: Vec<NodeType>,
    marks: Vec<MarkType>,
}

impl Schema {
    pub fn new(
        nodes: Vec<(&str, NodeSpec)>,
        marks: Vec<(&str, MarkSpec)>,
    ) -> Result<Self, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::UnknownNodeType("(top node)".into()));
        }
        if !nodes.iter().any(|(name, _)| *name == "text") {
            return Err(ModelError::UnknownNodeType("text".into()));
        }

        let resolve = |name: &str| -> Option<Vec<String>> {
            if nodes.iter().any(|(n, _)| *n == name) {
                return Some(vec![name.to_string()]);
            }
            let members: Vec<String> = nodes
                .iter()
                .filter(|(_, spec)| spec.group.split_whitespace().any(|g| g == name))
                .map(|(n, _)| n.to_string())
                .collect();
            (!members.is_empty()).then_some(members)
        };
        let is_inline = |name: &str| {
            name == "text"
                || nodes
                    .iter()
                    .any(|(n, spec)| *n == name && spec.inline)
        };

        let mut types = Vec::with_capacity(nodes.len());
        for (name, spec) in &nodes {
            let content = ContentExpr::parse(&spec.content, &resolve)?;
            let inline_content = content.first_type().is_some_and(is_inline);
            let allowed_marks = match spec.marks.as_deref() {
                Some("_") => None,
                Some(list) => Some(list.split_whitespace().map(str::to_string).collect()),
                None if inline_content => None,
                None => Some(Vec::new()),
            };
            types.push(NodeType(Arc::new(NodeTypeInner {
                name: name.to_string(),
                groups: spec.group.split_whitespace().map(str::to_string).collect(),
                spec: spec.clone(),
                content: Arc::new(content),
                inline_content,
                allowed_marks,
            })));
        }

        let marks = marks
            .into_iter()
            .enumerate()
            .map(|(rank, (name, spec))| MarkType::new(name, rank, spec))
            .collect();

        Ok(Self {
            nodes: types,
            marks,
        })
    }

    /// The editor vocabulary: the basic rich-text nodes, bullet and ordered
    /// lists whose items hold `"paragraph block*"`, and inline external
    /// entity nodes.
    pub fn cozy() -> Schema {
        static COZY: OnceLock<Schema> = OnceLock::new();
        COZY.get_or_init(|| {
            Schema::new(
                vec![
                    ("doc", NodeSpec::new("block+")),
                    ("paragraph", NodeSpec::new("inline*").group("block")),
                    ("blockquote", NodeSpec::new("block+").group("block").defining()),
                    ("horizontal_rule", NodeSpec::leaf().group("block")),
                    (
                        "heading",
                        NodeSpec::new("inline*")
                            .group("block")
                            .defining()
                            .attr("level", Some(json!(1))),
                    ),
                    (
                        "code_block",
                        NodeSpec::new("text*").group("block").marks("").code().defining(),
                    ),
                    ("text", NodeSpec::leaf().group("inline")),
                    (
                        "image",
                        NodeSpec::leaf()
                            .inline()
                            .group("inline")
                            .attr("src", None)
                            .attr("alt", Some(Value::Null))
                            .attr("title", Some(Value::Null)),
                    ),
                    (
                        "hard_break",
                        NodeSpec::leaf().inline().group("inline").not_selectable(),
                    ),
                    (
                        "ordered_list",
                        NodeSpec::new("list_item+")
                            .group("block")
                            .attr("order", Some(json!(1))),
                    ),
                    ("bullet_list", NodeSpec::new("list_item+").group("block")),
                    ("list_item", NodeSpec::new("paragraph block*").defining()),
                    (
                        "external_item",
                        NodeSpec::leaf()
                            .inline()
                            .atom()
                            .group("inline")
                            .attr("id", None)
                            .attr("type", None),
                    ),
                ],
                vec![
                    (
                        "link",
                        MarkSpec::new()
                            .attr("href", None)
                            .attr("title", Some(Value::Null))
                            .not_inclusive(),
                    ),
                    ("em", MarkSpec::new()),
                    ("strong", MarkSpec::new()),
                    ("code", MarkSpec::new()),
                ],
            )
            .expect("cozy schema is well-formed")
        })
        .clone()
    }

    pub fn node_types(&self) -> &[NodeType] {
        &self.nodes
    }

    pub fn mark_types(&self) -> &[MarkType] {
        &self.marks
    }

    pub fn top_node_type(&self) -> &NodeType {
        &self.nodes[0]
    }

    pub fn node_type(&self, name: &str) -> Result<&NodeType, ModelError> {
        self.nodes
            .iter()
            .find(|ty| ty.name() == name)
            .ok_or_else(|| ModelError::UnknownNodeType(name.to_string()))
    }

    pub fn mark_type(&self, name: &str) -> Result<&MarkType, ModelError> {
        self.marks
            .iter()
            .find(|ty| ty.name() == name)
            .ok_or_else(|| ModelError::UnknownMarkType(name.to_string()))
    }

    /// Create a node of the named type, checking its content.
    pub fn node(
        &self,
        name: &str,
        attrs: Option<&Attrs>,
        content: Vec<Node>,
    ) -> Result<Node, ModelError> {
        self.node_type(name)?
            .create_checked(attrs, Fragment::from_vec(content), Vec::new())
    }

    /// Create a text node. Empty text is not a valid node; callers pass
    /// non-empty strings.
    pub fn text(&self, text: &str, marks: Vec<Mark>) -> Node {
        Node::new_text(self.text_type().clone(), text, marks)
    }

    pub fn mark(&self, name: &str, attrs: Option<&Attrs>) -> Result<Mark, ModelError> {
        self.mark_type(name)?.create(attrs)
    }

    fn text_type(&self) -> &NodeType {
        self.nodes
            .iter()
            .find(|ty| ty.is_text())
            .unwrap_or(&self.nodes[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cozy_schema_type_flags() {
        let schema = Schema::cozy();
        let paragraph = schema.node_type("paragraph").unwrap();
        assert!(paragraph.is_textblock());
        assert!(!paragraph.is_leaf());

        let list = schema.node_type("bullet_list").unwrap();
        assert!(list.is_block());
        assert!(!list.is_textblock());

        let external = schema.node_type("external_item").unwrap();
        assert!(external.is_inline());
        assert!(external.is_atom());
        assert!(external.has_required_attrs());

        let code = schema.node_type("code_block").unwrap();
        assert!(code.is_code());
        let strong = schema.mark_type("strong").unwrap();
        assert!(!code.allows_mark_type(strong));
        assert!(paragraph.allows_mark_type(strong));

        assert!(!schema.node_type("hard_break").unwrap().is_selectable());
        assert!(schema.node_type("horizontal_rule").unwrap().is_selectable());
    }

    #[test]
    fn test_unknown_type_lookup_fails() {
        let schema = Schema::cozy();
        assert_eq!(
            schema.node_type("table").unwrap_err(),
            ModelError::UnknownNodeType("table".into())
        );
    }

    #[test]
    fn test_create_and_fill_list_item() {
        let schema = Schema::cozy();
        let item = schema
            .node_type("list_item")
            .unwrap()
            .create_and_fill(&schema)
            .unwrap();
        assert_eq!(item.to_string(), "list_item(paragraph)");
        assert_eq!(item.node_size(), 4);
    }

    #[test]
    fn test_node_rejects_invalid_content() {
        let schema = Schema::cozy();
        let text = schema.text("loose", Vec::new());
        let err = schema.node("bullet_list", None, vec![text]).unwrap_err();
        assert_eq!(err, ModelError::InvalidContent("bullet_list".into()));
    }

    #[test]
    fn test_heading_attr_defaults() {
        let schema = Schema::cozy();
        let heading = schema.node("heading", None, Vec::new()).unwrap();
        assert_eq!(heading.attr("level"), Some(&json!(1)));
    }
}
