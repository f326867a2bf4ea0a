//! Content expressions and the automaton that matches child sequences
//! against them.
//!
//! An expression such as `"paragraph block*"` is a sequence of terms. Each
//! term names a node type, a group or a parenthesised `a | b` choice and may
//! carry a `*`, `+` or `?` quantifier. Groups are expanded to the member
//! types, in schema order, when the schema is built.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Fragment, ModelError, NodeType, Schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Term {
    pub(crate) types: Vec<String>,
    pub(crate) min: usize,
    pub(crate) max: Option<usize>,
}

/// A compiled content expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentExpr {
    source: String,
    terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Name(&'a str),
    Open,
    Close,
    Choice,
    Star,
    Plus,
    Question,
}

fn tokenize(source: &str) -> Result<Vec<Token<'_>>, ModelError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    while let Some(c) = rest.chars().next() {
        let token = match c {
            c if c.is_whitespace() => {
                rest = &rest[c.len_utf8()..];
                continue;
            }
            '(' => Token::Open,
            ')' => Token::Close,
            '|' => Token::Choice,
            '*' => Token::Star,
            '+' => Token::Plus,
            '?' => Token::Question,
            c if c.is_alphanumeric() || c == '_' => {
                let end = rest
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());
                tokens.push(Token::Name(&rest[..end]));
                rest = &rest[end..];
                continue;
            }
            other => {
                return Err(ModelError::ContentExpr {
                    expr: source.to_string(),
                    reason: format!("unexpected character {other:?}"),
                });
            }
        };
        tokens.push(token);
        rest = &rest[1..];
    }
    Ok(tokens)
}

impl ContentExpr {
    /// Compile `source`, expanding each name through `resolve`.
    pub(crate) fn parse(
        source: &str,
        resolve: impl Fn(&str) -> Option<Vec<String>>,
    ) -> Result<Self, ModelError> {
        let err = |reason: String| ModelError::ContentExpr {
            expr: source.to_string(),
            reason,
        };
        let lookup =
            |name: &str| resolve(name).ok_or_else(|| err(format!("no node type or group {name}")));

        let tokens = tokenize(source)?;
        let mut terms = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let types = match &tokens[i] {
                Token::Name(name) => {
                    i += 1;
                    lookup(name)?
                }
                Token::Open => {
                    i += 1;
                    let mut types = Vec::new();
                    loop {
                        match tokens.get(i) {
                            Some(Token::Name(name)) => {
                                for ty in lookup(name)? {
                                    if !types.contains(&ty) {
                                        types.push(ty);
                                    }
                                }
                                i += 1;
                            }
                            _ => return Err(err("expected a name inside parentheses".into())),
                        }
                        match tokens.get(i) {
                            Some(Token::Choice) => i += 1,
                            Some(Token::Close) => {
                                i += 1;
                                break;
                            }
                            _ => return Err(err("unclosed parenthesis".into())),
                        }
                    }
                    types
                }
                other => return Err(err(format!("unexpected token {other:?}"))),
            };
            let quantifier = match tokens.get(i) {
                Some(Token::Star) => Some((0, None)),
                Some(Token::Plus) => Some((1, None)),
                Some(Token::Question) => Some((0, Some(1))),
                _ => None,
            };
            if quantifier.is_some() {
                i += 1;
            }
            let (min, max) = quantifier.unwrap_or((1, Some(1)));
            terms.push(Term { types, min, max });
        }

        Ok(Self {
            source: source.to_string(),
            terms,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Name of the first type the expression can start with.
    pub(crate) fn first_type(&self) -> Option<&str> {
        self.terms
            .first()
            .and_then(|t| t.types.first())
            .map(String::as_str)
    }
}

/// A position inside a content expression: the set of term states reachable
/// after matching some prefix of children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    expr: Arc<ContentExpr>,
    states: BTreeSet<(usize, usize)>,
}

impl ContentMatch {
    pub(crate) fn start(expr: Arc<ContentExpr>) -> Self {
        Self::closed(expr, [(0, 0)])
    }

    fn closed(expr: Arc<ContentExpr>, seeds: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut states = BTreeSet::new();
        let mut stack: Vec<_> = seeds.into_iter().collect();
        while let Some((term, count)) = stack.pop() {
            if states.insert((term, count))
                && let Some(t) = expr.terms.get(term)
                && count >= t.min
            {
                stack.push((term + 1, 0));
            }
        }
        Self { expr, states }
    }

    fn match_name(&self, name: &str) -> Option<ContentMatch> {
        let mut next = Vec::new();
        for &(term, count) in &self.states {
            let Some(t) = self.expr.terms.get(term) else {
                continue;
            };
            if t.types.iter().any(|ty| ty == name) && t.max.is_none_or(|max| count < max) {
                let count = match t.max {
                    Some(_) => count + 1,
                    None => (count + 1).min(t.min),
                };
                next.push((term, count));
            }
        }
        if next.is_empty() {
            None
        } else {
            Some(Self::closed(self.expr.clone(), next))
        }
    }

    /// Match a node of the given type, returning the state after it.
    pub fn match_type(&self, ty: &NodeType) -> Option<ContentMatch> {
        self.match_name(ty.name())
    }

    pub fn match_fragment(&self, fragment: &Fragment) -> Option<ContentMatch> {
        self.match_fragment_range(fragment, 0, fragment.child_count())
    }

    pub fn match_fragment_range(
        &self,
        fragment: &Fragment,
        start: usize,
        end: usize,
    ) -> Option<ContentMatch> {
        let mut cur = self.clone();
        for i in start..end {
            cur = cur.match_type(fragment.child(i).ty())?;
        }
        Some(cur)
    }

    /// True when the matched prefix is a complete match.
    pub fn valid_end(&self) -> bool {
        self.states
            .iter()
            .any(|&(term, _)| term == self.expr.terms.len())
    }

    /// Type names that may follow, in expression order.
    pub fn edge_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for &(term, count) in &self.states {
            let Some(t) = self.expr.terms.get(term) else {
                continue;
            };
            if t.max.is_some_and(|max| count >= max) {
                continue;
            }
            for ty in &t.types {
                if !names.contains(&ty.as_str()) {
                    names.push(ty);
                }
            }
        }
        names
    }

    pub fn edges(&self, schema: &Schema) -> Vec<NodeType> {
        self.edge_names()
            .into_iter()
            .filter_map(|name| schema.node_type(name).ok().cloned())
            .collect()
    }

    /// The first type that can be created here without any attributes.
    pub fn default_type(&self, schema: &Schema) -> Option<NodeType> {
        self.edges(schema)
            .into_iter()
            .find(|ty| !(ty.is_text() || ty.has_required_attrs()))
    }

    /// True when both positions accept at least one common type.
    pub fn compatible(&self, other: &ContentMatch) -> bool {
        let theirs = other.edge_names();
        self.edge_names().iter().any(|name| theirs.contains(name))
    }

    /// Find the smallest sequence of default nodes that makes `after` match
    /// from here, optionally also reaching a valid end.
    pub fn fill_before(&self, after: &Fragment, to_end: bool, schema: &Schema) -> Option<Fragment> {
        let mut seen = vec![self.clone()];
        self.search_fill(after, to_end, schema, &mut seen, &mut Vec::new())
    }

    fn search_fill(
        &self,
        after: &Fragment,
        to_end: bool,
        schema: &Schema,
        seen: &mut Vec<ContentMatch>,
        types: &mut Vec<NodeType>,
    ) -> Option<Fragment> {
        if let Some(finished) = self.match_fragment(after)
            && (!to_end || finished.valid_end())
        {
            let nodes = types
                .iter()
                .map(|ty| ty.create_and_fill(schema))
                .collect::<Option<Vec<_>>>()?;
            return Some(Fragment::from_vec(nodes));
        }
        for ty in self.edges(schema) {
            if ty.is_text() || ty.has_required_attrs() {
                continue;
            }
            let Some(next) = self.match_type(&ty) else {
                continue;
            };
            if seen.contains(&next) {
                continue;
            }
            seen.push(next.clone());
            types.push(ty);
            if let Some(found) = next.search_fill(after, to_end, schema, seen, types) {
                return Some(found);
            }
            types.pop();
        }
        None
    }

    /// Find a chain of wrapper types that lets a node of type `target` be
    /// placed here. An empty chain means it fits directly.
    pub fn find_wrapping(&self, target: &NodeType, schema: &Schema) -> Option<Vec<NodeType>> {
        struct Active {
            at: ContentMatch,
            ty: Option<NodeType>,
            via: Option<usize>,
        }

        let mut active = vec![Active {
            at: self.clone(),
            ty: None,
            via: None,
        }];
        let mut seen = BTreeSet::new();
        let mut head = 0;
        while head < active.len() {
            let current = head;
            head += 1;
            if active[current].at.match_type(target).is_some() {
                let mut wrappers = Vec::new();
                let mut cursor = Some(current);
                while let Some(i) = cursor {
                    if let Some(ty) = &active[i].ty {
                        wrappers.push(ty.clone());
                    }
                    cursor = active[i].via;
                }
                wrappers.reverse();
                return Some(wrappers);
            }
            let at = active[current].at.clone();
            let outermost = active[current].ty.is_none();
            for ty in at.edges(schema) {
                let Some(next) = at.match_type(&ty) else {
                    continue;
                };
                if !ty.is_leaf()
                    && !ty.has_required_attrs()
                    && !seen.contains(ty.name())
                    && (outermost || next.valid_end())
                {
                    seen.insert(ty.name().to_string());
                    active.push(Active {
                        at: ty.content_match(),
                        ty: Some(ty),
                        via: Some(current),
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Schema;

    fn schema() -> Schema {
        Schema::cozy()
    }

    #[test]
    fn test_group_expansion_keeps_schema_order() {
        let schema = schema();
        let doc = schema.top_node_type();
        let names = doc.content_match().edge_names().join(" ");
        assert_eq!(
            names,
            "paragraph blockquote horizontal_rule heading code_block ordered_list bullet_list"
        );
    }

    #[test]
    fn test_list_item_requires_leading_paragraph() {
        let schema = schema();
        let item = schema.node_type("list_item").unwrap();
        let paragraph = schema.node_type("paragraph").unwrap();
        let list = schema.node_type("bullet_list").unwrap();

        let start = item.content_match();
        assert!(!start.valid_end());
        assert!(start.match_type(list).is_none());

        let after_paragraph = start.match_type(paragraph).unwrap();
        assert!(after_paragraph.valid_end());
        assert!(after_paragraph.match_type(list).is_some());
        assert!(after_paragraph.match_type(paragraph).is_some());
    }

    #[test]
    fn test_default_type_skips_text_and_required_attrs() {
        let schema = schema();
        let paragraph = schema.node_type("paragraph").unwrap();
        assert_eq!(
            paragraph.content_match().default_type(&schema).map(|t| t.name().to_string()),
            Some("hard_break".to_string())
        );
        let doc = schema.top_node_type();
        assert_eq!(
            doc.content_match().default_type(&schema).map(|t| t.name().to_string()),
            Some("paragraph".to_string())
        );
    }

    #[test]
    fn test_find_wrapping_paragraph_into_list() {
        let schema = schema();
        let list = schema.node_type("bullet_list").unwrap();
        let paragraph = schema.node_type("paragraph").unwrap();
        let wrappers = list.content_match().find_wrapping(paragraph, &schema).unwrap();
        let names: Vec<_> = wrappers.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["list_item"]);
    }

    #[test]
    fn test_fill_before_creates_required_paragraph() {
        let schema = schema();
        let item = schema.node_type("list_item").unwrap();
        let filled = item
            .content_match()
            .fill_before(&Fragment::empty(), true, &schema)
            .unwrap();
        assert_eq!(filled.to_string(), "paragraph");
    }

    #[test]
    fn test_choice_and_optional_terms() {
        let expr = ContentExpr::parse("(a | b)? c+", |name| Some(vec![name.to_string()])).unwrap();
        let start = ContentMatch::start(Arc::new(expr));
        assert_eq!(start.edge_names(), vec!["a", "b", "c"]);
        let after_a = start.match_name("a").unwrap();
        assert!(after_a.match_name("b").is_none());
        let after_c = after_a.match_name("c").unwrap();
        assert!(after_c.valid_end());
        assert!(after_c.match_name("c").unwrap().valid_end());
    }

    #[test]
    fn test_rejects_unknown_names() {
        let result = ContentExpr::parse("nothing+", |_| None);
        assert!(matches!(result, Err(ModelError::ContentExpr { .. })));
    }
}
