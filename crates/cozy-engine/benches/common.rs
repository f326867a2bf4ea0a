// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
use cozy_engine::builders::{Piece, TaggedDoc, doc, node};

/// A bullet list of `items` single-paragraph items followed by a paragraph,
/// with the cursor at the start of the last item.
#[allow(dead_code)]
pub fn long_list(items: usize) -> TaggedDoc {
    let item = |text: String| {
        Piece::from(node(
            "list_item",
            None,
            vec![Piece::from(node("paragraph", None, vec![Piece::from(text)]))],
        ))
    };
    let mut children: Vec<Piece> = (0..items.saturating_sub(1))
        .map(|i| item(format!("item {i}")))
        .collect();
    children.push(item("<a>last item".to_string()));
    doc(vec![
        Piece::from(node("bullet_list", None, children)),
        Piece::from(node("paragraph", None, vec![Piece::from("after the list")])),
    ])
}
