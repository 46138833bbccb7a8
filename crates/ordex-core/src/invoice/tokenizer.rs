//! Flatten an HTML document into the token stream the parser consumes.

use scraper::{ElementRef, Html, Node};

/// Elements whose subtrees never contain visible text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Tokenize a parsed document.
///
/// Text nodes are visited depth-first with whitespace collapsed. A fragment
/// repeating the one before it is dropped. A label ending in `:` absorbs the
/// next fragment, and a fragment starting with `,` is glued onto the previous
/// token.
pub fn tokenize(document: &Html) -> Vec<String> {
    let mut raw = Vec::new();
    collect_text(document.root_element(), &mut raw);

    let mut tokens: Vec<String> = Vec::with_capacity(raw.len());
    let mut previous_raw: Option<&str> = None;
    for fragment in &raw {
        if previous_raw == Some(fragment.as_str()) {
            continue;
        }
        previous_raw = Some(fragment.as_str());

        if let Some(last) = tokens.last_mut() {
            if fragment.starts_with(',') {
                last.push_str(fragment);
                continue;
            }
            if last.ends_with(':') {
                last.push(' ');
                last.push_str(fragment);
                continue;
            }
        }
        tokens.push(fragment.clone());
    }
    tokens
}

/// Parse `html` and tokenize it.
pub fn tokenize_html(html: &str) -> Vec<String> {
    tokenize(&Html::parse_document(html))
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let collapsed = collapse_whitespace(text);
                if !collapsed.is_empty() {
                    out.push(collapsed);
                }
            }
            Node::Element(el) => {
                if SKIPPED_ELEMENTS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
