use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::config::SegmentMode;
use crate::extractor::charset::is_special;

static SPACE_SEQ_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{Z}\p{C}]+").unwrap());

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

static PARAGRAPH_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

/// Elements whose boundaries separate words even without whitespace in the
/// markup.
const BREAKING_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

/// Raw candidate passages of a document, in document order.
pub fn segment(document: &Html, mode: SegmentMode) -> Vec<String> {
    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return Vec::new();
    };

    match mode {
        SegmentMode::Paragraphs => body
            .select(&PARAGRAPH_SELECTOR)
            .map(element_text)
            .collect(),
        SegmentMode::OwnText => body
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(has_own_text)
            .map(element_text)
            .collect(),
    }
}

enum Step<'a> {
    Element(ElementRef<'a>),
    Text(&'a str),
    Space,
}

/// Text content of `element` in document order, with a space around every
/// nested breaking element. The walk is iterative, so nesting depth does not
/// grow the call stack.
fn element_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    let mut stack = Vec::new();
    push_children(element, &mut stack);

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(t) => text.push_str(t),
            Step::Space => text.push(' '),
            Step::Element(child) => {
                let breaks = BREAKING_TAGS.contains(&child.value().name());
                if breaks {
                    text.push(' ');
                    stack.push(Step::Space);
                }
                push_children(child, &mut stack);
            }
        }
    }
    text
}

fn push_children<'a>(element: ElementRef<'a>, stack: &mut Vec<Step<'a>>) {
    let children: Vec<_> = element.children().collect();
    for child in children.into_iter().rev() {
        if let Some(t) = child.value().as_text() {
            stack.push(Step::Text(&**t));
        } else if let Some(child) = ElementRef::wrap(child) {
            stack.push(Step::Element(child));
        }
    }
}

fn has_own_text(element: &ElementRef<'_>) -> bool {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .any(|text| !text.trim().is_empty())
}

/// Collapses every run of separators and control characters to one space
/// and trims both ends.
pub fn clean(text: &str) -> String {
    SPACE_SEQ_REGEX.replace_all(text, " ").trim().to_string()
}

/// Rejects passages shorter than `min_length` characters or still holding
/// specials code points, which point at a wrong decoding.
pub fn passes_shape_filter(text: &str, min_length: usize) -> bool {
    let mut length = 0usize;
    for c in text.chars() {
        if is_special(c) {
            return false;
        }
        length += 1;
    }
    length >= min_length
}
