//! Hansard section HTML parsing
//!
//! Parses one section's HTML body into speaker-attributed segments with a
//! forward walk over the top-level children. No CSS selectors for structure:
//! the markup is frequently malformed, so structure is decided per element.
//!
//! Reconstruction rules:
//! - A heading whose text matches the `H.MM am|pm|noon` pattern sets the
//!   time context for every segment started after it in the section.
//! - A paragraph with a leading `<strong>`/`<b>` speaker label starts a new
//!   segment. Both historical colon placements are accepted:
//!   `<strong>Name:</strong>` and `<strong>Name</strong>:`.
//! - A paragraph without a label continues the current segment, joined by a
//!   single space; with no current segment it is discarded. Continuations
//!   are dropped only when their cleaned text is empty.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

/// One reconstructed speech within a section
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSegment {
    /// May be empty for narration labels like `<strong></strong>`
    pub speaker: String,
    pub text: String,
    pub timestamp: Option<String>,
}

/// Sitting-time headings, e.g. `1.30 pm`, `12.00 noon`
static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d{1,2}\.\d{2}\s*(?:am|pm|noon)$").expect("valid regex")
});

/// Parse a section's HTML content into ordered segments
#[must_use]
pub fn parse_section_html(html: &str) -> Vec<ParsedSegment> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();

    let mut segments: Vec<ParsedSegment> = Vec::new();
    let mut current_timestamp: Option<String> = None;

    for node in root.children() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };

        match element.value().name() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let text = collapse_whitespace(&element_text(element));
                if TIME_PATTERN.is_match(&text) {
                    current_timestamp = Some(text);
                }
            }
            "p" => match classify_paragraph(element) {
                Paragraph::NewSegment { speaker, text } => {
                    segments.push(ParsedSegment {
                        speaker,
                        text,
                        timestamp: current_timestamp.clone(),
                    });
                }
                Paragraph::Continuation(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(current) = segments.last_mut() {
                        if !current.text.is_empty() {
                            current.text.push(' ');
                        }
                        current.text.push_str(&text);
                    }
                    // no current segment: discard
                }
            },
            _ => {}
        }
    }

    segments
}

enum Paragraph {
    NewSegment { speaker: String, text: String },
    Continuation(String),
}

/// Decide whether a paragraph starts a new segment or continues the last one
fn classify_paragraph(p: ElementRef<'_>) -> Paragraph {
    let mut children = p.children();

    // find the first non-blank node
    let first = loop {
        match children.next() {
            Some(node) => {
                if node.value().is_comment() {
                    continue;
                }
                if let Some(text) = node.value().as_text() {
                    if text.trim().is_empty() {
                        continue;
                    }
                    // leading plain text means no speaker label
                    break None;
                }
                break Some(node);
            }
            None => break None,
        }
    };

    let label = first
        .and_then(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "strong" | "b"));

    let Some(label) = label else {
        return Paragraph::Continuation(collapse_whitespace(&element_text(p)));
    };

    // everything after the label element is the speech
    let mut remainder = String::new();
    let mut past_label = false;
    for node in p.children() {
        if !past_label {
            if node.id() == label.id() {
                past_label = true;
            }
            continue;
        }
        if let Some(text) = node.value().as_text() {
            remainder.push_str(text);
        } else if let Some(el) = ElementRef::wrap(node) {
            remainder.push_str(&element_text(el));
        }
    }

    let mut speaker = collapse_whitespace(&element_text(label));
    let mut remainder = remainder.trim_start().to_string();

    // <strong>Name:</strong> carries the colon inside the label;
    // <strong>Name</strong>: leaves it at the start of the remainder
    if let Some(stripped) = speaker.strip_suffix(':') {
        speaker = stripped.trim_end().to_string();
    } else if let Some(stripped) = remainder.strip_prefix(':') {
        remainder = stripped.to_string();
    }

    Paragraph::NewSegment {
        speaker,
        text: collapse_whitespace(&remainder),
    }
}

/// Concatenated text of an element's subtree, entities already decoded
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join("")
}

/// Collapse every whitespace run to a single space and trim the ends
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_speakers_continuations_and_timestamps() {
        let html = "<h6>1.30 pm</h6>\
            <p><strong>Speaker A:</strong> Hello world.</p>\
            <p>Continuing remark.</p>\
            <p><strong>Speaker B:</strong> Reply.</p>";
        let segments = parse_section_html(html);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].speaker, "Speaker A");
        assert_eq!(segments[0].text, "Hello world. Continuing remark.");
        assert_eq!(segments[0].timestamp.as_deref(), Some("1.30 pm"));
        assert_eq!(segments[1].speaker, "Speaker B");
        assert_eq!(segments[1].text, "Reply.");
        assert_eq!(segments[1].timestamp.as_deref(), Some("1.30 pm"));
    }

    #[test]
    fn accepts_colon_outside_the_label() {
        let html = "<p><strong>Mr Lee</strong>: Thank you, Speaker.</p>";
        let segments = parse_section_html(html);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker, "Mr Lee");
        assert_eq!(segments[0].text, "Thank you, Speaker.");
    }

    #[test]
    fn discards_leading_paragraph_without_a_speaker() {
        let html = "<p>Orphan narration.</p>\
            <p><strong>Ms Tan:</strong> Actual speech.</p>";
        let segments = parse_section_html(html);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].speaker, "Ms Tan");
    }

    #[test]
    fn keeps_short_interjections() {
        let html = "<p><strong>Mr Lim:</strong> I object.</p><p>No.</p>";
        let segments = parse_section_html(html);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "I object. No.");
    }

    #[test]
    fn drops_empty_continuations() {
        let html = "<p><strong>Mr Lim:</strong> Point taken.</p><p>   </p><p></p>";
        let segments = parse_section_html(html);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Point taken.");
    }

    #[test]
    fn strips_nested_markup_and_collapses_whitespace() {
        let html = "<p><strong>Dr Koh:</strong> We   will <em>not</em>\n accept&nbsp;this.</p>";
        let segments = parse_section_html(html);
        // &nbsp; decodes to U+00A0, which is whitespace and collapses too
        assert_eq!(segments[0].text, "We will not accept this.");
    }

    #[test]
    fn timestamp_only_from_matching_headings() {
        let html = "<h6>Annex A</h6><p><strong>Mr Ng:</strong> See annex.</p>";
        let segments = parse_section_html(html);
        assert_eq!(segments[0].timestamp, None);
    }

    #[test]
    fn timestamp_updates_mid_section() {
        let html = "<h6>1.30 pm</h6>\
            <p><strong>A:</strong> First.</p>\
            <h6>2.45 pm</h6>\
            <p><strong>B:</strong> Second.</p>";
        let segments = parse_section_html(html);
        assert_eq!(segments[0].timestamp.as_deref(), Some("1.30 pm"));
        assert_eq!(segments[1].timestamp.as_deref(), Some("2.45 pm"));
    }

    #[test]
    fn noon_heading_is_a_timestamp() {
        let html = "<h6>12.00 noon</h6><p><strong>A:</strong> Hi.</p>";
        let segments = parse_section_html(html);
        assert_eq!(segments[0].timestamp.as_deref(), Some("12.00 noon"));
    }

    #[test]
    fn bold_label_is_accepted() {
        let html = "<p><b>The Speaker:</b> Order.</p>";
        let segments = parse_section_html(html);
        assert_eq!(segments[0].speaker, "The Speaker");
        assert_eq!(segments[0].text, "Order.");
    }

    #[test]
    fn empty_input_yields_no_segments() {
        assert!(parse_section_html("").is_empty());
        assert!(parse_section_html("<div>stray</div>").is_empty());
    }
}
