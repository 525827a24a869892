//! HTML normalization for uploaded documents
//!
//! Uploaded markup is reduced to plain text before chunking: script, style,
//! and metadata subtrees are dropped entirely, the remaining text nodes are
//! joined, and all whitespace runs collapse to single spaces. Content-free
//! input yields an empty string.

use scraper::{Html, Node};

/// Elements whose entire subtree is non-content.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "meta", "link"];

/// Extract the text content of `html` and collapse whitespace.
///
/// Only text nodes survive: tags, attributes, and URLs never reach the
/// output, and text under any [`SKIP_TAGS`] element is dropped with it.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut pieces: Vec<&str> = Vec::new();
    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            let skipped = node.ancestors().any(|ancestor| match ancestor.value() {
                Node::Element(element) => SKIP_TAGS.contains(&element.name()),
                _ => false,
            });
            if !skipped {
                pieces.push(text);
            }
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

/// Collapse any whitespace run (spaces, newlines, tabs) to a single space
/// and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_body_text() {
        let html = "<html><body><p>Employee Name : Jane Doe</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Employee Name : Jane Doe"));
    }

    #[test]
    fn test_strips_script_and_style() {
        let html = r#"<html><head><style>.x{color:red}</style></head>
            <body><script>alert("hi")</script><p>visible</p></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("visible"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color:red"));
    }

    #[test]
    fn test_script_only_body_is_empty() {
        let html = "<html><body><script>alert(1)</script></body></html>";
        assert_eq!(html_to_text(html), "");
    }

    #[test]
    fn test_strips_noscript_and_metadata() {
        let html = r#"<html><head>
            <meta name="description" content="hidden">
            <link rel="stylesheet" href="app.css">
            </head><body><noscript>enable js</noscript><p>shown</p></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "shown");
    }

    #[test]
    fn test_output_is_plain_text_not_markup() {
        let html = r#"<h1>Employee Record</h1>
            <b>Name</b> : <a href="https://internal/hr/42">Jane Doe</a>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Employee Record Name : Jane Doe");
        assert!(!text.contains("**"));
        assert!(!text.contains("=="));
        assert!(!text.contains("https://internal"));
        assert!(!text.contains("]("));
    }

    #[test]
    fn test_collapses_whitespace() {
        let html = "<p>one</p>\n\n\n<p>two   three</p>";
        let text = html_to_text(html);
        assert!(!text.contains('\n'));
        assert!(!text.contains("  "));
        assert!(text.contains("one"));
        assert!(text.contains("two three"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_content_free_input() {
        assert_eq!(html_to_text("<html><head><title></title></head><body></body></html>"), "");
    }

    #[test]
    fn test_collapse_whitespace_plain() {
        assert_eq!(collapse_whitespace("  a\t\tb \n c  "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
