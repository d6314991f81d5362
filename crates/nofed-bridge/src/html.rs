//! HTML ⇄ plain text for note content.

use scraper::{Html, Node};

/// Plain text of an HTML fragment. Line breaks and block boundaries become
/// newlines; entities are decoded.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => match el.name() {
                "br" => out.push('\n'),
                "p" | "div" | "blockquote" | "pre" if !out.is_empty() => out.push_str("\n\n"),
                "li" if !out.is_empty() => out.push('\n'),
                _ => {}
            },
            _ => {}
        }
    }
    collapse_blank_lines(&out)
}

fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Render plain text as HTML: blank lines separate `<p>` paragraphs, single
/// newlines become `<br>`.
pub fn text_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape(p).replace('\n', "<br>")))
        .collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_mastodon_markup() {
        let html = r#"<p>Hello <span class="h-card"><a href="https://fed.example/@bob">@<span>bob</span></a></span> &amp; all</p><p>line one<br>line two</p>"#;
        assert_eq!(strip_html(html), "Hello @bob & all\n\nline one\nline two");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_html("just text"), "just text");
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn text_is_escaped_into_paragraphs() {
        assert_eq!(
            text_to_html("a <b> & c\nnext\n\nsecond"),
            "<p>a &lt;b&gt; &amp; c<br>next</p><p>second</p>"
        );
    }
}
