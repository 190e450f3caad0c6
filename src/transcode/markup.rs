//! FB2 element to XHTML markup mapping.

use crate::epub::writer::xml_escape;
use crate::fb2::anchors::AnchorIndex;
use crate::fb2::{attr, raw_attr};
use quick_xml::events::BytesStart;

/// Elements an image renders inline inside (no block wrapper).
const INLINE_PARENTS: &[&str] = &[
    "p",
    "v",
    "subtitle",
    "text-author",
    "date",
    "th",
    "td",
    "a",
    "strong",
    "emphasis",
    "strikethrough",
    "sub",
    "sup",
    "code",
    "style",
];

/// Opening markup plus the text that closes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Markup {
    pub open: String,
    pub close: String,
}

impl Markup {
    pub fn new(open: String, close: impl Into<String>) -> Self {
        Self {
            open,
            close: close.into(),
        }
    }

    /// Rendered nothing; children still render.
    pub fn transparent() -> Self {
        Self::new(String::new(), "")
    }
}

/// ` id="…"` when the element carries an id.
pub(crate) fn id_attr(e: &BytesStart) -> String {
    attr(e, "id")
        .map(|id| format!(" id=\"{}\"", xml_escape(&id)))
        .unwrap_or_default()
}

/// One-to-one mappings. Structural elements (body, section, title, a,
/// image, binary, description) are handled by the transcoder; anything
/// else unknown renders transparently.
pub(crate) fn element(name: &str, e: &BytesStart) -> Markup {
    let id = id_attr(e);
    match name {
        "p" => Markup::new(format!("<p{id}>"), "</p>\n"),
        "subtitle" | "v" | "text-author" | "date" => {
            Markup::new(format!("<p class=\"{name}\"{id}>"), "</p>\n")
        }
        "epigraph" | "annotation" | "poem" | "stanza" => {
            Markup::new(format!("<div class=\"{name}\"{id}>\n"), "</div>\n")
        }
        "cite" => Markup::new(
            format!("<blockquote class=\"cite\"{id}>\n"),
            "</blockquote>\n",
        ),
        "empty-line" => Markup::new("<br/>\n".to_string(), ""),
        "strong" | "sub" | "sup" | "code" => {
            Markup::new(format!("<{name}{id}>"), format!("</{name}>"))
        }
        "emphasis" => Markup::new(format!("<em{id}>"), "</em>"),
        "strikethrough" => Markup::new(format!("<del{id}>"), "</del>"),
        "style" => {
            let class = attr(e, "name")
                .map(|n| format!(" class=\"{}\"", xml_escape(&n)))
                .unwrap_or_default();
            Markup::new(format!("<span{class}{id}>"), "</span>")
        }
        "table" => Markup::new(format!("<table{id}>\n"), "</table>\n"),
        "tr" => Markup::new(format!("<tr{}{id}>", carried(e, &["align"])), "</tr>\n"),
        "th" | "td" => Markup::new(
            format!(
                "<{name}{}{id}>",
                carried(e, &["colspan", "rowspan", "align", "valign"])
            ),
            format!("</{name}>"),
        ),
        _ => Markup::transparent(),
    }
}

/// Attributes copied verbatim to the output element.
fn carried(e: &BytesStart, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|n| attr(e, n).map(|v| format!(" {n}=\"{}\"", xml_escape(&v))))
        .collect()
}

/// `<a>` with its target rewritten through the anchor index. Targets the
/// index does not know are written exactly as they appear in the source.
pub(crate) fn link(e: &BytesStart, anchors: &AnchorIndex) -> Markup {
    let href = match attr(e, "href") {
        Some(target) => match anchors.resolve(&target) {
            Some(dest) => xml_escape(&dest.href()),
            None => {
                if target.starts_with('#') {
                    tracing::debug!(href = %target, "unresolved internal link");
                }
                raw_attr(e, "href")
                    .unwrap_or_default()
                    .replace('"', "&quot;")
            }
        },
        None => String::new(),
    };
    let note = if attr(e, "type").as_deref() == Some("note") {
        " class=\"note\" epub:type=\"noteref\""
    } else {
        ""
    };
    Markup::new(format!("<a href=\"{href}\"{note}{}>", id_attr(e)), "</a>")
}

/// Image reference with the leading `#` removed.
pub(crate) fn image_target(e: &BytesStart) -> String {
    attr(e, "href")
        .map(|h| h.trim_start_matches('#').to_string())
        .unwrap_or_default()
}

/// Whether an image whose parent is `parent` stays inline.
pub(crate) fn is_inline_parent(parent: Option<&str>) -> bool {
    parent.is_some_and(|p| INLINE_PARENTS.contains(&p))
}

pub(crate) fn image(e: &BytesStart, inline: bool) -> String {
    let src = xml_escape(&image_target(e));
    let alt = xml_escape(&attr(e, "alt").unwrap_or_default());
    let id = id_attr(e);
    if inline {
        format!("<img src=\"{src}\" alt=\"{alt}\"{id}/>")
    } else {
        format!("<div class=\"image\"{id}><img src=\"{src}\" alt=\"{alt}\"/></div>\n")
    }
}

/// Escape raw source text for the page buffer.
///
/// The text still carries the source's own entity references, so only
/// angle brackets and an ampersand followed by whitespace are escaped.
/// Control characters other than tab, CR and LF are dropped.
pub fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if chars.peek().is_some_and(|n| n.is_whitespace()) => out.push_str("&amp;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
