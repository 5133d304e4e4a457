//! # Document splitting and reassembly
//!
//! A combined document is one markup string that may embed `<style>` blocks
//! and inline `<script>` blocks. [`split`] pulls those out into three
//! independent [`Fragments`]; [`reassemble`] puts them back.
//!
//! ## Guarantees
//! - Pure: no I/O, no shared state, same input always gives the same output
//! - Non-failing: absent or malformed tags produce empty or best-effort output
//! - `split(reassemble(m, c, j))` recovers `(m, c, j)` up to surrounding
//!   whitespace when `m` carries no style/script blocks of its own
//!
//! ## NOT Responsible For
//! - Full HTML parsing (tags are matched lexically, nearest closing tag wins)
//! - Scripts with an external `src` (left in the markup untouched)

use std::ops::Range;

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CodeflowError, Result};

static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>(.*?)</style>").expect("invalid style pattern"));

// Group 1 is the attribute text of the opening tag.
static SCRIPT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<script([^>]*)>").expect("invalid script pattern"));

static SCRIPT_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</script>").expect("invalid script pattern"));

/// Base file name used by [`Document::export`] when the caller has none.
pub const DEFAULT_EXPORT_NAME: &str = "codeflow-project";

// ---------------------------------------------------------------------------
// Fragment kinds
// ---------------------------------------------------------------------------

/// One of the four views of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// The combined document with style and script embedded.
    Complete,
    /// Markup with style and inline script removed.
    #[value(name = "html")]
    #[serde(rename = "html")]
    Markup,
    #[value(name = "css")]
    #[serde(rename = "css")]
    Style,
    #[value(name = "js")]
    #[serde(rename = "js")]
    Script,
}

impl FragmentKind {
    pub const ALL: [FragmentKind; 4] = [
        FragmentKind::Complete,
        FragmentKind::Markup,
        FragmentKind::Style,
        FragmentKind::Script,
    ];

    /// Classify a file by its extension: `.css` is style, `.js` is script,
    /// anything else is treated as a combined document.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".css") {
            FragmentKind::Style
        } else if lower.ends_with(".js") {
            FragmentKind::Script
        } else {
            FragmentKind::Complete
        }
    }

    /// File extension used when exporting this fragment.
    pub fn extension(&self) -> &'static str {
        match self {
            FragmentKind::Complete | FragmentKind::Markup => "html",
            FragmentKind::Style => "css",
            FragmentKind::Script => "js",
        }
    }
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentKind::Complete => write!(f, "complete"),
            FragmentKind::Markup => write!(f, "html"),
            FragmentKind::Style => write!(f, "css"),
            FragmentKind::Script => write!(f, "js"),
        }
    }
}

// ---------------------------------------------------------------------------
// Splitter
// ---------------------------------------------------------------------------

/// The three separated parts of a combined document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragments {
    pub markup: String,
    pub style: String,
    pub script: String,
}

fn is_external_script(attrs: &str) -> bool {
    attrs.to_ascii_lowercase().contains("src=")
}

fn join_blocks<'a>(bodies: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for body in bodies {
        out.push_str(body.trim());
        out.push_str("\n\n");
    }
    out.trim().to_string()
}

/// Inner text of every `<style>` block, in document order, separated by a
/// blank line.
pub fn extract_style(html: &str) -> String {
    join_blocks(
        STYLE_BLOCK
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str())),
    )
}

/// Byte ranges of one inline script block: the whole element and its body.
struct ScriptSpan {
    element: Range<usize>,
    body: Range<usize>,
}

/// Inline script blocks in document order.
///
/// An external opening tag is skipped on its own, so a following inline block
/// is still found even when the external tag is never closed.
fn inline_scripts(html: &str) -> Vec<ScriptSpan> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(open) = SCRIPT_OPEN.captures_at(html, pos) {
        let (Some(tag), Some(attrs)) = (open.get(0), open.get(1)) else {
            break;
        };
        if is_external_script(attrs.as_str()) {
            pos = tag.end();
            continue;
        }
        let Some(close) = SCRIPT_CLOSE.find_at(html, tag.end()) else {
            break;
        };
        spans.push(ScriptSpan {
            element: tag.start()..close.end(),
            body: tag.end()..close.start(),
        });
        pos = close.end();
    }
    spans
}

/// Inner text of every inline `<script>` block. Tags with a `src` attribute
/// are skipped.
pub fn extract_script(html: &str) -> String {
    join_blocks(inline_scripts(html).into_iter().map(|s| &html[s.body]))
}

/// The document with style blocks and inline script blocks removed.
pub fn extract_markup(html: &str) -> String {
    let without_style = STYLE_BLOCK.replace_all(html, "");
    let mut out = String::with_capacity(without_style.len());
    let mut last = 0;
    for span in inline_scripts(&without_style) {
        out.push_str(&without_style[last..span.element.start]);
        last = span.element.end;
    }
    out.push_str(&without_style[last..]);
    out.trim().to_string()
}

pub fn split(document: &str) -> Fragments {
    Fragments {
        markup: extract_markup(document),
        style: extract_style(document),
        script: extract_script(document),
    }
}

// ---------------------------------------------------------------------------
// Reassembler
// ---------------------------------------------------------------------------

/// Rebuild a combined document from its fragments.
///
/// Style goes before the first `</head>`, else before the first `<body>`,
/// else at the very top. Script goes before the first `</body>`, else at the
/// very end. Blank fragments are not inserted at all.
pub fn reassemble(fragments: &Fragments) -> String {
    let mut combined = fragments.markup.clone();
    let style = &fragments.style;
    let script = &fragments.script;

    if !style.trim().is_empty() {
        combined = if combined.contains("</head>") {
            combined.replacen("</head>", &format!("  <style>\n{style}\n  </style>\n</head>"), 1)
        } else if combined.contains("<body>") {
            combined.replacen("<body>", &format!("<style>\n{style}\n</style>\n<body>"), 1)
        } else {
            format!("<style>\n{style}\n</style>\n\n{combined}")
        };
    }

    if !script.trim().is_empty() {
        combined = if combined.contains("</body>") {
            combined.replacen("</body>", &format!("  <script>\n{script}\n  </script>\n</body>"), 1)
        } else {
            format!("{combined}\n\n<script>\n{script}\n</script>")
        };
    }

    combined
}

// ---------------------------------------------------------------------------
// Document bundle
// ---------------------------------------------------------------------------

/// The four-field document bundle.
///
/// Field names match the persisted JSON layout (`complete`, `html`, `css`,
/// `js`). Every mutating method keeps the fields consistent: edits to the
/// combined text re-split it, edits to a fragment reassemble the combined
/// text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub complete: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
}

/// A file name plus its content, ready to write to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content: String,
}

impl Document {
    pub fn from_combined(text: &str) -> Self {
        let Fragments { markup, style, script } = split(text);
        Document {
            complete: text.to_string(),
            html: markup,
            css: style,
            js: script,
        }
    }

    pub fn fragments(&self) -> Fragments {
        Fragments {
            markup: self.html.clone(),
            style: self.css.clone(),
            script: self.js.clone(),
        }
    }

    pub fn get(&self, kind: FragmentKind) -> &str {
        match kind {
            FragmentKind::Complete => &self.complete,
            FragmentKind::Markup => &self.html,
            FragmentKind::Style => &self.css,
            FragmentKind::Script => &self.js,
        }
    }

    /// Replace one fragment and rebuild the combined text from all three.
    ///
    /// Passing [`FragmentKind::Complete`] behaves like [`Document::apply_edit`].
    pub fn set_fragment(&mut self, kind: FragmentKind, text: &str) {
        match kind {
            FragmentKind::Complete => {
                *self = Document::from_combined(text);
                return;
            }
            FragmentKind::Markup => self.html = text.to_string(),
            FragmentKind::Style => self.css = text.to_string(),
            FragmentKind::Script => self.js = text.to_string(),
        }
        self.complete = reassemble(&self.fragments());
    }

    pub fn apply_edit(&mut self, target: FragmentKind, text: &str) {
        self.set_fragment(target, text);
    }

    /// Load file content according to its extension and return the kind it
    /// was classified as.
    pub fn load_file(&mut self, name: &str, content: &str) -> FragmentKind {
        let kind = FragmentKind::from_file_name(name);
        self.set_fragment(kind, content);
        kind
    }

    pub fn clear(&mut self) {
        *self = Document::default();
    }

    pub fn is_empty(&self) -> bool {
        FragmentKind::ALL.iter().all(|k| self.get(*k).trim().is_empty())
    }

    pub fn export(&self, kind: FragmentKind, base_name: &str) -> Result<ExportFile> {
        let content = self.get(kind);
        if content.trim().is_empty() {
            return Err(CodeflowError::EmptyExport(kind));
        }
        Ok(ExportFile {
            file_name: export_name(base_name, kind),
            content: content.to_string(),
        })
    }
}

fn export_base(base_name: &str) -> &str {
    let base = base_name.trim();
    if base.is_empty() {
        DEFAULT_EXPORT_NAME
    } else {
        base
    }
}

pub fn export_name(base_name: &str, kind: FragmentKind) -> String {
    format!("{}.{}", export_base(base_name), kind.extension())
}

/// File name for `kind` when every section is exported together. The
/// markup gets a `.body.html` suffix so it does not overwrite the combined
/// document.
pub fn bundle_export_name(base_name: &str, kind: FragmentKind) -> String {
    match kind {
        FragmentKind::Markup => format!("{}.body.html", export_base(base_name)),
        _ => export_name(base_name, kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><head></head><body><style>a{color:red}</style><script>alert(1)</script></body></html>";

    #[test]
    fn test_split_basic_page() {
        let f = split(PAGE);
        assert_eq!(f.style, "a{color:red}");
        assert_eq!(f.script, "alert(1)");
        assert_eq!(f.markup, "<html><head></head><body></body></html>");
    }

    #[test]
    fn test_external_script_kept_in_markup() {
        let html = r#"<body><script src="x.js"></script><script>go()</script></body>"#;
        let f = split(html);
        assert_eq!(f.script, "go()");
        assert_eq!(f.markup, r#"<body><script src="x.js"></script></body>"#);
    }

    #[test]
    fn test_external_script_uppercase_src() {
        let html = r#"<SCRIPT SRC="lib.js">ignored()</SCRIPT>"#;
        assert_eq!(extract_script(html), "");
        assert_eq!(extract_markup(html), html);
    }

    #[test]
    fn test_multiple_style_blocks_joined_with_blank_line() {
        let html = "<style>\n a{} \n</style><p>x</p><STYLE media=\"print\">b{}</STYLE>";
        assert_eq!(extract_style(html), "a{}\n\nb{}");
        assert_eq!(extract_markup(html), "<p>x</p>");
    }

    #[test]
    fn test_style_match_is_not_greedy() {
        let html = "<style>a{}</style><p>keep</p><style>b{}</style>";
        assert_eq!(extract_markup(html), "<p>keep</p>");
    }

    #[test]
    fn test_multiline_script_body() {
        let html = "<script type=\"module\">\nconst a = 1;\nconsole.log(a);\n</script>";
        assert_eq!(extract_script(html), "const a = 1;\nconsole.log(a);");
    }

    #[test]
    fn test_no_tags_yields_empty_fragments() {
        let f = split("  <p>plain</p>  ");
        assert_eq!(f.style, "");
        assert_eq!(f.script, "");
        assert_eq!(f.markup, "<p>plain</p>");
    }

    #[test]
    fn test_reassemble_style_before_head_close() {
        let out = reassemble(&Fragments {
            markup: "<html><head></head><body></body></html>".into(),
            style: "a{}".into(),
            script: String::new(),
        });
        assert_eq!(out, "<html><head>  <style>\na{}\n  </style>\n</head><body></body></html>");
    }

    #[test]
    fn test_reassemble_style_before_body_without_head() {
        let out = reassemble(&Fragments {
            markup: "<body></body>".into(),
            style: "a{}".into(),
            script: String::new(),
        });
        assert!(out.starts_with("<style>\na{}\n</style>\n<body>"));
    }

    #[test]
    fn test_reassemble_style_prepended_without_anchors() {
        let out = reassemble(&Fragments {
            markup: "<p>x</p>".into(),
            style: "a{}".into(),
            script: String::new(),
        });
        assert_eq!(out, "<style>\na{}\n</style>\n\n<p>x</p>");
    }

    #[test]
    fn test_reassemble_script_appended_without_body() {
        let out = reassemble(&Fragments {
            markup: "<p>x</p>".into(),
            style: String::new(),
            script: "go()".into(),
        });
        assert_eq!(out, "<p>x</p>\n\n<script>\ngo()\n</script>");
    }

    #[test]
    fn test_reassemble_uses_first_anchor_only() {
        let out = reassemble(&Fragments {
            markup: "<body></body><body></body>".into(),
            style: String::new(),
            script: "go()".into(),
        });
        assert_eq!(out.matches("<script>").count(), 1);
        assert!(out.ends_with("</body><body></body>"));
    }

    #[test]
    fn test_reassemble_blank_fragments_untouched() {
        let out = reassemble(&Fragments {
            markup: "<body></body>".into(),
            style: "   ".into(),
            script: "\n".into(),
        });
        assert_eq!(out, "<body></body>");
    }

    #[test]
    fn test_from_file_name() {
        assert_eq!(FragmentKind::from_file_name("site.css"), FragmentKind::Style);
        assert_eq!(FragmentKind::from_file_name("APP.JS"), FragmentKind::Script);
        assert_eq!(FragmentKind::from_file_name("index.html"), FragmentKind::Complete);
        assert_eq!(FragmentKind::from_file_name("notes.txt"), FragmentKind::Complete);
    }

    #[test]
    fn test_set_fragment_rebuilds_complete() {
        let mut doc = Document::from_combined("<html><head></head><body></body></html>");
        doc.set_fragment(FragmentKind::Script, "run()");
        assert!(doc.complete.contains("<script>\nrun()\n  </script>\n</body>"));
        assert_eq!(split(&doc.complete).script, "run()");
    }

    #[test]
    fn test_load_file_classifies() {
        let mut doc = Document::default();
        assert_eq!(doc.load_file("a.css", "p{}"), FragmentKind::Style);
        assert_eq!(doc.css, "p{}");
        assert!(doc.complete.contains("p{}"));
        assert_eq!(doc.load_file("page.html", PAGE), FragmentKind::Complete);
        assert_eq!(doc.css, "a{color:red}");
        assert_eq!(doc.complete, PAGE);
    }

    #[test]
    fn test_clear_and_is_empty() {
        let mut doc = Document::from_combined(PAGE);
        assert!(!doc.is_empty());
        doc.clear();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_export_empty_section_errors() {
        let doc = Document::from_combined("<p>x</p>");
        assert!(matches!(
            doc.export(FragmentKind::Style, "site"),
            Err(CodeflowError::EmptyExport(FragmentKind::Style))
        ));
    }

    #[test]
    fn test_export_name_defaults() {
        assert_eq!(export_name("", FragmentKind::Script), "codeflow-project.js");
        assert_eq!(export_name("demo", FragmentKind::Markup), "demo.html");
    }

    #[test]
    fn test_bundle_export_name_suffixes_markup_only() {
        assert_eq!(bundle_export_name("site.html.v2", FragmentKind::Markup), "site.html.v2.body.html");
        assert_eq!(bundle_export_name("site.html.v2", FragmentKind::Complete), "site.html.v2.html");
        assert_eq!(bundle_export_name(" ", FragmentKind::Markup), "codeflow-project.body.html");
        assert_eq!(bundle_export_name("demo", FragmentKind::Style), "demo.css");
    }

    #[test]
    fn test_document_json_field_names() {
        let doc = Document::from_combined(PAGE);
        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["css"], "a{color:red}");
        assert_eq!(json["js"], "alert(1)");
        assert!(json.get("complete").is_some());
        assert!(json.get("html").is_some());
    }
}
