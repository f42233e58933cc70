//! Wiring a page's bundle and stylesheet into its rendered document.
//!
//! Only what the caller passes in is injected; the caller passes a target's
//! restricted chunks, never the full chunk table.

use std::path::{Component, Path};

const HEAD_CLOSE: &str = "</head>";

/// URL of `to` as seen from the document at `from_doc`.
///
/// Both paths are relative to the output root.
///
/// ```ignore
/// relative_url("blog/post.html", "static/js/post.bundle.js") // "../static/js/post.bundle.js"
/// ```
pub fn relative_url(from_doc: &Path, to: &Path) -> String {
    let depth = from_doc
        .parent()
        .map_or(0, |dir| dir.components().filter(|c| matches!(c, Component::Normal(_))).count());

    let target = to
        .components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(urlencoding::encode(&seg.to_string_lossy()).into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    "../".repeat(depth) + &target
}

/// Insert stylesheet links and deferred scripts before `</head>`.
///
/// Documents without a head get the tags prepended.
pub fn inject_tags(html: &str, scripts: &[String], styles: &[String]) -> String {
    let mut tags = String::new();
    for href in styles {
        tags.push_str(&format!(r#"<link rel="stylesheet" href="{href}">"#));
    }
    for src in scripts {
        tags.push_str(&format!(r#"<script defer src="{src}"></script>"#));
    }
    if tags.is_empty() {
        return html.to_owned();
    }

    // ASCII lowercasing keeps byte offsets intact.
    match html.to_ascii_lowercase().find(HEAD_CLOSE) {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + tags.len());
            out.push_str(&html[..at]);
            out.push_str(&tags);
            out.push_str(&html[at..]);
            out
        }
        None => tags + html,
    }
}
