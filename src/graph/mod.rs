//! Page discovery and build graph construction.
//!
//! The graph is derived from scratch on every build, purely from the current
//! contents of the page and entry directories:
//!
//! ```text
//! catalog::PageCatalog::scan()   template dir → [PageId]
//!         │
//!         ▼
//! resolve::EntryResolver         PageId → template + entry paths
//!         │
//!         ▼
//! assemble::assemble()           → BuildGraph (targets, chunks, shared outputs)
//! ```

pub mod assemble;
pub mod catalog;
pub mod error;
pub mod pattern;
pub mod resolve;
pub mod source;

pub use assemble::{
    BuildGraph, BuildTarget, CopyTarget, GraphOptions, StyleKey, StyleTarget, assemble,
};
pub use catalog::{PageCatalog, PageId};
pub use error::GraphError;
pub use pattern::FilenamePattern;
pub use resolve::EntryResolver;
pub use source::{DiskSource, SourceDir};

use crate::{
    config::{ConfigError, SiteConfig},
    log,
};
use std::{fmt::Write, path::Path};

impl<'a> GraphOptions<'a> {
    pub fn from_config(config: &'a SiteConfig) -> Result<Self, ConfigError> {
        let build = &config.build;
        let pattern = |field: &str, value: &str| {
            FilenamePattern::parse(value)
                .map_err(|reason| ConfigError::Validation(format!("{field} {reason}")))
        };

        Ok(Self {
            resolver: EntryResolver::new(
                &build.pages,
                &build.entries,
                &build.template_ext,
                &build.script_ext,
            ),
            output_root: &build.output,
            html: pattern("[build.html_filename]", &build.html_filename)?,
            script: pattern("[build.script_filename]", &build.script_filename)?,
            css: pattern("[build.css_filename]", &build.css_filename)?,
            css_mode: build.css_mode,
            shared_css_name: &build.shared_css_name,
            copies: &build.copy,
        })
    }
}

/// Scan the configured page directory and assemble the build graph.
pub fn discover(config: &SiteConfig, source: &impl SourceDir) -> anyhow::Result<BuildGraph> {
    let opts = GraphOptions::from_config(config)?;
    let catalog = PageCatalog::scan(source, &config.build.pages, &config.build.template_ext)?;
    if catalog.is_empty() {
        log!(
            "warn";
            "no `*.{}` templates in {}",
            config.build.template_ext,
            catalog.dir().display()
        );
    }
    Ok(assemble(&catalog, source, &opts)?)
}

/// Plain-text listing of a graph, paths shown relative to `root`.
///
/// ```text
/// 2 pages → dist
///   about  src/views/pages/about.ejs + src/_entries/about.entry.js
///          → about.html, static/js/about.bundle.js [about]
/// ```
pub fn render_table(graph: &BuildGraph, root: &Path) -> String {
    let rel = |p: &Path| p.strip_prefix(root).unwrap_or(p).display().to_string();
    let width = graph
        .targets
        .iter()
        .map(|t| t.page.as_str().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "{} pages → {}", graph.targets.len(), rel(&graph.output_root));
    for t in &graph.targets {
        let chunks: Vec<_> = t.restricted_chunks.iter().map(PageId::as_str).collect();
        let _ = writeln!(
            out,
            "  {:width$}  {} + {}\n  {:width$}  → {}, {} [{}]",
            t.page.as_str(),
            rel(&t.template),
            rel(&t.entry),
            "",
            t.html.display(),
            t.script.display(),
            chunks.join(", "),
        );
    }

    let _ = writeln!(out, "{} stylesheets", graph.shared.styles.len());
    for style in &graph.shared.styles {
        let pages: Vec<_> = style.pages.iter().map(PageId::as_str).collect();
        let _ = writeln!(out, "  {} ← [{}]", style.output.display(), pages.join(", "));
    }

    if !graph.shared.copies.is_empty() {
        let _ = writeln!(out, "{} copied trees", graph.shared.copies.len());
        for copy in &graph.shared.copies {
            let _ = writeln!(out, "  {} → {}", rel(&copy.from), copy.to.display());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture(pages: &[&str], entries: &[&str]) -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.build.pages = dir.path().join("src/views/pages");
        config.build.entries = dir.path().join("src/_entries");
        config.build.output = dir.path().join("dist");
        fs::create_dir_all(&config.build.pages).unwrap();
        fs::create_dir_all(&config.build.entries).unwrap();

        for page in pages {
            fs::write(config.build.pages.join(format!("{page}.ejs")), "<p></p>").unwrap();
        }
        for entry in entries {
            fs::write(config.build.entries.join(format!("{entry}.entry.js")), "").unwrap();
        }
        (dir, config)
    }

    #[test]
    fn test_discover_from_disk() {
        let (_dir, config) = fixture(&["home", "about"], &["home", "about"]);
        let graph = discover(&config, &DiskSource).unwrap();

        let pages: Vec<_> = graph.targets.iter().map(|t| t.page.as_str()).collect();
        assert_eq!(pages, ["about", "home"]);
        assert_eq!(graph.output_root, config.build.output);
    }

    #[test]
    fn test_discover_twice_is_deep_equal() {
        let (_dir, config) = fixture(&["home", "about", "faq"], &["home", "about", "faq"]);
        assert_eq!(
            discover(&config, &DiskSource).unwrap(),
            discover(&config, &DiskSource).unwrap()
        );
    }

    #[test]
    fn test_discover_keeps_graph_error() {
        let (_dir, config) = fixture(&["home", "about"], &["home"]);
        let err = discover(&config, &DiskSource).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>(),
            Some(GraphError::MissingEntries(m)) if m.len() == 1
        ));
    }

    #[test]
    fn test_render_table() {
        let (dir, config) = fixture(&["home"], &["home"]);
        let graph = discover(&config, &DiskSource).unwrap();
        let table = render_table(&graph, dir.path());

        assert!(table.starts_with("1 pages → dist\n"));
        assert!(table.contains("home  src/views/pages/home.ejs + src/_entries/home.entry.js"));
        assert!(table.contains("→ home.html, static/js/home.bundle.js [home]"));
        assert!(table.contains("static/css/main.bundle.css ← [home]"));
    }

    #[test]
    fn test_discover_missing_page_dir() {
        let (dir, mut config) = fixture(&[], &[]);
        config.build.pages = dir.path().join("views");
        let err = discover(&config, &DiskSource).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>(),
            Some(GraphError::Discovery { .. })
        ));
    }
}
