//! Build graph assembly.
//!
//! Every page becomes one [`BuildTarget`] whose document may only load the
//! page's own chunk. Stylesheets and copied trees are [`SharedOutputs`] that
//! no single page owns.
//!
//! ```text
//! PageCatalog ──► EntryResolver ──► assemble() ──► BuildGraph
//!   [about,          about.ejs          about.html ─► {about}
//!    home]           about.entry.js     home.html  ─► {home}
//!                                       static/css/main.bundle.css
//! ```

use super::{
    catalog::{DiscoveredPage, PageCatalog, PageId},
    error::{GraphError, MissingEntry},
    pattern::FilenamePattern,
    resolve::EntryResolver,
    source::SourceDir,
};
use crate::config::{CopyConfig, CssMode};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

// ============================================================================
// Graph Types
// ============================================================================

/// One page: its inputs, its two outputs and the chunks its document may load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    pub page: PageId,
    pub template: PathBuf,
    pub entry: PathBuf,
    /// Document path, relative to the output root.
    pub html: PathBuf,
    /// Bundle path, relative to the output root.
    pub script: PathBuf,
    /// Always exactly `{page}`.
    pub restricted_chunks: BTreeSet<PageId>,
}

/// Which pages feed a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "page")]
pub enum StyleKey {
    Shared,
    Page(PageId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleTarget {
    pub key: StyleKey,
    /// Value substituted for `[name]`.
    pub name: String,
    /// Stylesheet path, relative to the output root.
    pub output: PathBuf,
    /// Pages whose entry imports are extracted into this stylesheet, in page order.
    pub pages: Vec<PageId>,
}

/// A resource tree copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyTarget {
    pub from: PathBuf,
    /// Destination, relative to the output root.
    pub to: PathBuf,
}

/// Outputs not owned by any single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedOutputs {
    pub styles: Vec<StyleTarget>,
    pub copies: Vec<CopyTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildGraph {
    pub output_root: PathBuf,
    pub targets: Vec<BuildTarget>,
    /// Chunk name → bundle path, relative to the output root.
    pub chunks: BTreeMap<PageId, PathBuf>,
    pub shared: SharedOutputs,
}

impl BuildGraph {
    pub fn target(&self, page: &PageId) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| &t.page == page)
    }

    /// Bundles a target's document may reference, in chunk-name order.
    pub fn scripts_for<'a>(&'a self, target: &'a BuildTarget) -> impl Iterator<Item = &'a Path> {
        target
            .restricted_chunks
            .iter()
            .filter_map(|chunk| self.chunks.get(chunk).map(PathBuf::as_path))
    }

    /// The stylesheet a page's document links to.
    pub fn stylesheet_for(&self, page: &PageId) -> Option<&StyleTarget> {
        self.shared.styles.iter().find(|s| s.pages.contains(page))
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Everything besides the catalog that shapes the graph.
#[derive(Debug, Clone)]
pub struct GraphOptions<'a> {
    pub resolver: EntryResolver<'a>,
    pub output_root: &'a Path,
    pub html: FilenamePattern,
    pub script: FilenamePattern,
    pub css: FilenamePattern,
    pub css_mode: CssMode,
    pub shared_css_name: &'a str,
    pub copies: &'a [CopyConfig],
}

/// Turn a catalog into a build graph.
///
/// Fails without producing a graph when two templates share a page id or
/// when any entry script is missing; all missing entries are reported together.
pub fn assemble(
    catalog: &PageCatalog,
    source: &impl SourceDir,
    opts: &GraphOptions<'_>,
) -> Result<BuildGraph, GraphError> {
    reject_duplicates(catalog.pages())?;

    let resolved: Vec<_> = catalog.ids().map(|id| opts.resolver.resolve(id)).collect();

    let missing: Vec<_> = resolved
        .iter()
        .filter(|page| !source.is_file(&page.entry))
        .map(|page| MissingEntry {
            page: page.id.clone(),
            expected: page.entry.clone(),
        })
        .collect();
    if !missing.is_empty() {
        return Err(GraphError::MissingEntries(missing));
    }

    let mut chunks = BTreeMap::new();
    let targets: Vec<_> = resolved
        .into_iter()
        .map(|page| {
            let script = opts.script.render(page.id.as_str());
            chunks.insert(page.id.clone(), script.clone());
            BuildTarget {
                html: opts.html.render(page.id.as_str()),
                script,
                restricted_chunks: BTreeSet::from([page.id.clone()]),
                page: page.id,
                template: page.template,
                entry: page.entry,
            }
        })
        .collect();

    let styles = match opts.css_mode {
        CssMode::Shared => vec![StyleTarget {
            key: StyleKey::Shared,
            name: opts.shared_css_name.to_owned(),
            output: opts.css.render(opts.shared_css_name),
            pages: targets.iter().map(|t| t.page.clone()).collect(),
        }],
        CssMode::PerPage => targets
            .iter()
            .map(|t| StyleTarget {
                key: StyleKey::Page(t.page.clone()),
                name: t.page.to_string(),
                output: opts.css.render(t.page.as_str()),
                pages: vec![t.page.clone()],
            })
            .collect(),
    };

    let copies = opts
        .copies
        .iter()
        .map(|c| CopyTarget {
            from: c.from.clone(),
            to: c.to.clone(),
        })
        .collect();

    Ok(BuildGraph {
        output_root: opts.output_root.to_path_buf(),
        targets,
        chunks,
        shared: SharedOutputs { styles, copies },
    })
}

/// First page id (in catalog order) claimed by more than one template.
fn reject_duplicates(pages: &[DiscoveredPage]) -> Result<(), GraphError> {
    let mut groups: FxHashMap<String, Vec<&DiscoveredPage>> = FxHashMap::default();
    for page in pages {
        groups.entry(page.id.fold_key()).or_default().push(page);
    }

    for page in pages {
        if let Some(group) = groups.get(&page.id.fold_key())
            && group.len() > 1
        {
            return Err(GraphError::DuplicatePage {
                id: page.id.clone(),
                paths: group.iter().map(|p| p.source.clone()).collect(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
