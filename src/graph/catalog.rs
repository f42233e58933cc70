//! Page discovery: template directory → ordered page ids.

use super::{error::GraphError, source::SourceDir};
use serde::Serialize;
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Page identifier: a template's file name without its extension.
///
/// Also the chunk name binding the page's bundle to its document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `pages/about.ejs` with ext `ejs` → `about`.
    ///
    /// The extension must match exactly; dotfiles and other extensions yield `None`.
    pub fn from_template(path: &Path, template_ext: &str) -> Option<Self> {
        if path.extension()?.to_str()? != template_ext {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        (!matches!(stem, "" | "." | "..")).then(|| Self::new(stem))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which two ids count as the same page.
    ///
    /// Case-insensitive, so `home` and `Home` cannot both write `home.html`
    /// on a case-insensitive filesystem.
    pub fn fold_key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A template file found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPage {
    pub id: PageId,
    pub source: PathBuf,
}

/// The ordered page set of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCatalog {
    dir: PathBuf,
    pages: Vec<DiscoveredPage>,
}

impl PageCatalog {
    /// Scan `dir` for `*.<template_ext>` files.
    ///
    /// Pages are sorted by file name so the result does not depend on
    /// directory enumeration order. Subdirectories and other files are skipped.
    pub fn scan(
        source: &impl SourceDir,
        dir: &Path,
        template_ext: &str,
    ) -> Result<Self, GraphError> {
        let mut files = source
            .list_files(dir)
            .map_err(|source| GraphError::Discovery {
                dir: dir.to_path_buf(),
                source,
            })?;
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let pages = files
            .into_iter()
            .filter_map(|source| {
                PageId::from_template(&source, template_ext)
                    .map(|id| DiscoveredPage { id, source })
            })
            .collect();

        Ok(Self {
            dir: dir.to_path_buf(),
            pages,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pages(&self) -> &[DiscoveredPage] {
        &self.pages
    }

    pub fn ids(&self) -> impl Iterator<Item = &PageId> {
        self.pages.iter().map(|p| &p.id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
