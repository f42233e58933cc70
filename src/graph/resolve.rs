//! Naming conventions: page id → template path and entry script path.

use super::catalog::PageId;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Marker between the page id and the script extension of an entry file.
const ENTRY_MARKER: &str = "entry";

/// Paths the conventions assign to one page. Existence is not checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPage {
    pub id: PageId,
    /// `<pages>/<id>.<template_ext>`
    pub template: PathBuf,
    /// `<entries>/<id>.entry.<script_ext>`
    pub entry: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct EntryResolver<'a> {
    pages_dir: &'a Path,
    entries_dir: &'a Path,
    template_ext: &'a str,
    script_ext: &'a str,
}

impl<'a> EntryResolver<'a> {
    pub const fn new(
        pages_dir: &'a Path,
        entries_dir: &'a Path,
        template_ext: &'a str,
        script_ext: &'a str,
    ) -> Self {
        Self {
            pages_dir,
            entries_dir,
            template_ext,
            script_ext,
        }
    }

    pub fn resolve(&self, id: &PageId) -> ResolvedPage {
        ResolvedPage {
            id: id.clone(),
            template: self.template_path(id),
            entry: self.entry_path(id),
        }
    }

    pub fn template_path(&self, id: &PageId) -> PathBuf {
        self.pages_dir
            .join(format!("{}.{}", id, self.template_ext))
    }

    pub fn entry_path(&self, id: &PageId) -> PathBuf {
        self.entries_dir
            .join(format!("{}.{}.{}", id, ENTRY_MARKER, self.script_ext))
    }

    /// Inverse of [`EntryResolver::template_path`] for files inside the page directory.
    pub fn page_of_template(&self, path: &Path) -> Option<PageId> {
        if path.parent()? != self.pages_dir {
            return None;
        }
        PageId::from_template(path, self.template_ext)
    }

    /// Inverse of [`EntryResolver::entry_path`] for files inside the entry directory.
    pub fn page_of_entry(&self, path: &Path) -> Option<PageId> {
        if path.parent()? != self.entries_dir {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        let suffix = format!(".{}.{}", ENTRY_MARKER, self.script_ext);
        name.strip_suffix(&suffix)
            .filter(|id| !id.is_empty())
            .map(PageId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> EntryResolver<'static> {
        EntryResolver::new(
            Path::new("/site/src/views/pages"),
            Path::new("/site/src/_entries"),
            "ejs",
            "js",
        )
    }

    #[test]
    fn test_resolve_conventions() {
        let page = resolver().resolve(&PageId::new("about"));
        assert_eq!(page.template, PathBuf::from("/site/src/views/pages/about.ejs"));
        assert_eq!(page.entry, PathBuf::from("/site/src/_entries/about.entry.js"));
    }

    #[test]
    fn test_round_trip_from_template_path() {
        let r = resolver();
        for name in ["home", "about-us", "blog.post", "页面"] {
            let template = r.template_path(&PageId::new(name));
            let id = r.page_of_template(&template).unwrap();
            let again = r.resolve(&id);

            assert_eq!(id.as_str(), name);
            assert_eq!(again.template, template);
            assert_eq!(r.page_of_entry(&again.entry), Some(id));
        }
    }

    #[test]
    fn test_page_of_paths_outside_convention() {
        let r = resolver();
        assert_eq!(r.page_of_template(Path::new("/site/src/views/home.ejs")), None);
        assert_eq!(r.page_of_template(Path::new("/site/src/views/pages/home.html")), None);
        assert_eq!(r.page_of_entry(Path::new("/site/src/_entries/home.js")), None);
        assert_eq!(r.page_of_entry(Path::new("/site/src/_entries/.entry.js")), None);
        assert_eq!(r.page_of_entry(Path::new("/site/src/js/home.entry.js")), None);
    }
}
