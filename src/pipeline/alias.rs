//! Import roots such as `@scss` and `@js`.
//!
//! `@scss/base/reset.scss` resolves to `<root>/src/scss/base/reset.scss` no
//! matter which file contains the import.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Longest alias first, so `@js/vendor` beats `@js`.
    entries: Vec<(String, PathBuf)>,
}

impl AliasTable {
    pub fn new(aliases: &BTreeMap<String, PathBuf>) -> Self {
        let mut entries: Vec<_> = aliases
            .iter()
            .map(|(alias, dir)| (alias.clone(), dir.clone()))
            .collect();
        entries.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { entries }
    }

    /// Expand an aliased specifier; `None` if no alias applies.
    ///
    /// An alias only matches a whole leading segment: `@jsx/a` is not `@js`.
    pub fn expand(&self, specifier: &str) -> Option<PathBuf> {
        self.entries.iter().find_map(|(alias, dir)| {
            let rest = specifier.strip_prefix(alias.as_str())?;
            match rest.strip_prefix('/') {
                Some(rest) => Some(dir.join(rest)),
                None if rest.is_empty() => Some(dir.clone()),
                None => None,
            }
        })
    }

    /// Resolve an import found in `importer`.
    ///
    /// Aliased and relative (`./`, `../`) specifiers resolve; bare package
    /// names do not, since module resolution is left to the script stages.
    /// Results are lexically normalized, so one file always has one path.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        if let Some(path) = self.expand(specifier) {
            return Some(normalize(&path));
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = importer.parent().unwrap_or(Path::new(""));
            return Some(normalize(&base.join(specifier)));
        }
        None
    }
}

/// Drop `.` and fold `..` into its parent without touching the filesystem.
///
/// `..` past the root stays at the root; a leading `..` on a relative path
/// is kept.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AliasTable {
        AliasTable::new(&BTreeMap::from([
            ("@scss".into(), PathBuf::from("/site/src/scss")),
            ("@js".into(), PathBuf::from("/site/src/js")),
            ("@js/vendor".into(), PathBuf::from("/site/vendor")),
        ]))
    }

    #[test]
    fn test_expand_alias() {
        let t = table();
        assert_eq!(
            t.expand("@scss/pages/home.scss"),
            Some(PathBuf::from("/site/src/scss/pages/home.scss"))
        );
        assert_eq!(t.expand("@js"), Some(PathBuf::from("/site/src/js")));
    }

    #[test]
    fn test_expand_longest_alias_wins() {
        assert_eq!(
            table().expand("@js/vendor/jquery.js"),
            Some(PathBuf::from("/site/vendor/jquery.js"))
        );
    }

    #[test]
    fn test_expand_requires_segment_boundary() {
        assert_eq!(table().expand("@jsx/thing.js"), None);
        assert_eq!(table().expand("scss/main.scss"), None);
    }

    #[test]
    fn test_resolve_independent_of_importer() {
        let t = table();
        let a = t.resolve("@scss/main.scss", Path::new("/site/src/_entries/home.entry.js"));
        let b = t.resolve("@scss/main.scss", Path::new("/site/src/js/deep/nested/x.js"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_relative_and_bare() {
        let t = table();
        let importer = Path::new("/site/src/_entries/home.entry.js");
        assert_eq!(
            t.resolve("./home.css", importer),
            Some(PathBuf::from("/site/src/_entries/home.css"))
        );
        assert_eq!(
            t.resolve("../scss/a.scss", importer),
            Some(PathBuf::from("/site/src/scss/a.scss"))
        );
        assert_eq!(t.resolve("normalize.css", importer), None);
    }

    #[test]
    fn test_alias_and_relative_resolve_to_same_path() {
        let t = table();
        let importer = Path::new("/site/src/_entries/home.entry.js");
        let aliased = t.resolve("@scss/main.scss", importer).unwrap();
        let relative = t.resolve("../scss/./main.scss", importer).unwrap();
        assert_eq!(aliased.as_os_str(), relative.as_os_str());
        assert_eq!(
            t.resolve("@scss/pages/../main.scss", importer).unwrap().as_os_str(),
            aliased.as_os_str()
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("../a/../../b")), PathBuf::from("../../b"));
    }
}
