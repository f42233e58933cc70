//! Style sources referenced by entry scripts.
//!
//! Stylesheets are not discovered from the style directory; they are whatever
//! the entries import, e.g.
//!
//! ```js
//! import "@scss/pages/home.scss";
//! require("./home.css");
//! ```

use super::alias::AliasTable;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

static STYLE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)(?:^\s*import\s+(?:[^'";]*?\s+from\s+)?|\brequire\s*\(\s*)['"]([^'"\n]+\.(?:css|scss|sass))['"]"#,
    )
    .expect("style import regex is valid")
});

/// Style specifiers in `source`, in order of appearance.
pub fn style_imports(source: &str) -> Vec<&str> {
    STYLE_IMPORT
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// One style import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleImport {
    /// Entry script the import appears in.
    pub importer: PathBuf,
    pub specifier: String,
    /// `None` for bare package names.
    pub file: Option<PathBuf>,
}

/// Style imports of a list of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSources {
    /// Resolved imports, deduplicated by file, first-seen order.
    pub resolved: Vec<StyleImport>,
    /// Bare specifiers, which are not looked up.
    pub unresolved: Vec<StyleImport>,
}

impl StyleSources {
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.resolved.iter().filter_map(|import| import.file.as_deref())
    }
}

/// Collect the style imports of `entries` (already read) in order.
pub fn collect<'a>(
    entries: impl IntoIterator<Item = (&'a Path, &'a str)>,
    aliases: &AliasTable,
) -> StyleSources {
    let mut seen = FxHashSet::default();
    let mut sources = StyleSources::default();

    for (entry, text) in entries {
        for specifier in style_imports(text) {
            let file = aliases.resolve(specifier, entry);
            let import = StyleImport {
                importer: entry.to_path_buf(),
                specifier: specifier.to_owned(),
                file: file.clone(),
            };
            match file {
                Some(path) => {
                    if seen.insert(path) {
                        sources.resolved.push(import);
                    }
                }
                None => sources.unresolved.push(import),
            }
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn aliases() -> AliasTable {
        AliasTable::new(&BTreeMap::from([(
            "@scss".into(),
            PathBuf::from("/site/src/scss"),
        )]))
    }

    #[test]
    fn test_style_imports() {
        let src = r#"
import "@scss/main.scss";
import styles from './home.module.css';
import { render } from "@js/render.js";
const legacy = require("../scss/legacy.sass");
// import "@scss/commented.scss" is still a line starting with //, not import
import '@scss/pages/home.scss'
"#;
        assert_eq!(
            style_imports(src),
            [
                "@scss/main.scss",
                "./home.module.css",
                "../scss/legacy.sass",
                "@scss/pages/home.scss",
            ]
        );
    }

    #[test]
    fn test_style_imports_ignores_scripts() {
        assert!(style_imports("import x from './x.js';\nimport './y.json';").is_empty());
    }

    #[test]
    fn test_collect_dedups_in_first_seen_order() {
        let home = Path::new("/site/src/_entries/home.entry.js");
        let about = Path::new("/site/src/_entries/about.entry.js");
        let sources = collect(
            [
                (about, "import '@scss/main.scss';\nimport '@scss/about.scss';"),
                (home, "import '@scss/main.scss';\nimport '@scss/home.scss';"),
            ],
            &aliases(),
        );

        let files: Vec<_> = sources.files().collect();
        assert_eq!(
            files,
            [
                Path::new("/site/src/scss/main.scss"),
                Path::new("/site/src/scss/about.scss"),
                Path::new("/site/src/scss/home.scss"),
            ]
        );
        assert_eq!(sources.resolved[0].importer, about);
        assert!(sources.unresolved.is_empty());
    }

    #[test]
    fn test_collect_dedups_alias_and_relative_imports() {
        let home = Path::new("/site/src/_entries/home.entry.js");
        let about = Path::new("/site/src/_entries/about.entry.js");
        let sources = collect(
            [
                (home, "import '@scss/main.scss';"),
                (about, "import '../scss/main.scss';\nimport './about.css';"),
            ],
            &aliases(),
        );

        let files: Vec<_> = sources.files().collect();
        assert_eq!(
            files,
            [
                Path::new("/site/src/scss/main.scss"),
                Path::new("/site/src/_entries/about.css"),
            ]
        );
        assert_eq!(sources.resolved[0].importer, home);
    }

    #[test]
    fn test_collect_reports_bare_specifiers() {
        let home = Path::new("/site/src/_entries/home.entry.js");
        let sources = collect([(home, "import 'normalize.css';")], &aliases());

        assert!(sources.resolved.is_empty());
        assert_eq!(
            sources.unresolved,
            [StyleImport {
                importer: home.to_path_buf(),
                specifier: "normalize.css".into(),
                file: None,
            }]
        );
    }
}
