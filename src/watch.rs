//! File system watcher for rebuild-on-change.
//!
//! Every change under the source root triggers a full rebuild; the build
//! graph is always derived from scratch, so there is nothing incremental to
//! track.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────────┐
//! │ notify   │───▶│ Debouncer│───▶│ handle_changes() │
//! │ events   │    │ (300ms)  │    │  reload config?  │
//! └──────────┘    └──────────┘    │  build_site()    │
//!                                 └──────────────────┘
//! ```
//!
//! Builds run on the watcher thread itself. Events arriving meanwhile queue
//! in the channel and are folded into a single pending rebuild once the
//! current one returns.

use crate::{
    build::build_site,
    config::{SiteConfig, cfg, reload_config},
    graph::{EntryResolver, PageId},
    log,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::RecvTimeoutError,
    time::{Duration, Instant},
};

const DEBOUNCE_MS: u64 = 300;

/// Directory names never worth rebuilding for.
const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "target"];

// =============================================================================
// Path Filtering
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
        || name == "4913"
}

/// What a changed path means for the next build.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Config,
    Template(PageId),
    Entry(PageId),
    Source,
}

/// Decides which events matter, against a snapshot of the config.
struct ChangeFilter {
    root: PathBuf,
    config_path: PathBuf,
    /// Build products: output, staging and retired output.
    outputs: Vec<PathBuf>,
    pages: PathBuf,
    entries: PathBuf,
    template_ext: String,
    script_ext: String,
}

impl ChangeFilter {
    fn new(config: &SiteConfig) -> Self {
        Self {
            root: config.get_root().to_path_buf(),
            config_path: config.config_path.clone(),
            outputs: vec![config.build.output.clone(), config.staging_dir(), config.retired_dir()],
            pages: config.build.pages.clone(),
            entries: config.build.entries.clone(),
            template_ext: config.build.template_ext.clone(),
            script_ext: config.build.script_ext.clone(),
        }
    }

    fn classify(&self, path: &Path) -> Option<Change> {
        if path == self.config_path {
            return Some(Change::Config);
        }
        if is_temp_file(path) || self.outputs.iter().any(|dir| path.starts_with(dir)) {
            return None;
        }
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        if rel
            .components()
            .any(|c| IGNORED_DIRS.iter().any(|dir| c.as_os_str() == *dir))
        {
            return None;
        }

        let resolver = EntryResolver::new(&self.pages, &self.entries, &self.template_ext, &self.script_ext);
        Some(if let Some(page) = resolver.page_of_template(path) {
            Change::Template(page)
        } else if let Some(page) = resolver.page_of_entry(path) {
            Change::Entry(page)
        } else {
            Change::Source
        })
    }

    /// Short human description for the rebuild log line.
    fn describe(&self, path: &Path, change: &Change) -> String {
        match change {
            Change::Config => "config changed".to_owned(),
            Change::Template(page) => format!("page `{page}` template changed"),
            Change::Entry(page) => format!("page `{page}` entry changed"),
            Change::Source => {
                let rel = path.strip_prefix(&self.root).unwrap_or(path);
                format!("{} changed", rel.display())
            }
        }
    }
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events into one rebuild.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    delay: Duration,
}

impl Debouncer {
    fn new(delay: Duration) -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            delay,
        }
    }

    fn add(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.pending.extend(paths);
        if !self.pending.is_empty() {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.delay)
    }

    /// Drain the pending set, sorted for stable logging.
    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            self.delay
        }
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// Rebuild once for a batch of changes. Returns whether a build ran.
fn handle_changes(paths: &[PathBuf], filter: &ChangeFilter) -> bool {
    let changes: Vec<_> = paths
        .iter()
        .filter_map(|path| filter.classify(path).map(|change| (path, change)))
        .collect();
    let Some((first, first_change)) = changes.first() else {
        return false;
    };

    if changes.iter().any(|(_, change)| *change == Change::Config) {
        match reload_config() {
            Ok(true) => log!("watch"; "config reloaded"),
            Ok(false) => {}
            Err(err) => {
                log!("error"; "config not reloaded: {err:#}");
                return false;
            }
        }
    }

    let reason = filter.describe(first, first_change);
    match changes.len() {
        1 => log!("watch"; "{reason}, rebuilding..."),
        n => log!("watch"; "{reason} (+{} more), rebuilding...", n - 1),
    }

    if let Err(err) = build_site(&cfg()) {
        log!("error"; "build failed, keeping previous output");
        log!("error"; "{err:#}");
    }
    true
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the source root and rebuild on change. Blocks until the event
/// channel closes.
pub fn watch_for_changes_blocking() -> Result<()> {
    let config = cfg();
    let root = config.get_root().to_path_buf();

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;
    log!("watch"; "watching {}", root.display());

    let mut debouncer = Debouncer::new(Duration::from_millis(DEBOUNCE_MS));

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => {
                // Filter against the live config, which may have been reloaded.
                let filter = ChangeFilter::new(&cfg());
                debouncer.add(
                    event
                        .paths
                        .into_iter()
                        .filter(|path| filter.classify(path).is_some()),
                );
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                handle_changes(&debouncer.take(), &ChangeFilter::new(&cfg()));
            }
            Err(RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ChangeFilter {
        let mut config = SiteConfig::default();
        config.set_root(Path::new("/site"));
        config.config_path = "/site/pagekit.toml".into();
        config.build.pages = "/site/src/views/pages".into();
        config.build.entries = "/site/src/_entries".into();
        config.build.output = "/site/dist".into();
        ChangeFilter::new(&config)
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("/site/src/home.ejs~")));
        assert!(is_temp_file(Path::new("/site/src/.home.ejs.swp")));
        assert!(is_temp_file(Path::new("/site/src/.#home.ejs")));
        assert!(is_temp_file(Path::new("/site/src/4913")));
        assert!(!is_temp_file(Path::new("/site/src/home.ejs")));
        assert!(!is_temp_file(Path::new("/site/.babelrc")));
    }

    #[test]
    fn test_classify_pages_and_entries() {
        let f = filter();
        assert_eq!(
            f.classify(Path::new("/site/src/views/pages/home.ejs")),
            Some(Change::Template(PageId::new("home")))
        );
        assert_eq!(
            f.classify(Path::new("/site/src/_entries/about.entry.js")),
            Some(Change::Entry(PageId::new("about")))
        );
        assert_eq!(
            f.classify(Path::new("/site/src/scss/main.scss")),
            Some(Change::Source)
        );
        assert_eq!(f.classify(Path::new("/site/pagekit.toml")), Some(Change::Config));
    }

    #[test]
    fn test_classify_ignores_build_products() {
        let f = filter();
        assert_eq!(f.classify(Path::new("/site/dist/home.html")), None);
        assert_eq!(f.classify(Path::new("/site/dist.staging/home.html")), None);
        assert_eq!(f.classify(Path::new("/site/dist.old/home.html")), None);
        assert_eq!(f.classify(Path::new("/site/.git/index")), None);
        assert_eq!(f.classify(Path::new("/site/node_modules/x/index.js")), None);
    }

    #[test]
    fn test_describe() {
        let f = filter();
        assert_eq!(
            f.describe(Path::new("/x"), &Change::Template(PageId::new("home"))),
            "page `home` template changed"
        );
        assert_eq!(
            f.describe(Path::new("/site/src/scss/main.scss"), &Change::Source),
            "src/scss/main.scss changed"
        );
    }

    #[test]
    fn test_debouncer_coalesces_bursts() {
        let mut d = Debouncer::new(Duration::ZERO);
        assert!(!d.ready());

        d.add([PathBuf::from("/site/a"), PathBuf::from("/site/b")]);
        d.add([PathBuf::from("/site/a")]);
        assert!(d.ready());

        assert_eq!(d.take(), [PathBuf::from("/site/a"), PathBuf::from("/site/b")]);
        assert!(!d.ready());
        assert_eq!(d.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_debouncer_waits_for_quiet_period() {
        let mut d = Debouncer::new(Duration::from_secs(3600));
        d.add([PathBuf::from("/site/a")]);
        assert!(!d.ready());
        assert_eq!(d.timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_debouncer_ignores_empty_batches() {
        let mut d = Debouncer::new(Duration::ZERO);
        d.add(std::iter::empty());
        assert!(!d.ready());
    }

    #[test]
    fn test_handle_changes_skips_irrelevant_batch() {
        let f = filter();
        assert!(!handle_changes(&[PathBuf::from("/site/dist/home.html")], &f));
    }
}
