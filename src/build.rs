//! Site building orchestration.
//!
//! Executes a freshly discovered build graph into a staging directory and
//! swaps it into place only when every target succeeded.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── graph::discover()          fails → nothing written
//!     │
//!     ├── read_entries()             each entry script read once
//!     │
//!     ├── plan_styles()              entry imports → one source list per stylesheet
//!     │
//!     ├── Staging::prepare()         <output>.staging (seeded when clean = false)
//!     │
//!     ├── rayon::join
//!     │       ├── pages              bundle → render → inject, per page in parallel
//!     │       └── styles + copies    shared outputs, copy trees byte for byte
//!     │
//!     └── Staging::commit()          <output> → <output>.old, staging → <output>
//! ```

use crate::{
    config::SiteConfig,
    graph::{self, BuildGraph, BuildTarget, CopyTarget, DiskSource, PageId, StyleTarget},
    inject::{inject_tags, relative_url},
    log,
    logger::ProgressBars,
    pipeline::{
        AliasTable, Dispatch, Dispatcher, StageContext, StageError, Toolchain,
        styles::{self, StyleSources},
    },
};
use anyhow::{Context, Result};
use parking_lot::{Mutex, const_mutex};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};
use walkdir::WalkDir;

/// Held for the whole of a build; watch-triggered rebuilds queue behind it.
pub static BUILD_LOCK: Mutex<()> = const_mutex(());

/// Files never copied out of asset trees.
const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub output: PathBuf,
    pub pages: usize,
    pub styles: usize,
    pub assets: usize,
    /// Pages and style sources no rule matched; passed through unchanged.
    pub unmatched: usize,
}

/// Build the whole site.
///
/// The output directory either ends up holding this build's complete result
/// or is left exactly as it was.
pub fn build_site(config: &SiteConfig) -> Result<BuildReport> {
    let _guard = BUILD_LOCK.lock();

    let graph = graph::discover(config, &DiskSource)?;
    log!("build"; "{} pages", graph.targets.len());

    let executor = Executor::new(config)?;
    let entries = read_entries(&graph)?;
    let styles = executor.plan_styles(&graph, &entries)?;
    let assets = collect_copies(&graph.shared.copies);

    let mut staging = Staging::prepare(config)?;
    let report = executor.execute(&graph, &entries, &styles, &assets, staging.dir())?;
    staging.commit()?;

    log!(
        "build";
        "done: {} pages, {} stylesheets, {} assets → {}",
        report.pages,
        report.styles,
        report.assets,
        report.output.display()
    );
    Ok(report)
}

// ============================================================================
// Execution
// ============================================================================

/// Rule table, stage commands and import roots for one build.
struct Executor {
    dispatcher: Dispatcher,
    toolchain: Toolchain,
    aliases: AliasTable,
    root: PathBuf,
    unmatched: AtomicUsize,
}

/// Entry script text per page, read once and shared by style planning and
/// bundling.
type EntrySources = FxHashMap<PageId, String>;

/// Sources of one stylesheet, in concatenation order.
struct StylePlan<'g> {
    target: &'g StyleTarget,
    sources: StyleSources,
}

/// A file under a copy tree and where it lands.
struct AssetFile {
    source: PathBuf,
    /// Relative to the output root.
    dest: PathBuf,
}

impl Executor {
    fn new(config: &SiteConfig) -> Result<Self> {
        Ok(Self {
            dispatcher: Dispatcher::from_config(&config.build.rules)?,
            toolchain: Toolchain::from_config(config),
            aliases: AliasTable::new(&config.build.alias),
            root: config.get_root().to_path_buf(),
            unmatched: AtomicUsize::new(0),
        })
    }

    /// Resolve every stylesheet's imports up front, so a missing style file
    /// fails the build before anything is staged.
    fn plan_styles<'g>(&self, graph: &'g BuildGraph, entries: &EntrySources) -> Result<Vec<StylePlan<'g>>> {
        graph
            .shared
            .styles
            .iter()
            .map(|target| -> Result<StylePlan<'g>> {
                let sources = styles::collect(
                    target
                        .pages
                        .iter()
                        .filter_map(|page| {
                            let entry = graph.target(page)?.entry.as_path();
                            Some((entry, entries.get(page)?.as_str()))
                        }),
                    &self.aliases,
                );

                for import in &sources.unresolved {
                    log!(
                        "warn";
                        "{}: style import `{}` is not a path or alias, skipped",
                        self.display(&import.importer),
                        import.specifier
                    );
                }
                for import in &sources.resolved {
                    if let Some(file) = &import.file
                        && !file.is_file()
                    {
                        return Err(StageError::MissingStyle {
                            importer: import.importer.clone(),
                            specifier: import.specifier.clone(),
                            expected: file.clone(),
                        }
                        .into());
                    }
                }

                Ok(StylePlan { target, sources })
            })
            .collect()
    }

    fn execute(
        &self,
        graph: &BuildGraph,
        entries: &EntrySources,
        styles: &[StylePlan<'_>],
        assets: &[AssetFile],
        out: &Path,
    ) -> Result<BuildReport> {
        let progress = ProgressBars::new_filtered(&[
            ("pages", graph.targets.len()),
            ("styles", styles.len()),
            ("assets", assets.len()),
        ]);
        let tick = |name: &str| {
            if let Some(progress) = &progress {
                progress.inc_by_name(name);
            }
        };

        let (pages, (styles_res, assets_res)) = rayon::join(
            || {
                graph.targets.par_iter().try_for_each(|target| {
                    let entry = entries.get(&target.page).map_or("", String::as_str);
                    self.build_page(graph, target, entry, out)?;
                    tick("pages");
                    Ok::<_, anyhow::Error>(())
                })
            },
            || {
                rayon::join(
                    || {
                        styles.par_iter().try_for_each(|plan| {
                            self.build_stylesheet(plan, out)?;
                            tick("styles");
                            Ok::<_, anyhow::Error>(())
                        })
                    },
                    || {
                        assets.par_iter().try_for_each(|asset| {
                            self.copy_asset(asset, out)?;
                            tick("assets");
                            Ok::<_, anyhow::Error>(())
                        })
                    },
                )
            },
        );

        if let Some(progress) = &progress {
            progress.finish();
        }
        pages?;
        styles_res?;
        assets_res?;

        Ok(BuildReport {
            output: graph.output_root.clone(),
            pages: graph.targets.len(),
            styles: styles.len(),
            assets: assets.len(),
            unmatched: self.unmatched.load(Ordering::Relaxed),
        })
    }

    /// Bundle the entry, then render the template with the bundle wired in.
    fn build_page(&self, graph: &BuildGraph, target: &BuildTarget, entry: &str, out: &Path) -> Result<()> {
        let page = Some(target.page.as_str());

        let bundle = self.process(&target.entry, page, entry.as_bytes().to_vec())?;
        write_output(&out.join(&target.script), &bundle)?;

        let rendered = self.process(&target.template, page, read_source(&target.template)?.into_bytes())?;
        let scripts: Vec<_> = graph
            .scripts_for(target)
            .map(|script| relative_url(&target.html, script))
            .collect();
        let styles: Vec<_> = graph
            .stylesheet_for(&target.page)
            .map(|css| relative_url(&target.html, &css.output))
            .into_iter()
            .collect();

        let html = inject_tags(&String::from_utf8_lossy(&rendered), &scripts, &styles);
        write_output(&out.join(&target.html), html.as_bytes())
    }

    /// Stylesheets are always written, empty if nothing imports a style.
    fn build_stylesheet(&self, plan: &StylePlan<'_>, out: &Path) -> Result<()> {
        let mut css = Vec::new();
        for file in plan.sources.files() {
            let source = fs::read(file).map_err(|source| StageError::Read {
                file: file.to_path_buf(),
                source,
            })?;
            let processed = self.process(file, None, source)?;
            if !css.is_empty() && !css.ends_with(b"\n") {
                css.push(b'\n');
            }
            css.extend_from_slice(&processed);
        }
        write_output(&out.join(&plan.target.output), &css)
    }

    /// Copy trees skip the rule table entirely.
    fn copy_asset(&self, asset: &AssetFile, out: &Path) -> Result<()> {
        let dest = out.join(&asset.dest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::copy(&asset.source, &dest)
            .with_context(|| format!("Failed to copy {}", self.display(&asset.source)))?;
        Ok(())
    }

    /// Run `file`'s contents through the first matching chain.
    fn process(&self, file: &Path, page: Option<&str>, data: Vec<u8>) -> Result<Vec<u8>, StageError> {
        let relative = file.strip_prefix(&self.root).unwrap_or(file);
        match self.dispatcher.select(relative) {
            Dispatch::Chain(chain) => self.toolchain.run(chain, data, &StageContext { page, file }),
            Dispatch::PassThrough => {
                self.unmatched.fetch_add(1, Ordering::Relaxed);
                log!("warn"; "no rule matches {}, copied verbatim", relative.display());
                Ok(data)
            }
        }
    }

    fn display<'p>(&self, path: &'p Path) -> std::path::Display<'p> {
        path.strip_prefix(&self.root).unwrap_or(path).display()
    }
}

fn read_entries(graph: &BuildGraph) -> Result<EntrySources, StageError> {
    graph
        .targets
        .iter()
        .map(|t| Ok((t.page.clone(), read_source(&t.entry)?)))
        .collect()
}

fn read_source(path: &Path) -> Result<String, StageError> {
    fs::read_to_string(path).map_err(|source| StageError::Read {
        file: path.to_path_buf(),
        source,
    })
}

fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

/// Every file under each copy tree. Missing trees are skipped with a warning.
fn collect_copies(copies: &[CopyTarget]) -> Vec<AssetFile> {
    let mut files = Vec::new();
    for copy in copies {
        if !copy.from.is_dir() {
            log!("warn"; "copy source {} does not exist, skipped", copy.from.display());
            continue;
        }
        files.extend(
            WalkDir::new(&copy.from)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    let name = e.file_name().to_str().unwrap_or_default();
                    !IGNORED_FILES.contains(&name)
                })
                .filter_map(|e| {
                    let rel = e.path().strip_prefix(&copy.from).ok()?.to_path_buf();
                    Some(AssetFile {
                        dest: copy.to.join(rel),
                        source: e.into_path(),
                    })
                }),
        );
    }
    files
}

// ============================================================================
// Staging
// ============================================================================

/// Sibling directory the build writes into before it is swapped in.
///
/// Dropped without [`Staging::commit`], it removes itself and leaves the
/// output directory untouched.
struct Staging {
    output: PathBuf,
    staging: PathBuf,
    retired: PathBuf,
    committed: bool,
}

impl Staging {
    fn prepare(config: &SiteConfig) -> Result<Self> {
        let staging = Self {
            output: config.build.output.clone(),
            staging: config.staging_dir(),
            retired: config.retired_dir(),
            committed: false,
        };

        // Left over from an interrupted build.
        remove_if_exists(&staging.staging)?;

        if !config.build.clean && staging.output.is_dir() {
            copy_tree(&staging.output, &staging.staging)?;
        } else {
            fs::create_dir_all(&staging.staging).with_context(|| {
                format!("Failed to create staging directory: {}", staging.staging.display())
            })?;
        }
        Ok(staging)
    }

    fn dir(&self) -> &Path {
        &self.staging
    }

    /// Move the previous output aside, then the staged build into place.
    fn commit(&mut self) -> Result<()> {
        remove_if_exists(&self.retired)?;

        let had_output = self.output.exists();
        if had_output {
            fs::rename(&self.output, &self.retired).with_context(|| {
                format!("Failed to move aside {}", self.output.display())
            })?;
        }

        if let Err(err) = fs::rename(&self.staging, &self.output) {
            if had_output {
                fs::rename(&self.retired, &self.output).ok();
            }
            return Err(err).with_context(|| {
                format!("Failed to move build into {}", self.output.display())
            });
        }
        self.committed = true;

        if had_output && let Err(err) = fs::remove_dir_all(&self.retired) {
            log!("warn"; "could not remove {}: {err}", self.retired.display());
        }
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if !self.committed && self.staging.exists() {
            if let Err(err) = fs::remove_dir_all(&self.staging) {
                log!("warn"; "could not remove {}: {err}", self.staging.display());
            }
        }
    }
}

fn remove_if_exists(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let dest = to.join(entry.path().strip_prefix(from)?);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
